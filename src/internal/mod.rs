//! Internal implementation details.

pub(crate) mod toposort;

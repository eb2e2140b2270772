//! Layered topological ordering.

use std::collections::{HashMap, HashSet};

use crate::error::{JabError, JabResult};

/// Orders `nodes` so every node comes after the nodes it depends on.
///
/// `edges` are `(dependent, dependency)` pairs. Endpoints missing from `nodes`
/// are appended as extra nodes. Each layer holds every node whose
/// dependencies are all placed, in input order, which makes the result
/// deterministic. Nodes that can never be placed are reported as a cycle.
pub(crate) fn order<'a, N, E>(nodes: N, edges: E) -> JabResult<Vec<String>>
where
    N: IntoIterator<Item = &'a str>,
    E: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut all: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for node in nodes {
        if seen.insert(node) {
            all.push(node);
        }
    }

    let mut pending: HashMap<&str, HashSet<&str>> = HashMap::new();
    for (from, to) in edges {
        for endpoint in [from, to] {
            if seen.insert(endpoint) {
                all.push(endpoint);
            }
        }
        pending.entry(from).or_default().insert(to);
    }
    for node in &all {
        pending.entry(*node).or_default();
    }

    let mut ordered = Vec::with_capacity(all.len());
    loop {
        let layer: Vec<&str> = all
            .iter()
            .copied()
            .filter(|n| pending.get(n).is_some_and(|deps| deps.is_empty()))
            .collect();
        if layer.is_empty() {
            break;
        }

        for node in &layer {
            pending.remove(node);
        }
        for deps in pending.values_mut() {
            for node in &layer {
                deps.remove(node);
            }
        }
        ordered.extend(layer.into_iter().map(str::to_string));
    }

    if !pending.is_empty() {
        let cycle = all
            .into_iter()
            .filter(|n| pending.contains_key(n))
            .map(str::to_string)
            .collect();
        return Err(JabError::CircularDependency { cycle });
    }

    Ok(ordered)
}

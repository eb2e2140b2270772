//! Harness configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON document, then
//! `JAB_`-prefixed environment variables. Later layers win.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{JabError, JabResult};

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "JAB";

/// What the request adapter does when several components can handle requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerPolicy {
    /// Bind the first candidate in construction order and log a warning.
    #[default]
    FirstMatch,
    /// Refuse to bind and report every candidate.
    Reject,
}

impl std::str::FromStr for HandlerPolicy {
    type Err = JabError;

    fn from_str(s: &str) -> JabResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "first_match" | "first" => Ok(HandlerPolicy::FirstMatch),
            "reject" => Ok(HandlerPolicy::Reject),
            other => Err(JabError::Config(format!("unknown handler policy '{other}'"))),
        }
    }
}

/// Harness settings.
///
/// # Examples
///
/// ```rust
/// use jab::{HandlerPolicy, HarnessConfig};
///
/// let config = HarnessConfig::from_json(r#"{ "require_async_start": true, "handler_policy": "reject" }"#).unwrap();
/// assert!(config.require_async_start);
/// assert_eq!(config.handler_policy, HandlerPolicy::Reject);
/// assert_eq!(config.start_timeout(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Reject blocking `on_start` hooks instead of running them in place.
    pub require_async_start: bool,
    /// Upper bound for the whole Starting phase.
    pub start_timeout_ms: Option<u64>,
    /// Upper bound for each `on_stop` hook.
    pub stop_hook_timeout_ms: Option<u64>,
    pub handler_policy: HandlerPolicy,
    /// Default `tracing` filter directive.
    pub log_filter: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            require_async_start: false,
            start_timeout_ms: None,
            stop_hook_timeout_ms: None,
            handler_policy: HandlerPolicy::FirstMatch,
            log_filter: "info".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Defaults overlaid with a JSON document. Missing keys keep their default.
    pub fn from_json(json: &str) -> JabResult<Self> {
        serde_json::from_str(json).map_err(|e| JabError::Config(format!("invalid JSON configuration: {e}")))
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> JabResult<Self> {
        Self::default().with_env()
    }

    /// Defaults, then `json` if given, then the process environment.
    pub fn load(json: Option<&str>) -> JabResult<Self> {
        let base = match json {
            Some(json) => Self::from_json(json)?,
            None => Self::default(),
        };
        base.with_env()
    }

    /// Overlays `JAB_*` variables from the process environment.
    pub fn with_env(self) -> JabResult<Self> {
        self.with_vars(env::vars())
    }

    /// Overlays `JAB_*` entries from an arbitrary variable list.
    pub fn with_vars<I, K, V>(mut self, vars: I) -> JabResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let prefix = format!("{ENV_PREFIX}_");
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(k, v)| {
                k.as_ref()
                    .strip_prefix(&prefix)
                    .map(|key| (key.to_ascii_lowercase(), v.as_ref().to_string()))
            })
            .collect();

        if let Some(value) = vars.get("require_async_start") {
            self.require_async_start = parse_bool("require_async_start", value)?;
        }
        if let Some(value) = vars.get("start_timeout_ms") {
            self.start_timeout_ms = parse_millis("start_timeout_ms", value)?;
        }
        if let Some(value) = vars.get("stop_hook_timeout_ms") {
            self.stop_hook_timeout_ms = parse_millis("stop_hook_timeout_ms", value)?;
        }
        if let Some(value) = vars.get("handler_policy") {
            self.handler_policy = value.parse()?;
        }
        if let Some(value) = vars.get("log_filter") {
            self.log_filter = value.clone();
        }
        Ok(self)
    }

    pub fn start_timeout(&self) -> Option<Duration> {
        self.start_timeout_ms.map(Duration::from_millis)
    }

    pub fn stop_hook_timeout(&self) -> Option<Duration> {
        self.stop_hook_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_bool(key: &str, value: &str) -> JabResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(JabError::Config(format!("{key}: expected a boolean, got '{value}'"))),
    }
}

// An empty value clears the timeout.
fn parse_millis(key: &str, value: &str) -> JabResult<Option<u64>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    value
        .trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| JabError::Config(format!("{key}: expected milliseconds, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert!(!config.require_async_start);
        assert_eq!(config.stop_hook_timeout(), None);
        assert_eq!(config.handler_policy, HandlerPolicy::FirstMatch);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_env_overrides_json() {
        let config = HarnessConfig::from_json(r#"{ "start_timeout_ms": 100, "log_filter": "debug" }"#)
            .unwrap()
            .with_vars([
                ("JAB_START_TIMEOUT_MS", "250"),
                ("JAB_HANDLER_POLICY", "reject"),
                ("JAB_REQUIRE_ASYNC_START", "yes"),
                ("OTHER_LOG_FILTER", "trace"),
            ])
            .unwrap();

        assert_eq!(config.start_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.handler_policy, HandlerPolicy::Reject);
        assert!(config.require_async_start);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(HarnessConfig::from_json("{ nope"), Err(JabError::Config(_))));
        assert!(HarnessConfig::default().with_vars([("JAB_START_TIMEOUT_MS", "soon")]).is_err());
        assert!(HarnessConfig::default().with_vars([("JAB_HANDLER_POLICY", "random")]).is_err());
        assert!(HarnessConfig::default().with_vars([("JAB_REQUIRE_ASYNC_START", "maybe")]).is_err());
    }

    #[test]
    fn test_empty_value_clears_timeout() {
        let config = HarnessConfig::from_json(r#"{ "stop_hook_timeout_ms": 5 }"#)
            .unwrap()
            .with_vars([("JAB_STOP_HOOK_TIMEOUT_MS", "")])
            .unwrap();
        assert_eq!(config.stop_hook_timeout_ms, None);
    }
}

//! # Configuration
//!
//! A string key/value store mirroring Feathers' `app.set()` / `app.get()`.
//! Hooks receive an immutable snapshot taken when the call starts.
//!
//! ```rust
//! use qsl_core::QslApp;
//! let app = QslApp::<(), ()>::new();
//!
//! app.set("paginate.default", "10");
//! assert_eq!(app.get("paginate.default"), Some("10".to_string()));
//! ```
//!
//! [`load_env_config`] copies prefixed environment variables into the store:
//! `QSL__PAGINATE__MAX=50` becomes `paginate.max = 50`.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct QslConfig {
    values: HashMap<String, String>,
}

impl QslConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn snapshot(&self) -> QslConfigSnapshot {
        QslConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QslConfigSnapshot {
    map: HashMap<String, String>,
}

impl QslConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse::<u32>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }

    /// Accepts plain seconds (`3600`) or suffixed values (`90s`, `30m`, `12h`, `7d`).
    pub fn get_duration(&self, key: &str) -> Option<Duration> {
        self.get(key).and_then(parse_duration)
    }
}

pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let n: u64 = digits.parse().ok()?;
    let secs = match unit.trim() {
        "" | "s" => n,
        "m" => n.checked_mul(60)?,
        "h" => n.checked_mul(3_600)?,
        "d" => n.checked_mul(86_400)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

/// Copy `PREFIX__A__B=value` environment variables into `a.b = value`.
pub fn load_env_config<R, P>(app: &crate::QslApp<R, P>, prefix: &str)
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    for (key, value) in std::env::vars() {
        if let Some(stripped) = key.strip_prefix(prefix) {
            let normalized = stripped
                .trim_start_matches('_')
                .to_lowercase()
                .replace("__", ".");
            if !normalized.is_empty() {
                app.set(normalized, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_accept_suffixes() {
        assert_eq!(parse_duration("3600"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("30m"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_duration("7d"), Some(Duration::from_secs(604_800)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("5w"), None);
    }

    #[test]
    fn snapshot_parses_typed_values() {
        let mut cfg = QslConfig::new();
        cfg.set("paginate.max", "100");
        cfg.set("flag", "true");
        let snap = cfg.snapshot();
        assert_eq!(snap.get_usize("paginate.max"), Some(100));
        assert_eq!(snap.get_bool("flag"), Some(true));
        assert_eq!(snap.get_usize("missing"), None);
    }
}

use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Where the client finds its backend. Both endpoints are required; a client
/// built without them cannot do anything, so startup stops there.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: String,
    pub anon_key: String,
    /// File backing the persisted key-value state. In-memory when unset.
    pub state_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        Ok(Self {
            backend_url: required("DUO_BACKEND_URL")?.trim_end_matches('/').to_string(),
            anon_key: required("DUO_ANON_KEY")?,
            state_path: lookup("DUO_STATE_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn both_endpoints_are_required() {
        let err = ClientConfig::from_lookup(lookup(&[("DUO_ANON_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DUO_BACKEND_URL")));

        let err = ClientConfig::from_lookup(lookup(&[
            ("DUO_BACKEND_URL", "http://localhost:3000"),
            ("DUO_ANON_KEY", "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DUO_ANON_KEY")));
    }

    #[test]
    fn trailing_slash_is_dropped() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("DUO_BACKEND_URL", "http://localhost:3000/"),
            ("DUO_ANON_KEY", "k"),
        ]))
        .unwrap();
        assert_eq!(config.backend_url, "http://localhost:3000");
        assert!(config.state_path.is_none());
    }
}

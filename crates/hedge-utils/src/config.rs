//! Configuration management utilities

use serde::{Deserialize, Serialize};

/// Deployment environment, read from `HEDGE_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Parse an environment name, falling back to development
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Application-level settings shared by binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name
    pub app_name: String,
    /// Environment (development, production)
    pub environment: Environment,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "autohedge".to_string(),
            environment: Environment::Development,
        }
    }
}

impl AppConfig {
    /// Load settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            app_name: lookup("HEDGE_APP_NAME").unwrap_or(defaults.app_name),
            environment: lookup("HEDGE_ENV")
                .map_or(defaults.environment, |v| Environment::parse(&v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.app_name, "autohedge");
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("HEDGE_ENV", "Production"), ("HEDGE_APP_NAME", "swarms-fund")]);
        let config = AppConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.app_name, "swarms-fund");
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("prod"), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(
            serde_json::to_string(&Environment::Production).unwrap(),
            "\"production\""
        );
    }
}

//! Configuration management.
//!
//! Settings load from an optional `Config.toml` in the working directory,
//! then apply `SDK_*` environment variable overrides. Every field has a
//! default, so a store can be constructed with no configuration at all.

use std::env;
use std::time::Duration;

use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// TTL applied by `get` when the caller does not pass one, in seconds.
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,
    /// Source names to warm speculatively at startup via `preload_all`.
    #[serde(default)]
    pub preload_sources: Vec<String>,
}

fn default_ttl_seconds() -> u64 {
    crate::data_store::DEFAULT_TTL.as_secs()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_ttl_seconds(),
            preload_sources: Vec::new(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("Config").required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Environment variable overrides
        if let Ok(raw_ttl) = env::var("SDK_DEFAULT_TTL_SECONDS") {
            if let Ok(ttl) = raw_ttl.trim().parse() {
                settings.default_ttl_seconds = ttl;
            }
        }
        if let Ok(raw_sources) = env::var("SDK_PRELOAD_SOURCES") {
            if let Some(list) = parse_string_list(&raw_sources) {
                if !list.is_empty() {
                    settings.preload_sources = list;
                }
            }
        }

        Ok(settings)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }
}

/// Parse a comma-separated list, tolerating surrounding whitespace and empty
/// segments. Returns None for a blank input.
fn parse_string_list(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        trimmed
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_config_file() {
        let settings = Settings::default();
        assert_eq!(settings.default_ttl_seconds, 3600);
        assert_eq!(settings.default_ttl(), Duration::from_secs(3600));
        assert!(settings.preload_sources.is_empty());
    }

    #[test]
    fn parses_comma_separated_lists() {
        assert_eq!(
            parse_string_list("rules, dicts ,networks"),
            Some(vec![
                "rules".to_string(),
                "dicts".to_string(),
                "networks".to_string()
            ])
        );
        assert_eq!(parse_string_list("   "), None);
        assert_eq!(parse_string_list("solo"), Some(vec!["solo".to_string()]));
    }

    // The only test that touches SDK_* variables; keep it that way, env is
    // process-wide.
    #[test]
    fn environment_overrides_the_default_ttl() {
        env::set_var("SDK_DEFAULT_TTL_SECONDS", "45");
        let settings = Settings::new().unwrap();
        env::remove_var("SDK_DEFAULT_TTL_SECONDS");

        assert_eq!(settings.default_ttl_seconds, 45);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        std::fs::write(
            &path,
            "default_ttl_seconds = 120\npreload_sources = [\"rules\"]\n",
        )
        .unwrap();

        let s = Config::builder()
            .add_source(File::from(path))
            .build()
            .unwrap();
        let settings: Settings = s.try_deserialize().unwrap();

        assert_eq!(settings.default_ttl_seconds, 120);
        assert_eq!(settings.preload_sources, vec!["rules".to_string()]);
    }
}

//! Engine-wide defaults, loaded from a TOML file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_num_tries() -> u32 {
    1
}

fn default_retry_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Defaults handed to `Template::create`/`Handle::exec` when a caller
/// doesn't pass explicit `numTries`/`retryInterval` arguments of its own.
///
/// These are genuinely just defaults: a caller's explicit `exec(numTries,
/// retryInterval)` arguments always win, at any single call site, over
/// whatever this config carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default retry budget for a fresh `exec`/`undo` call.
    #[serde(default = "default_num_tries")]
    pub default_num_tries: u32,
    /// Default pause between retry attempts, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub default_retry_interval_ms: u64,
    /// The `log` crate level name (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`) the global logger is initialised at, unless overridden by
    /// the `RUST_LOG` environment variable.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_num_tries: default_num_tries(),
            default_retry_interval_ms: default_retry_interval_ms(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Parses a config from TOML source.
    pub fn from_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// `default_retry_interval_ms` as a `Duration`.
    pub fn default_retry_interval(&self) -> Duration {
        Duration::from_millis(self.default_retry_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_is_empty() {
        let config = EngineConfig::from_str("").unwrap();
        assert_eq!(config.default_num_tries, 1);
        assert_eq!(config.default_retry_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn overrides_only_what_is_present() {
        let config = EngineConfig::from_str("default_num_tries = 3\n").unwrap();
        assert_eq!(config.default_num_tries, 3);
        assert_eq!(config.log_level, "info");
    }
}

use std::env;
use std::path::PathBuf;
#[cfg(test)]
use std::sync::Mutex;

use clap::ValueEnum;

use crate::telemetry::logging::LogLevel;

/// Settings read from the environment. Command-line flags override them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let log_level = env::var("MIRRORDOM_LOG_LEVEL")
            .ok()
            .and_then(|value| LogLevel::from_str(value.trim(), true).ok())
            .unwrap_or_default();
        let log_file = env::var_os("MIRRORDOM_LOG_FILE")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let pretty = env::var("MIRRORDOM_PRETTY")
            .map(|value| value != "0" && !value.is_empty())
            .unwrap_or(false);
        Self {
            log_level,
            log_file,
            pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    // Mutex to ensure environment variable tests don't run in parallel
    static ENV_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    const VARS: &[&str] = &["MIRRORDOM_LOG_LEVEL", "MIRRORDOM_LOG_FILE", "MIRRORDOM_PRETTY"];

    fn with_env(values: &[(&str, &str)], check: impl FnOnce()) {
        let _lock = ENV_MUTEX.lock().unwrap();
        let saved: Vec<_> = VARS.iter().map(|var| (*var, env::var_os(var))).collect();
        unsafe {
            for var in VARS {
                env::remove_var(var);
            }
            for (var, value) in values {
                env::set_var(var, value);
            }
        }
        check();
        unsafe {
            for (var, value) in saved {
                match value {
                    Some(value) => env::set_var(var, value),
                    None => env::remove_var(var),
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_default() {
        with_env(&[], || {
            assert_eq!(Config::from_env(), Config::default());
        });
    }

    #[test]
    fn test_config_from_env_custom() {
        with_env(
            &[
                ("MIRRORDOM_LOG_LEVEL", "Debug"),
                ("MIRRORDOM_LOG_FILE", "/tmp/mirrordom.log"),
                ("MIRRORDOM_PRETTY", "1"),
            ],
            || {
                let config = Config::from_env();
                assert_eq!(config.log_level, LogLevel::Debug);
                assert_eq!(config.log_file, Some(PathBuf::from("/tmp/mirrordom.log")));
                assert!(config.pretty);
            },
        );
    }

    #[test]
    fn test_config_ignores_unknown_level() {
        with_env(&[("MIRRORDOM_LOG_LEVEL", "loud"), ("MIRRORDOM_PRETTY", "0")], || {
            let config = Config::from_env();
            assert_eq!(config.log_level, LogLevel::Warn);
            assert!(!config.pretty);
        });
    }
}

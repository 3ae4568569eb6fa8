//! Ambient settings carried alongside the pipeline topology
//!
//! These do not change what the pipeline computes, only how the binary
//! around it behaves: log verbosity and destination.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default `EnvFilter` directive when `RUST_LOG` is unset
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `warn,conveyer=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to this file (created or truncated on start)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Split `file` into the directory and file name `tracing_appender` expects.
    pub fn file_parts(&self) -> Option<(PathBuf, PathBuf)> {
        let file = self.file.as_ref()?;
        let name = file.file_name()?;
        let dir = match file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Some((dir, PathBuf::from(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.level, "info");
        assert!(logging.file_parts().is_none());
    }

    #[test]
    fn test_file_parts() {
        let logging = LoggingConfig {
            file: Some(PathBuf::from("logs/conveyer.log")),
            ..Default::default()
        };
        assert_eq!(
            logging.file_parts(),
            Some((PathBuf::from("logs"), PathBuf::from("conveyer.log")))
        );

        let bare = LoggingConfig {
            file: Some(PathBuf::from("conveyer.log")),
            ..Default::default()
        };
        assert_eq!(
            bare.file_parts(),
            Some((PathBuf::from("."), PathBuf::from("conveyer.log")))
        );
    }
}

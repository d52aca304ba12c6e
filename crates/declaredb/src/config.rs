//! Reconciliation configuration.
//!
//! An explicit value passed to the runner; there is no process-wide
//! configuration state.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    5432
}

/// Connection parameters and behavioral flags for a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Database adapter name.
    #[serde(default)]
    pub adapter: String,
    /// Database host.
    #[serde(default)]
    pub host: String,
    /// Database port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database name.
    #[serde(default)]
    pub database: String,
    /// User name.
    #[serde(default)]
    pub user: String,
    /// Password.
    #[serde(default)]
    pub password: String,
    /// Emit a human-readable change log before applying (default: on).
    #[serde(default = "default_true")]
    pub log_changes: bool,
    /// Compute changes but roll the transaction back unconditionally
    /// (default: off).
    #[serde(default)]
    pub dry_run: bool,
    /// Re-read and re-diff after applying, failing on any remaining
    /// difference (default: on).
    #[serde(default = "default_true")]
    pub post_check: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adapter: "postgres".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            database: String::new(),
            user: String::new(),
            password: String::new(),
            log_changes: true,
            dry_run: false,
            post_check: true,
        }
    }
}

impl Config {
    /// Creates a configuration with default flags for the given
    /// database.
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Enables or disables the change log.
    #[must_use]
    pub fn log_changes(mut self, enabled: bool) -> Self {
        self.log_changes = enabled;
        self
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Enables or disables the post-apply consistency check.
    #[must_use]
    pub fn post_check(mut self, enabled: bool) -> Self {
        self.post_check = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = Config::new("app_db");
        assert!(config.log_changes);
        assert!(!config.dry_run);
        assert!(config.post_check);
        assert_eq!(config.database, "app_db");
    }

    #[test]
    fn builder_flags() {
        let config = Config::new("app_db").dry_run(true).post_check(false);
        assert!(config.dry_run);
        assert!(!config.post_check);
    }
}

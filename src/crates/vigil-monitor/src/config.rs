//! Monitoring configuration.
//!
//! The configuration file is JSON with comment support: `#` and `//` line
//! comments and `/* */` block comments are stripped before parsing, so the
//! file deployed next to the instrumented service can be annotated.

use crate::error::{MonitorError, Result};
use serde::Deserialize;
use std::path::Path;

fn default_verdict_server_url() -> String {
    "http://localhost:9001/".to_string()
}

fn default_verbose() -> bool {
    true
}

/// Recognized configuration keys, with their defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the verdict server.
    #[serde(default = "default_verdict_server_url")]
    pub verdict_server_url: String,

    /// When set, monitoring activity is written to the monitoring log.
    #[serde(default = "default_verbose")]
    pub verbose: bool,

    /// Root under which `binding_spaces/` lives.
    #[serde(default)]
    pub project_root: String,

    /// When non-empty the monitor persists across requests; otherwise it is
    /// created and torn down per request.
    #[serde(default)]
    pub service_module: String,

    /// `"yes"` enables test-framework mode.
    #[serde(default)]
    pub test: String,

    /// Directory holding the test suite. Mandatory in test mode.
    #[serde(default)]
    pub test_module: String,

    /// Optional prefix for qualified function identifiers, distinguishing
    /// machines that share a verdict server.
    #[serde(default)]
    pub machine_id: String,

    /// When present, integrators should construct an offset-adjusted clock
    /// from a query against this host.
    #[serde(default)]
    pub ntp_server: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verdict_server_url: default_verdict_server_url(),
            verbose: default_verbose(),
            project_root: String::new(),
            service_module: String::new(),
            test: String::new(),
            test_module: String::new(),
            machine_id: String::new(),
            ntp_server: None,
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&strip_comments(&raw))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a string (comments allowed).
    pub fn from_str(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(&strip_comments(raw))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.test_mode() && self.test_module.is_empty() {
            return Err(MonitorError::Configuration(
                "test mode requires a test_module".to_string(),
            ));
        }
        Ok(())
    }

    pub fn test_mode(&self) -> bool {
        self.test.contains("yes")
    }

    /// Machine prefix applied to qualified function identifiers.
    pub fn machine_prefix(&self) -> String {
        if self.machine_id.is_empty() {
            String::new()
        } else {
            format!("{}-", self.machine_id)
        }
    }
}

fn strip_comments(raw: &str) -> String {
    let mut content = String::new();
    let mut in_block = false;
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("/*") {
            in_block = true;
        }
        if trimmed.ends_with("*/") {
            in_block = false;
            continue;
        }
        if in_block || trimmed.starts_with('#') || trimmed.starts_with("//") {
            continue;
        }
        content.push_str(line);
        content.push('\n');
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_str("{}").unwrap();
        assert_eq!(config.verdict_server_url, "http://localhost:9001/");
        assert!(config.verbose);
        assert!(config.project_root.is_empty());
        assert!(!config.test_mode());
    }

    #[test]
    fn test_comments_are_stripped() {
        let raw = r#"
# deployment config
// local overrides
/* block
   comment */
{
    "verdict_server_url": "http://verdicts:9001/",
    "machine_id": "web-1"
}
"#;
        let config = Config::from_str(raw).unwrap();
        assert_eq!(config.verdict_server_url, "http://verdicts:9001/");
        assert_eq!(config.machine_prefix(), "web-1-");
    }

    #[test]
    fn test_test_mode_requires_test_module() {
        let err = Config::from_str(r#"{"test": "yes"}"#).unwrap_err();
        assert!(matches!(err, MonitorError::Configuration(_)));

        let ok = Config::from_str(r#"{"test": "yes", "test_module": "tests"}"#).unwrap();
        assert!(ok.test_mode());
    }
}

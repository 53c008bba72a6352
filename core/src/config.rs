//! Daemon configuration loading and validation
//!
//! The daemon's settings can come from CLI flags or a TOML file; this
//! module parses the TOML form into `sitter_schema::DaemonConfig`
//! (serde defaults fill in omitted fields) and performs strict
//! validation with field-path error messages.

use crate::{CoreError, Result};
use sitter_schema::DaemonConfig;
use std::fs;
use std::path::Path;

/// Load a daemon configuration from a TOML file
pub fn load_config_from_toml_path(path: &Path) -> Result<DaemonConfig> {
    let raw = fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!("failed to read {}: {}", path.display(), e))
    })?;
    let config: DaemonConfig = toml::from_str(&raw).map_err(|e| {
        CoreError::Config(format!("failed to parse {}: {}", path.display(), e))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration values
pub fn validate_config(config: &DaemonConfig) -> Result<()> {
    if config.socket_path.as_os_str().is_empty() {
        return Err(CoreError::Config(
            "socketPath: cannot be empty".to_string(),
        ));
    }
    if config.grace_period_ms == 0 {
        return Err(CoreError::Config(
            "gracePeriodMs: must be greater than 0".to_string(),
        ));
    }
    if let Some(stdout_file) = &config.stdout_file {
        if stdout_file.as_os_str().is_empty() {
            return Err(CoreError::Config(
                "stdoutFile: cannot be empty when set".to_string(),
            ));
        }
    }
    match config.log_level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        other => Err(CoreError::Config(format!(
            "logLevel: '{}' is not one of trace, debug, info, warn, error",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_temp_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sitter.toml");
        let mut file = fs::File::create(&path).expect("create config");
        file.write_all(contents.as_bytes()).expect("write config");
        (dir, path)
    }

    #[test]
    fn test_load_full_config() {
        let (_dir, path) = write_temp_config(
            r#"
socketPath = "/tmp/sitter-test.sock"
stdoutFile = "/tmp/sitter-out.log"
defaultRetries = 2
gracePeriodMs = 250
logLevel = "debug"
"#,
        );
        let config = load_config_from_toml_path(&path).expect("load");
        assert_eq!(config.socket_path, PathBuf::from("/tmp/sitter-test.sock"));
        assert_eq!(config.stdout_file, Some(PathBuf::from("/tmp/sitter-out.log")));
        assert_eq!(config.default_retries, 2);
        assert_eq!(config.grace_period_ms, 250);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let (_dir, path) = write_temp_config("socketPath = \"/tmp/x.sock\"\n");
        let config = load_config_from_toml_path(&path).expect("load");
        assert_eq!(config.default_retries, 0);
        assert_eq!(config.grace_period_ms, 1000);
        assert!(config.stdout_file.is_none());
    }

    #[test]
    fn test_rejects_zero_grace_period() {
        let (_dir, path) = write_temp_config(
            "socketPath = \"/tmp/x.sock\"\ngracePeriodMs = 0\n",
        );
        let err = load_config_from_toml_path(&path).unwrap_err();
        assert!(err.to_string().contains("gracePeriodMs"));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut config = DaemonConfig::default();
        config.log_level = "loud".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("logLevel"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_config_from_toml_path(Path::new("/nonexistent/sitter.toml")).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}

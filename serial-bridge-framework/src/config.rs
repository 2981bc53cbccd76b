//! Configuration traits and utilities.

use serde::de::DeserializeOwned;

use crate::BridgeArgs;
use crate::LoggingConfig;
use crate::error::{BridgeError, Result};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// JSON5 loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use serial_bridge_framework::{BridgeConfig, LoggingConfig};
///
/// #[derive(Debug, Default, Deserialize)]
/// pub struct MyBridgeConfig {
///     #[serde(default)]
///     pub logging: LoggingConfig,
///     pub port: String,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn validate(&self) -> Result<()> {
///         if self.port.is_empty() {
///             return Err(BridgeError::validation("port cannot be empty"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Validate the configuration.
    ///
    /// Bridges call this once their overrides are applied. Override to add
    /// custom validation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load from `--config` when given, otherwise start from the JSON5 empty
    /// document so every `#[serde(default)]` applies.
    ///
    /// Validation is left to the caller, which usually applies CLI and
    /// environment overrides first.
    fn load_or_default(args: &BridgeArgs) -> Result<Self> {
        match &args.config {
            Some(path) => {
                if !path.exists() {
                    return Err(BridgeError::ConfigNotFound {
                        path: path.display().to_string(),
                    });
                }
                let content = std::fs::read_to_string(path)?;
                Ok(json5::from_str(&content)?)
            }
            None => Ok(json5::from_str("{}")?),
        }
    }
}

/// Initialise tracing from the configuration, honouring `--log-level`.
pub fn init_logging<C: BridgeConfig>(config: &C, args: &BridgeArgs) -> Result<()> {
    let log_config = match &args.log_level {
        Some(level) => LoggingConfig {
            level: level.clone(),
            ..config.logging().clone()
        },
        None => config.logging().clone(),
    };

    serial_bridge_common::init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;
    use std::path::Path;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        logging: LoggingConfig,
        #[serde(default = "default_port")]
        port: String,
    }

    fn default_port() -> String {
        "/dev/ttyS9".to_string()
    }

    impl BridgeConfig for TestConfig {
        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn validate(&self) -> Result<()> {
            if self.port.is_empty() {
                return Err(BridgeError::validation("port cannot be empty"));
            }
            Ok(())
        }
    }

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn args_for(path: &Path) -> BridgeArgs {
        BridgeArgs {
            config: Some(path.to_path_buf()),
            log_level: None,
        }
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load_or_default(&args_for(Path::new("/nonexistent/path.json5")));
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_validation_is_left_to_caller() {
        let file = write_config(r#"{ port: "" }"#);
        let config = TestConfig::load_or_default(&args_for(file.path())).unwrap();
        assert!(matches!(config.validate(), Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_load_parse_error() {
        let file = write_config("{ port: ");
        let result = TestConfig::load_or_default(&args_for(file.path()));
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let args = BridgeArgs {
            config: None,
            log_level: None,
        };
        let config = TestConfig::load_or_default(&args).unwrap();
        assert_eq!(config.port, "/dev/ttyS9");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_or_default_with_file() {
        let file = write_config(r#"{ port: "/dev/ttyACM0", logging: { level: "debug" } }"#);
        let config = TestConfig::load_or_default(&args_for(file.path())).unwrap();
        assert_eq!(config.port, "/dev/ttyACM0");
        assert_eq!(config.logging.level, "debug");
    }
}

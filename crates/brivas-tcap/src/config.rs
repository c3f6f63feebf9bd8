//! Codec configuration

use crate::asn1::DEFAULT_MAX_DEPTH;
use crate::errors::{Result, TcapError};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Environment prefix, e.g. `TCAP_MAX_DEPTH=16`
pub const ENV_PREFIX: &str = "TCAP";

/// TCAP codec configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Deepest constructed-element nesting accepted by the decoders
    pub max_depth: usize,
    /// Reject bytes trailing the declared transaction length
    pub strict_length: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict_length: true,
        }
    }
}

impl CodecConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TcapError::Config(e.to_string()))?;

        let config: Self =
            serde_json::from_str(&content).map_err(|e| TcapError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Layer defaults, an optional file and `TCAP_*` environment variables
    ///
    /// A missing file is not an error; later sources override earlier ones.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let config: Self = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(TcapError::Config("max_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CodecConfig::default();
        assert_eq!(config.max_depth, 32);
        assert!(config.strict_length);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: CodecConfig = serde_json::from_str(r#"{"strict_length": false}"#).unwrap();
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.strict_length);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            CodecConfig::from_file("/nonexistent/tcap.json"),
            Err(TcapError::Config(_))
        ));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = CodecConfig {
            max_depth: 0,
            strict_length: true,
        };
        assert!(config.validate().is_err());
    }
}

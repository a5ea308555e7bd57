//! Driver configuration
//!
//! Everything has a default matching the stock board description, so an
//! empty TOML table is a valid configuration:
//!
//! ```toml
//! compatible = ["free-electrons,serial"]
//! name_prefix = "feserial"
//! tx_wait = { mode = "bounded", max_polls = 1000000 }
//! ```

use serde::Deserialize;
use thiserror::Error;

use crate::{COMPATIBLE, DRIVER_NAME};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How the transmitter waits for THRE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TxWait {
    /// Poll until ready, however long that takes
    #[default]
    Spin,

    /// Give up with a timeout after `max_polls` not-ready reads
    Bounded { max_polls: u32 },
}

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Compatible strings the driver binds to
    pub compatible: Vec<String>,

    /// Device node names are `<name_prefix>-<hex base>`
    pub name_prefix: String,

    pub tx_wait: TxWait,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            compatible: vec![COMPATIBLE.to_string()],
            name_prefix: DRIVER_NAME.to_string(),
            tx_wait: TxWait::Spin,
        }
    }
}

impl DriverConfig {
    /// Parse and validate a TOML configuration
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compatible.is_empty() {
            return Err(ConfigError::Invalid {
                field: "compatible",
                reason: "at least one compatible string is required".to_string(),
            });
        }

        if self.name_prefix.is_empty() || self.name_prefix.contains('/') {
            return Err(ConfigError::Invalid {
                field: "name_prefix",
                reason: format!("{:?} is not a valid node name prefix", self.name_prefix),
            });
        }

        if self.tx_wait == (TxWait::Bounded { max_polls: 0 }) {
            return Err(ConfigError::Invalid {
                field: "tx_wait",
                reason: "max_polls must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

//! Data model configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! lwm2m_version = "1.0"
//! access_control = true
//! ```
//!
//! Every field is optional.

use serde::Deserialize;
use thiserror::Error;

/// Enabler version the client speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Default)]
pub enum LwM2mVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "1.1")]
    #[default]
    V1_1,
}

impl LwM2mVersion {
    /// Read-/Write-Composite and Resource Instance level operations exist
    pub fn supports_composite(self) -> bool {
        self >= LwM2mVersion::V1_1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DmConfig {
    pub lwm2m_version: LwM2mVersion,
    /// Enforce Access Control and keep the Access Control Object in sync
    pub access_control: bool,
}

impl Default for DmConfig {
    fn default() -> Self {
        Self {
            lwm2m_version: LwM2mVersion::default(),
            access_control: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl DmConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

use larder_bus::BusConfig;
use serde::{Deserialize, Serialize};

use crate::error::{LarderError, Result};

/// Configuration for a [`Larder`](crate::Larder) context.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LarderConfig {
    /// Fail loads whose references point at missing records, instead of
    /// leaving those references empty.
    pub strict_references: bool,
    /// Event bus settings, used by [`Larder::connect`](crate::Larder::connect).
    pub bus: BusConfig,
}

impl LarderConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| LarderError::Config(e.to_string()))
    }
}

//! Tunables for the handle table and the eternal pool.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Slots per block unless configured otherwise.
pub const DEFAULT_BLOCK_SIZE: usize = 256;

const MAX_BLOCK_SIZE: usize = u32::MAX as usize;

/// Configuration shared by the root stores of one isolate.
///
/// Every field has a default, so a JSON document only needs to name the
/// values it changes:
///
/// ```
/// use gcroots::HandleConfig;
///
/// let config = HandleConfig::from_json(r#"{ "block_size": 64 }"#).unwrap();
/// assert_eq!(config.block_size, 64);
/// assert_eq!(config.floor_blocks, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleConfig {
    /// Slots per global handle block.
    pub block_size: usize,
    /// Slots per eternal handle block.
    pub eternal_block_size: usize,
    /// Empty blocks kept by the handle table when it shrinks after a pass.
    pub floor_blocks: usize,
    /// Run block invariant checks at the end of every pass (debug builds only).
    pub verify_on_end_pass: bool,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            eternal_block_size: DEFAULT_BLOCK_SIZE,
            floor_blocks: 1,
            verify_on_end_pass: true,
        }
    }
}

impl HandleConfig {
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("block_size", self.block_size),
            ("eternal_block_size", self.eternal_block_size),
        ] {
            if value == 0 || value > MAX_BLOCK_SIZE {
                return Err(ConfigError::BlockSizeOutOfRange {
                    field,
                    max: MAX_BLOCK_SIZE,
                });
            }
        }
        if self.floor_blocks == 0 {
            return Err(ConfigError::ZeroFloor);
        }
        Ok(())
    }
}

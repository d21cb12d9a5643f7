// config.rs - Configuration for ldvm-core
use ldvm_common::ldvm_bail;
use ldvm_common::prelude::*;
use ldvm_transaction::FeeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Chain id every transaction must carry
    pub chain_id: u64,

    /// Block builder receiving tips
    pub builder: Address,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Gas pricing and creation pledges
    pub fees: FeeConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 2357,
            builder: Address::EMPTY,
            log_level: "info".to_string(),
            fees: FeeConfig::default(),
        }
    }
}

impl ChainConfig {
    /// Validate configuration
    pub fn validate(&self) -> LedgerResult<()> {
        if self.chain_id == 0 {
            ldvm_bail!(Config, "chain_id must be greater than 0");
        }

        if self.log_level.is_empty() {
            ldvm_bail!(Config, "log_level cannot be empty");
        }

        self.fees.validate().context("fees")
    }

    /// Load and validate a config file; the format follows the extension
    pub fn load(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&raw).map_err(|e| LedgerError::config(e.to_string()))?,
            Some("json") => serde_json::from_str(&raw)?,
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&raw).map_err(|e| LedgerError::config(e.to_string()))?
            }
            other => ldvm_bail!(Config, "unsupported config format {:?}", other.unwrap_or_default()),
        };
        config.validate()?;
        Ok(config)
    }
}

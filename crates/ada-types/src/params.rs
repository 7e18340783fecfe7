//! Protocol parameter snapshots and network configuration.
//!
//! A `ProtocolParameters` value is read once per build and never mutated.
//! `NetworkConfig` bundles it with the backend URL and scan/TTL settings and
//! can be loaded from a JSON file or taken from a built-in preset.

use crate::constants::{Network, DEFAULT_GAP_LIMIT, DEFAULT_SCAN_BATCH_SIZE, DEFAULT_TTL_OFFSET};
use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `fee = coefficient * size_in_bytes + constant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearFee {
    pub coefficient: u64,
    pub constant: u64,
}

impl LinearFee {
    pub fn fee_for_size(&self, size: usize) -> u64 {
        self.coefficient
            .saturating_mul(size as u64)
            .saturating_add(self.constant)
    }
}

/// Fee and deposit constants needed to size a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolParameters {
    pub linear_fee: LinearFee,
    pub key_deposit: u64,
    pub pool_deposit: u64,
    pub coins_per_utxo_byte: u64,
    pub network_id: u8,
    #[serde(default = "default_max_tx_size")]
    pub max_tx_size: u32,
    #[serde(default = "default_max_value_size")]
    pub max_value_size: u32,
}

fn default_max_tx_size() -> u32 {
    16_384
}

fn default_max_value_size() -> u32 {
    5_000
}

impl ProtocolParameters {
    /// Current mainnet-equivalent parameters for `network`.
    pub fn for_network(network: Network) -> Self {
        Self {
            linear_fee: LinearFee {
                coefficient: 44,
                constant: 155_381,
            },
            key_deposit: 2_000_000,
            pool_deposit: 500_000_000,
            coins_per_utxo_byte: 4_310,
            network_id: network.network_id(),
            max_tx_size: default_max_tx_size(),
            max_value_size: default_max_value_size(),
        }
    }
}

/// Everything a build or restore needs to know about one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub network: Network,
    pub protocol: ProtocolParameters,
    pub backend_url: String,
    #[serde(default = "default_gap_limit")]
    pub gap_limit: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_ttl_offset")]
    pub ttl_offset: u64,
}

fn default_gap_limit() -> u32 {
    DEFAULT_GAP_LIMIT
}

fn default_batch_size() -> u32 {
    DEFAULT_SCAN_BATCH_SIZE
}

fn default_ttl_offset() -> u64 {
    DEFAULT_TTL_OFFSET
}

impl NetworkConfig {
    /// Built-in configuration for `network`.
    pub fn preset(network: Network) -> Self {
        let backend_url = match network {
            Network::Mainnet => "https://api.yoroiwallet.com",
            Network::Preprod => "https://preprod-backend.yoroiwallet.com",
            Network::Preview => "https://preview-backend.yoroiwallet.com",
        };
        Self {
            network,
            protocol: ProtocolParameters::for_network(network),
            backend_url: backend_url.to_string(),
            gap_limit: DEFAULT_GAP_LIMIT,
            batch_size: DEFAULT_SCAN_BATCH_SIZE,
            ttl_offset: DEFAULT_TTL_OFFSET,
        }
    }

    pub fn from_json(s: &str) -> Result<Self, TypesError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TypesError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<(), TypesError> {
        if self.protocol.network_id != self.network.network_id() {
            return Err(TypesError::Config(format!(
                "protocol network id {} does not match {} ({})",
                self.protocol.network_id,
                self.network,
                self.network.network_id()
            )));
        }
        if self.gap_limit == 0 || self.batch_size == 0 {
            return Err(TypesError::Config("gap limit and batch size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_fee() {
        let fee = LinearFee {
            coefficient: 44,
            constant: 155_381,
        };
        assert_eq!(fee.fee_for_size(0), 155_381);
        assert_eq!(fee.fee_for_size(200), 155_381 + 8_800);
    }

    #[test]
    fn test_preset_network_ids() {
        assert_eq!(NetworkConfig::preset(Network::Mainnet).protocol.network_id, 1);
        assert_eq!(NetworkConfig::preset(Network::Preprod).protocol.network_id, 0);
    }

    #[test]
    fn test_config_json_defaults() {
        let json = r#"{
            "network": "preprod",
            "protocol": {
                "linearFee": { "coefficient": 44, "constant": 155381 },
                "keyDeposit": 2000000,
                "poolDeposit": 500000000,
                "coinsPerUtxoByte": 4310,
                "networkId": 0
            },
            "backendUrl": "http://localhost:8080"
        }"#;
        let config = NetworkConfig::from_json(json).unwrap();
        assert_eq!(config.gap_limit, DEFAULT_GAP_LIMIT);
        assert_eq!(config.ttl_offset, DEFAULT_TTL_OFFSET);
        assert_eq!(config.protocol.max_tx_size, 16_384);
    }

    #[test]
    fn test_config_rejects_network_mismatch() {
        let mut config = NetworkConfig::preset(Network::Mainnet);
        config.protocol.network_id = 0;
        let json = serde_json::to_string(&config).unwrap();
        assert!(NetworkConfig::from_json(&json).is_err());
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.json");
        let config = NetworkConfig::preset(Network::Preview);
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(NetworkConfig::from_file(&path).unwrap(), config);
    }
}

//! Engine configuration: chain profiles and retry defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Placeholder address conventionally used for a chain's native currency.
pub const NATIVE_PLACEHOLDER: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

/// Engine-wide configuration, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_chains")]
    pub chains: HashMap<String, ChainProfile>,

    #[serde(default)]
    pub retry: RetrySettings,
}

/// Per-chain execution profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainProfile {
    /// Symbol of the chain's native currency (e.g. "ETH", "STT").
    pub native_symbol: String,

    /// Address treated as "this transfer is in the native currency".
    #[serde(default = "default_native_placeholder")]
    pub native_placeholder: String,

    /// Test networks expose a single-call swap router instead of the
    /// quote/approve/swap flow.
    #[serde(default)]
    pub simple_router: bool,
}

impl ChainProfile {
    /// Profile applied to chain names absent from the config table.
    pub fn default_evm() -> Self {
        Self {
            native_symbol: "ETH".to_string(),
            native_placeholder: default_native_placeholder(),
            simple_router: false,
        }
    }
}

/// Bounded-retry settings for remote write operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the unconditional first attempt.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Flat delay before each retry, in seconds. Not exponential.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_secs() -> u64 {
    2
}

fn default_native_placeholder() -> String {
    NATIVE_PLACEHOLDER.to_string()
}

fn default_chains() -> HashMap<String, ChainProfile> {
    let mut chains = HashMap::new();
    chains.insert(
        "somnia".to_string(),
        ChainProfile {
            native_symbol: "STT".to_string(),
            native_placeholder: default_native_placeholder(),
            simple_router: true,
        },
    );
    chains.insert(
        "ethereum".to_string(),
        ChainProfile {
            native_symbol: "ETH".to_string(),
            native_placeholder: default_native_placeholder(),
            simple_router: false,
        },
    );
    chains.insert(
        "sepolia".to_string(),
        ChainProfile {
            native_symbol: "ETH".to_string(),
            native_placeholder: default_native_placeholder(),
            simple_router: false,
        },
    );
    chains
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chains: default_chains(),
            retry: RetrySettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Resolve the profile for a chain name (case-insensitive). Unknown
    /// chains get the default EVM profile.
    pub fn chain(&self, name: &str) -> ChainProfile {
        let key = name.trim().to_lowercase();
        self.chains
            .get(&key)
            .cloned()
            .unwrap_or_else(ChainProfile::default_evm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_carry_test_network() {
        let config = EngineConfig::default();
        let somnia = config.chain("somnia");
        assert!(somnia.simple_router);
        assert_eq!(somnia.native_symbol, "STT");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_secs, 2);
    }

    #[test]
    fn unknown_chain_falls_back_to_evm_profile() {
        let config = EngineConfig::default();
        let profile = config.chain("x");
        assert!(!profile.simple_router);
        assert_eq!(profile.native_placeholder, NATIVE_PLACEHOLDER);
    }

    #[test]
    fn chain_lookup_is_case_insensitive() {
        let config = EngineConfig::default();
        assert!(config.chain(" Somnia ").simple_router);
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.chains.contains_key("somnia"));
    }

    #[test]
    fn load_parses_toml_with_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[retry]
max_attempts = 5

[chains.base]
native_symbol = "ETH"
"#
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        // serde default kicks in for the unset delay
        assert_eq!(config.retry.delay_secs, 2);
        assert_eq!(config.chain("base").native_symbol, "ETH");
    }
}

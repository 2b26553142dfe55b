//! Runtime configuration loaded from `durin.toml`.
//!
//! Holds the registry factory address, the domain lookup service, engine
//! timing and per-chain RPC endpoint lists. When no config file is present
//! the built-in defaults from [`durin::ChainTarget::default_rpc`] are used.

use std::collections::HashMap;
use std::path::Path;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use durin::EngineConfig;
use serde::Deserialize;

/// Lookup service used when the config does not name one.
pub const DEFAULT_DOMAINS_API: &str = "https://durin.dev";

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry factory, deployed at the same address on every L2.
    pub factory: Option<Address>,
    /// Base URL of the domain lookup service.
    pub domains_api: String,
    /// Engine time-outs and display delay.
    pub engine: EngineConfig,
    /// Per-chain RPC overrides, keyed by decimal chain ID (`[chains.8453]`).
    pub chains: HashMap<String, ChainRpcs>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            factory: None,
            domains_api: DEFAULT_DOMAINS_API.to_owned(),
            engine: EngineConfig::default(),
            chains: HashMap::new(),
        }
    }
}

/// RPC endpoint list for a single chain.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainRpcs {
    /// Ordered list of RPC URLs (best first).
    pub rpcs: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Returns [`Config::default`] if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Return the RPC URL list for a chain, falling back to the built-in
    /// default if the config has no entry for this chain.
    #[must_use]
    pub fn rpcs_for(&self, chain_id: u64, default_rpc: &str) -> Vec<String> {
        match self.chains.get(&chain_id.to_string()) {
            Some(c) if !c.rpcs.is_empty() => c.rpcs.clone(),
            _ => vec![default_rpc.to_owned()],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy::primitives::address;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg.factory, None);
        assert_eq!(cfg.domains_api, DEFAULT_DOMAINS_API);
        assert_eq!(cfg.engine, EngineConfig::default());
        assert_eq!(cfg.rpcs_for(8453, "https://mainnet.base.org"), ["https://mainnet.base.org"]);
    }

    #[test]
    fn full_file_overrides() {
        let cfg = Config::parse(
            r#"
            factory = "0xdddddddddd8aa1f237b4fa0669cb46892346d22d"
            domains_api = "http://localhost:3000"

            [engine]
            receipt_timeout_ms = 1000

            [chains.8453]
            rpcs = ["https://a.example", "https://b.example"]

            [chains.10]
            rpcs = []
            "#,
        )
        .unwrap();

        assert_eq!(
            cfg.factory,
            Some(address!("dddddddddd8aa1f237b4fa0669cb46892346d22d"))
        );
        assert_eq!(cfg.domains_api, "http://localhost:3000");
        assert_eq!(cfg.engine.receipt_timeout(), Duration::from_secs(1));
        assert_eq!(cfg.engine.display_delay(), Duration::from_millis(1_500));
        assert_eq!(cfg.rpcs_for(8453, "x"), ["https://a.example", "https://b.example"]);
        assert_eq!(cfg.rpcs_for(10, "https://mainnet.optimism.io"), ["https://mainnet.optimism.io"]);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let cfg = Config::load(Path::new("/nonexistent/durin.toml")).unwrap();
        assert_eq!(cfg.domains_api, DEFAULT_DOMAINS_API);
    }

    #[test]
    fn bad_factory_is_rejected() {
        assert!(Config::parse(r#"factory = "0x1234""#).is_err(), "short address must fail");
    }
}

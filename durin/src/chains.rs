//! Static chain configuration for every network the workflow can target.
//!
//! Each entry pairs a human-readable name (the key users pick from) with its
//! EIP-155 chain ID, block-explorer base URL and a public RPC endpoint. The
//! two ENS-capable L1 networks additionally carry the ENS registry,
//! NameWrapper and L2-aware resolver addresses.
//!
//! [`ALL`] is the single source of truth; [`ChainRegistry`] wraps it (or a
//! custom table) as the process-wide immutable configuration.

use alloy::primitives::{Address, B256, address};

use crate::error::ChainError;

/// ENS contract addresses on an L1 network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L1Contracts {
    /// The ENS registry (same address on every network).
    pub ens_registry: Address,
    /// The NameWrapper contract; names owned by it are wrapped.
    pub name_wrapper: Address,
    /// The resolver that understands `setL2Registry` and cross-chain records.
    pub l2_resolver: Address,
}

/// One supported network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTarget {
    /// Human-readable key, e.g. `"Base Sepolia"`.
    pub name: &'static str,
    /// EIP-155 chain ID, unique per name.
    pub chain_id: u64,
    /// Base URL for address and transaction links.
    pub explorer_base_url: &'static str,
    /// Suggested public RPC endpoint.
    pub default_rpc: &'static str,
    /// Whether this is a testnet.
    pub is_testnet: bool,
    /// ENS deployment, present only on L1 networks names can live on.
    pub l1: Option<L1Contracts>,
}

/// What an explorer link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorerLink {
    /// An account or contract page.
    Address(Address),
    /// A transaction page.
    Transaction(B256),
}

impl ChainTarget {
    /// Build the explorer URL for an address or transaction on this chain.
    #[must_use]
    pub fn explorer_url(&self, link: ExplorerLink) -> String {
        match link {
            ExplorerLink::Address(a) => format!("{}/address/{a}", self.explorer_base_url),
            ExplorerLink::Transaction(h) => format!("{}/tx/{h:#x}", self.explorer_base_url),
        }
    }

    /// ENS contracts on this chain.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::NotEnsNetwork`] for chains without an ENS deployment.
    pub fn ens(&self) -> Result<&L1Contracts, ChainError> {
        self.l1
            .as_ref()
            .ok_or_else(|| ChainError::NotEnsNetwork(self.name.to_owned()))
    }
}

const ENS_REGISTRY: Address = address!("00000000000C2E074eC69A0dFb2997BA6C7d2e1e");

const MAINNET_ENS: L1Contracts = L1Contracts {
    ens_registry: ENS_REGISTRY,
    name_wrapper: address!("D4416b13d2b3a9aBae7AcD5D6C2BbDBE25686401"),
    l2_resolver: address!("2A6C785b002Ad859a3BAED69211167C7e998aAeC"),
};

const SEPOLIA_ENS: L1Contracts = L1Contracts {
    ens_registry: ENS_REGISTRY,
    name_wrapper: address!("0635513f179D50A207757E05759CbD106d7dFcE8"),
    l2_resolver: address!("00f9314C69c3e7C37b3C7aD36EF9FB40d94eDDe1"),
};

/// Every chain the workflow knows about.
pub const ALL: &[ChainTarget] = &[
    // L1
    ChainTarget {
        name: "Mainnet",
        chain_id: 1,
        explorer_base_url: "https://etherscan.io",
        default_rpc: "https://ethereum-rpc.publicnode.com",
        is_testnet: false,
        l1: Some(MAINNET_ENS),
    },
    ChainTarget {
        name: "Sepolia",
        chain_id: 11_155_111,
        explorer_base_url: "https://sepolia.etherscan.io",
        default_rpc: "https://ethereum-sepolia-rpc.publicnode.com",
        is_testnet: true,
        l1: Some(SEPOLIA_ENS),
    },
    // L2 mainnets
    ChainTarget {
        name: "Base",
        chain_id: 8453,
        explorer_base_url: "https://basescan.org",
        default_rpc: "https://mainnet.base.org",
        is_testnet: false,
        l1: None,
    },
    ChainTarget {
        name: "Optimism",
        chain_id: 10,
        explorer_base_url: "https://optimistic.etherscan.io",
        default_rpc: "https://mainnet.optimism.io",
        is_testnet: false,
        l1: None,
    },
    ChainTarget {
        name: "Arbitrum",
        chain_id: 42161,
        explorer_base_url: "https://arbiscan.io",
        default_rpc: "https://arb1.arbitrum.io/rpc",
        is_testnet: false,
        l1: None,
    },
    ChainTarget {
        name: "Scroll",
        chain_id: 534_352,
        explorer_base_url: "https://scrollscan.com",
        default_rpc: "https://rpc.scroll.io",
        is_testnet: false,
        l1: None,
    },
    ChainTarget {
        name: "Linea",
        chain_id: 59144,
        explorer_base_url: "https://lineascan.build",
        default_rpc: "https://rpc.linea.build",
        is_testnet: false,
        l1: None,
    },
    ChainTarget {
        name: "Polygon",
        chain_id: 137,
        explorer_base_url: "https://polygonscan.com",
        default_rpc: "https://polygon-rpc.com",
        is_testnet: false,
        l1: None,
    },
    ChainTarget {
        name: "Celo",
        chain_id: 42220,
        explorer_base_url: "https://celoscan.io",
        default_rpc: "https://forno.celo.org",
        is_testnet: false,
        l1: None,
    },
    ChainTarget {
        name: "World Chain",
        chain_id: 480,
        explorer_base_url: "https://worldscan.org",
        default_rpc: "https://worldchain-mainnet.g.alchemy.com/public",
        is_testnet: false,
        l1: None,
    },
    // L2 testnets
    ChainTarget {
        name: "Base Sepolia",
        chain_id: 84532,
        explorer_base_url: "https://sepolia.basescan.org",
        default_rpc: "https://sepolia.base.org",
        is_testnet: true,
        l1: None,
    },
    ChainTarget {
        name: "Optimism Sepolia",
        chain_id: 11_155_420,
        explorer_base_url: "https://sepolia-optimism.etherscan.io",
        default_rpc: "https://sepolia.optimism.io",
        is_testnet: true,
        l1: None,
    },
    ChainTarget {
        name: "Arbitrum Sepolia",
        chain_id: 421_614,
        explorer_base_url: "https://sepolia.arbiscan.io",
        default_rpc: "https://sepolia-rollup.arbitrum.io/rpc",
        is_testnet: true,
        l1: None,
    },
    ChainTarget {
        name: "Scroll Sepolia",
        chain_id: 534_351,
        explorer_base_url: "https://sepolia.scrollscan.com",
        default_rpc: "https://sepolia-rpc.scroll.io",
        is_testnet: true,
        l1: None,
    },
    ChainTarget {
        name: "Linea Sepolia",
        chain_id: 59141,
        explorer_base_url: "https://sepolia.lineascan.build",
        default_rpc: "https://rpc.sepolia.linea.build",
        is_testnet: true,
        l1: None,
    },
    ChainTarget {
        name: "Polygon Amoy",
        chain_id: 80002,
        explorer_base_url: "https://amoy.polygonscan.com",
        default_rpc: "https://rpc-amoy.polygon.technology",
        is_testnet: true,
        l1: None,
    },
    ChainTarget {
        name: "Celo Alfajores",
        chain_id: 44787,
        explorer_base_url: "https://alfajores.celoscan.io",
        default_rpc: "https://alfajores-forno.celo-testnet.org",
        is_testnet: true,
        l1: None,
    },
    ChainTarget {
        name: "World Chain Sepolia",
        chain_id: 4801,
        explorer_base_url: "https://sepolia.worldscan.org",
        default_rpc: "https://worldchain-sepolia.g.alchemy.com/public",
        is_testnet: true,
        l1: None,
    },
];

/// Look up a built-in [`ChainTarget`] by name.
///
/// # Errors
///
/// Returns [`ChainError::UnknownChain`] if the name is not in [`ALL`].
pub fn by_name(name: &str) -> Result<&'static ChainTarget, ChainError> {
    ALL.iter()
        .find(|c| c.name == name)
        .ok_or_else(|| ChainError::UnknownChain(name.to_owned()))
}

/// Look up a built-in [`ChainTarget`] by chain ID.
#[must_use]
pub fn by_chain_id(chain_id: u64) -> Option<&'static ChainTarget> {
    ALL.iter().find(|c| c.chain_id == chain_id)
}

/// Immutable chain table shared by every engine in the process.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainTarget>,
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ChainRegistry {
    /// Registry over the built-in [`ALL`] table.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            chains: ALL.to_vec(),
        }
    }

    /// Registry over a custom table.
    #[must_use]
    pub const fn new(chains: Vec<ChainTarget>) -> Self {
        Self { chains }
    }

    /// Check at startup that every name the UI can offer is mapped.
    ///
    /// # Errors
    ///
    /// Returns the first name that has no entry.
    pub fn require<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<(), ChainError> {
        for name in names {
            self.by_name(name)?;
        }
        Ok(())
    }

    /// Look up a chain by name.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::UnknownChain`] if the name is not registered.
    pub fn by_name(&self, name: &str) -> Result<&ChainTarget, ChainError> {
        self.chains
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ChainError::UnknownChain(name.to_owned()))
    }

    /// Look up a chain by ID.
    #[must_use]
    pub fn by_chain_id(&self, chain_id: u64) -> Option<&ChainTarget> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Explorer URL for an address or transaction on the named chain.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::UnknownChain`] if the name is not registered.
    pub fn explorer_url(&self, chain_name: &str, link: ExplorerLink) -> Result<String, ChainError> {
        Ok(self.by_name(chain_name)?.explorer_url(link))
    }

    /// Iterate over all registered chains.
    pub fn iter(&self) -> impl Iterator<Item = &ChainTarget> {
        self.chains.iter()
    }
}

/// Shorten an address for display: `0x123...abcde`.
#[must_use]
pub fn short_address(address: &str) -> String {
    if address.len() < 10 || !address.is_ascii() {
        return address.to_owned();
    }
    format!("{}...{}", &address[..5], &address[address.len() - 5..])
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_and_ids_are_unique() {
        let names: HashSet<_> = ALL.iter().map(|c| c.name).collect();
        let ids: HashSet<_> = ALL.iter().map(|c| c.chain_id).collect();
        assert_eq!(names.len(), ALL.len(), "duplicate chain name");
        assert_eq!(ids.len(), ALL.len(), "duplicate chain id");
    }

    #[test]
    fn unknown_name_is_an_error() {
        assert_eq!(
            by_name("Basee"),
            Err(ChainError::UnknownChain("Basee".to_owned()))
        );
        let registry = ChainRegistry::builtin();
        assert!(registry.require(["Base", "Sepolia", "Mainnet"]).is_ok());
        assert!(registry.require(["Base", "Zora"]).is_err());
    }

    #[test]
    fn only_l1_networks_carry_ens() {
        assert!(by_name("Mainnet").unwrap().ens().is_ok());
        assert!(by_name("Sepolia").unwrap().ens().is_ok());
        assert_eq!(
            by_name("Base").unwrap().ens(),
            Err(ChainError::NotEnsNetwork("Base".to_owned()))
        );
    }

    #[test]
    fn explorer_links() {
        let registry = ChainRegistry::builtin();
        let addr = address!("00f9314C69c3e7C37b3C7aD36EF9FB40d94eDDe1");
        let url = registry
            .explorer_url("Sepolia", ExplorerLink::Address(addr))
            .unwrap();
        assert_eq!(url, format!("https://sepolia.etherscan.io/address/{addr}"));

        let tx = registry
            .explorer_url("Base", ExplorerLink::Transaction(B256::ZERO))
            .unwrap();
        assert_eq!(tx, format!("https://basescan.org/tx/0x{}", "0".repeat(64)));
    }

    #[test]
    fn short_address_keeps_ends() {
        assert_eq!(
            short_address("0x2A6C785b002Ad859a3BAED69211167C7e998aAeC"),
            "0x2A6...8aAeC"
        );
        assert_eq!(short_address("0x1234"), "0x1234");
    }
}

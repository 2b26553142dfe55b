//! Core domain types.
//!
//! These model the ENS names a user can operate on, the opaque write
//! descriptions handed to the wallet, and the records the workflow keeps
//! once a write has landed.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, B256, Bytes, Log, keccak256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::chains::L1Contracts;
use crate::error::ChainError;

/// Deserialize an optional address, mapping `null` to the zero address.
fn deserialize_address_or_null<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Address>::deserialize(deserializer)?.unwrap_or_default())
}

/// An ENS name owned or controlled by the connected account.
///
/// Deserializes from the domain lookup service payload; fields other than
/// the ones below are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    /// Fully-qualified name, e.g. `"alice.eth"`.
    pub name: String,

    /// Address currently controlling the name in the ENS registry.
    #[serde(default, deserialize_with = "deserialize_address_or_null")]
    pub owner: Address,

    /// Resolver currently set on the name, zero if unset.
    #[serde(default, deserialize_with = "deserialize_address_or_null")]
    pub resolver: Address,

    /// Owner inside the NameWrapper, for wrapped names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_owner: Option<Address>,
}

impl Domain {
    /// Create a domain with an explicit owner and resolver.
    #[must_use]
    pub fn new(name: impl Into<String>, owner: Address, resolver: Address) -> Self {
        Self {
            name: name.into(),
            owner,
            resolver,
            wrapped_owner: None,
        }
    }

    /// Whether a resolver is set.
    #[must_use]
    pub fn has_resolver(&self) -> bool {
        !self.resolver.is_zero()
    }

    /// Whether registry writes must go through the NameWrapper.
    #[must_use]
    pub fn is_wrapped(&self, ens: &L1Contracts) -> bool {
        self.owner == ens.name_wrapper
    }

    /// EIP-137 node of this name.
    #[must_use]
    pub fn node(&self) -> B256 {
        namehash(&self.name)
    }
}

/// The L1 networks ENS names are fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum L1Network {
    /// Ethereum mainnet.
    Mainnet,
    /// Ethereum Sepolia testnet.
    Sepolia,
}

impl L1Network {
    /// Name of the matching [`crate::chains::ChainTarget`].
    #[must_use]
    pub const fn chain_name(self) -> &'static str {
        match self {
            Self::Mainnet => "Mainnet",
            Self::Sepolia => "Sepolia",
        }
    }
}

impl fmt::Display for L1Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.chain_name())
    }
}

impl FromStr for L1Network {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Mainnet" => Ok(Self::Mainnet),
            "Sepolia" => Ok(Self::Sepolia),
            other => Err(ChainError::NotEnsNetwork(other.to_owned())),
        }
    }
}

/// One contract write, opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCall {
    /// Contract the call is sent to.
    pub to: Address,
    /// Human-readable Solidity signature, for logs.
    pub signature: &'static str,
    /// ABI-encoded calldata.
    pub input: Bytes,
    /// Chain the call must be sent on.
    pub chain_id: u64,
}

/// Idle and success labels of the button driving an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonLabels {
    /// Label shown while nothing is in flight.
    pub idle: &'static str,
    /// Label shown right after the receipt confirms.
    pub success: &'static str,
}

/// Input to [`crate::engine::ActionEngine::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    /// Chain the wallet must be on before the write is submitted.
    pub target_chain_id: u64,
    /// The write to perform once on the target chain.
    pub call: WriteCall,
    /// History label, e.g. `"Deployed Registry"`.
    pub label: &'static str,
    /// Button text for this action.
    pub buttons: ButtonLabels,
}

/// A completed action in the transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    /// History label of the action.
    pub label: String,
    /// Name of the chain the transaction landed on.
    pub chain_name: String,
    /// Transaction hash, unique within a log.
    pub transaction_hash: B256,
    /// When the receipt was observed.
    pub recorded_at: DateTime<Utc>,
}

impl ActionRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn now(label: impl Into<String>, chain_name: impl Into<String>, hash: B256) -> Self {
        Self {
            label: label.into(),
            chain_name: chain_name.into(),
            transaction_hash: hash,
            recorded_at: Utc::now(),
        }
    }
}

/// Inclusion record of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Receipt {
    /// Hash of the included transaction.
    pub transaction_hash: B256,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
    /// Logs emitted by the transaction.
    pub logs: Vec<Log>,
}

/// State of a watched transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Not yet included.
    Pending,
    /// Included and succeeded.
    Success(Receipt),
    /// Included but reverted.
    Reverted(String),
    /// The watch itself failed.
    Error(String),
}

/// An event from a shared receipt watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptEvent {
    /// The transaction this event is about.
    pub hash: B256,
    /// Current status.
    pub status: ReceiptStatus,
}

/// Compute the ENS namehash of a name (EIP-137).
#[must_use]
pub fn namehash(name: &str) -> B256 {
    let mut node = B256::ZERO;
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let label_hash = keccak256(label.as_bytes());
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(label_hash.as_slice());
        node = keccak256(buf);
    }
    node
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, b256};

    use super::*;

    #[test]
    fn namehash_matches_eip137_vectors() {
        assert_eq!(namehash(""), B256::ZERO);
        assert_eq!(
            namehash("eth"),
            b256!("93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae")
        );
        assert_eq!(
            namehash("foo.eth"),
            b256!("de9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f")
        );
    }

    #[test]
    fn domain_from_lookup_payload() {
        let json = r#"{
            "id": "0xabc",
            "name": "alice.eth",
            "labelName": "alice",
            "owner": "0x1111111111111111111111111111111111111111",
            "wrappedOwner": null,
            "resolver": null,
            "relation": { "owner": true, "registrant": true }
        }"#;
        let domain: Domain = serde_json::from_str(json).unwrap();
        assert_eq!(domain.name, "alice.eth");
        assert_eq!(
            domain.owner,
            address!("1111111111111111111111111111111111111111")
        );
        assert!(!domain.has_resolver());
        assert_eq!(domain.wrapped_owner, None);
    }

    #[test]
    fn wrapped_names_are_owned_by_the_wrapper() {
        let ens = crate::chains::by_name("Sepolia").unwrap().ens().unwrap();
        let wrapped = Domain::new("bob.eth", ens.name_wrapper, Address::ZERO);
        let plain = Domain::new("carol.eth", Address::repeat_byte(7), Address::ZERO);
        assert!(wrapped.is_wrapped(ens));
        assert!(!plain.is_wrapped(ens));
    }

    #[test]
    fn l1_network_parses_exact_names() {
        assert_eq!("Sepolia".parse::<L1Network>(), Ok(L1Network::Sepolia));
        assert_eq!(L1Network::Mainnet.to_string(), "Mainnet");
        assert!("Base".parse::<L1Network>().is_err());
    }
}

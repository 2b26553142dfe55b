//! Error types shared across the crate.
//!
//! Each concern gets its own enum so callers can match on the failure class
//! without string inspection: configuration misses ([`ChainError`]), local
//! precondition failures ([`ValidationError`]), wallet-side failures
//! ([`GatewayError`]), terminal action failures ([`ActionError`]) and
//! domain lookup failures ([`LookupError`]).

use std::fmt;

use alloy::primitives::B256;

/// A chain name or ID that is not part of the configured registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// No chain is registered under this human-readable name.
    #[error("unknown chain name: {0}")]
    UnknownChain(String),

    /// No chain is registered under this EIP-155 chain ID.
    #[error("unknown chain ID: {0}")]
    UnknownChainId(u64),

    /// The chain exists but carries no ENS deployment.
    #[error("{0} has no ENS contracts")]
    NotEnsNetwork(String),
}

/// A precondition that failed before any network call was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No wallet account is connected.
    #[error("wallet not connected")]
    NotConnected,

    /// No ENS domain has been selected.
    #[error("no domain selected")]
    MissingDomain,

    /// The registry address is empty; deploy a registry first.
    #[error("missing registry address")]
    MissingRegistry,

    /// The registry factory address is not configured.
    #[error("missing registry factory address")]
    MissingFactory,

    /// The write has no target contract.
    #[error("write call has no target contract")]
    MissingTarget,

    /// The write is bound to a different chain than the one switched to.
    #[error("write call targets chain {call}, action targets chain {target}")]
    ChainMismatch {
        /// Chain the write call carries.
        call: u64,
        /// Chain the action switches to.
        target: u64,
    },

    /// The target chain is not recognized.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Failure reported by the wallet/chain gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The user declined the request in the wallet.
    #[error("request rejected by user")]
    UserRejected,

    /// The wallet cannot switch to the requested chain.
    #[error("chain {0} is not supported by the wallet")]
    UnsupportedChain(u64),

    /// The transaction was mined but reverted.
    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// Transport or node failure.
    #[error("rpc error: {0}")]
    Rpc(String),
}

/// The step an action was waiting on when its time-out elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Waiting for the wallet to report the target chain.
    ChainSwitch,
    /// Waiting for the transaction receipt.
    Receipt,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChainSwitch => f.write_str("chain switch"),
            Self::Receipt => f.write_str("receipt"),
        }
    }
}

/// Terminal failure of one action run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The user declined the switch or the signature.
    #[error("rejected by user")]
    UserRejected,

    /// The wallet refused to switch to the target chain.
    #[error("chain {0} is not supported by the wallet")]
    UnsupportedChain(u64),

    /// The transaction was included but reverted.
    #[error("transaction reverted: {reason}")]
    Reverted {
        /// Hash of the reverted transaction, when one was issued.
        hash: Option<B256>,
        /// Revert reason, if the node provided one.
        reason: String,
    },

    /// Transport or node failure.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// A bounded wait elapsed.
    #[error("timed out waiting for {0}")]
    TimedOut(Stage),
}

impl From<GatewayError> for ActionError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::UserRejected => Self::UserRejected,
            GatewayError::UnsupportedChain(id) => Self::UnsupportedChain(id),
            GatewayError::Reverted(reason) => Self::Reverted { hash: None, reason },
            GatewayError::Rpc(msg) => Self::Rpc(msg),
        }
    }
}

/// Error returned from [`crate::engine::ActionEngine::run`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Another action is already in flight on this engine.
    #[error("an action is already in progress")]
    Busy,

    /// A precondition failed; no network call was made.
    #[error("invalid action: {0}")]
    Invalid(#[from] ValidationError),

    /// The action ran and failed.
    #[error(transparent)]
    Failed(#[from] ActionError),
}

/// Failure fetching domains from the lookup service.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The service rejected the address (HTTP 400).
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Any other non-success status.
    #[error("lookup service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The request could not be sent or the body could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The body was not a domain list.
    #[error("decoding domain list: {0}")]
    Decode(#[from] serde_json::Error),
}

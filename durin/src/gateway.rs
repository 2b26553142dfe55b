//! Interfaces of the wallet/chain collaborator.
//!
//! The engine never talks to a wallet directly. It consumes these traits,
//! implemented by a browser connector, the CLI's local-signer gateway or a
//! test double.
//!
//! Two of the four surfaces are *observed* rather than awaited: chain switch
//! completion arrives through [`WalletSession::subscribe_chain`], and receipt
//! outcomes arrive on the shared [`ReceiptWatcher::subscribe_receipts`]
//! stream, which may carry events for unrelated transactions.

use std::future::Future;

use alloy::primitives::{Address, B256};
use tokio::sync::{broadcast, watch};

use crate::error::GatewayError;
use crate::types::{ReceiptEvent, WriteCall};

/// The connected account and its active chain.
pub trait WalletSession: Send + Sync {
    /// The connected account, if any.
    fn current_address(&self) -> Option<Address>;

    /// Whether an account is connected.
    fn is_connected(&self) -> bool {
        self.current_address().is_some()
    }

    /// The chain the wallet is currently on.
    fn current_chain_id(&self) -> Option<u64> {
        *self.subscribe_chain().borrow()
    }

    /// Observe changes of the active chain.
    fn subscribe_chain(&self) -> watch::Receiver<Option<u64>>;
}

/// Chain switching.
pub trait ChainSwitcher: Send + Sync {
    /// Ask the wallet to switch to `chain_id`.
    ///
    /// Returning `Ok` only means the request was accepted; the switch has
    /// landed once [`WalletSession::subscribe_chain`] reports the new chain.
    fn request_switch(&self, chain_id: u64) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Contract writes.
pub trait ContractWriter: Send + Sync {
    /// Sign and broadcast `call`, returning its transaction hash.
    fn submit_write(&self, call: &WriteCall) -> impl Future<Output = Result<B256, GatewayError>> + Send;
}

/// Receipt watching over a shared event stream.
pub trait ReceiptWatcher: Send + Sync {
    /// Subscribe to receipt events for every watched hash.
    fn subscribe_receipts(&self) -> broadcast::Receiver<ReceiptEvent>;

    /// Start watching `hash`; outcomes are published to subscribers.
    fn watch_receipt(&self, hash: B256);
}

/// Everything the engine needs from the wallet side.
pub trait Gateway: WalletSession + ChainSwitcher + ContractWriter + ReceiptWatcher {}

impl<T> Gateway for T where T: WalletSession + ChainSwitcher + ContractWriter + ReceiptWatcher {}

//! Durin: deploy and wire ENS L2 subname registries.
//!
//! The workflow picks an ENS name on an L1 network, deploys a registry on an
//! L2 chain, points the name at the L2-aware resolver, writes the
//! cross-chain `registry` text record and links the resolver to the
//! registry. Each of those steps is one contract write driven by an
//! [`ActionEngine`]: switch the wallet to the right chain if needed, submit
//! exactly one write, wait for its receipt, record it once.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use durin::{ActionEngine, ChainRegistry, HistoryLog, Gateway, actions, chains};
//! use alloy::primitives::Address;
//!
//! async fn deploy<G: Gateway>(gateway: Arc<G>, factory: Address) -> Result<(), Box<dyn std::error::Error>> {
//!     let history = HistoryLog::new();
//!     let engine = ActionEngine::new(gateway, Arc::new(ChainRegistry::builtin()), history.clone());
//!
//!     let base = chains::by_name("Base")?;
//!     let outcome = engine.run(actions::deploy_registry(base, factory, "alice.eth")?).await?;
//!     println!("registry: {:?}", actions::registry_address_from_receipt(&outcome.receipt));
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod chains;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod history;
pub mod lookup;
pub mod selector;
pub mod types;

pub use chains::{ChainRegistry, ChainTarget, ExplorerLink, L1Contracts};
pub use engine::{
    ActionEngine, ActionOutcome, EngineConfig, EngineState, Notification, NotificationKind,
    Notifier, TracingNotifier,
};
pub use error::{
    ActionError, ChainError, EngineError, GatewayError, LookupError, Stage, ValidationError,
};
pub use gateway::{ChainSwitcher, ContractWriter, Gateway, ReceiptWatcher, WalletSession};
pub use history::HistoryLog;
pub use lookup::{DomainLookup, HttpDomainLookup};
pub use selector::DomainSelector;
pub use types::{
    ActionRecord, ActionRequest, ButtonLabels, Domain, L1Network, Receipt, ReceiptEvent,
    ReceiptStatus, WriteCall, namehash,
};

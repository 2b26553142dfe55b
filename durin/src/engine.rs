//! The transaction action engine.
//!
//! One engine backs one button. A run takes an [`ActionRequest`] from intent
//! to a terminal outcome:
//!
//! ```text
//! Idle -> Preparing -> [SwitchingChain] -> AwaitingApproval -> Pending -> Succeeded
//!            |                |                   |               |    \-> Failed
//!            v                v                   v               v
//!          Idle             Failed              Failed          Failed
//! ```
//!
//! `Succeeded` and `Failed` are held for [`EngineConfig::display_delay`]
//! before the engine returns to `Idle`.
//!
//! The engine reacts to wallet state instead of call returns: after asking
//! for a chain switch it waits until the session's chain channel reports the
//! target, and after submitting it waits for a receipt event carrying its own
//! hash on the shared receipt stream. Every other event is ignored.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::B256;
use serde::Deserialize;
use tokio::sync::{broadcast, watch};

use crate::chains::{ChainRegistry, ChainTarget};
use crate::error::{ActionError, ChainError, EngineError, Stage, ValidationError};
use crate::gateway::Gateway;
use crate::history::HistoryLog;
use crate::types::{ActionRecord, ActionRequest, ButtonLabels, Receipt, ReceiptEvent, ReceiptStatus};

/// State of one engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EngineState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Checking preconditions.
    Preparing,
    /// Waiting for the wallet to land on `target`.
    SwitchingChain {
        /// Chain the wallet was asked to switch to.
        target: u64,
    },
    /// Waiting for the user to sign.
    AwaitingApproval {
        /// Chain the write is sent on.
        target: u64,
    },
    /// Submitted, waiting for the receipt.
    Pending {
        /// Hash of the submitted transaction.
        hash: B256,
    },
    /// The receipt confirmed.
    Succeeded {
        /// Hash of the confirmed transaction.
        hash: B256,
    },
    /// The run failed.
    Failed {
        /// Why the run failed.
        error: ActionError,
    },
}

impl EngineState {
    /// Whether the button is disabled: any state other than `Idle`.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Whether a write is being prepared, signed or mined.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Preparing
                | Self::SwitchingChain { .. }
                | Self::AwaitingApproval { .. }
                | Self::Pending { .. }
        )
    }

    /// Button text for this state.
    #[must_use]
    pub const fn label(&self, buttons: &ButtonLabels) -> &'static str {
        match self {
            Self::Idle => buttons.idle,
            Self::Preparing => "Preparing...",
            Self::SwitchingChain { .. } => "Switching network...",
            Self::AwaitingApproval { .. } => "Waiting for approval...",
            Self::Pending { .. } => "Pending...",
            Self::Succeeded { .. } => buttons.success,
            Self::Failed { .. } => "Failed",
        }
    }
}

/// Bounded waits and display timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long to wait for the wallet to report the target chain.
    pub switch_timeout_ms: u64,
    /// How long to wait for a receipt.
    pub receipt_timeout_ms: u64,
    /// How long `Succeeded` / `Failed` are held before returning to `Idle`.
    pub display_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            switch_timeout_ms: 60_000,
            receipt_timeout_ms: 300_000,
            display_delay_ms: 1_500,
        }
    }
}

impl EngineConfig {
    /// Chain switch time-out.
    #[must_use]
    pub const fn switch_timeout(&self) -> Duration {
        Duration::from_millis(self.switch_timeout_ms)
    }

    /// Receipt time-out.
    #[must_use]
    pub const fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }

    /// Terminal state display delay.
    #[must_use]
    pub const fn display_delay(&self) -> Duration {
        Duration::from_millis(self.display_delay_ms)
    }
}

/// Class of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// The action confirmed.
    Success,
    /// The user declined in the wallet.
    Rejected,
    /// The transaction reverted on chain.
    Reverted,
    /// Infrastructure failure or time-out.
    Failure,
    /// A precondition failed before anything was sent.
    Invalid,
}

/// One toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Class of the notification.
    pub kind: NotificationKind,
    /// Message shown to the user.
    pub message: String,
    /// Transaction the notification is about, for de-duplication by the sink.
    pub key: Option<B256>,
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    fn notify(&self, notification: Notification);
}

/// Notifier that writes to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.kind {
            NotificationKind::Success => tracing::info!(key = ?n.key, "{}", n.message),
            NotificationKind::Rejected | NotificationKind::Invalid => {
                tracing::warn!(key = ?n.key, "{}", n.message);
            }
            NotificationKind::Reverted | NotificationKind::Failure => {
                tracing::error!(key = ?n.key, "{}", n.message);
            }
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// The history entry for this run.
    pub record: ActionRecord,
    /// The confirming receipt.
    pub receipt: Receipt,
}

/// Returns the engine to `Idle` when a run finishes or its future is dropped.
struct IdleOnDrop<'a> {
    state: &'a watch::Sender<EngineState>,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.state.send_replace(EngineState::Idle);
    }
}

/// Drives one switch-then-write action at a time against a [`Gateway`].
pub struct ActionEngine<G> {
    gateway: Arc<G>,
    chains: Arc<ChainRegistry>,
    history: HistoryLog,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
    state: watch::Sender<EngineState>,
}

impl<G> fmt::Debug for ActionEngine<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionEngine")
            .field("state", &*self.state.borrow())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<G: Gateway> ActionEngine<G> {
    /// Create an idle engine recording into `history`.
    #[must_use]
    pub fn new(gateway: Arc<G>, chains: Arc<ChainRegistry>, history: HistoryLog) -> Self {
        Self {
            gateway,
            chains,
            history,
            notifier: Arc::new(TracingNotifier),
            config: EngineConfig::default(),
            state: watch::Sender::new(EngineState::Idle),
        }
    }

    /// Replace the notification sink.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the timing configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Whether the driving button should be disabled.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.borrow().is_busy()
    }

    /// Run `request` to completion.
    ///
    /// Resolves after the terminal state has been displayed and the engine
    /// is `Idle` again. Dropping the future abandons the run: no further
    /// gateway events are handled and the engine returns to `Idle`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Busy`] if a run is already in progress.
    /// - [`EngineError::Invalid`] if a precondition fails; nothing is sent.
    /// - [`EngineError::Failed`] if the switch, the write or the receipt fails.
    pub async fn run(&self, request: ActionRequest) -> Result<ActionOutcome, EngineError> {
        let claimed = self.state.send_if_modified(|s| {
            if matches!(s, EngineState::Idle) {
                *s = EngineState::Preparing;
                true
            } else {
                false
            }
        });
        if !claimed {
            tracing::warn!(action = request.label, "rejected start while busy");
            return Err(EngineError::Busy);
        }
        let _idle = IdleOnDrop { state: &self.state };
        tracing::info!(action = request.label, target = request.target_chain_id, "preparing");

        let chain = match self.prepare(&request) {
            Ok(chain) => chain,
            Err(e) => {
                tracing::warn!(action = request.label, error = %e, "validation failed");
                self.notifier.notify(Notification {
                    kind: NotificationKind::Invalid,
                    message: e.to_string(),
                    key: None,
                });
                return Err(e.into());
            }
        };

        let result = match self.drive(&request).await {
            Ok((hash, receipt)) => {
                let record = ActionRecord::now(request.label, chain.name, hash);
                self.history.append(record.clone());
                self.transition(request.label, EngineState::Succeeded { hash });
                self.notifier.notify(Notification {
                    kind: NotificationKind::Success,
                    message: format!("{} on {}", request.label, chain.name),
                    key: Some(hash),
                });
                Ok(ActionOutcome { record, receipt })
            }
            Err(error) => {
                tracing::warn!(action = request.label, %error, "action failed");
                self.transition(
                    request.label,
                    EngineState::Failed {
                        error: error.clone(),
                    },
                );
                self.notifier.notify(failure_notification(request.label, &error));
                Err(EngineError::Failed(error))
            }
        };

        tokio::time::sleep(self.config.display_delay()).await;
        result
    }

    fn prepare(&self, request: &ActionRequest) -> Result<ChainTarget, ValidationError> {
        if !self.gateway.is_connected() {
            return Err(ValidationError::NotConnected);
        }
        if request.call.to.is_zero() {
            return Err(ValidationError::MissingTarget);
        }
        if request.call.chain_id != request.target_chain_id {
            return Err(ValidationError::ChainMismatch {
                call: request.call.chain_id,
                target: request.target_chain_id,
            });
        }
        self.chains
            .by_chain_id(request.target_chain_id)
            .copied()
            .ok_or_else(|| ChainError::UnknownChainId(request.target_chain_id).into())
    }

    async fn drive(&self, request: &ActionRequest) -> Result<(B256, Receipt), ActionError> {
        let target = request.target_chain_id;
        let mut chain_rx = self.gateway.subscribe_chain();
        let current = *chain_rx.borrow_and_update();

        if current != Some(target) {
            self.transition(request.label, EngineState::SwitchingChain { target });
            tokio::time::timeout(
                self.config.switch_timeout(),
                self.switch_chain(&mut chain_rx, target),
            )
            .await
            .map_err(|_| ActionError::TimedOut(Stage::ChainSwitch))??;
        }

        self.transition(request.label, EngineState::AwaitingApproval { target });
        // Subscribe before submitting so a fast receipt cannot be missed.
        let mut receipts = self.gateway.subscribe_receipts();
        let hash = self.gateway.submit_write(&request.call).await?;
        tracing::info!(action = request.label, signature = request.call.signature, %hash, "submitted");

        self.transition(request.label, EngineState::Pending { hash });
        self.gateway.watch_receipt(hash);
        let receipt = tokio::time::timeout(
            self.config.receipt_timeout(),
            await_receipt(&mut receipts, hash),
        )
        .await
        .map_err(|_| ActionError::TimedOut(Stage::Receipt))??;

        Ok((hash, receipt))
    }

    /// Ask for `target` and wait until the session reports it.
    ///
    /// The wallet prompt and the chain change share one switch time-out.
    async fn switch_chain(
        &self,
        chain_rx: &mut watch::Receiver<Option<u64>>,
        target: u64,
    ) -> Result<(), ActionError> {
        self.gateway.request_switch(target).await?;
        let landed = chain_rx.wait_for(|c| *c == Some(target)).await.is_ok();

        if landed {
            tracing::info!(chain_id = target, "chain switch observed");
            Ok(())
        } else {
            Err(ActionError::Rpc("wallet session closed".to_owned()))
        }
    }

    fn transition(&self, action: &str, next: EngineState) {
        tracing::debug!(action, state = ?next, "transition");
        self.state.send_replace(next);
    }
}

/// Wait on the shared receipt stream for the terminal event of `hash`.
async fn await_receipt(
    receipts: &mut broadcast::Receiver<ReceiptEvent>,
    hash: B256,
) -> Result<Receipt, ActionError> {
    loop {
        match receipts.recv().await {
            Ok(event) if event.hash == hash => match event.status {
                ReceiptStatus::Pending => {}
                ReceiptStatus::Success(receipt) => return Ok(receipt),
                ReceiptStatus::Reverted(reason) => {
                    return Err(ActionError::Reverted {
                        hash: Some(hash),
                        reason,
                    });
                }
                ReceiptStatus::Error(msg) => return Err(ActionError::Rpc(msg)),
            },
            Ok(event) => {
                tracing::trace!(ours = %hash, theirs = %event.hash, "ignoring receipt for another transaction");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(%hash, skipped, "receipt stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(ActionError::Rpc("receipt watcher closed".to_owned()));
            }
        }
    }
}

fn failure_notification(action: &str, error: &ActionError) -> Notification {
    let (kind, message, key) = match error {
        ActionError::UserRejected => (
            NotificationKind::Rejected,
            "Transaction rejected".to_owned(),
            None,
        ),
        ActionError::Reverted { hash, reason } => (
            NotificationKind::Reverted,
            format!("{action} reverted: {reason}"),
            *hash,
        ),
        ActionError::UnsupportedChain(_) | ActionError::Rpc(_) | ActionError::TimedOut(_) => (
            NotificationKind::Failure,
            format!("{action} failed: {error}"),
            None,
        ),
    };
    Notification { kind, message, key }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUTTONS: ButtonLabels = ButtonLabels {
        idle: "Deploy",
        success: "Deployed!",
    };

    #[test]
    fn labels_follow_state() {
        assert_eq!(EngineState::Idle.label(&BUTTONS), "Deploy");
        assert_eq!(EngineState::Preparing.label(&BUTTONS), "Preparing...");
        assert_eq!(
            EngineState::SwitchingChain { target: 8453 }.label(&BUTTONS),
            "Switching network..."
        );
        assert_eq!(
            EngineState::Succeeded { hash: B256::ZERO }.label(&BUTTONS),
            "Deployed!"
        );
        assert_eq!(
            EngineState::Failed {
                error: ActionError::UserRejected
            }
            .label(&BUTTONS),
            "Failed"
        );
    }

    #[test]
    fn busy_spans_everything_but_idle() {
        assert!(!EngineState::Idle.is_busy());
        assert!(EngineState::Pending { hash: B256::ZERO }.is_busy());
        assert!(EngineState::Succeeded { hash: B256::ZERO }.is_busy());
        assert!(!EngineState::Succeeded { hash: B256::ZERO }.is_in_flight());
        assert!(EngineState::AwaitingApproval { target: 1 }.is_in_flight());
    }

    #[test]
    fn config_defaults_and_partial_override() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"display_delay_ms": 2000}"#).unwrap();
        assert_eq!(cfg.display_delay(), Duration::from_secs(2));
        assert_eq!(cfg.switch_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn failures_are_classified() {
        let rejected = failure_notification("Set Registry", &ActionError::UserRejected);
        assert_eq!(rejected.kind, NotificationKind::Rejected);

        let hash = B256::repeat_byte(4);
        let reverted = failure_notification(
            "Set Registry",
            &ActionError::Reverted {
                hash: Some(hash),
                reason: "not owner".to_owned(),
            },
        );
        assert_eq!(reverted.kind, NotificationKind::Reverted);
        assert_eq!(reverted.key, Some(hash));

        let timed_out = failure_notification("Set Registry", &ActionError::TimedOut(Stage::Receipt));
        assert_eq!(timed_out.kind, NotificationKind::Failure);
        assert_eq!(timed_out.message, "Set Registry failed: timed out waiting for receipt");
    }
}

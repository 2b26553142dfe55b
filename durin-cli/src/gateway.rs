//! Wallet gateway backed by a local private key and JSON-RPC endpoints.
//!
//! A "chain switch" re-targets the signing provider: the first configured
//! endpoint whose `eth_chainId` answers with the requested chain becomes the
//! active provider, and the new chain is published on the session channel.
//! Receipts are polled with `eth_getTransactionReceipt` in a background task
//! per hash and published on one shared broadcast stream.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use durin::gateway::{ChainSwitcher, ContractWriter, ReceiptWatcher, WalletSession};
use durin::{GatewayError, Receipt, ReceiptEvent, ReceiptStatus, WriteCall};
use tokio::sync::{broadcast, watch};

/// Per-request timeout for RPC calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between receipt polls.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Longest a single receipt is polled for.
const RECEIPT_WATCH_LIMIT: Duration = Duration::from_secs(30 * 60);

/// Maximum consecutive poll errors before the watch gives up.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Capacity of the shared receipt stream.
const RECEIPT_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
struct Active {
    chain_id: u64,
    provider: DynProvider,
}

/// [`durin::Gateway`] that signs locally and talks to public RPCs.
pub struct RpcGateway {
    wallet: EthereumWallet,
    address: Address,
    endpoints: HashMap<u64, Vec<String>>,
    active: Mutex<Option<Active>>,
    chain: watch::Sender<Option<u64>>,
    receipts: broadcast::Sender<ReceiptEvent>,
}

impl fmt::Debug for RpcGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcGateway")
            .field("address", &self.address)
            .field("chain", &*self.chain.borrow())
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl RpcGateway {
    /// Create a gateway for `signer` with RPC endpoint lists keyed by chain ID.
    ///
    /// The gateway starts on no chain; the first action switches it.
    #[must_use]
    pub fn new(signer: PrivateKeySigner, endpoints: HashMap<u64, Vec<String>>) -> Self {
        let address = signer.address();
        Self {
            wallet: EthereumWallet::from(signer),
            address,
            endpoints,
            active: Mutex::new(None),
            chain: watch::Sender::new(None),
            receipts: broadcast::Sender::new(RECEIPT_CHANNEL_CAPACITY),
        }
    }

    fn active(&self) -> Option<Active> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn connect(&self, chain_id: u64, rpc: &str) -> Result<DynProvider, GatewayError> {
        let url: Url = rpc
            .parse()
            .map_err(|e| GatewayError::Rpc(format!("invalid RPC URL {rpc}: {e}")))?;
        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .connect_http(url)
            .erased();

        let reported = tokio::time::timeout(REQUEST_TIMEOUT, provider.get_chain_id())
            .await
            .map_err(|_| GatewayError::Rpc(format!("{rpc}: request timed out")))?
            .map_err(|e| GatewayError::Rpc(format!("{rpc}: {e}")))?;
        if reported != chain_id {
            return Err(GatewayError::Rpc(format!(
                "{rpc} serves chain {reported}, expected {chain_id}"
            )));
        }
        Ok(provider)
    }
}

impl WalletSession for RpcGateway {
    fn current_address(&self) -> Option<Address> {
        Some(self.address)
    }

    fn subscribe_chain(&self) -> watch::Receiver<Option<u64>> {
        self.chain.subscribe()
    }
}

impl ChainSwitcher for RpcGateway {
    async fn request_switch(&self, chain_id: u64) -> Result<(), GatewayError> {
        let rpcs = self
            .endpoints
            .get(&chain_id)
            .filter(|r| !r.is_empty())
            .ok_or(GatewayError::UnsupportedChain(chain_id))?;

        let mut last_error = None;
        for rpc in rpcs {
            match self.connect(chain_id, rpc).await {
                Ok(provider) => {
                    *self.active.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some(Active { chain_id, provider });
                    self.chain.send_replace(Some(chain_id));
                    tracing::info!(chain_id, rpc = %rpc, "switched chain");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(chain_id, rpc = %rpc, error = %e, "RPC unusable, trying next");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(GatewayError::UnsupportedChain(chain_id)))
    }
}

impl ContractWriter for RpcGateway {
    async fn submit_write(&self, call: &WriteCall) -> Result<B256, GatewayError> {
        let active = self
            .active()
            .ok_or_else(|| GatewayError::Rpc("no active chain".to_owned()))?;
        if active.chain_id != call.chain_id {
            return Err(GatewayError::Rpc(format!(
                "active chain is {}, call targets {}",
                active.chain_id, call.chain_id
            )));
        }

        let tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(call.to)
            .with_input(call.input.clone());
        tracing::debug!(chain_id = call.chain_id, to = %call.to, signature = call.signature, "sending transaction");

        let pending = tokio::time::timeout(REQUEST_TIMEOUT, active.provider.send_transaction(tx))
            .await
            .map_err(|_| GatewayError::Rpc("send timed out".to_owned()))?
            .map_err(|e| classify_send_error(&e.to_string()))?;
        Ok(*pending.tx_hash())
    }
}

impl ReceiptWatcher for RpcGateway {
    fn subscribe_receipts(&self) -> broadcast::Receiver<ReceiptEvent> {
        self.receipts.subscribe()
    }

    fn watch_receipt(&self, hash: B256) {
        let receipts = self.receipts.clone();
        let Some(active) = self.active() else {
            receipts
                .send(ReceiptEvent {
                    hash,
                    status: ReceiptStatus::Error("no active chain".to_owned()),
                })
                .ok();
            return;
        };
        tokio::spawn(async move {
            let Some(status) = poll_receipt(&active.provider, hash, &receipts).await else {
                tracing::debug!(chain_id = active.chain_id, %hash, "receipt watch abandoned");
                return;
            };
            tracing::debug!(chain_id = active.chain_id, %hash, ?status, "receipt watch finished");
            // No subscribers means every interested run has gone away.
            receipts.send(ReceiptEvent { hash, status }).ok();
        });
    }
}

/// Poll until `hash` is mined, the watch limit passes or nobody listens.
///
/// Returns `None` once every subscriber of `receipts` is gone.
async fn poll_receipt<P: Provider>(
    provider: &P,
    hash: B256,
    receipts: &broadcast::Sender<ReceiptEvent>,
) -> Option<ReceiptStatus> {
    let deadline = tokio::time::Instant::now() + RECEIPT_WATCH_LIMIT;
    let mut errors = 0u32;
    loop {
        if receipts.receiver_count() == 0 {
            return None;
        }
        if tokio::time::Instant::now() >= deadline {
            return Some(ReceiptStatus::Error(format!(
                "no receipt after {}s",
                RECEIPT_WATCH_LIMIT.as_secs()
            )));
        }

        let result = tokio::time::timeout(REQUEST_TIMEOUT, provider.get_transaction_receipt(hash))
            .await
            .map_err(|_| "request timed out".to_owned())
            .and_then(|r| r.map_err(|e| e.to_string()));

        match result {
            Ok(Some(receipt)) => {
                if !receipt.status() {
                    return Some(ReceiptStatus::Reverted("execution reverted".to_owned()));
                }
                return Some(ReceiptStatus::Success(Receipt {
                    transaction_hash: receipt.transaction_hash,
                    block_number: receipt.block_number,
                    logs: receipt.inner.logs().iter().map(|l| l.inner.clone()).collect(),
                }));
            }
            Ok(None) => errors = 0,
            Err(e) => {
                errors += 1;
                if errors >= MAX_CONSECUTIVE_ERRORS {
                    return Some(ReceiptStatus::Error(format!("{errors} consecutive errors: {e}")));
                }
                tracing::warn!(%hash, error = %e, "receipt poll failed, retrying");
            }
        }
        tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
    }
}

/// Map a node error on submission to a gateway error.
///
/// Gas estimation surfaces contract reverts before anything is broadcast.
fn classify_send_error(message: &str) -> GatewayError {
    if message.contains("execution reverted") {
        GatewayError::Reverted(message.to_owned())
    } else {
        GatewayError::Rpc(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::Bytes;

    use super::*;

    fn gateway(endpoints: &[(u64, &str)]) -> RpcGateway {
        let endpoints = endpoints
            .iter()
            .map(|(id, url)| (*id, vec![(*url).to_owned()]))
            .collect();
        RpcGateway::new(PrivateKeySigner::random(), endpoints)
    }

    fn call(chain_id: u64) -> WriteCall {
        WriteCall {
            to: Address::repeat_byte(1),
            signature: "setText(bytes32,string,string)",
            input: Bytes::new(),
            chain_id,
        }
    }

    #[test]
    fn starts_connected_on_no_chain() {
        let gw = gateway(&[]);
        assert!(gw.is_connected());
        assert_eq!(gw.current_chain_id(), None);
    }

    #[tokio::test]
    async fn switch_to_unconfigured_chain_is_unsupported() {
        let gw = gateway(&[(1, "https://eth.llamarpc.com")]);
        assert_eq!(
            gw.request_switch(8453).await,
            Err(GatewayError::UnsupportedChain(8453))
        );
        assert_eq!(gw.current_chain_id(), None);
    }

    #[tokio::test]
    async fn malformed_endpoint_fails_switch() {
        let gw = gateway(&[(8453, "not a url")]);
        let err = gw.request_switch(8453).await.unwrap_err();
        assert!(matches!(err, GatewayError::Rpc(ref m) if m.contains("invalid RPC URL")), "{err}");
        assert_eq!(gw.current_chain_id(), None);
    }

    #[tokio::test]
    async fn write_without_active_chain_fails() {
        let gw = gateway(&[]);
        let err = gw.submit_write(&call(8453)).await.unwrap_err();
        assert_eq!(err, GatewayError::Rpc("no active chain".to_owned()));
    }

    #[tokio::test]
    async fn watch_without_active_chain_reports_error() {
        let gw = gateway(&[]);
        let mut rx = gw.subscribe_receipts();
        let hash = B256::repeat_byte(7);
        gw.watch_receipt(hash);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.hash, hash);
        assert!(matches!(event.status, ReceiptStatus::Error(_)), "{event:?}");
    }

    /// Provider pointed at a closed local port.
    fn unreachable_provider() -> DynProvider {
        let url: Url = "http://127.0.0.1:1".parse().unwrap();
        ProviderBuilder::new().connect_http(url).erased()
    }

    #[tokio::test]
    async fn poll_stops_without_subscribers() {
        let receipts = broadcast::Sender::new(4);
        let status = poll_receipt(&unreachable_provider(), B256::repeat_byte(7), &receipts).await;
        assert_eq!(status, None);
    }

    #[tokio::test]
    async fn poll_stops_once_last_subscriber_leaves() {
        let receipts = broadcast::Sender::new(4);
        let rx = receipts.subscribe();
        let provider = unreachable_provider();
        let poll = poll_receipt(&provider, B256::repeat_byte(7), &receipts);
        tokio::pin!(poll);

        // Still polling while a run is waiting.
        assert!(
            tokio::time::timeout(Duration::from_millis(500), poll.as_mut()).await.is_err(),
            "poll ended while a subscriber was waiting"
        );
        drop(rx);
        let status = tokio::time::timeout(RECEIPT_POLL_INTERVAL * 2, poll).await.unwrap();
        assert_eq!(status, None);
    }

    #[test]
    fn reverts_are_told_apart_from_transport_errors() {
        assert!(matches!(
            classify_send_error("server returned an error response: execution reverted: not owner"),
            GatewayError::Reverted(_)
        ));
        assert!(matches!(
            classify_send_error("error sending request for url"),
            GatewayError::Rpc(_)
        ));
    }
}

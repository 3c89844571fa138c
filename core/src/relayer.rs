//! Relayers
//!
//! Transactions reach the ledger through a relayer so the submitter's
//! transparent identity never touches the shielded transaction. A pool of
//! relayers is tried in order; the first one that answers wins.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ProtocolError, Result};
use crate::ledger::{Ledger, ShieldedTransaction, TxId};

/// Anything that can forward a transaction to the ledger
pub trait Relayer: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn relay(&self, tx: ShieldedTransaction) -> impl Future<Output = Result<TxId>> + Send;
}

/// Relayer that hands transactions straight to a ledger
pub struct DirectRelayer<L> {
    name: String,
    ledger: Arc<L>,
    online: AtomicBool,
}

impl<L: Ledger> DirectRelayer<L> {
    pub fn new(name: impl Into<String>, ledger: Arc<L>) -> Self {
        Self {
            name: name.into(),
            ledger,
            online: AtomicBool::new(true),
        }
    }

    /// Take the relayer on or off line
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

impl<L: Ledger> Relayer for DirectRelayer<L> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn relay(&self, tx: ShieldedTransaction) -> Result<TxId> {
        if !self.is_online() {
            return Err(ProtocolError::RelayerUnavailable(self.name.clone()));
        }
        self.ledger.submit(tx).await
    }
}

/// Ordered set of relayers with failover
pub struct RelayerPool<R> {
    relayers: Vec<R>,
    request_timeout: Duration,
}

impl<R: Relayer> RelayerPool<R> {
    pub fn new(relayers: Vec<R>, request_timeout: Duration) -> Self {
        Self {
            relayers,
            request_timeout,
        }
    }

    pub fn relayers(&self) -> &[R] {
        &self.relayers
    }

    /// Submit through the first relayer that responds.
    ///
    /// Unavailable or timed-out relayers are skipped. A verdict from the
    /// ledger (accepted or rejected) ends the search.
    pub async fn submit(&self, tx: &ShieldedTransaction) -> Result<TxId> {
        let mut tried = Vec::with_capacity(self.relayers.len());

        for relayer in &self.relayers {
            let outcome = tokio::time::timeout(self.request_timeout, relayer.relay(tx.clone())).await;
            match outcome {
                Ok(Err(ProtocolError::RelayerUnavailable(reason))) => {
                    warn!(relayer = relayer.name(), %reason, "Relayer unavailable, failing over");
                }
                Err(_elapsed) => {
                    warn!(
                        relayer = relayer.name(),
                        timeout_ms = self.request_timeout.as_millis() as u64,
                        "Relayer timed out, failing over"
                    );
                }
                Ok(result) => {
                    debug!(relayer = relayer.name(), ok = result.is_ok(), "Relayer answered");
                    return result;
                }
            }
            tried.push(relayer.name().to_string());
        }

        Err(ProtocolError::RelayerUnavailable(if tried.is_empty() {
            "no relayers configured".to_string()
        } else {
            format!("all relayers failed: {}", tried.join(", "))
        }))
    }
}

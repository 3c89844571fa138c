//! Note scanner
//!
//! Walks the ledger's published leaves from a cursor, trial-decrypts every
//! payload with the wallet's ECDH key and records the notes that belong to
//! it. Scanning is idempotent: a note already in the store is skipped.

use std::sync::Arc;
use std::time::Duration;

use shade_privacy::{KeyHierarchy, Note, decrypt_with};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ledger::Ledger;
use crate::store::{NoteStatus, NoteStore};

pub struct NoteScanner<L> {
    ledger: Arc<L>,
    keys: KeyHierarchy,
    store: Arc<Mutex<NoteStore>>,
    cursor: Mutex<u64>,
    batch_size: usize,
    interval: Duration,
}

impl<L: Ledger> NoteScanner<L> {
    pub fn new(
        ledger: Arc<L>,
        keys: KeyHierarchy,
        store: Arc<Mutex<NoteStore>>,
        batch_size: usize,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            keys,
            store,
            cursor: Mutex::new(0),
            batch_size: batch_size.max(1),
            interval,
        }
    }

    /// Next leaf index to be scanned
    pub async fn cursor(&self) -> u64 {
        *self.cursor.lock().await
    }

    /// Scan everything published since the cursor. Returns the number of
    /// newly discovered notes.
    pub async fn scan_once(&self) -> usize {
        let mut cursor = self.cursor.lock().await;
        let mut discovered = 0;

        loop {
            let batch = self
                .ledger
                .encrypted_notes_from(*cursor, self.batch_size)
                .await;
            let Some(last) = batch.last() else {
                break;
            };
            let next = last.leaf_index + 1;

            let mut found: Vec<(Note, u64)> = Vec::new();
            for leaf in &batch {
                let Some(payload) = &leaf.payload else {
                    continue;
                };
                match decrypt_with(self.keys.ecdh().secret(), payload) {
                    Some(note) if note.commitment() == leaf.commitment => {
                        found.push((note, leaf.leaf_index));
                    }
                    Some(_) => {
                        warn!(leaf_index = leaf.leaf_index, "Payload does not open to its leaf");
                    }
                    None => {}
                }
            }

            let mut statuses = Vec::with_capacity(found.len());
            for (note, _) in &found {
                let status = if self.ledger.is_spent(&note.nullifier()).await {
                    NoteStatus::Spent
                } else {
                    NoteStatus::Unspent
                };
                statuses.push(status);
            }

            {
                let mut store = self.store.lock().await;
                for ((note, leaf_index), status) in found.into_iter().zip(statuses) {
                    if store.add_note_with_status(note, leaf_index, status) {
                        discovered += 1;
                    }
                }
            }

            debug!(from = *cursor, to = next, "Scanned ledger batch");
            *cursor = next;

            if batch.len() < self.batch_size {
                break;
            }
        }

        if discovered > 0 {
            info!(discovered, cursor = *cursor, "Discovered incoming notes");
        }
        discovered
    }

    /// Rescan from leaf zero
    pub async fn rescan(&self) -> usize {
        *self.cursor.lock().await = 0;
        self.scan_once().await
    }

    /// Poll the ledger until cancelled
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Note scanner stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.scan_once().await;
                    }
                }
            }
        })
    }
}

//! Serialized background writer for a single store key
//!
//! Callers hand over whole-collection blobs and return immediately. The
//! writer task performs at most one store operation at a time for its key
//! and always writes the newest issued operation, so an older blob can
//! never land after a newer one.

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, time::sleep};
use tracing::{debug, warn};

use super::KeyValueStore;
use crate::{error::AppError, state::NoticeBoard};

/// Operation queued for a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put(String),
    Remove,
}

#[derive(Debug, Clone)]
struct Issued {
    seq: u64,
    op: WriteOp,
}

#[derive(Debug, Clone, Default)]
struct Completed {
    seq: u64,
    error: Option<String>,
}

/// Handle to the writer task owning one key
#[derive(Debug)]
pub struct PersistWriter {
    key: &'static str,
    issued_tx: watch::Sender<Option<Issued>>,
    completed_rx: watch::Receiver<Completed>,
}

impl PersistWriter {
    /// Spawn the writer task. Must be called inside a Tokio runtime.
    pub fn spawn(
        store: Arc<dyn KeyValueStore>,
        key: &'static str,
        debounce: Duration,
        notices: NoticeBoard,
    ) -> Self {
        let (issued_tx, issued_rx) = watch::channel(None);
        let (completed_tx, completed_rx) = watch::channel(Completed::default());

        tokio::spawn(write_loop(
            store,
            key,
            debounce,
            issued_rx,
            completed_tx,
            notices,
        ));

        Self {
            key,
            issued_tx,
            completed_rx,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Queue an operation, superseding anything not yet written.
    /// Returns the sequence number assigned to it.
    pub fn issue(&self, op: WriteOp) -> u64 {
        let mut seq = 0;
        // Sequence assignment and publication happen under the channel lock
        self.issued_tx.send_modify(|slot| {
            seq = slot.as_ref().map_or(0, |issued| issued.seq) + 1;
            *slot = Some(Issued { seq, op });
        });
        seq
    }

    /// Wait until everything issued so far has been written.
    /// Reports the outcome of the most recent write.
    pub async fn flush(&self) -> Result<(), AppError> {
        let target = self
            .issued_tx
            .borrow()
            .as_ref()
            .map_or(0, |issued| issued.seq);

        let mut completed = self.completed_rx.clone();
        let done = completed
            .wait_for(|c| c.seq >= target)
            .await
            .map_err(|_| AppError::StorageWrite {
                key: self.key.to_string(),
                message: "writer task stopped".to_string(),
            })?;

        match &done.error {
            Some(message) => Err(AppError::StorageWrite {
                key: self.key.to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

async fn write_loop(
    store: Arc<dyn KeyValueStore>,
    key: &'static str,
    debounce: Duration,
    mut issued_rx: watch::Receiver<Option<Issued>>,
    completed_tx: watch::Sender<Completed>,
    notices: NoticeBoard,
) {
    debug!("Writer for '{}' started", key);

    loop {
        if issued_rx.changed().await.is_err() {
            break;
        }

        if !debounce.is_zero() {
            sleep(debounce).await;
        }

        let Some(issued) = issued_rx.borrow_and_update().clone() else {
            continue;
        };

        let result = match &issued.op {
            WriteOp::Put(blob) => store.set(key, blob).await,
            WriteOp::Remove => store.remove(key).await,
        };

        let error = match result {
            Ok(()) => {
                debug!("Write #{} for '{}' completed", issued.seq, key);
                notices.clear_for(key);
                None
            }
            Err(e) => {
                warn!("Write #{} for '{}' failed: {}", issued.seq, key, e);
                notices.push(key, format!("Failed to save {}: {}", key, e));
                Some(e.to_string())
            }
        };

        completed_tx.send_replace(Completed {
            seq: issued.seq,
            error,
        });
    }

    debug!("Writer for '{}' stopped", key);
}

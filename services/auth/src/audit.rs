//! Best-effort audit trail
//!
//! Handlers hand entries to an [`AuditSink`], which only pushes them onto a
//! bounded channel. A single writer task drains the channel into the
//! [`AuditStore`]. When the queue is full or the writer has stopped the
//! entry is dropped with a warning; a failed insert is logged and skipped.
//! Neither case reaches the request that produced the entry.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::models::{AuditAction, AuditEntry, RequestContext};
use crate::repositories::AuditStore;

/// Default number of entries buffered between handlers and the writer
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Sending half of the audit queue
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditEntry>,
}

impl AuditSink {
    /// Queue an audit entry without waiting
    ///
    /// Returns whether the entry was accepted by the queue.
    pub fn record(
        &self,
        user_id: i64,
        action: AuditAction,
        token_jti: Option<&str>,
        ctx: &RequestContext,
    ) -> bool {
        let entry = AuditEntry {
            user_id,
            action,
            token_jti: token_jti.map(str::to_string),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            created_at: Utc::now(),
        };

        match self.tx.try_send(entry) {
            Ok(()) => true,
            Err(TrySendError::Full(entry)) => {
                warn!(
                    user_id = entry.user_id,
                    action = %entry.action,
                    "Audit queue full, dropping entry"
                );
                false
            }
            Err(TrySendError::Closed(entry)) => {
                warn!(
                    user_id = entry.user_id,
                    action = %entry.action,
                    "Audit writer stopped, dropping entry"
                );
                false
            }
        }
    }
}

/// Start the writer task and return the sink feeding it
///
/// The task ends once every clone of the sink has been dropped and the
/// queue is drained; its output is the number of entries written.
pub fn spawn(store: Arc<dyn AuditStore>, capacity: usize) -> (AuditSink, JoinHandle<u64>) {
    let (tx, mut rx) = mpsc::channel::<AuditEntry>(capacity.max(1));

    let handle = tokio::spawn(async move {
        let mut written = 0u64;
        while let Some(entry) = rx.recv().await {
            match store.append(&entry).await {
                Ok(()) => written += 1,
                Err(e) => error!(
                    user_id = entry.user_id,
                    action = %entry.action,
                    "Failed to write audit entry: {}",
                    e
                ),
            }
        }
        info!("Audit writer stopped after {} entries", written);
        written
    });

    (AuditSink { tx }, handle)
}

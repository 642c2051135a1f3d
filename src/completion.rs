//! Completion side-effect interface
//!
//! When a session reaches `completed` the coordinator notifies this
//! interface exactly once, after the ledger commit. Hook failures are
//! logged for reconciliation and never roll anything back, so
//! implementations must tolerate at-most-once delivery.

use async_trait::async_trait;

use crate::core_types::{Amount, SessionId, UserId};
use crate::session::InteractionKind;

/// Snapshot handed to the hook; built under the coordinator lock,
/// delivered after it is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    pub session_id: SessionId,
    pub requester_id: UserId,
    pub provider_id: UserId,
    pub kind: InteractionKind,
    pub gross: Amount,
    pub provider_net: Amount,
    pub completed_at: i64,
}

#[async_trait]
pub trait CompletionHooks: Send + Sync {
    /// Called once per completed session. Errors are logged, not retried.
    async fn on_session_completed(&self, record: &CompletionRecord) -> anyhow::Result<()>;
}

/// Default wiring when no downstream systems are configured.
pub struct NoopHooks;

#[async_trait]
impl CompletionHooks for NoopHooks {
    async fn on_session_completed(&self, _record: &CompletionRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Test double that captures every delivery.
#[derive(Default)]
pub struct RecordingHooks {
    records: std::sync::Mutex<Vec<CompletionRecord>>,
    pub fail: std::sync::atomic::AtomicBool,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<CompletionRecord> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl CompletionHooks for RecordingHooks {
    async fn on_session_completed(&self, record: &CompletionRecord) -> anyhow::Result<()> {
        if let Ok(mut guard) = self.records.lock() {
            guard.push(record.clone());
        }
        if self.fail.load(std::sync::atomic::Ordering::Relaxed) {
            anyhow::bail!("downstream rejected completion");
        }
        Ok(())
    }
}

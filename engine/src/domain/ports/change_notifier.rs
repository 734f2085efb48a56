//! ChangeNotifier port
//! Receives the full runtime snapshot after every tracked state transition

use crate::domain::ProgramSnapshot;
use async_trait::async_trait;

#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Deliver a snapshot. Must not block on a missing or slow receiver.
    async fn notify(&self, snapshot: Vec<ProgramSnapshot>);
}

/// Discards every snapshot
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl ChangeNotifier for NoopNotifier {
    async fn notify(&self, _snapshot: Vec<ProgramSnapshot>) {}
}

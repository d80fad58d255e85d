//! Queue snapshot persistence port (driven/secondary port)
//!
//! Snapshots are written after every queue mutation and read once at
//! start-up. They are a best-effort recovery aid: the in-memory queue stays
//! authoritative and a failed save never fails a transfer.

use crate::domain::{QueueSnapshot, TransferDirection};

/// Port for persisting pending queue contents per direction
#[async_trait::async_trait]
pub trait IQueueSnapshotStore: Send + Sync {
    /// Replace the stored snapshot for `snapshot.direction`
    async fn save(&self, snapshot: &QueueSnapshot) -> anyhow::Result<()>;

    /// Last stored snapshot for `direction`
    async fn load(&self, direction: TransferDirection) -> anyhow::Result<Option<QueueSnapshot>>;

    /// Drop the stored snapshot for `direction`
    async fn clear(&self, direction: TransferDirection) -> anyhow::Result<()>;
}

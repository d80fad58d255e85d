//! SQLite implementation of the IQueueSnapshotStore port
//!
//! One row per transfer direction. The pending items are stored as a JSON
//! array in FIFO order, so a snapshot always reads back whole: a row is
//! replaced in a single statement and never holds a partial queue.
//!
//! | Column       | SQL Type | Contents                                  |
//! |--------------|----------|-------------------------------------------|
//! | `direction`  | TEXT     | `upload` / `download`                     |
//! | `items`      | TEXT     | `Vec<PendingTransferItem>` as JSON        |
//! | `item_count` | INTEGER  | Number of items, for quick inspection     |
//! | `saved_at`   | TEXT     | RFC 3339 timestamp                        |

use chrono::{DateTime, Utc};
use permafiles_core::{
    domain::{PendingTransferItem, QueueSnapshot, TransferDirection},
    ports::IQueueSnapshotStore,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, trace};

use crate::CacheError;

/// Queue snapshot store backed by the `queue_snapshots` table
#[derive(Debug, Clone)]
pub struct SqliteQueueStore {
    pool: SqlitePool,
}

impl SqliteQueueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn save_snapshot(&self, snapshot: &QueueSnapshot) -> Result<(), CacheError> {
        let items = serde_json::to_string(&snapshot.items)?;
        sqlx::query(
            "INSERT INTO queue_snapshots (direction, items, item_count, saved_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(direction) DO UPDATE SET
                items = excluded.items,
                item_count = excluded.item_count,
                saved_at = excluded.saved_at",
        )
        .bind(snapshot.direction.name())
        .bind(items)
        .bind(snapshot.items.len() as i64)
        .bind(snapshot.saved_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        trace!(
            direction = %snapshot.direction,
            items = snapshot.items.len(),
            "saved queue snapshot"
        );
        Ok(())
    }

    async fn load_snapshot(
        &self,
        direction: TransferDirection,
    ) -> Result<Option<QueueSnapshot>, CacheError> {
        let row = sqlx::query("SELECT items, saved_at FROM queue_snapshots WHERE direction = ?")
            .bind(direction.name())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<PendingTransferItem> = serde_json::from_str(row.get::<&str, _>("items"))?;
        let saved_at = DateTime::parse_from_rfc3339(row.get::<&str, _>("saved_at"))
            .map_err(|e| CacheError::SerializationError(format!("saved_at: {e}")))?
            .with_timezone(&Utc);

        debug!(direction = %direction, items = items.len(), "loaded queue snapshot");
        Ok(Some(QueueSnapshot {
            direction,
            items,
            saved_at,
        }))
    }

    async fn clear_snapshot(&self, direction: TransferDirection) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM queue_snapshots WHERE direction = ?")
            .bind(direction.name())
            .execute(&self.pool)
            .await?;
        trace!(direction = %direction, "cleared queue snapshot");
        Ok(())
    }
}

#[async_trait::async_trait]
impl IQueueSnapshotStore for SqliteQueueStore {
    async fn save(&self, snapshot: &QueueSnapshot) -> anyhow::Result<()> {
        Ok(self.save_snapshot(snapshot).await?)
    }

    async fn load(&self, direction: TransferDirection) -> anyhow::Result<Option<QueueSnapshot>> {
        Ok(self.load_snapshot(direction).await?)
    }

    async fn clear(&self, direction: TransferDirection) -> anyhow::Result<()> {
        Ok(self.clear_snapshot(direction).await?)
    }
}

//! Integration tests for SqliteQueueStore
//!
//! Each test opens a fresh in-memory database so tests stay isolated.

use permafiles_cache::{DatabasePool, SqliteQueueStore};
use permafiles_core::domain::{
    ArchiveNumber, FileEntry, FolderId, FolderLinkId, PendingTransferItem, QueueSnapshot,
    RecordId, TargetFolder, TransferDirection,
};
use permafiles_core::ports::IQueueSnapshotStore;

// ============================================================================
// Test helpers
// ============================================================================

async fn setup() -> SqliteQueueStore {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    SqliteQueueStore::new(pool.pool().clone())
}

fn archive() -> ArchiveNumber {
    ArchiveNumber::new("0a21-0000").unwrap()
}

fn upload(name: &str) -> PendingTransferItem {
    let target = TargetFolder {
        archive_number: archive(),
        folder_id: FolderId::new(19).unwrap(),
        folder_link_id: FolderLinkId::new(20).unwrap(),
    };
    PendingTransferItem::upload(format!("/home/user/Pictures/{name}"), 2048, target).unwrap()
}

fn download(name: &str, record_id: i64) -> PendingTransferItem {
    let entry = FileEntry::file(
        name,
        archive(),
        RecordId::new(record_id).unwrap(),
        FolderLinkId::new(record_id + 1000).unwrap(),
    )
    .with_parent(FolderLinkId::new(20).unwrap());
    PendingTransferItem::download(&entry).unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_load_without_snapshot_is_none() {
    let store = setup().await;
    assert!(store.load(TransferDirection::Upload).await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_then_load_keeps_fifo_order() {
    let store = setup().await;
    let items = vec![upload("A.jpg"), upload("B.pdf"), upload("C.png")];
    let snapshot = QueueSnapshot::new(TransferDirection::Upload, items.clone());

    store.save(&snapshot).await.unwrap();
    let loaded = store
        .load(TransferDirection::Upload)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(loaded.direction, TransferDirection::Upload);
    assert_eq!(loaded.items, items);
    assert_eq!(loaded.saved_at.timestamp(), snapshot.saved_at.timestamp());
}

#[tokio::test]
async fn test_save_replaces_previous_snapshot() {
    let store = setup().await;
    store
        .save(&QueueSnapshot::new(
            TransferDirection::Upload,
            vec![upload("A.jpg"), upload("B.pdf")],
        ))
        .await
        .unwrap();
    let remaining = vec![upload("B.pdf")];
    store
        .save(&QueueSnapshot::new(TransferDirection::Upload, remaining.clone()))
        .await
        .unwrap();

    let loaded = store.load(TransferDirection::Upload).await.unwrap().unwrap();
    assert_eq!(loaded.items, remaining);
}

#[tokio::test]
async fn test_directions_are_independent() {
    let store = setup().await;
    let uploads = vec![upload("A.jpg")];
    let downloads = vec![download("E.pdf", 5), download("D.pdf", 6)];
    store
        .save(&QueueSnapshot::new(TransferDirection::Upload, uploads.clone()))
        .await
        .unwrap();
    store
        .save(&QueueSnapshot::new(
            TransferDirection::Download,
            downloads.clone(),
        ))
        .await
        .unwrap();

    store.clear(TransferDirection::Upload).await.unwrap();

    assert!(store.load(TransferDirection::Upload).await.unwrap().is_none());
    let loaded = store
        .load(TransferDirection::Download)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.items, downloads);
}

#[tokio::test]
async fn test_clear_without_snapshot_is_ok() {
    let store = setup().await;
    store.clear(TransferDirection::Download).await.unwrap();
}

#[tokio::test]
async fn test_corrupt_row_is_an_error() {
    let pool = DatabasePool::in_memory().await.unwrap();
    sqlx::query(
        "INSERT INTO queue_snapshots (direction, items, item_count, saved_at)
         VALUES ('upload', 'not json', 1, '2026-01-01T00:00:00Z')",
    )
    .execute(pool.pool())
    .await
    .unwrap();

    let store = SqliteQueueStore::new(pool.pool().clone());
    assert!(store.load(TransferDirection::Upload).await.is_err());
}

#[tokio::test]
async fn test_snapshot_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("queue.db");
    let items = vec![download("E.pdf", 5)];

    {
        let pool = DatabasePool::new(&path).await.unwrap();
        let store = SqliteQueueStore::new(pool.pool().clone());
        store
            .save(&QueueSnapshot::new(TransferDirection::Download, items.clone()))
            .await
            .unwrap();
        pool.pool().close().await;
    }

    let pool = DatabasePool::new(&path).await.unwrap();
    let store = SqliteQueueStore::new(pool.pool().clone());
    let loaded = store
        .load(TransferDirection::Download)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.items, items);
}

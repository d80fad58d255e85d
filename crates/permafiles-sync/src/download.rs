//! Download pipeline
//!
//! Resolves a record's download URL, streams its bytes and writes them to
//! local storage. A record already present in local storage completes
//! without touching the network.

use std::path::PathBuf;
use std::sync::Arc;

use permafiles_core::{
    domain::{PendingTransferItem, RecordId, TransferDirection, TransferSource},
    ports::{ILocalFileStorage, SyncEvent},
};
use tracing::{debug, info, instrument};

use crate::error::TransferError;
use crate::queue::{ProgressReporter, TransferPipeline, TransferResult};
use crate::repository::FolderRepository;

/// Local file name of a downloaded record
pub fn cache_file_name(record_id: RecordId, display_name: &str) -> String {
    let safe: String = display_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{record_id}_{safe}")
}

/// Downloads records into local storage
pub struct DownloadPipeline {
    repository: Arc<FolderRepository>,
    storage: Arc<dyn ILocalFileStorage>,
}

impl DownloadPipeline {
    pub fn new(repository: Arc<FolderRepository>, storage: Arc<dyn ILocalFileStorage>) -> Self {
        Self {
            repository,
            storage,
        }
    }
}

#[async_trait::async_trait]
impl TransferPipeline for DownloadPipeline {
    type Output = PathBuf;

    fn direction(&self) -> TransferDirection {
        TransferDirection::Download
    }

    fn supports_in_flight_cancel(&self) -> bool {
        true
    }

    #[instrument(skip(self, item, progress), fields(item_id = %item.id, name = %item.display_name))]
    async fn run(
        &self,
        item: &PendingTransferItem,
        progress: ProgressReporter,
    ) -> TransferResult<PathBuf> {
        let TransferSource::RemoteRecord {
            record_id,
            folder_link_id,
            archive_number,
            ..
        } = &item.source
        else {
            return Err(TransferError::InvalidItem(format!(
                "'{}' is not a download",
                item.display_name
            )));
        };

        let filename = cache_file_name(*record_id, &item.display_name);
        match self.storage.read(&filename).await {
            Ok(Some(path)) => {
                info!(path = %path.display(), "using cached copy");
                progress.report(1, 1);
                return Ok(path);
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "cache lookup failed, downloading"),
        }

        let url = self
            .repository
            .resolve_download_url(archive_number, *record_id, *folder_link_id)
            .await
            .map_err(TransferError::Resolution)?;
        debug!(url = %url, "resolved download URL");

        let bytes = self
            .repository
            .download_content(&url, progress.callback())
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    TransferError::Cancelled
                } else {
                    TransferError::Binary(e)
                }
            })?;

        self.storage
            .write(&bytes, &filename)
            .await
            .map_err(|e| TransferError::Storage(e.to_string()))
    }

    fn completed_event(&self, item: &PendingTransferItem, path: &PathBuf) -> SyncEvent {
        SyncEvent::DownloadCompleted {
            item_id: item.id,
            local_path: path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use permafiles_core::endpoint::Endpoint;
    use serde_json::json;

    use super::*;
    use crate::events::EventBus;
    use crate::queue::{CancelOutcome, TransferQueue, TransferQueueHandle};
    use crate::test_support::{download_item, FakeDispatcher, MemoryStorage, RecordingObserver, Reply};

    struct Harness {
        dispatcher: Arc<FakeDispatcher>,
        storage: Arc<MemoryStorage>,
        observer: Arc<RecordingObserver>,
        queue: TransferQueueHandle<PathBuf>,
    }

    fn harness() -> Harness {
        let dispatcher = FakeDispatcher::new();
        dispatcher.on("get_record", |request| {
            let Endpoint::GetRecord { record_id, .. } = &request.endpoint else {
                unreachable!()
            };
            Reply::record(json!({
                "recordId": record_id.get(),
                "folder_linkId": record_id.get() + 1000,
                "FileVOs": [{"downloadURL": format!("https://files.example/{record_id}")}]
            }))
        });
        let storage = MemoryStorage::new();
        let events = EventBus::new();
        let observer = RecordingObserver::new();
        events.subscribe(observer.clone());
        let repository = Arc::new(FolderRepository::new(dispatcher.clone()));
        let pipeline = Arc::new(DownloadPipeline::new(repository, storage.clone()));
        let queue = TransferQueue::spawn(pipeline, events, None, 1);
        Harness {
            dispatcher,
            storage,
            observer,
            queue,
        }
    }

    #[test]
    fn test_cache_file_name_is_flat() {
        let id = RecordId::new(7).unwrap();
        assert_eq!(cache_file_name(id, "a/b.jpg"), "7_a_b.jpg");
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_download_finishes_before_next_begins() {
        let h = harness();
        h.dispatcher
            .delay("https://files.example/5", Duration::from_millis(500));

        let first = h
            .queue
            .enqueue(vec![download_item("E.pdf", 5, 20)])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = h
            .queue
            .enqueue(vec![download_item("D.pdf", 6, 20)])
            .await
            .unwrap();

        for ticket in first.into_iter().chain(second) {
            ticket.outcome().await.unwrap();
        }

        let calls = h.dispatcher.calls();
        assert_eq!(
            calls,
            vec![
                "get_record:5",
                "download:https://files.example/5",
                "get_record:6",
                "download:https://files.example/6",
            ]
        );
        assert_eq!(
            h.storage.contents("5_E.pdf").unwrap(),
            b"https://files.example/5".to_vec()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_copy_skips_network() {
        let h = harness();
        h.storage.insert("5_E.pdf", b"cached");

        let tickets = h
            .queue
            .enqueue(vec![download_item("E.pdf", 5, 20)])
            .await
            .unwrap();
        let path = tickets.into_iter().next().unwrap().outcome().await.unwrap();

        assert_eq!(path, PathBuf::from("/cache/5_E.pdf"));
        assert!(h.dispatcher.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_url_fails_resolution_without_transfer() {
        let h = harness();
        h.dispatcher
            .on("get_record", |_| Reply::record(json!({"recordId": 5, "folder_linkId": 9})));

        let tickets = h
            .queue
            .enqueue(vec![download_item("E.pdf", 5, 20)])
            .await
            .unwrap();
        let outcome = tickets.into_iter().next().unwrap().outcome().await;

        assert!(matches!(outcome, Err(TransferError::Resolution(_))));
        assert!(h.dispatcher.transfers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_head_without_completion() {
        let h = harness();
        h.dispatcher
            .delay("https://files.example/5", Duration::from_millis(1_000));

        let mut tickets = h
            .queue
            .enqueue(vec![download_item("E.pdf", 5, 20), download_item("D.pdf", 6, 20)])
            .await
            .unwrap()
            .into_iter();
        let e = tickets.next().unwrap();
        let d = tickets.next().unwrap();
        let e_id = e.id();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            h.queue.cancel_in_flight().await.unwrap(),
            CancelOutcome::Cancelled(e_id)
        );
        assert_eq!(e.outcome().await, Err(TransferError::Cancelled));
        d.outcome().await.unwrap();

        // Let the abandoned transfer's timers run out.
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert!(h.storage.contents("5_E.pdf").is_none());
        assert!(!h.observer.events().iter().any(|event| matches!(
            event,
            SyncEvent::DownloadCompleted { item_id, .. } if *item_id == e_id
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_queue_view_marks_head_downloading() {
        let h = harness();
        h.dispatcher
            .delay("https://files.example/5", Duration::from_millis(500));
        h.queue
            .enqueue(vec![download_item("E.pdf", 5, 20), download_item("D.pdf", 6, 20)])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let placeholders = h.queue.status().await.unwrap().placeholders();
        let statuses: Vec<_> = placeholders.iter().map(|p| p.sync_status).collect();
        assert_eq!(
            statuses,
            vec![
                permafiles_core::domain::SyncStatus::Downloading,
                permafiles_core::domain::SyncStatus::Waiting
            ]
        );
        assert_eq!(placeholders[0].folder_link_id.unwrap().get(), 1005);
    }
}

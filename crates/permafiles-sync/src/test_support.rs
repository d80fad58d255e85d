//! In-process fakes shared by the engine tests

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use permafiles_core::{
    domain::{
        ArchiveNumber, FileEntry, FolderId, FolderLinkId, PendingTransferItem, QueueSnapshot,
        RecordId, TargetFolder, TransferDirection,
    },
    ports::{
        ApiRequest, DispatchError, DispatchResponse, IEventObserver, ILocalFileStorage,
        IQueueSnapshotStore, IRequestDispatcher, ProgressFn, SyncEvent, TransferRequest,
    },
};
use serde_json::{json, Value};

pub fn archive() -> ArchiveNumber {
    ArchiveNumber::new("0a21-0000").unwrap()
}

pub fn folder_entry(name: &str, folder_id: i64, link_id: i64) -> FileEntry {
    FileEntry::folder(
        name,
        archive(),
        FolderId::new(folder_id).unwrap(),
        FolderLinkId::new(link_id).unwrap(),
    )
}

pub fn file_entry(name: &str, record_id: i64, link_id: i64, parent_link_id: i64) -> FileEntry {
    FileEntry::file(
        name,
        archive(),
        RecordId::new(record_id).unwrap(),
        FolderLinkId::new(link_id).unwrap(),
    )
    .with_parent(FolderLinkId::new(parent_link_id).unwrap())
}

pub fn target(folder_id: i64, link_id: i64) -> TargetFolder {
    TargetFolder {
        archive_number: archive(),
        folder_id: FolderId::new(folder_id).unwrap(),
        folder_link_id: FolderLinkId::new(link_id).unwrap(),
    }
}

pub fn upload_item(name: &str, size: u64, link_id: i64) -> PendingTransferItem {
    PendingTransferItem::upload(format!("/tmp/{name}"), size, target(link_id - 1, link_id)).unwrap()
}

pub fn download_item(name: &str, record_id: i64, parent_link_id: i64) -> PendingTransferItem {
    PendingTransferItem::download(&file_entry(name, record_id, record_id + 1000, parent_link_id))
        .unwrap()
}

pub fn child_file(name: &str, record_id: i64, link_id: i64) -> Value {
    json!({
        "recordId": record_id,
        "folder_linkId": link_id,
        "displayName": name,
        "type": "type.record.image"
    })
}

pub fn child_folder(name: &str, folder_id: i64, link_id: i64) -> Value {
    json!({
        "folderId": folder_id,
        "folder_linkId": link_id,
        "displayName": name,
        "type": "type.folder"
    })
}

/// Serve a fixed root plus folder listings keyed by folder link id.
///
/// Listings are sorted by display name for the name sorts and kept in
/// the given order (reversed for descending) for the date sorts.
pub fn serve_tree(dispatcher: &FakeDispatcher, root: Value, folders: Vec<(i64, Vec<Value>)>) {
    use permafiles_core::{domain::SortOption, endpoint::Endpoint};

    dispatcher.on("get_root", move |_| Reply::folder(root.clone()));

    let tree: Arc<HashMap<i64, Vec<Value>>> = Arc::new(folders.into_iter().collect());
    let lookup = Arc::clone(&tree);
    dispatcher.on("navigate_min", move |request| {
        let Endpoint::NavigateMin { folder_link_id, .. } = &request.endpoint else {
            unreachable!()
        };
        match lookup.get(&folder_link_id.get()) {
            Some(children) => {
                let links: Vec<Value> = children
                    .iter()
                    .map(|c| json!({"folder_linkId": c["folder_linkId"]}))
                    .collect();
                Reply::folder(json!({
                    "folder_linkId": folder_link_id.get(),
                    "ChildItemVOs": links
                }))
            }
            None => Reply::rejected("Folder not found"),
        }
    });

    dispatcher.on("get_lean_items", move |request| {
        let Endpoint::GetLeanItems {
            folder_link_id,
            sort,
            ..
        } = &request.endpoint
        else {
            unreachable!()
        };
        let Some(children) = tree.get(&folder_link_id.get()) else {
            return Reply::rejected("Folder not found");
        };
        let mut children = children.clone();
        let name = |v: &Value| v["displayName"].as_str().unwrap_or_default().to_string();
        match sort {
            SortOption::NameAsc => children.sort_by_key(name),
            SortOption::NameDesc => {
                children.sort_by_key(name);
                children.reverse();
            }
            SortOption::DateAsc => {}
            SortOption::DateDesc => children.reverse(),
        }
        Reply::folder(json!({
            "folder_linkId": folder_link_id.get(),
            "ChildItemVOs": children
        }))
    });
}

pub fn root_vo() -> Value {
    json!({
        "folderId": 1,
        "folder_linkId": 2,
        "archiveNbr": "0a21-0000",
        "displayName": "My Files",
        "type": "type.folder.root.private"
    })
}

/// Builders for scripted answers
pub struct Reply;

impl Reply {
    pub fn json(body: Value) -> Result<DispatchResponse, DispatchError> {
        Ok(DispatchResponse::Json(body))
    }

    pub fn folder(vo: Value) -> Result<DispatchResponse, DispatchError> {
        Self::json(json!({
            "isSuccessful": true,
            "csrf": "csrf-token",
            "Results": [{"data": [{"FolderVO": vo}], "message": []}]
        }))
    }

    pub fn record(vo: Value) -> Result<DispatchResponse, DispatchError> {
        Self::json(json!({
            "isSuccessful": true,
            "csrf": "csrf-token",
            "Results": [{"data": [{"RecordVO": vo}], "message": []}]
        }))
    }

    pub fn share_link(vo: Value) -> Result<DispatchResponse, DispatchError> {
        Self::json(json!({
            "isSuccessful": true,
            "csrf": "csrf-token",
            "Results": [{"data": [{"Shareby_urlVO": vo}], "message": []}]
        }))
    }

    pub fn ok() -> Result<DispatchResponse, DispatchError> {
        Self::json(json!({"isSuccessful": true, "csrf": "csrf-token", "Results": []}))
    }

    pub fn rejected(message: &str) -> Result<DispatchResponse, DispatchError> {
        Self::json(json!({
            "isSuccessful": false,
            "Results": [{"data": [], "message": [message]}]
        }))
    }
}

type Handler = Box<dyn Fn(&ApiRequest) -> Result<DispatchResponse, DispatchError> + Send + Sync>;
type TransferHandler =
    Box<dyn Fn(&TransferRequest) -> Result<DispatchResponse, DispatchError> + Send + Sync>;

/// Dispatcher answering from per-endpoint closures and recording every call
#[derive(Default)]
pub struct FakeDispatcher {
    handlers: Mutex<HashMap<&'static str, Handler>>,
    transfer_handler: Mutex<Option<TransferHandler>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<ApiRequest>>,
    transfers: Mutex<Vec<TransferRequest>>,
    calls: Mutex<Vec<String>>,
}

impl FakeDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer calls to endpoint `name`
    pub fn on<F>(&self, name: &'static str, handler: F)
    where
        F: Fn(&ApiRequest) -> Result<DispatchResponse, DispatchError> + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap()
            .insert(name, Box::new(handler));
    }

    /// Answer binary transfers
    pub fn on_transfer<F>(&self, handler: F)
    where
        F: Fn(&TransferRequest) -> Result<DispatchResponse, DispatchError> + Send + Sync + 'static,
    {
        *self.transfer_handler.lock().unwrap() = Some(Box::new(handler));
    }

    /// Delay calls whose key matches: the display name for registration,
    /// the record id for record lookups, `folder:<link id>` for folder
    /// resolution, the file name for uploads, the URL for downloads
    pub fn delay(&self, key: &str, duration: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(key.to_string(), duration);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn transfers(&self) -> Vec<TransferRequest> {
        self.transfers.lock().unwrap().clone()
    }

    /// Every call in order, as `endpoint` or `endpoint:key`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn delay_for(&self, key: &str) -> Option<Duration> {
        self.delays.lock().unwrap().get(key).copied()
    }
}

fn request_key(request: &ApiRequest) -> Option<String> {
    use permafiles_core::endpoint::Endpoint;
    match &request.endpoint {
        Endpoint::RegisterRecord { display_name, .. } => Some(display_name.clone()),
        Endpoint::GetRecord { record_id, .. } => Some(record_id.to_string()),
        Endpoint::NavigateMin { folder_link_id, .. } => Some(format!("folder:{folder_link_id}")),
        _ => None,
    }
}

fn transfer_key(request: &TransferRequest) -> String {
    match request {
        TransferRequest::Upload { filename, .. } => filename.clone(),
        TransferRequest::Download { url } => url.clone(),
    }
}

#[async_trait::async_trait]
impl IRequestDispatcher for FakeDispatcher {
    async fn execute(&self, request: ApiRequest) -> Result<DispatchResponse, DispatchError> {
        let name = request.endpoint.name();
        let key = request_key(&request);
        self.calls.lock().unwrap().push(match &key {
            Some(k) => format!("{name}:{k}"),
            None => name.to_string(),
        });
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = key.as_deref().and_then(|k| self.delay_for(k)) {
            tokio::time::sleep(delay).await;
        }

        let handlers = self.handlers.lock().unwrap();
        match handlers.get(name) {
            Some(handler) => handler(&request),
            None => Err(DispatchError::Transport(format!("no handler for {name}"))),
        }
    }

    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressFn,
    ) -> Result<DispatchResponse, DispatchError> {
        let key = transfer_key(&request);
        let kind = match request {
            TransferRequest::Upload { .. } => "upload",
            TransferRequest::Download { .. } => "download",
        };
        self.calls.lock().unwrap().push(format!("{kind}:{key}"));
        self.transfers.lock().unwrap().push(request.clone());

        let total = match &request {
            TransferRequest::Upload { size, .. } => *size,
            TransferRequest::Download { .. } => 100,
        };
        progress(0, total);
        if let Some(delay) = self.delay_for(&key) {
            tokio::time::sleep(delay / 2).await;
            progress(total / 2, total);
            tokio::time::sleep(delay / 2).await;
        }
        progress(total, total);

        let handler = self.transfer_handler.lock().unwrap();
        match handler.as_ref() {
            Some(handler) => handler(&request),
            None => match request {
                TransferRequest::Upload { .. } => Reply::ok(),
                TransferRequest::Download { url } => Ok(DispatchResponse::Binary(url.into_bytes())),
            },
        }
    }
}

/// Observer that records every event
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(SyncEvent::name).collect()
    }
}

impl IEventObserver for RecordingObserver {
    fn on_event(&self, event: &SyncEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Snapshot store kept in memory
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<TransferDirection, QueueSnapshot>>,
    pub fail_saves: std::sync::atomic::AtomicBool,
}

impl MemorySnapshotStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, direction: TransferDirection) -> Option<QueueSnapshot> {
        self.snapshots.lock().unwrap().get(&direction).cloned()
    }

    pub fn put(&self, snapshot: QueueSnapshot) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.direction, snapshot);
    }
}

#[async_trait::async_trait]
impl IQueueSnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &QueueSnapshot) -> anyhow::Result<()> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.put(snapshot.clone());
        Ok(())
    }

    async fn load(&self, direction: TransferDirection) -> anyhow::Result<Option<QueueSnapshot>> {
        Ok(self.get(direction))
    }

    async fn clear(&self, direction: TransferDirection) -> anyhow::Result<()> {
        self.snapshots.lock().unwrap().remove(&direction);
        Ok(())
    }
}

/// Local storage kept in memory, handing out fake paths
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn contents(&self, filename: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(filename).cloned()
    }

    pub fn insert(&self, filename: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(filename.to_string(), bytes.to_vec());
    }
}

#[async_trait::async_trait]
impl ILocalFileStorage for MemoryStorage {
    async fn write(&self, bytes: &[u8], filename: &str) -> anyhow::Result<PathBuf> {
        self.insert(filename, bytes);
        Ok(PathBuf::from("/cache").join(filename))
    }

    async fn read(&self, filename: &str) -> anyhow::Result<Option<PathBuf>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .contains_key(filename)
            .then(|| PathBuf::from("/cache").join(filename)))
    }
}

//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the engines depend on,
//! but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRequestDispatcher`] - JSON calls and binary transfers against the archive service
//! - [`ILocalFileStorage`] - Local cache for completed downloads
//! - [`IQueueSnapshotStore`] - Best-effort persistence of pending queues
//! - [`IEventObserver`] - Receivers of engine events

pub mod local_storage;
pub mod observer;
pub mod queue_store;
pub mod request_dispatcher;

pub use local_storage::ILocalFileStorage;
pub use observer::{IEventObserver, SyncEvent};
pub use queue_store::IQueueSnapshotStore;
pub use request_dispatcher::{
    ApiRequest, DispatchError, DispatchResponse, IRequestDispatcher, ProgressFn, TransferRequest,
};

//! Serial transfer queue
//!
//! One [`TransferQueue`] task owns the pending items of one direction and
//! runs them strictly one at a time, in FIFO order. Callers talk to it
//! through a cloneable [`TransferQueueHandle`]; every request is a message
//! on a channel and every answer comes back on a oneshot, so the queue list
//! is only ever mutated by the queue task itself.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  Command   ┌────────────────┐  spawn   ┌──────────────┐
//! │  handle(s) │ ─────────► │ TransferQueue  │ ───────► │ worker: run  │
//! └────────────┘            │     task       │          │ the pipeline │
//!       ▲                   └────────────────┘          └──────────────┘
//!       │  TransferTicket          ▲     Finished { id, result }  │
//!       └──────────────────────────┴────────────────────────────────┘
//! ```
//!
//! What a transfer actually does is supplied by a [`TransferPipeline`].
//! After a pipeline succeeds, its completion hook runs on the queue task
//! before the next item is started.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use permafiles_core::{
    domain::{
        FileEntry, FolderLinkId, PendingTransferItem, QueueItemId, QueueSnapshot, SyncStatus,
        TransferDirection, TransferState,
    },
    ports::{IQueueSnapshotStore, ProgressFn, SyncEvent},
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::TransferError;
use crate::events::EventBus;

/// Outcome delivered to a ticket
pub type TransferResult<T> = Result<T, TransferError>;

// ============================================================================
// TransferPipeline
// ============================================================================

/// The work performed for one queued item
#[async_trait::async_trait]
pub trait TransferPipeline: Send + Sync + 'static {
    /// Value produced by a successful transfer
    type Output: Send + 'static;

    /// Direction served by this pipeline
    fn direction(&self) -> TransferDirection;

    /// Whether the in-flight item may be abandoned
    fn supports_in_flight_cancel(&self) -> bool;

    /// Perform the transfer
    async fn run(
        &self,
        item: &PendingTransferItem,
        progress: ProgressReporter,
    ) -> TransferResult<Self::Output>;

    /// Called on the queue task after `run` succeeded, before the next
    /// item starts
    fn on_completed(&self, _item: &PendingTransferItem, _output: &Self::Output) {}

    /// Event announcing a successful transfer
    fn completed_event(&self, item: &PendingTransferItem, output: &Self::Output) -> SyncEvent;
}

// ============================================================================
// Progress
// ============================================================================

/// Turns byte counts into throttled progress events for one item
#[derive(Clone)]
pub struct ProgressReporter {
    direction: TransferDirection,
    item_id: QueueItemId,
    events: EventBus,
    step_percent: u32,
    last_percent: Arc<AtomicU32>,
    token: CancellationToken,
}

impl ProgressReporter {
    fn new(
        direction: TransferDirection,
        item_id: QueueItemId,
        events: EventBus,
        step_percent: u8,
        token: CancellationToken,
    ) -> Self {
        Self {
            direction,
            item_id,
            events,
            step_percent: u32::from(step_percent.max(1)),
            last_percent: Arc::new(AtomicU32::new(u32::MAX)),
            token,
        }
    }

    /// Report `done` of `total` bytes
    pub fn report(&self, done: u64, total: u64) {
        if self.token.is_cancelled() {
            return;
        }
        let fraction = if total == 0 {
            1.0
        } else {
            (done as f64 / total as f64).clamp(0.0, 1.0)
        };
        let percent = (fraction * 100.0).floor() as u32;
        let last = self.last_percent.load(Ordering::SeqCst);
        let due = last == u32::MAX || percent == 100 || percent >= last + self.step_percent;
        if !due || percent == last {
            return;
        }
        self.last_percent.store(percent, Ordering::SeqCst);
        self.events.emit(SyncEvent::TransferProgress {
            direction: self.direction,
            item_id: self.item_id,
            fraction,
        });
    }

    /// Boxed callback for the dispatcher port
    pub fn callback(&self) -> ProgressFn {
        let reporter = self.clone();
        Box::new(move |done, total| reporter.report(done, total))
    }
}

// ============================================================================
// Tickets, outcomes and status
// ============================================================================

/// Completion handle for one enqueued item
///
/// Resolves exactly once. Dropping it does not affect processing.
#[derive(Debug)]
pub struct TransferTicket<T> {
    id: QueueItemId,
    rx: oneshot::Receiver<TransferResult<T>>,
}

impl<T> TransferTicket<T> {
    pub fn id(&self) -> QueueItemId {
        self.id
    }

    /// Wait for the item's terminal outcome
    pub async fn outcome(self) -> TransferResult<T> {
        self.rx.await.unwrap_or(Err(TransferError::Abandoned))
    }
}

/// Result of a cancellation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The item was removed and will never run (or was abandoned in flight)
    Cancelled(QueueItemId),
    /// The item is in flight and this queue cannot abandon it
    InFlight,
    /// No such item is pending
    NotFound,
}

/// Point-in-time view of a queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatus {
    pub direction: TransferDirection,
    /// Pending items in FIFO order with their state; the in-flight item, if
    /// any, is first
    pub items: Vec<(PendingTransferItem, TransferState)>,
}

impl QueueStatus {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn in_flight(&self) -> Option<&PendingTransferItem> {
        self.items
            .first()
            .filter(|(_, state)| state.is_in_flight())
            .map(|(item, _)| item)
    }

    /// Listing placeholders for the items targeting `folder`
    pub fn placeholders_for(&self, folder: FolderLinkId) -> Vec<FileEntry> {
        self.items
            .iter()
            .filter(|(item, _)| item.folder_link_id() == Some(folder))
            .filter_map(|(item, state)| item.placeholder(state.sync_status()).ok())
            .collect()
    }

    /// Listing placeholders for every pending item
    pub fn placeholders(&self) -> Vec<FileEntry> {
        self.items
            .iter()
            .filter_map(|(item, state)| {
                let status = match state.sync_status() {
                    SyncStatus::Synced => return None,
                    status => status,
                };
                item.placeholder(status).ok()
            })
            .collect()
    }
}

// ============================================================================
// Commands
// ============================================================================

enum Command<T> {
    Enqueue {
        items: Vec<(PendingTransferItem, Option<oneshot::Sender<TransferResult<T>>>)>,
        reply: oneshot::Sender<()>,
    },
    Cancel {
        id: QueueItemId,
        reply: oneshot::Sender<CancelOutcome>,
    },
    CancelInFlight {
        reply: oneshot::Sender<CancelOutcome>,
    },
    CancelFolder {
        folder_link_id: FolderLinkId,
        reply: oneshot::Sender<Vec<QueueItemId>>,
    },
    Status {
        reply: oneshot::Sender<QueueStatus>,
    },
    Finished {
        id: QueueItemId,
        result: TransferResult<T>,
    },
}

// ============================================================================
// TransferQueueHandle
// ============================================================================

/// Handle for sending requests to a [`TransferQueue`]
///
/// This handle can be cloned and shared across tasks.
pub struct TransferQueueHandle<T> {
    tx: mpsc::Sender<Command<T>>,
    direction: TransferDirection,
}

impl<T> Clone for TransferQueueHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            direction: self.direction,
        }
    }
}

impl<T: Send + 'static> TransferQueueHandle<T> {
    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> Command<T>,
    ) -> TransferResult<R> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .await
            .map_err(|_| TransferError::QueueClosed)?;
        rx.await.map_err(|_| TransferError::QueueClosed)
    }

    /// Append `items` to the tail of the queue
    ///
    /// Returns one ticket per item, in the same order. Processing starts
    /// immediately if the queue was idle.
    pub async fn enqueue(
        &self,
        items: Vec<PendingTransferItem>,
    ) -> TransferResult<Vec<TransferTicket<T>>> {
        let mut tickets = Vec::with_capacity(items.len());
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let (tx, rx) = oneshot::channel();
            tickets.push(TransferTicket { id: item.id, rx });
            entries.push((item, Some(tx)));
        }
        self.request(|reply| Command::Enqueue {
            items: entries,
            reply,
        })
        .await?;
        Ok(tickets)
    }

    /// Re-append recovered items whose ids are not already queued
    ///
    /// Returns the ids that were added.
    pub async fn restore(
        &self,
        items: Vec<PendingTransferItem>,
    ) -> TransferResult<Vec<QueueItemId>> {
        let before: Vec<QueueItemId> = self
            .status()
            .await?
            .items
            .into_iter()
            .map(|(item, _)| item.id)
            .collect();
        let fresh: Vec<_> = items
            .into_iter()
            .filter(|item| !before.contains(&item.id))
            .collect();
        let ids = fresh.iter().map(|item| item.id).collect();
        if !fresh.is_empty() {
            let entries = fresh.into_iter().map(|item| (item, None)).collect();
            self.request(|reply| Command::Enqueue {
                items: entries,
                reply,
            })
            .await?;
        }
        Ok(ids)
    }

    /// Remove a waiting item. Has no effect on the in-flight item.
    pub async fn cancel(&self, id: QueueItemId) -> TransferResult<CancelOutcome> {
        self.request(|reply| Command::Cancel { id, reply }).await
    }

    /// Abandon the in-flight item, if the pipeline allows it
    pub async fn cancel_in_flight(&self) -> TransferResult<CancelOutcome> {
        self.request(|reply| Command::CancelInFlight { reply }).await
    }

    /// Remove every waiting item targeting `folder_link_id`
    pub async fn cancel_folder(
        &self,
        folder_link_id: FolderLinkId,
    ) -> TransferResult<Vec<QueueItemId>> {
        self.request(|reply| Command::CancelFolder {
            folder_link_id,
            reply,
        })
        .await
    }

    pub async fn status(&self) -> TransferResult<QueueStatus> {
        self.request(|reply| Command::Status { reply }).await
    }
}

// ============================================================================
// TransferQueue
// ============================================================================

struct QueuedItem<T> {
    item: PendingTransferItem,
    state: TransferState,
    ticket: Option<oneshot::Sender<TransferResult<T>>>,
}

impl<T> QueuedItem<T> {
    fn transition(&mut self, target: TransferState) {
        let result = self.state.transition_to(target);
        debug_assert!(result.is_ok(), "queue item {}: {result:?}", self.item.id);
    }

    fn resolve(&mut self, outcome: TransferResult<T>) {
        if let Some(ticket) = self.ticket.take() {
            let _ = ticket.send(outcome);
        }
    }
}

struct InFlight {
    id: QueueItemId,
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Queue task for one direction
///
/// Created with [`TransferQueue::spawn`], which starts the task and
/// returns its handle. The task stops once every handle is dropped and
/// nothing is in flight.
pub struct TransferQueue<P: TransferPipeline> {
    pipeline: Arc<P>,
    events: EventBus,
    store: Option<Arc<dyn IQueueSnapshotStore>>,
    step_percent: u8,
    rx: mpsc::Receiver<Command<P::Output>>,
    tx: mpsc::WeakSender<Command<P::Output>>,
    items: VecDeque<QueuedItem<P::Output>>,
    in_flight: Option<InFlight>,
}

impl<P: TransferPipeline> TransferQueue<P> {
    /// Start a queue task for `pipeline`
    pub fn spawn(
        pipeline: Arc<P>,
        events: EventBus,
        store: Option<Arc<dyn IQueueSnapshotStore>>,
        step_percent: u8,
    ) -> TransferQueueHandle<P::Output> {
        let (tx, rx) = mpsc::channel(100);
        let direction = pipeline.direction();
        let queue = Self {
            pipeline,
            events,
            store,
            step_percent,
            rx,
            tx: tx.downgrade(),
            items: VecDeque::new(),
            in_flight: None,
        };
        tokio::spawn(queue.run());
        TransferQueueHandle { tx, direction }
    }

    fn direction(&self) -> TransferDirection {
        self.pipeline.direction()
    }

    async fn run(mut self) {
        info!(direction = %self.direction(), "transfer queue started");
        while let Some(command) = self.rx.recv().await {
            self.handle(command).await;
        }
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.token.cancel();
            in_flight.task.abort();
        }
        info!(direction = %self.direction(), "transfer queue stopped (all handles dropped)");
    }

    async fn handle(&mut self, command: Command<P::Output>) {
        match command {
            Command::Enqueue { items, reply } => {
                trace!(count = items.len(), "processing Enqueue");
                for (item, ticket) in items {
                    debug_assert!(
                        item.direction() == self.direction(),
                        "item {} queued in the wrong direction",
                        item.id
                    );
                    self.events.emit(SyncEvent::TransferQueued {
                        direction: self.direction(),
                        item_id: item.id,
                        display_name: item.display_name.clone(),
                        folder_link_id: item.folder_link_id(),
                    });
                    self.items.push_back(QueuedItem {
                        item,
                        state: TransferState::Waiting,
                        ticket,
                    });
                }
                self.persist().await;
                let _ = reply.send(());
                self.start_next().await;
            }

            Command::Cancel { id, reply } => {
                trace!(item_id = %id, "processing Cancel");
                let outcome = if self.in_flight.as_ref().is_some_and(|f| f.id == id) {
                    CancelOutcome::InFlight
                } else if let Some(index) = self.items.iter().position(|q| q.item.id == id) {
                    self.remove_waiting(index);
                    self.persist().await;
                    CancelOutcome::Cancelled(id)
                } else {
                    CancelOutcome::NotFound
                };
                let _ = reply.send(outcome);
            }

            Command::CancelInFlight { reply } => {
                trace!("processing CancelInFlight");
                let outcome = self.abandon_in_flight();
                if let CancelOutcome::Cancelled(_) = outcome {
                    self.persist().await;
                    self.start_next().await;
                }
                let _ = reply.send(outcome);
            }

            Command::CancelFolder {
                folder_link_id,
                reply,
            } => {
                trace!(folder_link_id = %folder_link_id, "processing CancelFolder");
                let in_flight = self.in_flight.as_ref().map(|f| f.id);
                let doomed: Vec<QueueItemId> = self
                    .items
                    .iter()
                    .filter(|q| Some(q.item.id) != in_flight)
                    .filter(|q| q.item.folder_link_id() == Some(folder_link_id))
                    .map(|q| q.item.id)
                    .collect();
                for id in &doomed {
                    if let Some(index) = self.items.iter().position(|q| q.item.id == *id) {
                        self.remove_waiting(index);
                    }
                }
                if !doomed.is_empty() {
                    self.persist().await;
                }
                let _ = reply.send(doomed);
            }

            Command::Status { reply } => {
                let status = QueueStatus {
                    direction: self.direction(),
                    items: self
                        .items
                        .iter()
                        .map(|q| (q.item.clone(), q.state))
                        .collect(),
                };
                let _ = reply.send(status);
            }

            Command::Finished { id, result } => {
                trace!(item_id = %id, ok = result.is_ok(), "processing Finished");
                self.finish(id, result).await;
            }
        }
    }

    /// Drop a waiting item, resolving its ticket as cancelled
    fn remove_waiting(&mut self, index: usize) {
        let Some(mut queued) = self.items.remove(index) else {
            debug_assert!(false, "cancel index {index} out of bounds");
            return;
        };
        queued.transition(TransferState::Cancelled);
        info!(item_id = %queued.item.id, name = %queued.item.display_name, "cancelled queued transfer");
        self.events.emit(SyncEvent::TransferCancelled {
            direction: self.direction(),
            item_id: queued.item.id,
        });
        queued.resolve(Err(TransferError::Cancelled));
    }

    fn abandon_in_flight(&mut self) -> CancelOutcome {
        let Some(in_flight) = self.in_flight.as_ref() else {
            return CancelOutcome::NotFound;
        };
        if !self.pipeline.supports_in_flight_cancel() {
            return CancelOutcome::InFlight;
        }
        let id = in_flight.id;
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.token.cancel();
            in_flight.task.abort();
        }
        match self.items.pop_front() {
            Some(mut head) => {
                debug_assert_eq!(head.item.id, id, "in-flight item is not the queue head");
                head.transition(TransferState::Cancelled);
                info!(item_id = %id, name = %head.item.display_name, "abandoned in-flight transfer");
                self.events.emit(SyncEvent::TransferCancelled {
                    direction: self.direction(),
                    item_id: id,
                });
                head.resolve(Err(TransferError::Cancelled));
            }
            None => debug_assert!(false, "in-flight item missing from queue"),
        }
        CancelOutcome::Cancelled(id)
    }

    async fn finish(&mut self, id: QueueItemId, result: TransferResult<P::Output>) {
        if self.in_flight.as_ref().map(|f| f.id) != Some(id) {
            // Late completion of an abandoned transfer.
            debug!(item_id = %id, "ignoring completion of abandoned transfer");
            return;
        }
        self.in_flight = None;

        let Some(mut head) = self.items.pop_front() else {
            debug_assert!(false, "completed item missing from queue");
            return;
        };
        debug_assert_eq!(head.item.id, id, "completed item is not the queue head");

        match result {
            Ok(output) => {
                head.transition(TransferState::succeeded(self.direction()));
                info!(
                    direction = %self.direction(),
                    item_id = %id,
                    name = %head.item.display_name,
                    "transfer completed"
                );
                self.pipeline.on_completed(&head.item, &output);
                self.events
                    .emit(self.pipeline.completed_event(&head.item, &output));
                head.resolve(Ok(output));
            }
            Err(error) => {
                head.transition(TransferState::Failed);
                warn!(
                    direction = %self.direction(),
                    item_id = %id,
                    name = %head.item.display_name,
                    error = %error,
                    "transfer failed"
                );
                self.events.emit(SyncEvent::TransferFailed {
                    direction: self.direction(),
                    item_id: id,
                    message: error.to_string(),
                });
                head.resolve(Err(error));
            }
        }

        self.persist().await;
        self.start_next().await;
    }

    /// Start the head item if nothing is in flight
    async fn start_next(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let Some(head) = self.items.front_mut() else {
            self.events.emit(SyncEvent::QueueDrained {
                direction: self.pipeline.direction(),
            });
            return;
        };
        let Some(tx) = self.tx.upgrade() else {
            return;
        };

        let direction = self.pipeline.direction();
        head.transition(TransferState::in_flight(direction));
        let item = head.item.clone();
        let id = item.id;
        info!(direction = %direction, item_id = %id, name = %item.display_name, "starting transfer");
        self.events.emit(SyncEvent::TransferStarted {
            direction,
            item_id: id,
        });

        let token = CancellationToken::new();
        let reporter = ProgressReporter::new(
            direction,
            id,
            self.events.clone(),
            self.step_percent,
            token.clone(),
        );
        let pipeline = Arc::clone(&self.pipeline);
        let worker_token = token.clone();
        let task = tokio::spawn(async move {
            let result = tokio::select! {
                result = pipeline.run(&item, reporter) => result,
                _ = worker_token.cancelled() => Err(TransferError::Cancelled),
            };
            let _ = tx.send(Command::Finished { id, result }).await;
        });

        self.in_flight = Some(InFlight { id, token, task });
        self.persist().await;
    }

    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let direction = self.direction();
        let result = if self.items.is_empty() {
            store.clear(direction).await
        } else {
            let items = self.items.iter().map(|q| q.item.clone()).collect();
            store.save(&QueueSnapshot::new(direction, items)).await
        };
        if let Err(e) = result {
            warn!(direction = %direction, error = %e, "failed to persist queue snapshot");
        }
    }
}

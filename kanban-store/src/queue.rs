//! Write serializer.
//!
//! ```text
//! Callers ─→ [bounded mpsc] ─→ Flush Task ─→ integrity check ─→ KvStore::set_many
//!                                   │
//!                         replies on each task's oneshot
//! ```
//!
//! A single task owns the write path, so at most one flush is in flight and
//! tasks are applied strictly in arrival order. Tasks are never coalesced:
//! every enqueued snapshot is checked and written in full. Once enqueued a
//! task runs to completion even if its caller stops waiting.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::StoreError;
use crate::integrity::{self, IntegrityReport};
use crate::storage::{self, KvStore};
use crate::types::Snapshot;
use crate::validate::Limits;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Flushing,
}

type Reply = oneshot::Sender<Result<IntegrityReport, StoreError>>;

struct SaveTask {
    snapshot: Snapshot,
    reply: Reply,
}

/// Handle to the flush task. Dropping every handle lets the task drain the
/// remaining queue and exit.
pub struct SaveQueue {
    tx: mpsc::Sender<SaveTask>,
    /// Tasks enqueued but not yet resolved.
    pending: Arc<watch::Sender<usize>>,
    worker: Option<JoinHandle<()>>,
}

impl SaveQueue {
    /// Spawn the flush task on the current tokio runtime.
    pub fn start(kv: Arc<dyn KvStore>, limits: Limits, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);

        let flusher = Flusher {
            kv,
            limits,
            pending: pending.clone(),
        };
        let worker = tokio::spawn(flusher.run(rx));

        Self {
            tx,
            pending,
            worker: Some(worker),
        }
    }

    /// Enqueue a full snapshot and wait until it is durable or rejected.
    pub async fn save(&self, snapshot: Snapshot) -> Result<IntegrityReport, StoreError> {
        // Count the task only once it holds a slot, so a caller dropped
        // while waiting for capacity leaves nothing pending.
        let permit = self
            .tx
            .reserve()
            .await
            .map_err(|_| StoreError::QueueClosed)?;
        let (reply, rx) = oneshot::channel();
        self.pending.send_modify(|n| *n += 1);
        permit.send(SaveTask { snapshot, reply });
        rx.await.map_err(|_| StoreError::QueueClosed)?
    }

    pub fn state(&self) -> QueueState {
        if *self.pending.borrow() == 0 {
            QueueState::Idle
        } else {
            QueueState::Flushing
        }
    }

    /// Resolve once every task enqueued so far has been flushed.
    pub async fn wait_idle(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Close the queue and wait for the flush task to drain it.
    pub async fn shutdown(mut self) {
        let worker = self.worker.take();
        drop(self);
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                log::error!("[kanban.store.queue] Flush task ended abnormally: {}", e);
            }
        }
    }
}

struct Flusher {
    kv: Arc<dyn KvStore>,
    limits: Limits,
    pending: Arc<watch::Sender<usize>>,
}

impl Flusher {
    async fn run(self, mut rx: mpsc::Receiver<SaveTask>) {
        while let Some(task) = rx.recv().await {
            let kv = self.kv.clone();
            let limits = self.limits;
            // Substrate writes block (fsync, rename); keep them off the runtime threads.
            if let Err(e) = tokio::task::spawn_blocking(move || flush(kv.as_ref(), &limits, task)).await {
                log::error!("[kanban.store.queue] Flush task panicked: {}", e);
            }
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
        }
        log::debug!("[kanban.store.queue] Save queue closed");
    }
}

fn flush(kv: &dyn KvStore, limits: &Limits, task: SaveTask) {
    let SaveTask {
        mut snapshot,
        reply,
    } = task;
    let result = commit(kv, limits, &mut snapshot);
    match &result {
        Ok(report) => log::debug!(
            "[kanban.store.queue] Flushed snapshot ({} boards, {} columns, {} cards, {} heals)",
            snapshot.boards.len(),
            snapshot.columns.len(),
            snapshot.cards.len(),
            report.diagnostics.len()
        ),
        Err(e) => log::warn!("[kanban.store.queue] Rejected snapshot: {}", e),
    }
    // The caller may have gone away; the write already happened.
    let _ = reply.send(result);
}

fn commit(kv: &dyn KvStore, limits: &Limits, snapshot: &mut Snapshot) -> Result<IntegrityReport, StoreError> {
    let report = integrity::check(snapshot, limits)?;
    storage::write_snapshot(kv, snapshot)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::Poll;
    use std::time::Duration;

    use crate::storage::memory::MemoryKv;
    use crate::storage::BOARDS_SLOT;
    use crate::types::BoardMetadata;

    /// Poll `fut` exactly once without yielding to the scheduler.
    async fn poll_once<F: Future + Unpin>(fut: &mut F) -> bool {
        std::future::poll_fn(|cx| Poll::Ready(Pin::new(&mut *fut).poll(cx).is_ready())).await
    }

    fn snapshot_with_title(title: &str) -> Snapshot {
        Snapshot::from_records(
            vec![BoardMetadata {
                id: "b1".to_string(),
                title: title.to_string(),
                description: String::new(),
                column_ids: Vec::new(),
                created_at: "t".to_string(),
                updated_at: "t".to_string(),
            }],
            Vec::new(),
            Vec::new(),
        )
    }

    fn stored_title(kv: &MemoryKv) -> String {
        kv.get(BOARDS_SLOT).unwrap().unwrap()[0]["title"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_save_writes_snapshot() {
        let kv = Arc::new(MemoryKv::new());
        let queue = SaveQueue::start(kv.clone(), Limits::default(), 4);
        let report = queue.save(snapshot_with_title("A")).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(stored_title(&kv), "A");
        assert_eq!(queue.state(), QueueState::Idle);
    }

    #[tokio::test]
    async fn test_saves_apply_in_arrival_order() {
        let kv = Arc::new(MemoryKv::new());
        let queue = SaveQueue::start(kv.clone(), Limits::default(), 1);
        let (a, b, c) = tokio::join!(
            queue.save(snapshot_with_title("A")),
            queue.save(snapshot_with_title("B")),
            queue.save(snapshot_with_title("C")),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(stored_title(&kv), "C");
    }

    #[tokio::test]
    async fn test_rejected_task_leaves_store_untouched() {
        let kv = Arc::new(MemoryKv::new());
        let queue = SaveQueue::start(kv.clone(), Limits::default(), 4);
        queue.save(snapshot_with_title("A")).await.unwrap();

        let mut bad = snapshot_with_title("B");
        bad.boards.get_mut("b1").unwrap().id.clear();
        let err = queue.save(bad).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(stored_title(&kv), "A");

        // The queue keeps serving after a rejection.
        queue.save(snapshot_with_title("C")).await.unwrap();
        assert_eq!(stored_title(&kv), "C");
    }

    #[tokio::test]
    async fn test_cancelled_save_does_not_stay_pending() {
        let kv = Arc::new(MemoryKv::new());
        let queue = SaveQueue::start(kv.clone(), Limits::default(), 1);

        // A takes the only slot; B waits for capacity and is then dropped.
        let mut first = Box::pin(queue.save(snapshot_with_title("A")));
        assert!(!poll_once(&mut first).await);
        let mut second = Box::pin(queue.save(snapshot_with_title("B")));
        assert!(!poll_once(&mut second).await);
        drop(second);

        first.await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), queue.wait_idle())
            .await
            .expect("queue should drain");
        assert_eq!(queue.state(), QueueState::Idle);
        assert_eq!(stored_title(&kv), "A");
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let kv = Arc::new(MemoryKv::new());
        let queue = SaveQueue::start(kv.clone(), Limits::default(), 4);
        queue.save(snapshot_with_title("A")).await.unwrap();
        queue.wait_idle().await;
        queue.shutdown().await;
        assert_eq!(stored_title(&kv), "A");
    }
}

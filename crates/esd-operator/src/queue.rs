//! Work queue for reconcile tasks.
//!
//! At most one task per resource is pending and at most one is in flight.
//! Triggers that arrive while a task is pending fold into it; a pending
//! delete is never downgraded. Distinct resources are worked on
//! concurrently by a fixed pool of workers.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::store::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Create,
    Update,
    Delete,
    /// Periodic or requeued pass with no new input.
    Resync,
}

impl Trigger {
    fn fold(self, next: Trigger) -> Trigger {
        match (self, next) {
            (Trigger::Delete, _) => Trigger::Delete,
            (current, Trigger::Resync) => current,
            (_, next) => next,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileTask {
    pub id: ResourceId,
    pub trigger: Trigger,
}

impl ReconcileTask {
    pub fn new(id: ResourceId, trigger: Trigger) -> Self {
        Self { id, trigger }
    }
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<ResourceId>,
    pending: HashMap<ResourceId, Trigger>,
    in_flight: HashSet<ResourceId>,
    closed: bool,
}

#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn push(&self, task: ReconcileTask) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }

        if let Some(pending) = state.pending.get_mut(&task.id) {
            *pending = pending.fold(task.trigger);
            trace!(domain = %task.id, trigger = ?*pending, "Folded into pending task");
            return;
        }

        state.pending.insert(task.id.clone(), task.trigger);
        if !state.in_flight.contains(&task.id) {
            state.ready.push_back(task.id);
            self.notify.notify_one();
        }
    }

    /// Push once `delay` has passed.
    pub fn push_after(self: &Arc<Self>, task: ReconcileTask, delay: Duration) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.push(task).await;
        });
    }

    /// Next ready task, or `None` once the queue is closed.
    pub async fn pop(&self) -> Option<ReconcileTask> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if state.closed {
                    return None;
                }
                while let Some(id) = state.ready.pop_front() {
                    if let Some(trigger) = state.pending.remove(&id) {
                        state.in_flight.insert(id.clone());
                        return Some(ReconcileTask { id, trigger });
                    }
                }
            }

            notified.await;
        }
    }

    /// Mark the task for `id` finished, releasing anything that queued up
    /// behind it.
    pub async fn done(&self, id: &ResourceId) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(id);
        if state.pending.contains_key(id) {
            state.ready.push_back(id.clone());
            self.notify.notify_one();
        }
    }

    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    pub async fn is_idle(&self) -> bool {
        let state = self.state.lock().await;
        state.pending.is_empty() && state.in_flight.is_empty()
    }

    pub async fn pending(&self) -> Option<Trigger> {
        let state = self.state.lock().await;
        state.ready.front().and_then(|id| state.pending.get(id).copied())
    }
}

/// Handles one task and says when, if ever, the resource wants another pass.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, task: &ReconcileTask) -> Option<Duration>;
}

/// Spawn `concurrency` workers draining `queue` until it is closed.
pub fn run_workers(
    queue: Arc<WorkQueue>,
    concurrency: usize,
    handler: Arc<dyn TaskHandler>,
) -> Vec<JoinHandle<()>> {
    (0..concurrency.max(1))
        .map(|worker| {
            let queue = queue.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                while let Some(task) = queue.pop().await {
                    trace!(worker, domain = %task.id, trigger = ?task.trigger, "Picked up task");
                    let requeue = handler.handle(&task).await;
                    queue.done(&task.id).await;

                    match requeue {
                        Some(delay) if delay.is_zero() => {
                            queue.push(ReconcileTask::new(task.id, Trigger::Resync)).await
                        }
                        Some(delay) => {
                            queue.push_after(ReconcileTask::new(task.id, Trigger::Resync), delay)
                        }
                        None => {}
                    }
                }
                debug!(worker, "Worker stopped");
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn task(name: &str, trigger: Trigger) -> ReconcileTask {
        ReconcileTask::new(ResourceId::new("default", name), trigger)
    }

    #[tokio::test]
    async fn triggers_fold_and_delete_wins() {
        let queue = WorkQueue::new();
        queue.push(task("a", Trigger::Create)).await;
        queue.push(task("a", Trigger::Delete)).await;
        queue.push(task("a", Trigger::Update)).await;
        queue.push(task("a", Trigger::Resync)).await;

        assert_eq!(queue.pop().await, Some(task("a", Trigger::Delete)));
        queue.done(&ResourceId::new("default", "a")).await;
        assert!(queue.is_idle().await);
    }

    #[tokio::test]
    async fn resync_does_not_replace_update() {
        let queue = WorkQueue::new();
        queue.push(task("a", Trigger::Update)).await;
        queue.push(task("a", Trigger::Resync)).await;
        assert_eq!(queue.pending().await, Some(Trigger::Update));
    }

    #[tokio::test]
    async fn one_in_flight_per_resource() {
        let queue = WorkQueue::new();
        queue.push(task("a", Trigger::Create)).await;
        let first = queue.pop().await.unwrap();

        queue.push(task("a", Trigger::Update)).await;
        queue.push(task("b", Trigger::Create)).await;
        // "a" is in flight, so "b" comes out first.
        assert_eq!(queue.pop().await, Some(task("b", Trigger::Create)));

        let blocked = tokio::time::timeout(Duration::from_millis(20), queue.pop()).await;
        assert!(blocked.is_err());

        queue.done(&first.id).await;
        assert_eq!(queue.pop().await, Some(task("a", Trigger::Update)));
    }

    #[tokio::test]
    async fn arrival_order_across_resources() {
        let queue = WorkQueue::new();
        for name in ["a", "b", "c"] {
            queue.push(task(name, Trigger::Create)).await;
        }
        for name in ["a", "b", "c"] {
            assert_eq!(queue.pop().await.unwrap().id.name, name);
        }
    }

    #[tokio::test]
    async fn close_releases_waiting_workers() {
        let queue = WorkQueue::new();
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close().await;
        assert_eq!(waiter.await.unwrap(), None);
    }

    struct Counting {
        calls: AtomicUsize,
        requeue_first: bool,
    }

    #[async_trait]
    impl TaskHandler for Counting {
        async fn handle(&self, _task: &ReconcileTask) -> Option<Duration> {
            let seen = self.calls.fetch_add(1, Ordering::SeqCst);
            (self.requeue_first && seen == 0).then_some(Duration::from_millis(5))
        }
    }

    #[tokio::test]
    async fn workers_requeue_when_asked() {
        let queue = WorkQueue::new();
        let handler = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            requeue_first: true,
        });
        let workers = run_workers(queue.clone(), 2, handler.clone());

        queue.push(task("a", Trigger::Create)).await;
        for _ in 0..100 {
            if handler.calls.load(Ordering::SeqCst) >= 2 && queue.is_idle().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);

        queue.close().await;
        for worker in workers {
            worker.await.unwrap();
        }
    }
}

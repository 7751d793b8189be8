//! Keyed job executor.
//!
//! At most one job runs per key. A key's job can be dropped when one is
//! already running (`may_execute`), replace it (`must_execute`), or be queued
//! as the single follow-up that starts when the running one ends
//! (`execute_after`). Queuing again replaces the queued job, so bursts of
//! requests for one key coalesce into one extra run.
//!
//! Aborting only lands at the job's next `.await`, so a replaced job is also
//! flagged through its [`JobTicket`] and must check it before side effects.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::observability::metrics;

pub type Job = BoxFuture<'static, ()>;

tokio::task_local! {
    static CURRENT: JobTicket;
}

/// Cancellation flag of one executor job.
#[derive(Debug, Clone, Default)]
pub struct JobTicket {
    cancelled: Arc<AtomicBool>,
}

impl JobTicket {
    /// Ticket of the job running on the current task. Outside an executor
    /// job this is a fresh ticket that is never cancelled.
    pub fn current() -> JobTicket {
        CURRENT.try_with(Clone::clone).unwrap_or_default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn cancelled() -> JobTicket {
        let ticket = JobTicket::default();
        ticket.cancel();
        ticket
    }
}

struct Slot {
    generation: u64,
    abort: AbortHandle,
    ticket: JobTicket,
    // Mutex only to make the slot Sync; BoxFuture is Send but not Sync.
    follow_up: Option<Mutex<Job>>,
}

impl Slot {
    fn stop(&self) {
        self.ticket.cancel();
        self.abort.abort();
    }
}

struct Inner {
    runtime: Handle,
    slots: DashMap<String, Slot>,
    generations: AtomicU64,
}

#[derive(Clone)]
pub struct KeyedExecutor {
    inner: Arc<Inner>,
}

impl KeyedExecutor {
    pub fn new(runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                runtime,
                slots: DashMap::new(),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Start `job` unless one runs for `key`. Returns whether it started.
    pub fn may_execute(&self, key: &str, job: Job) -> bool {
        match self.inner.slots.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                let slot = Inner::start(&self.inner, key.to_string(), job);
                vacant.insert(slot);
                self.inner.report();
                true
            }
        }
    }

    /// Start `job`, cancelling a running one. Returns whether one was cancelled.
    pub fn must_execute(&self, key: &str, job: Job) -> bool {
        let cancelled = match self.inner.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                occupied.get().stop();
                let slot = Inner::start(&self.inner, key.to_string(), job);
                occupied.insert(slot);
                true
            }
            Entry::Vacant(vacant) => {
                let slot = Inner::start(&self.inner, key.to_string(), job);
                vacant.insert(slot);
                false
            }
        };
        self.inner.report();
        cancelled
    }

    /// Start `job` now, or queue it behind the running one. Returns whether
    /// it started immediately.
    pub fn execute_after(&self, key: &str, job: Job) -> bool {
        match self.inner.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().follow_up = Some(Mutex::new(job));
                false
            }
            Entry::Vacant(vacant) => {
                let slot = Inner::start(&self.inner, key.to_string(), job);
                vacant.insert(slot);
                self.inner.report();
                true
            }
        }
    }

    pub fn has_running(&self, key: &str) -> bool {
        self.inner.slots.contains_key(key)
    }

    /// Keys with a running job, sorted.
    pub fn running_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.slots.iter().map(|s| s.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn cancel(&self, key: &str) -> bool {
        let cancelled = match self.inner.slots.remove(key) {
            Some((_, slot)) => {
                slot.stop();
                true
            }
            None => false,
        };
        self.inner.report();
        cancelled
    }

    pub fn cancel_all(&self) {
        let keys: Vec<String> = self.inner.slots.iter().map(|s| s.key().clone()).collect();
        for key in keys {
            if let Some((_, slot)) = self.inner.slots.remove(&key) {
                slot.stop();
            }
        }
        self.inner.report();
    }
}

impl Inner {
    /// Spawn `job` for `key`. The caller inserts the returned slot while it
    /// still holds the key's entry, so the task cannot finish unobserved.
    fn start(inner: &Arc<Inner>, key: String, job: Job) -> Slot {
        let generation = inner.generations.fetch_add(1, Ordering::Relaxed);
        let owner = Arc::clone(inner);
        let ticket = JobTicket::default();
        let handle = inner.runtime.spawn(CURRENT.scope(ticket.clone(), async move {
            job.await;
            Inner::finish(&owner, key, generation);
        }));
        Slot {
            generation,
            abort: handle.abort_handle(),
            ticket,
            follow_up: None,
        }
    }

    fn finish(inner: &Arc<Inner>, key: String, generation: u64) {
        if let Entry::Occupied(mut occupied) = inner.slots.entry(key.clone()) {
            if occupied.get().generation != generation {
                return;
            }
            match occupied.get_mut().follow_up.take() {
                Some(next) => {
                    let next = next.into_inner().unwrap_or_else(PoisonError::into_inner);
                    tracing::trace!(key = %key, "Starting queued follow-up job");
                    let slot = Inner::start(inner, key, next);
                    occupied.insert(slot);
                }
                None => {
                    occupied.remove();
                }
            }
        }
        inner.report();
    }

    fn report(&self) {
        metrics::record_jobs_running(self.slots.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn wait_idle(executor: &KeyedExecutor) {
        for _ in 0..200 {
            if executor.running_keys().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("executor did not become idle");
    }

    #[tokio::test]
    async fn test_may_execute_drops_while_running() {
        let executor = KeyedExecutor::new(Handle::current());
        let (tx, rx) = oneshot::channel::<()>();
        let runs = Arc::new(AtomicUsize::new(0));

        let r = runs.clone();
        assert!(executor.may_execute(
            "central",
            Box::pin(async move {
                let _ = rx.await;
                r.fetch_add(1, Ordering::SeqCst);
            })
        ));
        let r = runs.clone();
        assert!(!executor.may_execute(
            "central",
            Box::pin(async move {
                r.fetch_add(1, Ordering::SeqCst);
            })
        ));
        assert!(executor.has_running("central"));
        assert_eq!(executor.running_keys(), vec!["central"]);

        tx.send(()).unwrap();
        wait_idle(&executor).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_must_execute_cancels() {
        let executor = KeyedExecutor::new(Handle::current());
        let runs = Arc::new(AtomicUsize::new(0));

        let r = runs.clone();
        executor.may_execute(
            "central",
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                r.fetch_add(100, Ordering::SeqCst);
            }),
        );
        let r = runs.clone();
        assert!(executor.must_execute(
            "central",
            Box::pin(async move {
                r.fetch_add(1, Ordering::SeqCst);
            })
        ));
        wait_idle(&executor).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_follow_ups_coalesce() {
        let executor = KeyedExecutor::new(Handle::current());
        let (tx, rx) = oneshot::channel::<()>();
        let runs = Arc::new(AtomicUsize::new(0));

        let r = runs.clone();
        assert!(executor.execute_after(
            "group",
            Box::pin(async move {
                let _ = rx.await;
                r.fetch_add(1, Ordering::SeqCst);
            })
        ));
        for _ in 0..3 {
            let r = runs.clone();
            assert!(!executor.execute_after(
                "group",
                Box::pin(async move {
                    r.fetch_add(10, Ordering::SeqCst);
                })
            ));
        }
        tx.send(()).unwrap();
        wait_idle(&executor).await;
        assert_eq!(runs.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_executor_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<KeyedExecutor>();
    }

    #[tokio::test]
    async fn test_replaced_job_sees_cancelled_ticket() {
        let executor = KeyedExecutor::new(Handle::current());
        let (ticket_tx, ticket_rx) = oneshot::channel::<JobTicket>();
        let (go_tx, go_rx) = oneshot::channel::<()>();

        executor.may_execute(
            "central",
            Box::pin(async move {
                let _ = ticket_tx.send(JobTicket::current());
                let _ = go_rx.await;
            }),
        );
        let ticket = ticket_rx.await.unwrap();
        assert!(!ticket.is_cancelled());

        executor.must_execute("central", Box::pin(async {}));
        assert!(ticket.is_cancelled());
        drop(go_tx);
        wait_idle(&executor).await;
        assert!(!JobTicket::current().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let executor = KeyedExecutor::new(Handle::current());
        for key in ["a", "b"] {
            executor.may_execute(key, Box::pin(tokio::time::sleep(Duration::from_secs(60))));
        }
        assert_eq!(executor.running_keys(), vec!["a", "b"]);
        executor.cancel_all();
        assert!(executor.running_keys().is_empty());
    }
}

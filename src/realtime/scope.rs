//! Cancellation scope for the fetches of one mounted view.
//!
//! A view runs its fetches through its scope. Disposing the scope aborts
//! everything still in flight, and any result that completes after disposal
//! is dropped instead of being delivered to a view that no longer exists.

use dashmap::DashMap;
use futures::future::{AbortHandle, Abortable};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct ScopeInner {
    disposed: AtomicBool,
    next_id: AtomicU64,
    in_flight: DashMap<u64, AbortHandle>,
}

#[derive(Clone, Default)]
pub struct ViewScope {
    inner: Arc<ScopeInner>,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `fut` inside the scope. None if the scope was disposed before
    /// the future finished.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_disposed() {
            return None;
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (handle, registration) = AbortHandle::new_pair();
        self.inner.in_flight.insert(id, handle);

        let result = Abortable::new(fut, registration).await;
        self.inner.in_flight.remove(&id);

        match result {
            Ok(output) if !self.is_disposed() => Some(output),
            _ => None,
        }
    }

    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for entry in self.inner.in_flight.iter() {
            entry.value().abort();
        }
        self.inner.in_flight.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;

    #[actix_rt::test]
    async fn test_completed_work_is_delivered() {
        let scope = ViewScope::new();
        assert_eq!(scope.run(async { 7 }).await, Some(7));
        assert_eq!(scope.in_flight(), 0);
    }

    #[actix_rt::test]
    async fn test_disposed_scope_drops_late_results() {
        let scope = ViewScope::new();
        let (tx, rx) = oneshot::channel::<u32>();

        let pending = {
            let scope = scope.clone();
            actix_rt::spawn(async move { scope.run(rx).await })
        };

        actix_rt::task::yield_now().await;
        scope.dispose();
        let _ = tx.send(1);

        assert_eq!(pending.await.unwrap(), None);
        assert_eq!(scope.run(async { 2 }).await, None);
    }
}

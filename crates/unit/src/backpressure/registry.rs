use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::backpressure::BackpressureWaiter;
use crate::transport::HandleId;

/// Tracks writers blocked on shared memory acknowledgment.
///
/// A registration is single-use: whichever notification reaches it first
/// consumes it, and the writer attaches again the next time it blocks.
#[derive(Debug, Default)]
pub struct BackpressureRegistry {
    waiters: DashMap<HandleId, mpsc::Sender<u32>>,
    absorbed: AtomicU64,
}

impl BackpressureRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers `waiter` for the next acknowledgment of its handle.
    ///
    /// Attaching the same handle again replaces the earlier registration.
    pub fn attach(&self, waiter: &BackpressureWaiter) {
        if self.waiters.insert(waiter.id(), waiter.sender()).is_some() {
            trace!(handle = %waiter.id(), "replaced pending waiter registration");
        }
    }

    pub fn detach(&self, id: HandleId) -> bool {
        self.waiters.remove(&id).is_some()
    }

    /// Routes an acknowledgment to the writer blocked on `id`.
    ///
    /// Returns `false` when nobody waits on that handle; the signal is absorbed.
    pub fn notify_handle(&self, id: HandleId, count: u32) -> bool {
        match self.waiters.remove(&id) {
            Some((id, sender)) => {
                deliver(id, &sender, count);
                true
            }
            None => {
                self.absorbed.fetch_add(1, Ordering::Relaxed);
                trace!(handle = %id, count, "ack without waiter absorbed");
                false
            }
        }
    }

    /// Context wide acknowledgment: wakes every registered writer.
    ///
    /// The transport does not always say which response freed space, so all
    /// waiters retry and the ones whose bytes still don't fit block again.
    /// Returns the number of writers woken.
    pub fn notify(&self, count: u32) -> usize {
        let mut woken = 0;
        self.waiters.retain(|id, sender| {
            deliver(*id, sender, count);
            woken += 1;
            false
        });

        if woken == 0 {
            self.absorbed.fetch_add(1, Ordering::Relaxed);
            trace!(count, "ack without waiter absorbed");
        }
        woken
    }

    /// Number of writers currently registered.
    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }

    /// Number of notifications that found no waiter.
    pub fn absorbed(&self) -> u64 {
        self.absorbed.load(Ordering::Relaxed)
    }

    /// A handle for the transport's acknowledgment callback.
    pub fn notifier(self: &Arc<Self>) -> AckNotifier {
        AckNotifier { registry: Arc::clone(self) }
    }
}

fn deliver(id: HandleId, sender: &mpsc::Sender<u32>, count: u32) {
    match sender.try_send(count) {
        // full means a wake-up is already pending for this writer
        Ok(()) | Err(TrySendError::Full(_)) => {}
        Err(TrySendError::Closed(_)) => {
            trace!(handle = %id, "waiter dropped before ack arrived");
        }
    }
}

/// Forwards transport acknowledgments into a [`BackpressureRegistry`].
///
/// Cheap to clone and safe to call from any thread, including threads that
/// are not part of a tokio runtime.
#[derive(Debug, Clone)]
pub struct AckNotifier {
    registry: Arc<BackpressureRegistry>,
}

impl AckNotifier {
    /// Shared buffer space was freed without a known owner.
    pub fn ack(&self, count: u32) -> usize {
        self.registry.notify(count)
    }

    /// Shared buffer space was freed for one handle.
    pub fn ack_handle(&self, id: HandleId, count: u32) -> bool {
        self.registry.notify_handle(id, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn notify_handle_wakes_only_that_waiter() {
        let registry = BackpressureRegistry::new();
        let mut first = BackpressureWaiter::new(HandleId::new(1));
        let mut second = BackpressureWaiter::new(HandleId::new(2));
        registry.attach(&first);
        registry.attach(&second);

        assert!(registry.notify_handle(HandleId::new(2), 4));

        assert_eq!(second.wait(None).await.unwrap(), 4);
        assert!(first.wait(Some(Duration::from_millis(10))).await.is_err());
        assert_eq!(registry.waiting(), 1);
    }

    #[tokio::test]
    async fn registration_is_consumed_by_one_notification() {
        let registry = BackpressureRegistry::new();
        let waiter = BackpressureWaiter::new(HandleId::new(1));
        registry.attach(&waiter);

        assert!(registry.notify_handle(HandleId::new(1), 1));
        assert!(!registry.notify_handle(HandleId::new(1), 1));
        assert_eq!(registry.absorbed(), 1);
    }

    #[tokio::test]
    async fn broadcast_wakes_every_waiter() {
        let registry = BackpressureRegistry::new();
        let mut waiters: Vec<_> = (0..3).map(|i| BackpressureWaiter::new(HandleId::new(i))).collect();
        for waiter in &waiters {
            registry.attach(waiter);
        }

        assert_eq!(registry.notify(1), 3);
        assert_eq!(registry.waiting(), 0);

        for waiter in &mut waiters {
            assert_eq!(waiter.wait(None).await.unwrap(), 1);
        }
    }

    #[test]
    fn notification_without_waiter_is_absorbed() {
        let registry = BackpressureRegistry::new();

        assert_eq!(registry.notify(1), 0);
        assert!(!registry.notify_handle(HandleId::new(9), 1));
        assert_eq!(registry.absorbed(), 2);
    }

    #[test]
    fn detach_removes_registration() {
        let registry = BackpressureRegistry::new();
        let waiter = BackpressureWaiter::new(HandleId::new(5));
        registry.attach(&waiter);

        assert!(registry.detach(HandleId::new(5)));
        assert!(!registry.detach(HandleId::new(5)));
        assert_eq!(registry.waiting(), 0);
    }

    #[tokio::test]
    async fn notifier_works_from_foreign_thread() {
        let registry = Arc::new(BackpressureRegistry::new());
        let mut waiter = BackpressureWaiter::new(HandleId::new(3));
        registry.attach(&waiter);

        let notifier = registry.notifier();
        std::thread::spawn(move || notifier.ack_handle(HandleId::new(3), 2)).join().unwrap();

        assert_eq!(waiter.wait(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn dropped_waiter_does_not_break_notify() {
        let registry = BackpressureRegistry::new();
        let waiter = BackpressureWaiter::new(HandleId::new(1));
        registry.attach(&waiter);
        drop(waiter);

        assert_eq!(registry.notify(1), 1);
    }
}

use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::WriteError;
use crate::transport::HandleId;

/// Two slots are enough: one pending wake-up plus one that races with it.
const WAITER_SLOTS: usize = 2;

/// A signal channel owned by exactly one response writer.
///
/// The registry only ever holds the sending side, so dropping the waiter
/// closes the channel and later notifications for it are discarded.
#[derive(Debug)]
pub struct BackpressureWaiter {
    id: HandleId,
    sender: mpsc::Sender<u32>,
    receiver: mpsc::Receiver<u32>,
}

impl BackpressureWaiter {
    pub fn new(id: HandleId) -> Self {
        let (sender, receiver) = mpsc::channel(WAITER_SLOTS);
        Self { id, sender, receiver }
    }

    #[inline]
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<u32> {
        self.sender.clone()
    }

    /// Suspends until one notification arrives and returns its ready slot count.
    ///
    /// With `timeout` set, gives up after that long with [`WriteError::AckTimeout`].
    pub async fn wait(&mut self, timeout: Option<Duration>) -> Result<u32, WriteError> {
        let received = match timeout {
            None => self.receiver.recv().await,
            Some(limit) => tokio::time::timeout(limit, self.receiver.recv())
                .await
                .map_err(|_elapsed| WriteError::ack_timeout(limit))?,
        };

        // we hold a sender ourselves, the channel can't be closed here
        Ok(received.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_buffered_count() {
        let mut waiter = BackpressureWaiter::new(HandleId::new(1));
        waiter.sender().try_send(3).unwrap();

        assert_eq!(waiter.wait(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn extra_signals_beyond_slots_are_rejected() {
        let waiter = BackpressureWaiter::new(HandleId::new(1));
        let sender = waiter.sender();

        assert!(sender.try_send(1).is_ok());
        assert!(sender.try_send(1).is_ok());
        assert!(sender.try_send(1).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_without_signal() {
        let mut waiter = BackpressureWaiter::new(HandleId::new(7));

        let result = waiter.wait(Some(Duration::from_millis(50))).await;

        assert!(matches!(result, Err(WriteError::AckTimeout { waited }) if waited == Duration::from_millis(50)));
    }
}

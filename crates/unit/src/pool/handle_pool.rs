use std::fmt;
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use tracing::{debug, trace};

use crate::error::{ConfigError, TransportError};
use crate::pool::PooledHandle;
use crate::transport::{Completion, RequestHandle, Transport};

/// Outcome of [`HandlePool::release`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Release {
    /// The handle is back in the pool.
    Pooled,
    /// The pool was full, the handle went back to the transport.
    Finalized,
}

pub struct HandlePool<T: Transport> {
    transport: Arc<T>,
    queue: ArrayQueue<T::Handle>,
}

impl<T: Transport> HandlePool<T> {
    pub fn new(transport: Arc<T>, capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidPoolCapacity);
        }
        Ok(Self { transport, queue: ArrayQueue::new(capacity) })
    }

    /// Takes a pooled handle, `None` when the pool is empty.
    #[inline]
    pub fn acquire(&self) -> Option<T::Handle> {
        self.queue.pop()
    }

    /// Returns `handle` to the pool, or finalizes it when the pool is full.
    pub fn release(&self, handle: T::Handle) -> Release {
        match self.queue.push(handle) {
            Ok(()) => Release::Pooled,
            Err(handle) => {
                debug!(handle = %handle.id(), capacity = self.queue.capacity(), "handle pool full, finalizing handle");
                self.transport.finalize(handle, Completion::Ok);
                Release::Finalized
            }
        }
    }

    /// Checks out a pooled handle, allocating a fresh one when the pool is empty.
    ///
    /// The handle is released back when the returned guard drops.
    pub fn checkout(&self) -> Result<PooledHandle<'_, T>, TransportError> {
        let handle = match self.acquire() {
            Some(handle) => handle,
            None => {
                trace!("handle pool empty, allocating from transport");
                self.transport.allocate()?
            }
        };
        Ok(PooledHandle::new(self, handle))
    }

    /// Allocates handles until the pool is full. Returns how many were added.
    pub fn prefill(&self) -> Result<usize, TransportError> {
        let mut filled = 0;
        while !self.queue.is_full() {
            let handle = self.transport.allocate()?;
            if let Err(handle) = self.queue.push(handle) {
                // filled concurrently by releases
                self.transport.finalize(handle, Completion::Ok);
                break;
            }
            filled += 1;
        }
        debug!(filled, capacity = self.queue.capacity(), "handle pool prefilled");
        Ok(filled)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    #[inline]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }
}

impl<T: Transport> Drop for HandlePool<T> {
    fn drop(&mut self) {
        while let Some(handle) = self.queue.pop() {
            self.transport.finalize(handle, Completion::Ok);
        }
    }
}

impl<T: Transport> fmt::Debug for HandlePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlePool").field("len", &self.queue.len()).field("capacity", &self.queue.capacity()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HandleId;
    use crate::transport::loopback::{LoopbackHandle, LoopbackTransport};
    use crate::transport::mock::MockNative;

    fn handle(id: u64) -> LoopbackHandle {
        LoopbackHandle::new(HandleId::new(id))
    }

    #[test]
    fn release_past_capacity_finalizes() {
        let mut native = MockNative::new();
        native
            .expect_finalize()
            .withf(|handle, completion| handle.id() == HandleId::new(3) && *completion == Completion::Ok)
            .times(1)
            .return_const(());
        // the two pooled handles are finalized when the pool drops
        native.expect_finalize().withf(|handle, _| handle.id() != HandleId::new(3)).times(2).return_const(());

        let pool = HandlePool::new(Arc::new(native), 2).unwrap();

        assert_eq!(pool.release(handle(1)), Release::Pooled);
        assert_eq!(pool.release(handle(2)), Release::Pooled);
        assert_eq!(pool.release(handle(3)), Release::Finalized);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn acquire_on_empty_pool_is_none() {
        let pool = HandlePool::new(Arc::new(LoopbackTransport::unbounded()), 1).unwrap();

        assert!(pool.acquire().is_none());

        pool.release(handle(8));
        assert_eq!(pool.acquire().map(|h| h.id()), Some(HandleId::new(8)));
        assert!(pool.is_empty());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = HandlePool::new(Arc::new(LoopbackTransport::unbounded()), 0);

        assert!(matches!(result, Err(ConfigError::InvalidPoolCapacity)));
    }

    #[test]
    fn checkout_allocates_then_reuses() {
        let transport = Arc::new(LoopbackTransport::unbounded());
        let pool = HandlePool::new(Arc::clone(&transport), 4).unwrap();

        let first_id = {
            let handle = pool.checkout().unwrap();
            handle.id()
        };
        assert_eq!(transport.allocated(), 1);
        assert_eq!(pool.len(), 1);

        let handle = pool.checkout().unwrap();
        assert_eq!(handle.id(), first_id);
        assert_eq!(transport.allocated(), 1);
    }

    #[test]
    fn checkout_is_released_on_panic() {
        let transport = Arc::new(LoopbackTransport::unbounded());
        let pool = HandlePool::new(Arc::clone(&transport), 4).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _handle = pool.checkout().unwrap();
            panic!("handler blew up");
        }));

        assert!(result.is_err());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn prefill_and_drop_finalize_everything() {
        let transport = Arc::new(LoopbackTransport::unbounded());
        let pool = HandlePool::new(Arc::clone(&transport), 3).unwrap();

        assert_eq!(pool.prefill().unwrap(), 3);
        assert_eq!(pool.prefill().unwrap(), 0);
        assert_eq!(transport.allocated(), 3);

        drop(pool);
        let finalized = transport.finalized();
        assert_eq!(finalized.len(), 3);
        assert!(finalized.iter().all(|(_, completion)| *completion == Completion::Ok));
    }

    #[test]
    fn concurrent_checkouts_never_leak() {
        let transport = Arc::new(LoopbackTransport::unbounded());
        let pool = HandlePool::new(Arc::clone(&transport), 4).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let handle = pool.checkout().unwrap();
                        std::hint::black_box(handle.id());
                    }
                });
            }
        });

        assert!(pool.len() <= pool.capacity());
        assert_eq!(transport.allocated(), transport.finalized().len() + pool.len());
    }
}

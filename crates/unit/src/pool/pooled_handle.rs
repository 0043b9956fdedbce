use std::fmt;
use std::ops::Deref;

use crate::pool::HandlePool;
use crate::transport::{RequestHandle, Transport};

/// A handle checked out of a [`HandlePool`].
///
/// Dropping the guard releases the handle, so it goes back to the pool on
/// every exit path of a request, unwinding included.
pub struct PooledHandle<'p, T: Transport> {
    pool: &'p HandlePool<T>,
    handle: Option<T::Handle>,
}

impl<'p, T: Transport> PooledHandle<'p, T> {
    pub(crate) fn new(pool: &'p HandlePool<T>, handle: T::Handle) -> Self {
        Self { pool, handle: Some(handle) }
    }
}

impl<T: Transport> Deref for PooledHandle<'_, T> {
    type Target = T::Handle;

    fn deref(&self) -> &Self::Target {
        self.handle.as_ref().expect("pooled handle is present until dropped")
    }
}

impl<T: Transport> Drop for PooledHandle<'_, T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(handle);
        }
    }
}

impl<T: Transport> fmt::Debug for PooledHandle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledHandle").field("id", &self.handle.as_ref().map(RequestHandle::id)).finish()
    }
}

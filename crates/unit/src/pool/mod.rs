//! Recycling of native request handles.
//!
//! Allocating a handle means a round trip into the transport, so finished
//! handles go back into a bounded lock-free queue instead of being finalized.
//! The pool never grows: a handle released into a full pool is finalized on
//! the spot, and an empty pool falls back to allocating a fresh handle.
//!
//! - [`HandlePool`]: the bounded queue with non-blocking `acquire` / `release`
//! - [`PooledHandle`]: a checked out handle, returned to the pool when dropped

mod handle_pool;
mod pooled_handle;

pub use handle_pool::HandlePool;
pub use handle_pool::Release;
pub use pooled_handle::PooledHandle;

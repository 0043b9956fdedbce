//! Backpressure signaling between the transport and blocked writers.
//!
//! When the shared-memory buffer is full a [`ResponseWriter`](crate::response::ResponseWriter)
//! attaches its [`BackpressureWaiter`] to the [`BackpressureRegistry`] and
//! suspends. The transport reports freed space through an [`AckNotifier`],
//! either for one handle ([`AckNotifier::ack_handle`]) or for the whole
//! context ([`AckNotifier::ack`]).
//!
//! No lock is held while a writer waits: the registry map is only touched
//! synchronously, the wait itself happens on the waiter's own channel.

mod registry;
mod waiter;

pub use registry::AckNotifier;
pub use registry::BackpressureRegistry;
pub use waiter::BackpressureWaiter;

//! The boundary to the native request/response transport.
//!
//! The transport is the peer that owns request handles and moves response
//! bytes through a bounded shared-memory buffer to the front-end server. This
//! crate only needs a handful of synchronous primitives from it, collected in
//! the [`Transport`] trait.
//!
//! Acknowledgments flow the other way: whenever the transport frees space in
//! the shared buffer it reports it through an
//! [`AckNotifier`](crate::backpressure::AckNotifier), usually from a thread
//! owned by the native runtime.
//!
//! [`loopback`] provides an in-process implementation backed by plain memory,
//! used by tests, benches and demos.

use std::fmt;

use http::StatusCode;

use crate::error::TransportError;

pub mod loopback;

#[cfg(test)]
pub(crate) mod mock;

/// Identity of a native request handle.
///
/// Used to route shared memory acknowledgments to the writer that is waiting
/// on a specific handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A transport owned request context.
pub trait RequestHandle: Send + Sync + 'static {
    fn id(&self) -> HandleId;
}

/// Final status reported to the transport when a handle is finalized.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Completion {
    Ok,
    Error,
}

/// Primitives the native transport exposes for one response.
///
/// Every method must be non-blocking. `offer` in particular reports a full
/// shared buffer by accepting fewer bytes than offered, never by blocking or
/// returning an error.
pub trait Transport: Send + Sync + 'static {
    type Handle: RequestHandle;

    /// Allocates a fresh request handle. Expensive, so callers go through the
    /// [`HandlePool`](crate::pool::HandlePool).
    fn allocate(&self) -> Result<Self::Handle, TransportError>;

    /// Releases a handle back to the transport with the given completion status.
    fn finalize(&self, handle: Self::Handle, completion: Completion);

    /// Offers body bytes to the shared buffer and returns how many were accepted.
    fn offer(&self, handle: &Self::Handle, buf: &[u8]) -> usize;

    /// Starts the response preamble. `field_count` is the number of field
    /// instances and `fields_size` the summed byte length of every name and value.
    fn init_response(
        &self,
        handle: &Self::Handle,
        status: StatusCode,
        field_count: u32,
        fields_size: u32,
    ) -> Result<(), TransportError>;

    /// Adds one header field instance, called once per value of a multi-valued field.
    fn add_field(&self, handle: &Self::Handle, name: &[u8], value: &[u8]) -> Result<(), TransportError>;

    /// Marks the header section as complete.
    fn send_headers(&self, handle: &Self::Handle) -> Result<(), TransportError>;
}

//! Response writing against the native transport.
//!
//! - [`ResponseWriter`]: header collection, the one-time header send and the
//!   flow-controlled body write loop
//! - [`FieldLayout`]: the field count and byte size the transport's response
//!   preamble is sized from
//! - [`CachedResponse`]: a captured response that can be replayed through
//!   another writer

mod cached;
mod header;
mod writer;

pub use cached::CachedResponse;
pub use header::DEFAULT_CONTENT_TYPE;
pub use header::FieldLayout;
pub use writer::ResponseWriter;
pub use writer::WriteStats;

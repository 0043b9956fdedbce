use std::fmt;

use http::{HeaderMap, StatusCode};
use tracing::{debug, trace, warn};

use crate::backpressure::{BackpressureRegistry, BackpressureWaiter};
use crate::config::WriterConfig;
use crate::error::WriteError;
use crate::response::cached::{CachedResponse, Capture};
use crate::response::header::{FieldLayout, ensure_content_type};
use crate::transport::{HandleId, RequestHandle, Transport};

/// Counters of the write loop, exposed so the retry and suspend behaviour is observable.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct WriteStats {
    /// Calls to the transport's `offer`.
    pub offers: u64,
    /// Offers that left part of the chunk unaccepted.
    pub partial_offers: u64,
    /// Suspensions waiting for shared memory ack.
    pub waits: u64,
    /// Body bytes accepted by the transport.
    pub bytes: u64,
}

/// Writes one response to the transport through the bounded shared buffer.
///
/// Headers are collected in [`headers_mut`](Self::headers_mut) and sent
/// exactly once, either explicitly with [`write_header`](Self::write_header)
/// or implicitly with a 200 status by the first [`write`](Self::write) or
/// [`flush`](Self::flush). Body bytes are pushed straight to the transport,
/// there is no body buffer.
///
/// When the transport accepts fewer bytes than offered, `write` suspends until
/// the transport acknowledges freed space and then carries on, so a successful
/// `write` always reports the full input length.
pub struct ResponseWriter<'h, T: Transport> {
    transport: &'h T,
    handle: &'h T::Handle,
    registry: &'h BackpressureRegistry,
    config: WriterConfig,
    headers: HeaderMap,
    headers_sent: bool,
    status: Option<StatusCode>,
    waiter: Option<BackpressureWaiter>,
    capture: Option<Capture>,
    stats: WriteStats,
}

impl<'h, T: Transport> ResponseWriter<'h, T> {
    pub fn new(transport: &'h T, handle: &'h T::Handle, registry: &'h BackpressureRegistry) -> Self {
        Self {
            transport,
            handle,
            registry,
            config: WriterConfig::default(),
            headers: HeaderMap::new(),
            headers_sent: false,
            status: None,
            waiter: None,
            capture: None,
            stats: WriteStats::default(),
        }
    }

    pub fn with_config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header fields to send. Changes made after the headers went out are not transmitted.
    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[inline]
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    /// The status sent with the headers, `None` before they went out.
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    #[inline]
    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    #[inline]
    pub fn handle_id(&self) -> HandleId {
        self.handle.id()
    }

    /// Sends the status line and header fields.
    ///
    /// Only the first successful call has an effect; later calls log a warning and return `Ok`.
    /// On error nothing counts as sent and the writer state is unchanged.
    pub fn write_header(&mut self, status: StatusCode) -> Result<(), WriteError> {
        if self.headers_sent {
            warn!(
                handle = %self.handle.id(),
                status = status.as_u16(),
                "multiple response write_header calls"
            );
            return Ok(());
        }

        ensure_content_type(&mut self.headers);
        let layout = FieldLayout::measure(&self.headers)?;

        self.transport.init_response(self.handle, status, layout.count, layout.size)?;
        for (name, value) in &self.headers {
            self.transport.add_field(self.handle, name.as_str().as_bytes(), value.as_bytes())?;
        }
        self.transport.send_headers(self.handle)?;

        // only a completed send counts, a failed one may be retried with other headers
        self.headers_sent = true;
        self.status = Some(status);

        if let Some(capture) = &mut self.capture {
            capture.record_headers(&self.headers);
        }

        debug!(
            handle = %self.handle.id(),
            status = status.as_u16(),
            fields = layout.count,
            fields_size = layout.size,
            "response headers sent"
        );
        Ok(())
    }

    /// Writes the whole of `buf`, suspending while the shared buffer is full.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, WriteError> {
        if !self.headers_sent {
            self.write_header(StatusCode::OK)?;
        }

        let registry = self.registry;
        let mut written = 0;

        while written < buf.len() {
            let end = buf.len().min(written.saturating_add(self.config.chunk_size));
            written += self.offer(&buf[written..end]);
            if written == end {
                continue;
            }

            self.stats.partial_offers += 1;
            registry.attach(self.waiter());

            // an ack may have landed between the short offer and the attach
            let retried = self.offer(&buf[written..end]);
            if retried > 0 {
                registry.detach(self.handle.id());
                written += retried;
                continue;
            }

            self.stats.waits += 1;
            trace!(
                handle = %self.handle.id(),
                written,
                remaining = buf.len() - written,
                "shared buffer full, waiting for ack"
            );

            let timeout = self.config.ack_timeout();
            let waited = self.waiter().wait(timeout).await;
            match waited {
                Ok(ready) => {
                    trace!(handle = %self.handle.id(), ready, "shared buffer ack received");
                }
                Err(e) => {
                    registry.detach(self.handle.id());
                    if let Some(capture) = &mut self.capture {
                        capture.abandon();
                    }
                    warn!(handle = %self.handle.id(), written, remaining = buf.len() - written, "{e}");
                    return Err(e);
                }
            }
        }

        if let Some(capture) = &mut self.capture {
            capture.record_body(buf);
        }

        Ok(written)
    }

    /// Makes sure the headers went out.
    ///
    /// Body bytes are never buffered, so there is nothing else to flush.
    pub fn flush(&mut self) -> Result<(), WriteError> {
        if !self.headers_sent {
            self.write_header(StatusCode::OK)?;
        }
        Ok(())
    }

    /// Starts recording headers and body so the response can be cached.
    ///
    /// Must be called before the headers are sent. A body longer than `limit`
    /// or a failed write disables the capture.
    pub(crate) fn capture(&mut self, limit: usize) {
        self.capture = Some(Capture::new(limit));
    }

    pub(crate) fn take_cached(&mut self) -> Option<CachedResponse> {
        self.capture.take()?.into_cached(self.status)
    }

    fn offer(&mut self, chunk: &[u8]) -> usize {
        self.stats.offers += 1;
        let accepted = self.transport.offer(self.handle, chunk).min(chunk.len());
        self.stats.bytes += accepted as u64;
        accepted
    }

    fn waiter(&mut self) -> &mut BackpressureWaiter {
        let id = self.handle.id();
        self.waiter.get_or_insert_with(|| BackpressureWaiter::new(id))
    }
}

impl<T: Transport> Drop for ResponseWriter<'_, T> {
    fn drop(&mut self) {
        if self.waiter.is_some() {
            self.registry.detach(self.handle.id());
        }
    }
}

impl<T: Transport> fmt::Debug for ResponseWriter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("handle", &self.handle.id())
            .field("headers", &self.headers)
            .field("headers_sent", &self.headers_sent)
            .field("status", &self.status)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

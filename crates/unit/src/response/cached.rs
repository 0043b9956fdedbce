use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use tracing::trace;

use crate::error::WriteError;
use crate::response::ResponseWriter;
use crate::transport::Transport;

/// A completed response captured for the response cache.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self { status, headers, body }
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Re-emits this response through `writer`, which must not have sent headers yet.
    pub async fn replay<T: Transport>(&self, writer: &mut ResponseWriter<'_, T>) -> Result<usize, WriteError> {
        writer.headers_mut().extend(self.headers.clone());
        writer.write_header(self.status)?;

        if self.body.is_empty() {
            return Ok(0);
        }
        writer.write(&self.body).await
    }
}

/// Records what a writer sent so it can become a [`CachedResponse`].
#[derive(Debug)]
pub(crate) struct Capture {
    limit: usize,
    headers: Option<HeaderMap>,
    body: BytesMut,
    abandoned: bool,
}

impl Capture {
    pub(crate) fn new(limit: usize) -> Self {
        Self { limit, headers: None, body: BytesMut::new(), abandoned: false }
    }

    pub(crate) fn record_headers(&mut self, headers: &HeaderMap) {
        self.headers = Some(headers.clone());
    }

    pub(crate) fn record_body(&mut self, buf: &[u8]) {
        if self.abandoned {
            return;
        }

        if self.body.len() + buf.len() > self.limit {
            trace!(limit = self.limit, "response body exceeds capture limit, not cacheable");
            self.abandon();
            return;
        }
        self.body.extend_from_slice(buf);
    }

    /// Gives up on the capture, the response went out incomplete.
    pub(crate) fn abandon(&mut self) {
        self.abandoned = true;
        self.body = BytesMut::new();
    }

    pub(crate) fn into_cached(self, status: Option<StatusCode>) -> Option<CachedResponse> {
        if self.abandoned {
            return None;
        }
        Some(CachedResponse::new(status?, self.headers?, self.body.freeze()))
    }
}

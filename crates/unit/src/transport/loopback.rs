//! An in-process [`Transport`] backed by plain memory.
//!
//! Each handle gets a shared buffer of `capacity` bytes. Offered bytes are
//! recorded as the response body and occupy buffer space until [`drain`] frees
//! it, which also reports the ack through the connected [`AckNotifier`], the
//! way the native runtime does once the front-end has consumed the data.
//!
//! [`drain`]: LoopbackTransport::drain

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use http::StatusCode;
use tracing::trace;

use crate::backpressure::AckNotifier;
use crate::error::TransportError;
use crate::transport::{Completion, HandleId, RequestHandle, Transport};

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct LoopbackHandle {
    id: HandleId,
}

impl LoopbackHandle {
    pub fn new(id: HandleId) -> Self {
        Self { id }
    }
}

impl RequestHandle for LoopbackHandle {
    fn id(&self) -> HandleId {
        self.id
    }
}

/// How [`LoopbackTransport::drain`] reports freed space.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AckRouting {
    /// Ack the drained handle only.
    PerHandle,
    /// Ack the whole context, waking every blocked writer.
    Context,
}

/// Everything the transport saw for the latest response on one handle.
#[derive(Debug, Clone, Default)]
pub struct ResponseRecord {
    pub status: Option<StatusCode>,
    pub declared_field_count: u32,
    pub declared_fields_size: u32,
    pub fields: Vec<(String, String)>,
    pub headers_sent: bool,
    pub body: BytesMut,
    pub offers: usize,
    pending: usize,
}

impl ResponseRecord {
    /// All values recorded for `name`, compared case-insensitively.
    pub fn field(&self, name: &str) -> Vec<&str> {
        self.fields.iter().filter(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str()).collect()
    }

    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.body)
    }

    /// Bytes accepted but not yet drained.
    pub fn pending(&self) -> usize {
        self.pending
    }
}

#[derive(Debug)]
pub struct LoopbackTransport {
    capacity: usize,
    next_id: AtomicU64,
    allocated: AtomicUsize,
    records: DashMap<HandleId, ResponseRecord>,
    finalized: DashMap<HandleId, Completion>,
    notifier: Option<(AckNotifier, AckRouting)>,
}

impl LoopbackTransport {
    /// A transport whose per-handle shared buffer holds `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: AtomicU64::new(1),
            allocated: AtomicUsize::new(0),
            records: DashMap::new(),
            finalized: DashMap::new(),
            notifier: None,
        }
    }

    /// A transport that never exerts backpressure.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    pub fn with_notifier(mut self, notifier: AckNotifier, routing: AckRouting) -> Self {
        self.notifier = Some((notifier, routing));
        self
    }

    /// Frees the shared buffer of `id` and acks it. Returns the freed byte count.
    pub fn drain(&self, id: HandleId) -> usize {
        let freed = self.records.get_mut(&id).map(|mut record| std::mem::take(&mut record.pending)).unwrap_or_default();

        if freed > 0 {
            trace!(handle = %id, freed, "loopback drained shared buffer");
            match &self.notifier {
                Some((notifier, AckRouting::PerHandle)) => {
                    notifier.ack_handle(id, 1);
                }
                Some((notifier, AckRouting::Context)) => {
                    notifier.ack(1);
                }
                None => {}
            }
        }
        freed
    }

    /// Drains every handle with pending bytes. Returns the freed byte count.
    pub fn drain_all(&self) -> usize {
        let ids: Vec<HandleId> = self.records.iter().filter(|r| r.pending > 0).map(|r| *r.key()).collect();
        ids.into_iter().map(|id| self.drain(id)).sum()
    }

    /// Snapshot of the latest response written on `id`.
    pub fn response(&self, id: HandleId) -> Option<ResponseRecord> {
        self.records.get(&id).map(|record| record.clone())
    }

    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    pub fn finalized(&self) -> Vec<(HandleId, Completion)> {
        let mut finalized: Vec<_> = self.finalized.iter().map(|r| (*r.key(), *r.value())).collect();
        finalized.sort_by_key(|(id, _)| *id);
        finalized
    }
}

impl Transport for LoopbackTransport {
    type Handle = LoopbackHandle;

    fn allocate(&self) -> Result<Self::Handle, TransportError> {
        let id = HandleId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.allocated.fetch_add(1, Ordering::Relaxed);
        Ok(LoopbackHandle { id })
    }

    fn finalize(&self, handle: Self::Handle, completion: Completion) {
        self.finalized.insert(handle.id, completion);
    }

    fn offer(&self, handle: &Self::Handle, buf: &[u8]) -> usize {
        let mut record = self.records.entry(handle.id).or_default();
        record.offers += 1;

        let free = self.capacity.saturating_sub(record.pending);
        let accepted = free.min(buf.len());
        record.body.extend_from_slice(&buf[..accepted]);
        record.pending += accepted;
        accepted
    }

    fn init_response(
        &self,
        handle: &Self::Handle,
        status: StatusCode,
        field_count: u32,
        fields_size: u32,
    ) -> Result<(), TransportError> {
        // a pooled handle starts a new response here
        self.records.insert(
            handle.id,
            ResponseRecord {
                status: Some(status),
                declared_field_count: field_count,
                declared_fields_size: fields_size,
                ..Default::default()
            },
        );
        Ok(())
    }

    fn add_field(&self, handle: &Self::Handle, name: &[u8], value: &[u8]) -> Result<(), TransportError> {
        let mut record = self
            .records
            .get_mut(&handle.id)
            .ok_or_else(|| TransportError::rejected("add_field", "response not initialized"))?;
        if record.headers_sent {
            return Err(TransportError::rejected("add_field", "headers already sent"));
        }
        record.fields.push((String::from_utf8_lossy(name).into_owned(), String::from_utf8_lossy(value).into_owned()));
        Ok(())
    }

    fn send_headers(&self, handle: &Self::Handle) -> Result<(), TransportError> {
        let mut record = self
            .records
            .get_mut(&handle.id)
            .ok_or_else(|| TransportError::rejected("send_headers", "response not initialized"))?;
        record.headers_sent = true;
        Ok(())
    }
}

//! Request dispatch: cache lookup, handle checkout and handler invocation.
//!
//! A [`Dispatcher`] owns every piece of per-context state: the handle pool,
//! the response cache and the backpressure registry. Nothing is global, so
//! several dispatchers can serve independent transports in one process.
//!
//! For each request the dispatcher:
//!
//! 1. checks out a request handle from the pool
//! 2. serves a fresh cached response for `GET` requests when one exists
//! 3. otherwise runs the [`Handler`] and flushes its response
//! 4. caches the response when it was a complete `GET` answered with `200`
//! 5. returns the handle to the pool on every path

mod builder;

pub use builder::DispatcherBuilder;

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use http::{Request, StatusCode};
use tracing::{debug, error};

use crate::backpressure::BackpressureRegistry;
use crate::cache::{ResponseCache, CacheSweeper, cache_key};
use crate::config::UnitConfig;
use crate::error::DispatchError;
use crate::handler::Handler;
use crate::pool::HandlePool;
use crate::response::{ResponseWriter, WriteStats};
use crate::transport::{HandleId, RequestHandle, Transport};

/// Where a dispatched response came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Source {
    Cache,
    Handler,
}

/// Outcome of a successful dispatch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub status: StatusCode,
    pub source: Source,
    pub handle: HandleId,
    pub stats: WriteStats,
}

impl Dispatched {
    fn new<T: Transport>(status: StatusCode, source: Source, writer: &ResponseWriter<'_, T>) -> Self {
        Self { status, source, handle: writer.handle_id(), stats: writer.stats() }
    }
}

pub struct Dispatcher<T: Transport, H> {
    transport: Arc<T>,
    registry: Arc<BackpressureRegistry>,
    pool: HandlePool<T>,
    cache: Option<Arc<ResponseCache>>,
    handler: H,
    config: UnitConfig,
    _sweeper: Option<CacheSweeper>,
}

impl<T: Transport, H> Dispatcher<T, H> {
    pub fn builder(transport: Arc<T>, handler: H) -> DispatcherBuilder<T, H> {
        DispatcherBuilder::new(transport, handler)
    }

    pub async fn dispatch<B>(&self, request: Request<B>) -> Result<Dispatched, DispatchError>
    where
        H: Handler<T, B>,
    {
        let cache = self.cache.as_deref();
        let key = cache.and_then(|_| cache_key(&request));

        let handle = self.pool.checkout()?;
        let mut writer =
            ResponseWriter::new(&*self.transport, &handle, &self.registry).with_config(self.config.writer.clone());

        if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
            if let Some(cached) = cache.get(key) {
                debug!(key, handle = %handle.id(), "serving response from cache");
                cached.replay(&mut writer).await?;
                return Ok(Dispatched::new(cached.status(), Source::Cache, &writer));
            }
            writer.capture(self.config.cache.max_body_bytes);
        }

        if let Err(e) = self.handler.call(&mut writer, request).await {
            let e: Box<dyn Error + Send + Sync> = e.into();
            error!(handle = %handle.id(), cause = %e, "handler failed");
            if !writer.headers_sent() {
                // the handler's own fields may be what failed to send
                writer.headers_mut().clear();
                if let Err(send_err) = writer.write_header(StatusCode::INTERNAL_SERVER_ERROR) {
                    error!(handle = %handle.id(), cause = %send_err, "can't send error response");
                }
            }
            return Err(DispatchError::handler(e));
        }
        writer.flush()?;

        let status = writer.status().unwrap_or(StatusCode::OK);
        if let (Some(cache), Some(key)) = (cache, key)
            && status == StatusCode::OK
        {
            match writer.take_cached() {
                Some(response) => {
                    debug!(key = %key, bytes = response.body().len(), "caching response");
                    cache.store(key, response);
                }
                None => debug!(key = %key, "response body incomplete or over cache limit, not cached"),
            }
        }

        Ok(Dispatched::new(status, Source::Handler, &writer))
    }

    #[inline]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    #[inline]
    pub fn registry(&self) -> &Arc<BackpressureRegistry> {
        &self.registry
    }

    #[inline]
    pub fn pool(&self) -> &HandlePool<T> {
        &self.pool
    }

    /// The response cache, `None` when caching is disabled.
    #[inline]
    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    #[inline]
    pub fn config(&self) -> &UnitConfig {
        &self.config
    }
}

impl<T: Transport, H> fmt::Debug for Dispatcher<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pool", &self.pool)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

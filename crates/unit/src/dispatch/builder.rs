use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::backpressure::BackpressureRegistry;
use crate::cache::ResponseCache;
use crate::config::UnitConfig;
use crate::dispatch::Dispatcher;
use crate::error::BuildError;
use crate::pool::HandlePool;
use crate::transport::Transport;

pub struct DispatcherBuilder<T: Transport, H> {
    transport: Arc<T>,
    handler: H,
    registry: Option<Arc<BackpressureRegistry>>,
    config: UnitConfig,
}

impl<T: Transport, H> DispatcherBuilder<T, H> {
    pub(crate) fn new(transport: Arc<T>, handler: H) -> Self {
        Self { transport, handler, registry: None, config: UnitConfig::default() }
    }

    /// The registry the transport's acknowledgments are forwarded to.
    ///
    /// Without one the dispatcher creates its own, reachable through
    /// [`Dispatcher::registry`].
    pub fn registry(mut self, registry: Arc<BackpressureRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(mut self, config: UnitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Dispatcher<T, H>, BuildError> {
        self.config.validate()?;

        let pool = HandlePool::new(Arc::clone(&self.transport), self.config.pool.capacity)?;
        if self.config.pool.prefill {
            pool.prefill()?;
        }

        let cache = self.config.cache.enabled.then(|| Arc::new(ResponseCache::from_config(&self.config.cache)));

        let sweeper = match (&cache, self.config.cache.sweep_interval()) {
            (Some(cache), Some(interval)) => {
                if tokio::runtime::Handle::try_current().is_ok() {
                    Some(cache.spawn_sweeper(interval))
                } else {
                    warn!("no tokio runtime when building dispatcher, cache sweeper disabled");
                    None
                }
            }
            _ => None,
        };

        info!(
            pool_capacity = pool.capacity(),
            cache_enabled = cache.is_some(),
            chunk_size = self.config.writer.chunk_size,
            "dispatcher built"
        );

        Ok(Dispatcher {
            transport: self.transport,
            registry: self.registry.unwrap_or_default(),
            pool,
            cache,
            handler: self.handler,
            config: self.config,
            _sweeper: sweeper,
        })
    }
}

impl<T: Transport, H> fmt::Debug for DispatcherBuilder<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder").field("config", &self.config).finish_non_exhaustive()
    }
}

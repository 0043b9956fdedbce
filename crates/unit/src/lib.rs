//! Response writing, handle pooling and response caching for applications
//! served by an application server over a shared-memory transport.
//!
//! The server hands each request to the application together with a request
//! handle. The application answers by sending a status line, header fields and
//! body bytes through a bounded shared buffer. When the buffer is full the
//! writer suspends until the server acknowledges freed space, then carries on.
//!
//! # Features
//!
//! - Flow-controlled [`ResponseWriter`](response::ResponseWriter) that resumes on shared memory ack
//! - Per-handle or context-wide ack delivery through the [`BackpressureRegistry`](backpressure::BackpressureRegistry)
//! - Bounded, lock-free [`HandlePool`](pool::HandlePool) of reusable request handles
//! - Time-bounded [`ResponseCache`](cache::ResponseCache) of `GET` responses
//! - A [`Dispatcher`](dispatch::Dispatcher) tying it together, configured through serde
//!
//! The transport itself sits behind the [`Transport`](transport::Transport) trait;
//! an in-process [`LoopbackTransport`](transport::loopback::LoopbackTransport) is
//! provided for tests and local runs.
//!
//! # Example
//!
//! ```no_run
//! use std::error::Error;
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use http::{Request, StatusCode};
//! use micro_unit::backpressure::BackpressureRegistry;
//! use micro_unit::dispatch::Dispatcher;
//! use micro_unit::handler::Handler;
//! use micro_unit::response::ResponseWriter;
//! use micro_unit::transport::loopback::{AckRouting, LoopbackTransport};
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Handler<LoopbackTransport, ()> for Hello {
//!     type Error = Box<dyn Error + Send + Sync>;
//!
//!     async fn call(
//!         &self,
//!         writer: &mut ResponseWriter<'_, LoopbackTransport>,
//!         _req: Request<()>,
//!     ) -> Result<(), Self::Error> {
//!         writer.write_header(StatusCode::OK)?;
//!         writer.write(b"hello world").await?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(BackpressureRegistry::default());
//!     let transport = LoopbackTransport::unbounded().with_notifier(registry.notifier(), AckRouting::PerHandle);
//!     let transport = Arc::new(transport);
//!
//!     let dispatcher = Dispatcher::builder(transport, Hello).registry(registry).build().unwrap();
//!     let dispatched = dispatcher.dispatch(Request::get("/").body(()).unwrap()).await.unwrap();
//!
//!     assert_eq!(dispatched.status, StatusCode::OK);
//! }
//! ```

pub mod backpressure;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod pool;
pub mod response;
pub mod transport;

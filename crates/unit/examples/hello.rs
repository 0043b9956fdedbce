use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderValue, Request, StatusCode};
use micro_unit::backpressure::BackpressureRegistry;
use micro_unit::config::{UnitConfig, WriterConfig};
use micro_unit::dispatch::Dispatcher;
use micro_unit::handler::Handler;
use micro_unit::response::ResponseWriter;
use micro_unit::transport::loopback::{AckRouting, LoopbackTransport};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

struct HelloWorld;

#[async_trait]
impl Handler<LoopbackTransport, ()> for HelloWorld {
    type Error = Box<dyn Error + Send + Sync>;

    async fn call(
        &self,
        writer: &mut ResponseWriter<'_, LoopbackTransport>,
        req: Request<()>,
    ) -> Result<(), Self::Error> {
        let body = format!("hello from {}\n", req.uri().path()).repeat(64);

        writer.headers_mut().insert("content-type", HeaderValue::from_static("text/plain"));
        writer.write_header(StatusCode::OK)?;
        writer.write(body.as_bytes()).await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    // a small shared buffer so the writer has to wait for acks
    let registry = Arc::new(BackpressureRegistry::default());
    let transport = Arc::new(LoopbackTransport::new(256).with_notifier(registry.notifier(), AckRouting::PerHandle));

    let config = UnitConfig {
        writer: WriterConfig::default().with_chunk_size(128).with_ack_timeout(Duration::from_secs(1)),
        ..UnitConfig::default()
    };
    let built = Dispatcher::builder(Arc::clone(&transport), HelloWorld).registry(registry).config(config).build();
    let dispatcher = match built {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!(cause = %e, "build dispatcher error");
            return;
        }
    };

    let drainer = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            loop {
                transport.drain_all();
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    };

    for _ in 0..2 {
        let request = Request::get("/hello").body(()).expect("valid request");
        match dispatcher.dispatch(request).await {
            Ok(dispatched) => info!(
                status = dispatched.status.as_u16(),
                source = ?dispatched.source,
                bytes = dispatched.stats.bytes,
                waits = dispatched.stats.waits,
                "request dispatched"
            ),
            Err(e) => error!(cause = %e, "dispatch failed"),
        }
    }

    drainer.abort();
}

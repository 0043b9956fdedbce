use std::error::Error;

use async_trait::async_trait;
use http::Request;

use crate::response::ResponseWriter;
use crate::transport::Transport;

/// Application logic invoked by the [`Dispatcher`](crate::dispatch::Dispatcher).
///
/// The handler writes its response through `writer`; returning without
/// writing anything still produces an empty 200 response.
#[async_trait]
pub trait Handler<T: Transport, ReqBody>: Send + Sync {
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn call(&self, writer: &mut ResponseWriter<'_, T>, req: Request<ReqBody>) -> Result<(), Self::Error>;
}

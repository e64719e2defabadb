//! Page function execution
//!
//! A page function is any routine that looks at a fetched page and returns
//! data worth keeping. Routines may be plain closures or async closures; both
//! are adapted to the `PageFunction` trait. The executor awaits the routine,
//! turns panics into errors so one bad page cannot take a worker down, and
//! forwards whatever the routine returned to the result sink. Sinks do
//! blocking I/O, so they run on tokio's blocking thread pool.

use crate::crawler::context::ExtractionContext;
use crate::output::{OutputError, ResultSink};
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;

/// A routine run against every successfully fetched page
///
/// Returning `Ok(None)` means "nothing to store" and produces no record.
#[async_trait]
pub trait PageFunction: Send + Sync {
    async fn call(&self, ctx: ExtractionContext) -> anyhow::Result<Option<Value>>;
}

/// Adapter for synchronous closures
pub struct FnPageFunction<F>(F);

#[async_trait]
impl<F> PageFunction for FnPageFunction<F>
where
    F: Fn(&ExtractionContext) -> anyhow::Result<Option<Value>> + Send + Sync,
{
    async fn call(&self, ctx: ExtractionContext) -> anyhow::Result<Option<Value>> {
        (self.0)(&ctx)
    }
}

/// Adapter for closures returning a future
pub struct AsyncPageFunction<F>(F);

#[async_trait]
impl<F, Fut> PageFunction for AsyncPageFunction<F>
where
    F: Fn(ExtractionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<Value>>> + Send + 'static,
{
    async fn call(&self, ctx: ExtractionContext) -> anyhow::Result<Option<Value>> {
        (self.0)(ctx).await
    }
}

/// Wraps a synchronous closure as a page function
///
/// # Example
///
/// ```
/// use soup_scraper::page_function_fn;
/// use serde_json::json;
///
/// let routine = page_function_fn(|ctx| {
///     Ok(Some(json!({ "url": ctx.url().as_str(), "status": ctx.response().status.as_u16() })))
/// });
/// ```
pub fn page_function_fn<F>(f: F) -> Arc<dyn PageFunction>
where
    F: Fn(&ExtractionContext) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
{
    Arc::new(FnPageFunction(f))
}

/// Wraps an async closure as a page function
pub fn page_function_async<F, Fut>(f: F) -> Arc<dyn PageFunction>
where
    F: Fn(ExtractionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<Value>>> + Send + 'static,
{
    Arc::new(AsyncPageFunction(f))
}

/// Failure to produce or store a record for one page
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Page function failed on {url}: {cause:#}")]
    Routine { url: String, cause: anyhow::Error },

    #[error("Page function panicked on {url}: {message}")]
    Panicked { url: String, message: String },

    #[error("Failed to store result for {url}: {source}")]
    Sink { url: String, source: OutputError },
}

/// Runs `routine` on one page and forwards its result to `sink`
///
/// Returns true if a record was pushed.
pub async fn execute(
    ctx: ExtractionContext,
    routine: &dyn PageFunction,
    sink: Arc<dyn ResultSink>,
) -> Result<bool, ExtractionError> {
    let request = ctx.request().clone();
    let url = request.url.to_string();

    let outcome = AssertUnwindSafe(routine.call(ctx)).catch_unwind().await;

    let value = match outcome {
        Ok(Ok(value)) => value,
        Ok(Err(cause)) => return Err(ExtractionError::Routine { url, cause }),
        Err(payload) => {
            return Err(ExtractionError::Panicked {
                url,
                message: panic_message(payload.as_ref()),
            })
        }
    };

    match value {
        Some(data) => {
            let pushed = tokio::task::spawn_blocking(move || sink.push_data(&request, &data))
                .await
                .unwrap_or_else(|e| Err(OutputError::Write(format!("sink task failed: {}", e))));
            pushed.map_err(|source| ExtractionError::Sink { url, source })?;
            Ok(true)
        }
        None => {
            tracing::debug!("Page function returned nothing for {}", url);
            Ok(false)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

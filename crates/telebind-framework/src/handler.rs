//! The [`Handler`] trait.
//!
//! A handler is any `Fn(Bot, Arc<Update>) -> impl Future` whose output
//! implements [`HandlerOutput`]. Plain `async fn`s qualify:
//!
//! ```rust,ignore
//! async fn echo(bot: Bot, update: Arc<Update>) -> Result<(), ApiError> {
//!     if let Some(message) = update.message() {
//!         bot.send_message(&message.reply(message.text.clone().unwrap_or_default())).await?;
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use telebind_api::{Bot, Update};

// ============================================================================
// HandlerOutput
// ============================================================================

/// Values a handler may return.
///
/// `()` always succeeds. `Err` values are rendered with `Display` and
/// reported to the dispatcher's error sink.
pub trait HandlerOutput: Send {
    fn into_outcome(self) -> Result<(), String>;
}

impl HandlerOutput for () {
    fn into_outcome(self) -> Result<(), String> {
        Ok(())
    }
}

impl<T: HandlerOutput, E: Display + Send> HandlerOutput for Result<T, E> {
    fn into_outcome(self) -> Result<(), String> {
        match self {
            Ok(t) => t.into_outcome(),
            Err(e) => Err(e.to_string()),
        }
    }
}

// ============================================================================
// Handler
// ============================================================================

/// A callback invoked with the client and one update.
pub trait Handler: Send + Sync + 'static {
    /// Runs the handler. The returned future owns everything it needs.
    fn handle(&self, bot: Bot, update: Arc<Update>) -> BoxFuture<'static, Result<(), String>>;
}

impl<F, Fut, Res> Handler for F
where
    F: Fn(Bot, Arc<Update>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: HandlerOutput + 'static,
{
    fn handle(&self, bot: Bot, update: Arc<Update>) -> BoxFuture<'static, Result<(), String>> {
        let fut = (self)(bot, update);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

/// A type-erased handler stored in the registry.
pub type BoxedHandler = Arc<dyn Handler>;

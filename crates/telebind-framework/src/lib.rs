//! # telebind framework
//!
//! Routing updates to user code:
//!
//! - [`Handler`]: any `Fn(Bot, Arc<Update>) -> impl Future` returning `()` or a `Result`
//! - [`UpdateFilter`]: unconditional, or one [`UpdateType`](telebind_api::UpdateType)
//! - [`HandlerRegistry`]: ordered `(filter, handler)` registrations
//! - [`UpdateDispatcher`]: one isolated tokio task per matching `(update, handler)` pair
//! - [`ErrorSink`]: where handler errors and panics are reported
//!
//! The framework never decides *when* updates arrive; that is the poller's job
//! in `telebind-runtime`.

pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod handler;
pub mod registry;

pub use dispatcher::UpdateDispatcher;
pub use error::{ErrorSink, HandlerFailure, log_failures};
pub use filter::UpdateFilter;
pub use handler::{BoxedHandler, Handler, HandlerOutput};
pub use registry::{HandlerRegistry, Registration};

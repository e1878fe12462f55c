//! Fan-out of updates to handler tasks.
//!
//! For each update, [`UpdateDispatcher::dispatch`] spawns one task per
//! matching registration, in registration order, and returns without waiting:
//!
//! ```text
//! update ──▶ registry.matching() ──┬──▶ task(handler #0) ──▶ ok / ErrorSink
//!                                  ├──▶ task(handler #2) ──▶ ok / ErrorSink
//!                                  └──▶ ...
//! ```
//!
//! Every task runs under `catch_unwind`. A panicking or failing handler is
//! reported to the [`ErrorSink`] and affects nothing else: other handlers for
//! the same update still run and the caller never observes the failure.
//!
//! All tasks are tracked by a [`TaskTracker`], so a shutting-down runtime can
//! wait for in-flight handlers with [`UpdateDispatcher::wait_idle`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug_span, trace};

use crate::error::{ErrorSink, HandlerFailure, log_failures, panic_message};
use crate::registry::HandlerRegistry;
use telebind_api::{Bot, Update};

/// Spawns handler tasks for incoming updates.
///
/// Cloning is cheap; clones share the registry and the task tracker.
#[derive(Clone)]
pub struct UpdateDispatcher {
    registry: Arc<HandlerRegistry>,
    bot: Bot,
    sink: ErrorSink,
    tracker: TaskTracker,
}

impl UpdateDispatcher {
    /// Creates a dispatcher that logs handler failures.
    pub fn new(registry: impl Into<Arc<HandlerRegistry>>, bot: Bot) -> Self {
        Self {
            registry: registry.into(),
            bot,
            sink: log_failures(),
            tracker: TaskTracker::new(),
        }
    }

    /// Replaces the error sink.
    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Handler tasks spawned but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Spawns one task per matching handler and returns how many were spawned.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, update: Update) -> usize {
        self.spawn_matching(update).len()
    }

    /// Dispatches every update of `batch` in order, then waits for all of
    /// the spawned tasks to finish. Returns the number of tasks spawned.
    pub async fn dispatch_and_wait(&self, batch: Vec<Update>) -> usize {
        let handles: Vec<_> = batch
            .into_iter()
            .flat_map(|update| self.spawn_matching(update))
            .collect();
        let count = handles.len();
        // Panics are caught inside the task, so join errors only mean cancellation.
        join_all(handles).await;
        count
    }

    /// Waits until every handler task spawned so far has finished.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    fn spawn_matching(&self, update: Update) -> Vec<JoinHandle<()>> {
        let update_id = update.update_id;
        let update = Arc::new(update);

        let handles: Vec<_> = self
            .registry
            .matching(&update)
            .map(|registration| {
                let handler = Arc::clone(registration.handler());
                let name = registration.name().to_string();
                let bot = self.bot.clone();
                let update = Arc::clone(&update);
                let sink = Arc::clone(&self.sink);
                let span = debug_span!("handler", update_id, handler = %name);

                let task = async move {
                    let outcome = AssertUnwindSafe(async move { handler.handle(bot, update).await })
                        .catch_unwind()
                        .await;

                    let failure = match outcome {
                        Ok(Ok(())) => return,
                        Ok(Err(message)) => HandlerFailure::Failed {
                            update_id,
                            handler: name,
                            message,
                        },
                        Err(payload) => HandlerFailure::Panicked {
                            update_id,
                            handler: name,
                            message: panic_message(payload.as_ref()),
                        },
                    };
                    (sink)(failure);
                };

                self.tracker.spawn(task.instrument(span))
            })
            .collect();

        trace!(
            update_id,
            kind = %update.update_type(),
            handlers = handles.len(),
            "Dispatched update"
        );
        handles
    }
}

impl std::fmt::Debug for UpdateDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateDispatcher")
            .field("handler_count", &self.registry.len())
            .field("in_flight", &self.tracker.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::UpdateFilter;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use telebind_api::UpdateKind;
    use telebind_core::{ApiCaller, ApiResult};

    struct NullCaller;

    #[async_trait]
    impl ApiCaller for NullCaller {
        async fn call(&self, _method: &str, _params: Option<Value>) -> ApiResult<Value> {
            Ok(Value::Bool(true))
        }
    }

    fn message_update(id: i64) -> Update {
        serde_json::from_value(json!({
            "update_id": id,
            "message": {"message_id": id, "date": 0, "chat": {"id": 1, "type": "private"}, "text": "hi"}
        }))
        .unwrap()
    }

    fn collecting_sink() -> (ErrorSink, Arc<Mutex<Vec<HandlerFailure>>>) {
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink_failures = Arc::clone(&failures);
        let sink: ErrorSink = Arc::new(move |failure| sink_failures.lock().push(failure));
        (sink, failures)
    }

    fn counter_handler(
        counter: &Arc<AtomicUsize>,
    ) -> impl Fn(Bot, Arc<Update>) -> futures::future::Ready<()> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move |_bot, _update| {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    #[tokio::test]
    async fn dispatch_fires_matching_handlers_only() {
        let any = Arc::new(AtomicUsize::new(0));
        let messages = Arc::new(AtomicUsize::new(0));
        let callbacks = Arc::new(AtomicUsize::new(0));

        let mut registry = HandlerRegistry::new();
        registry
            .add(counter_handler(&any))
            .on_message(counter_handler(&messages))
            .on_callback_query(counter_handler(&callbacks));
        let dispatcher = UpdateDispatcher::new(registry, Bot::new(NullCaller));

        assert_eq!(dispatcher.dispatch(message_update(1)), 2);
        assert_eq!(
            dispatcher.dispatch(Update::new(2, UpdateKind::Unknown(json!({"foo": 1})))),
            1
        );
        dispatcher.wait_idle().await;

        assert_eq!(any.load(Ordering::SeqCst), 2);
        assert_eq!(messages.load(Ordering::SeqCst), 1);
        assert_eq!(callbacks.load(Ordering::SeqCst), 0);
    }

    async fn explode(_bot: Bot, _update: Arc<Update>) {
        panic!("boom");
    }

    #[tokio::test]
    async fn panicking_handler_is_isolated_and_reported() {
        let survivors = Arc::new(AtomicUsize::new(0));
        let (sink, failures) = collecting_sink();

        let mut registry = HandlerRegistry::new();
        registry
            .named("explodes", UpdateFilter::Any, explode)
            .add(counter_handler(&survivors));
        let dispatcher =
            UpdateDispatcher::new(registry, Bot::new(NullCaller)).with_error_sink(sink);

        dispatcher.dispatch(message_update(7));
        dispatcher.dispatch(message_update(8));
        dispatcher.wait_idle().await;

        assert_eq!(survivors.load(Ordering::SeqCst), 2);
        let failures = failures.lock();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| f.is_panic() && f.handler() == "explodes"));
        assert!(matches!(
            &failures[0],
            HandlerFailure::Panicked { message, .. } if message == "boom"
        ));
    }

    #[tokio::test]
    async fn panic_before_the_first_await_is_caught() {
        let (sink, failures) = collecting_sink();

        let mut registry = HandlerRegistry::new();
        registry.add(|_bot: Bot, _update: Arc<Update>| -> futures::future::Ready<()> {
            panic!("eager");
        });
        let dispatcher =
            UpdateDispatcher::new(registry, Bot::new(NullCaller)).with_error_sink(sink);

        dispatcher.dispatch(message_update(1));
        dispatcher.wait_idle().await;

        assert_eq!(failures.lock()[0].to_string(), "handler 'any#0' panicked on update 1: eager");
    }

    #[tokio::test]
    async fn handler_errors_are_reported_as_failures() {
        let (sink, failures) = collecting_sink();

        let mut registry = HandlerRegistry::new();
        registry.on_message(|_bot: Bot, update: Arc<Update>| async move {
            Err::<(), _>(format!("cannot handle {}", update.update_id))
        });
        let dispatcher =
            UpdateDispatcher::new(registry, Bot::new(NullCaller)).with_error_sink(sink);

        dispatcher.dispatch(message_update(42));
        dispatcher.wait_idle().await;

        assert_eq!(
            *failures.lock(),
            vec![HandlerFailure::Failed {
                update_id: 42,
                handler: "message#0".into(),
                message: "cannot handle 42".into(),
            }]
        );
    }

    #[tokio::test]
    async fn dispatch_and_wait_returns_after_every_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);

        let mut registry = HandlerRegistry::new();
        registry.add(move |_bot: Bot, update: Arc<Update>| {
            let recorder = Arc::clone(&recorder);
            async move {
                tokio::task::yield_now().await;
                recorder.lock().push(update.update_id);
            }
        });
        let dispatcher = UpdateDispatcher::new(registry, Bot::new(NullCaller));

        let spawned = dispatcher
            .dispatch_and_wait(vec![message_update(1), message_update(2)])
            .await;

        assert_eq!(spawned, 2);
        let mut seen = seen.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, [1, 2]);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn handlers_start_in_update_then_registration_order() {
        let started = Arc::new(Mutex::new(Vec::new()));

        let mut registry = HandlerRegistry::new();
        for label in ["first", "second"] {
            let started = Arc::clone(&started);
            registry.add(move |_bot: Bot, update: Arc<Update>| {
                started.lock().push((update.update_id, label));
                async {}
            });
        }
        let dispatcher = UpdateDispatcher::new(registry, Bot::new(NullCaller));

        for id in [7, 8, 9] {
            dispatcher.dispatch(message_update(id));
        }
        dispatcher.wait_idle().await;

        assert_eq!(
            *started.lock(),
            [
                (7, "first"),
                (7, "second"),
                (8, "first"),
                (8, "second"),
                (9, "first"),
                (9, "second"),
            ]
        );
    }

    #[test]
    fn empty_registry_spawns_nothing() {
        let dispatcher = UpdateDispatcher::new(HandlerRegistry::new(), Bot::new(NullCaller));
        let spawned = tokio_test::block_on(async { dispatcher.dispatch(message_update(1)) });
        assert_eq!(spawned, 0);
    }
}

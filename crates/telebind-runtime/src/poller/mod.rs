//! The long-poll loop.
//!
//! A [`Poller`] owns the offset cursor. Each cycle asks `getUpdates` for
//! everything at or after the cursor, moves the cursor past the newest
//! update received, and only then hands the batch to the dispatcher:
//!
//! ```text
//!            ┌──────────────────────── next cycle ───────────────────────┐
//!            ▼                                                           │
//! ┌────────────────────┐  batch  ┌─────────────────────────┐  spawn  ┌──────────┐
//! │ getUpdates(offset) │────────▶│ offset = max(id) + 1    │────────▶│ dispatch │
//! └────────────────────┘         └─────────────────────────┘         └──────────┘
//! ```
//!
//! The server confirms every update below the offset we send, so advancing
//! first means a batch is never delivered twice, whatever its handlers do.

mod builder;
mod policy;

pub use builder::PollerBuilder;
pub use policy::{AdvancePolicy, FailurePolicy, PollerState};

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{RuntimeError, RuntimeResult};
use telebind_api::params::GetUpdatesParams;
use telebind_api::{Bot, Update, UpdateType};
use telebind_core::ApiResult;
use telebind_framework::UpdateDispatcher;

/// The cursor after receiving `updates` while at `current`.
///
/// Never decreases; order and duplicates within the batch do not matter.
pub fn next_offset(current: i64, updates: &[Update]) -> i64 {
    updates
        .iter()
        .map(|update| update.update_id.saturating_add(1))
        .fold(current, i64::max)
}

/// Offset-cursor long-poll state machine.
///
/// Built with [`Poller::builder`]. Driven either one cycle at a time with
/// [`poll_once`](Self::poll_once) or until shutdown with [`run`](Self::run).
pub struct Poller {
    bot: Bot,
    dispatcher: UpdateDispatcher,
    offset: i64,
    state: PollerState,
    timeout: Duration,
    limit: Option<u32>,
    allowed_updates: Option<Vec<UpdateType>>,
    failure_policy: FailurePolicy,
    advance_policy: AdvancePolicy,
    error_backoff: Duration,
    shutdown_timeout: Duration,
    shutdown: CancellationToken,
}

impl Poller {
    pub fn builder(bot: Bot) -> PollerBuilder {
        PollerBuilder::new(bot)
    }

    /// The identifier of the next update to request.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn dispatcher(&self) -> &UpdateDispatcher {
        &self.dispatcher
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Requests shutdown. The loop notices at its next await point.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    fn set_state(&mut self, state: PollerState) {
        if self.state != state {
            trace!(from = %self.state, to = %state, "Poller state changed");
            self.state = state;
        }
    }

    fn request(&self) -> GetUpdatesParams {
        GetUpdatesParams {
            offset: Some(self.offset),
            limit: self.limit,
            timeout: Some(self.timeout.as_secs()),
            allowed_updates: self.allowed_updates.clone(),
        }
    }

    /// Runs one Polling → Dispatching cycle and returns how many updates
    /// were received.
    ///
    /// On error the offset is unchanged, so the next call asks for the same
    /// updates again.
    pub async fn poll_once(&mut self) -> ApiResult<usize> {
        self.set_state(PollerState::Polling);
        let updates = self.bot.get_updates(&self.request()).await?;

        self.set_state(PollerState::Dispatching);
        if updates.is_empty() {
            trace!(offset = self.offset, "Long poll returned no updates");
            return Ok(0);
        }

        let received = updates.len();
        self.offset = next_offset(self.offset, &updates);
        debug!(received, offset = self.offset, "Received updates");

        match self.advance_policy {
            AdvancePolicy::Unconditional => {
                for update in updates {
                    self.dispatcher.dispatch(update);
                }
            }
            AdvancePolicy::AfterHandlers => {
                let spawned = self.dispatcher.dispatch_and_wait(updates).await;
                trace!(spawned, "Batch handlers finished");
            }
        }

        Ok(received)
    }

    /// Polls until the shutdown token is cancelled or polling fails under
    /// [`FailurePolicy::Stop`].
    ///
    /// Cancellation abandons an outstanding long poll. Either way the
    /// poller ends [`Stopped`](PollerState::Stopped) after waiting for
    /// in-flight handlers.
    pub async fn run(&mut self) -> RuntimeResult<()> {
        if self.state.is_stopped() {
            return Ok(());
        }

        info!(
            offset = self.offset,
            timeout_secs = self.timeout.as_secs(),
            policy = ?self.failure_policy,
            "Polling for updates"
        );

        let shutdown = self.shutdown.clone();
        let result = loop {
            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Ok(()),
                outcome = self.poll_once() => outcome,
            };

            let Err(source) = outcome else {
                continue;
            };

            match self.failure_policy {
                FailurePolicy::Stop => {
                    error!(error = %source, offset = self.offset, "getUpdates failed, stopping");
                    break Err(RuntimeError::Poll {
                        offset: self.offset,
                        source,
                    });
                }
                FailurePolicy::Continue => {
                    warn!(
                        error = %source,
                        offset = self.offset,
                        backoff_ms = self.error_backoff.as_millis() as u64,
                        "getUpdates failed, polling again"
                    );
                    if !self.error_backoff.is_zero() {
                        tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => break Ok(()),
                            _ = tokio::time::sleep(self.error_backoff) => {}
                        }
                    }
                }
            }
        };

        self.finish().await;
        result
    }

    /// Like [`run`](Self::run), stopping when `shutdown` completes.
    pub async fn run_until<F>(&mut self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let token = self.shutdown.clone();
        let run = self.run();
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => return result,
            _ = shutdown => token.cancel(),
        }
        run.await
    }

    async fn finish(&mut self) {
        self.set_state(PollerState::Stopped);

        let in_flight = self.dispatcher.in_flight();
        if in_flight > 0 {
            debug!(in_flight, "Waiting for running handlers");
        }
        if tokio::time::timeout(self.shutdown_timeout, self.dispatcher.wait_idle())
            .await
            .is_err()
        {
            warn!(
                in_flight = self.dispatcher.in_flight(),
                timeout_secs = self.shutdown_timeout.as_secs(),
                "Handlers still running at shutdown, abandoning them"
            );
        }

        info!(offset = self.offset, "Poller stopped");
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("offset", &self.offset)
            .field("state", &self.state)
            .field("timeout", &self.timeout)
            .field("limit", &self.limit)
            .field("allowed_updates", &self.allowed_updates)
            .field("failure_policy", &self.failure_policy)
            .field("advance_policy", &self.advance_policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedCaller, message_update, unknown_update};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use telebind_api::UpdateKind;
    use telebind_core::ApiError;
    use telebind_framework::{ErrorSink, HandlerFailure, HandlerRegistry};

    async fn never_called(_bot: Bot, _update: Arc<Update>) {
        panic!("message handler must not see unknown updates");
    }

    fn ids(updates: &[i64]) -> Vec<Update> {
        updates.iter().map(|&id| message_update(id, "hi")).collect()
    }

    #[test]
    fn next_offset_is_max_plus_one() {
        assert_eq!(next_offset(0, &ids(&[100])), 101);
        assert_eq!(next_offset(101, &ids(&[102, 101, 102])), 103);
        assert_eq!(next_offset(0, &ids(&[5, 3, 9, 1])), 10);
    }

    #[test]
    fn next_offset_never_decreases() {
        assert_eq!(next_offset(50, &ids(&[10, 20])), 50);
        assert_eq!(next_offset(50, &[]), 50);
    }

    #[tokio::test]
    async fn end_to_end_cursor_and_dispatch() {
        let caller = ScriptedCaller::new()
            .batch(vec![message_update(100, "first")])
            .batch(vec![])
            .batch(vec![message_update(101, "second"), message_update(102, "third")]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let mut registry = HandlerRegistry::new();
        registry.on_message(move |_bot: Bot, update: Arc<Update>| {
            let recorder = Arc::clone(&recorder);
            async move {
                let text = update.message().and_then(|m| m.text.clone());
                recorder.lock().push((update.update_id, text));
            }
        });

        let mut poller = Poller::builder(Bot::new(caller.clone()))
            .registry(registry)
            .advance_policy(AdvancePolicy::AfterHandlers)
            .build();
        caller.stop_when_exhausted(poller.shutdown_token());

        poller.run().await.unwrap();

        assert_eq!(caller.offsets(), [0, 101, 101, 103]);
        assert_eq!(poller.offset(), 103);
        assert_eq!(poller.state(), PollerState::Stopped);
        assert_eq!(
            *seen.lock(),
            [
                (100, Some("first".to_string())),
                (101, Some("second".to_string())),
                (102, Some("third".to_string())),
            ]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn default_policy_starts_handlers_in_received_order() {
        let caller = ScriptedCaller::new()
            .batch(ids(&[100]))
            .batch(vec![])
            .batch(ids(&[101, 102]));

        let started = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&started);
        let mut registry = HandlerRegistry::new();
        registry.on_message(move |_bot: Bot, update: Arc<Update>| {
            recorder.lock().push(update.update_id);
            async {}
        });

        let mut poller = Poller::builder(Bot::new(caller.clone()))
            .registry(registry)
            .build();
        assert_eq!(poller.advance_policy, AdvancePolicy::Unconditional);
        caller.stop_when_exhausted(poller.shutdown_token());

        poller.run().await.unwrap();

        assert_eq!(*started.lock(), [100, 101, 102]);
        assert_eq!(caller.offsets(), [0, 101, 101, 103]);
    }

    #[tokio::test]
    async fn duplicates_and_out_of_order_ids_keep_cursor_monotonic() {
        let caller = ScriptedCaller::new()
            .batch(ids(&[7, 5, 7]))
            .batch(ids(&[3]))
            .batch(ids(&[8]));
        let mut poller = Poller::builder(Bot::new(caller.clone())).build();

        assert_eq!(poller.poll_once().await.unwrap(), 3);
        assert_eq!(poller.offset(), 8);
        assert_eq!(poller.poll_once().await.unwrap(), 1);
        assert_eq!(poller.offset(), 8);
        poller.poll_once().await.unwrap();
        assert_eq!(poller.offset(), 9);

        assert_eq!(caller.offsets(), [0, 8, 8]);
    }

    #[tokio::test]
    async fn empty_batch_leaves_cursor_alone() {
        let caller = ScriptedCaller::new().batch(vec![]);
        let mut poller = Poller::builder(Bot::new(caller))
            .initial_offset(42)
            .build();

        assert_eq!(poller.state(), PollerState::Idle);
        assert_eq!(poller.poll_once().await.unwrap(), 0);
        assert_eq!(poller.offset(), 42);
        assert_eq!(poller.state(), PollerState::Dispatching);
    }

    #[tokio::test]
    async fn request_carries_configured_parameters() {
        let caller = ScriptedCaller::new().batch(vec![]);
        let mut poller = Poller::builder(Bot::new(caller.clone()))
            .initial_offset(9)
            .timeout(Duration::from_secs(25))
            .limit(10)
            .allowed_updates(vec![UpdateType::Message])
            .build();

        poller.poll_once().await.unwrap();

        assert_eq!(
            caller.requests()[0],
            serde_json::json!({
                "offset": 9,
                "limit": 10,
                "timeout": 25,
                "allowed_updates": ["message"]
            })
        );
    }

    #[tokio::test]
    async fn stop_policy_returns_the_error() {
        let caller = ScriptedCaller::new()
            .batch(ids(&[1]))
            .failure(ApiError::remote("Unauthorized", 401, None));
        let mut poller = Poller::builder(Bot::new(caller.clone())).build();

        let err = poller.run().await.unwrap_err();

        assert!(matches!(
            &err,
            RuntimeError::Poll { offset: 2, source } if source.error_code() == Some(401)
        ));
        assert_eq!(poller.state(), PollerState::Stopped);
        assert_eq!(caller.offsets(), [0, 2]);
    }

    #[tokio::test]
    async fn continue_policy_repolls_from_the_same_offset() {
        let caller = ScriptedCaller::new()
            .batch(ids(&[10]))
            .failure(ApiError::MalformedEnvelope("not json".into()))
            .failure(ApiError::remote("Bad Gateway", 502, None))
            .batch(ids(&[11]));
        let mut poller = Poller::builder(Bot::new(caller.clone()))
            .failure_policy(FailurePolicy::Continue)
            .error_backoff(Duration::from_millis(1))
            .build();
        caller.stop_when_exhausted(poller.shutdown_token());

        poller.run().await.unwrap();

        assert_eq!(caller.offsets(), [0, 11, 11, 11, 12]);
        assert_eq!(poller.offset(), 12);
    }

    #[tokio::test]
    async fn handler_failures_do_not_stop_polling() {
        let caller = ScriptedCaller::new().batch(ids(&[1, 2])).batch(ids(&[3]));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink_failures = Arc::clone(&failures);
        let sink: ErrorSink = Arc::new(move |f: HandlerFailure| sink_failures.lock().push(f));

        let mut registry = HandlerRegistry::new();
        registry.add(|_bot: Bot, update: Arc<Update>| async move {
            if update.update_id == 2 {
                panic!("bad update");
            }
        });

        let mut poller = Poller::builder(Bot::new(caller.clone()))
            .registry(registry)
            .error_sink(sink)
            .advance_policy(AdvancePolicy::AfterHandlers)
            .build();
        caller.stop_when_exhausted(poller.shutdown_token());

        poller.run().await.unwrap();

        assert_eq!(caller.offsets(), [0, 3, 4]);
        let failures = failures.lock();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].update_id(), 2);
        assert!(failures[0].is_panic());
    }

    #[tokio::test]
    async fn unknown_updates_advance_the_cursor() {
        let any = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&any);
        let caller = ScriptedCaller::new().batch(vec![unknown_update(77)]);

        let mut registry = HandlerRegistry::new();
        registry
            .on_message(never_called)
            .add(move |_bot: Bot, update: Arc<Update>| {
                assert!(matches!(update.kind, UpdateKind::Unknown(_)));
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            });

        let mut poller = Poller::builder(Bot::new(caller))
            .registry(registry)
            .advance_policy(AdvancePolicy::AfterHandlers)
            .build();

        assert_eq!(poller.poll_once().await.unwrap(), 1);
        assert_eq!(poller.offset(), 78);
        assert_eq!(any.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_until_interrupts_a_pending_long_poll() {
        // Nothing scripted: every getUpdates call hangs like an idle long poll.
        let caller = ScriptedCaller::new();
        let mut poller = Poller::builder(Bot::new(caller.clone()))
            .initial_offset(5)
            .build();

        poller
            .run_until(tokio::time::sleep(Duration::from_millis(20)))
            .await
            .unwrap();

        assert_eq!(poller.state(), PollerState::Stopped);
        assert_eq!(poller.offset(), 5);
        assert_eq!(caller.offsets(), [5]);
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_handlers() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let caller = ScriptedCaller::new().batch(ids(&[1]));

        let mut registry = HandlerRegistry::new();
        registry.add(move |_bot: Bot, _update: Arc<Update>| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let mut poller = Poller::builder(Bot::new(caller.clone()))
            .registry(registry)
            .build();
        caller.stop_when_exhausted(poller.shutdown_token());

        poller.run().await.unwrap();

        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(poller.dispatcher().in_flight(), 0);
    }

    #[tokio::test]
    async fn stopped_poller_does_not_poll_again() {
        let caller = ScriptedCaller::new();
        let mut poller = Poller::builder(Bot::new(caller.clone())).build();
        poller.stop();

        poller.run().await.unwrap();
        poller.run().await.unwrap();

        assert!(caller.offsets().is_empty());
        assert!(poller.state().is_stopped());
    }
}

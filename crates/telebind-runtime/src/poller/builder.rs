use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{AdvancePolicy, FailurePolicy, Poller, PollerState};
use crate::config::PollingConfig;
use telebind_api::{Bot, UpdateType};
use telebind_framework::{ErrorSink, HandlerRegistry, UpdateDispatcher};

/// Builder for [`Poller`].
///
/// ```rust,ignore
/// let mut registry = HandlerRegistry::new();
/// registry.on_message(echo);
///
/// let mut poller = Poller::builder(bot)
///     .registry(registry)
///     .timeout(Duration::from_secs(30))
///     .failure_policy(FailurePolicy::Continue)
///     .build();
/// poller.run_until(tokio::signal::ctrl_c().map(drop)).await?;
/// ```
#[must_use = "a builder does nothing until `build` is called"]
pub struct PollerBuilder {
    bot: Bot,
    registry: Arc<HandlerRegistry>,
    dispatcher: Option<UpdateDispatcher>,
    error_sink: Option<ErrorSink>,
    config: PollingConfig,
    shutdown: Option<CancellationToken>,
}

impl PollerBuilder {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            registry: Arc::new(HandlerRegistry::new()),
            dispatcher: None,
            error_sink: None,
            config: PollingConfig::default(),
            shutdown: None,
        }
    }

    /// Takes every polling setting from `config`.
    pub fn config(mut self, config: &PollingConfig) -> Self {
        self.config = config.clone();
        self
    }

    pub fn registry(mut self, registry: impl Into<Arc<HandlerRegistry>>) -> Self {
        self.registry = registry.into();
        self
    }

    /// Uses a prepared dispatcher; `registry` and `error_sink` are ignored.
    pub fn dispatcher(mut self, dispatcher: UpdateDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn error_sink(mut self, sink: ErrorSink) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Long-poll timeout, sent in whole seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_secs = timeout.as_secs();
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.config.limit = Some(limit);
        self
    }

    pub fn allowed_updates(mut self, types: Vec<UpdateType>) -> Self {
        self.config.allowed_updates = Some(types);
        self
    }

    pub fn initial_offset(mut self, offset: i64) -> Self {
        self.config.initial_offset = offset;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn advance_policy(mut self, policy: AdvancePolicy) -> Self {
        self.config.advance_policy = policy;
        self
    }

    pub fn error_backoff(mut self, backoff: Duration) -> Self {
        self.config.error_backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// How long shutdown waits for in-flight handlers.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout_secs = timeout.as_secs();
        self
    }

    /// Shares an existing token, so one cancellation stops several pollers.
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn build(self) -> Poller {
        let dispatcher = self.dispatcher.unwrap_or_else(|| {
            let dispatcher = UpdateDispatcher::new(self.registry, self.bot.clone());
            match self.error_sink {
                Some(sink) => dispatcher.with_error_sink(sink),
                None => dispatcher,
            }
        });

        let config = self.config;
        Poller {
            bot: self.bot,
            dispatcher,
            offset: config.initial_offset,
            state: PollerState::Idle,
            timeout: config.timeout(),
            limit: config.limit,
            failure_policy: config.failure_policy,
            advance_policy: config.advance_policy,
            error_backoff: config.error_backoff(),
            shutdown_timeout: config.shutdown_timeout(),
            allowed_updates: config.allowed_updates,
            shutdown: self.shutdown.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCaller;

    #[test]
    fn defaults_match_polling_config() {
        let poller = PollerBuilder::new(Bot::new(ScriptedCaller::new())).build();

        assert_eq!(poller.offset(), 0);
        assert_eq!(poller.state(), PollerState::Idle);
        assert_eq!(poller.timeout, Duration::from_secs(12));
        assert_eq!(poller.failure_policy, FailurePolicy::Stop);
        assert_eq!(poller.advance_policy, AdvancePolicy::Unconditional);
        assert!(poller.error_backoff.is_zero());
    }

    #[test]
    fn config_then_overrides() {
        let config = PollingConfig {
            timeout_secs: 40,
            initial_offset: 500,
            failure_policy: FailurePolicy::Continue,
            ..Default::default()
        };

        let poller = PollerBuilder::new(Bot::new(ScriptedCaller::new()))
            .config(&config)
            .limit(25)
            .build();

        assert_eq!(poller.offset(), 500);
        assert_eq!(poller.timeout, Duration::from_secs(40));
        assert_eq!(poller.limit, Some(25));
        assert_eq!(poller.failure_policy, FailurePolicy::Continue);
    }

    #[test]
    fn every_polling_setting_reaches_the_poller() {
        let config = PollingConfig {
            allowed_updates: Some(vec![UpdateType::Message, UpdateType::ChatMember]),
            error_backoff_ms: 250,
            shutdown_timeout_secs: 5,
            advance_policy: AdvancePolicy::AfterHandlers,
            ..Default::default()
        };

        let poller = PollerBuilder::new(Bot::new(ScriptedCaller::new()))
            .config(&config)
            .build();

        assert_eq!(
            poller.allowed_updates,
            Some(vec![UpdateType::Message, UpdateType::ChatMember])
        );
        assert_eq!(poller.error_backoff, Duration::from_millis(250));
        assert_eq!(poller.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(poller.advance_policy, AdvancePolicy::AfterHandlers);
    }

    #[test]
    fn shared_token_stops_the_poller() {
        let token = CancellationToken::new();
        let poller = PollerBuilder::new(Bot::new(ScriptedCaller::new()))
            .shutdown_token(token.clone())
            .build();

        token.cancel();
        tokio_test::block_on(poller.shutdown_token().cancelled());
        assert!(poller.shutdown_token().is_cancelled());
    }
}

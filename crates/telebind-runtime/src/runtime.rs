//! Top-level orchestration: configuration, logging, transport, login and
//! the poll loop.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use telebind_runtime::TelebindRuntime;
//!
//! // Loads telebind.toml from the current directory plus TELEBIND_* variables
//! let mut runtime = TelebindRuntime::new();
//! runtime.handlers().on_message(echo);
//!
//! // Polls until Ctrl+C or SIGTERM
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{
    ConfigLoader, ConfigResult, TelebindConfig, validate_config, validate_polling_config,
};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::poller::Poller;
use telebind_api::Bot;
use telebind_api::params::DeleteWebhookParams;
use telebind_framework::{ErrorSink, HandlerRegistry};

/// Runs one bot from configuration.
///
/// Handlers are registered through [`handlers`](Self::handlers) before the
/// first run. Running takes `&self`, so [`stop`](Self::stop) can be called
/// from elsewhere while the loop is active.
pub struct TelebindRuntime {
    config: TelebindConfig,
    registry: HandlerRegistry,
    error_sink: Option<ErrorSink>,
    shutdown: CancellationToken,
    running: AtomicBool,
}

impl TelebindRuntime {
    /// Loads configuration from the current directory and the environment,
    /// then initializes logging.
    ///
    /// A configuration that fails to load is replaced by defaults; the
    /// missing token is then reported when the runtime starts.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                TelebindConfig::default()
            });

        Self::from_config(config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime and initializes logging from `config.logging`.
    pub fn from_config(config: TelebindConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            api_url = %config.bot.api_url,
            poll_timeout_secs = config.polling.timeout_secs,
            "Telebind runtime created"
        );

        Self::with_config(config)
    }

    /// Creates a runtime without touching the global subscriber.
    pub fn with_config(config: TelebindConfig) -> Self {
        Self {
            config,
            registry: HandlerRegistry::new(),
            error_sink: None,
            shutdown: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &TelebindConfig {
        &self.config
    }

    /// The registry the next run dispatches to.
    pub fn handlers(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Replaces the default sink, which logs handler failures.
    pub fn set_error_sink(&mut self, sink: ErrorSink) {
        self.error_sink = Some(sink);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Token cancelled by [`stop`](Self::stop).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops the active run. A stopped runtime does not poll again.
    pub fn stop(&self) {
        info!("Stopping runtime");
        self.shutdown.cancel();
    }

    /// Validates the configuration and builds an HTTP-backed client.
    #[cfg(feature = "http-client")]
    pub fn connect(&self) -> RuntimeResult<Bot> {
        validate_config(&self.config)?;
        let caller = telebind_transport::HttpApiCaller::new(self.config.bot.to_client_config())?;
        Ok(Bot::new(caller))
    }

    #[cfg(not(feature = "http-client"))]
    pub fn connect(&self) -> RuntimeResult<Bot> {
        validate_config(&self.config)?;
        Err(RuntimeError::NoTransport)
    }

    /// Prepares a poller: optional `deleteWebhook`, then `getMe`.
    ///
    /// `allowed_updates` falls back to the types the registered handlers
    /// care about when the configuration leaves it unset. Either way the
    /// list is sent explicitly.
    pub async fn start(&self, bot: Bot) -> RuntimeResult<Poller> {
        let polling = &self.config.polling;
        validate_polling_config(polling)?;

        if polling.delete_webhook_on_start {
            bot.delete_webhook(&DeleteWebhookParams::default())
                .await
                .map_err(|source| RuntimeError::Startup {
                    step: "deleteWebhook",
                    source,
                })?;
            info!("Webhook removed");
        }

        bot.login().await.map_err(|source| RuntimeError::Startup {
            step: "getMe",
            source,
        })?;

        let allowed_updates = polling
            .allowed_updates
            .clone()
            .unwrap_or_else(|| self.registry.allowed_updates());
        debug!(
            handlers = self.registry.len(),
            allowed_updates = ?allowed_updates,
            "Building poller"
        );

        let mut builder = Poller::builder(bot)
            .config(polling)
            .registry(self.registry.clone())
            .allowed_updates(allowed_updates)
            .shutdown_token(self.shutdown.child_token());
        if let Some(sink) = &self.error_sink {
            builder = builder.error_sink(sink.clone());
        }

        Ok(builder.build())
    }

    /// Runs until Ctrl+C, SIGTERM or [`stop`](Self::stop).
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Runs over HTTP until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let bot = self.connect()?;
        self.run_with_bot(bot, shutdown).await
    }

    /// Runs with a caller-supplied client until `shutdown` completes.
    ///
    /// Fails with [`RuntimeError::AlreadyRunning`] while another run of
    /// this runtime is active.
    pub async fn run_with_bot<F>(&self, bot: Bot, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let _running = RunningGuard::acquire(&self.running)?;
        tokio::pin!(shutdown);

        let mut poller = tokio::select! {
            poller = self.start(bot) => poller?,
            _ = &mut shutdown => {
                info!("Shutdown requested before polling started");
                return Ok(());
            }
            _ = self.shutdown.cancelled() => {
                info!("Runtime stopped before polling started");
                return Ok(());
            }
        };

        poller.run_until(shutdown).await
    }
}

impl Default for TelebindRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TelebindRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelebindRuntime")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Clears the running flag when a run ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> RuntimeResult<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return Err(RuntimeError::AlreadyRunning);
        }
        Ok(Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Completes on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM, waiting for Ctrl+C only");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Loads configuration, then creates a [`TelebindRuntime`].
///
/// ```rust,ignore
/// let runtime = TelebindRuntime::builder()
///     .config_file("deploy/telebind.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: TelebindConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Sets the bot token, overriding files and the environment.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.set("bot.token", token.into());
        self
    }

    pub fn build(self) -> ConfigResult<TelebindRuntime> {
        let config = self.config_loader.load()?;
        Ok(TelebindRuntime::from_config(config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::testing::{ScriptedCaller, message_update};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use telebind_api::Update;
    use telebind_core::ApiError;

    fn me() -> serde_json::Value {
        json!({"id": 1, "is_bot": true, "first_name": "Telebind", "username": "telebind_bot"})
    }

    async fn noop(_bot: Bot, _update: Arc<Update>) {}

    #[tokio::test]
    async fn run_logs_in_then_polls() {
        let caller = ScriptedCaller::new()
            .respond("getMe", Ok(me()))
            .batch(vec![message_update(3, "hi")]);

        let mut config = TelebindConfig::default();
        config.polling.delete_webhook_on_start = true;
        let mut runtime = TelebindRuntime::with_config(config);
        runtime.handlers().on_message(noop);
        caller.stop_when_exhausted(runtime.shutdown_token());

        runtime
            .run_with_bot(Bot::new(caller.clone()), std::future::pending())
            .await
            .unwrap();

        assert_eq!(
            caller.methods(),
            ["deleteWebhook", "getMe", "getUpdates", "getUpdates"]
        );
        assert_eq!(caller.offsets(), [0, 4]);
        assert_eq!(caller.requests()[0]["allowed_updates"], json!(["message"]));
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn configured_allowed_updates_win_over_registry() {
        let caller = ScriptedCaller::new().respond("getMe", Ok(me()));
        let mut config = TelebindConfig::default();
        config.polling.allowed_updates = Some(vec![telebind_api::UpdateType::CallbackQuery]);
        let mut runtime = TelebindRuntime::with_config(config);
        runtime.handlers().on_message(noop);
        caller.stop_when_exhausted(runtime.shutdown_token());

        runtime
            .run_with_bot(Bot::new(caller.clone()), std::future::pending())
            .await
            .unwrap();

        assert_eq!(
            caller.requests()[0]["allowed_updates"],
            json!(["callback_query"])
        );
    }

    #[tokio::test]
    async fn catch_all_handler_requests_every_known_type() {
        let caller = ScriptedCaller::new().respond("getMe", Ok(me()));
        let mut runtime = TelebindRuntime::with_config(TelebindConfig::default());
        runtime.handlers().add(noop).on_chat_member(noop);
        caller.stop_when_exhausted(runtime.shutdown_token());

        runtime
            .run_with_bot(Bot::new(caller.clone()), std::future::pending())
            .await
            .unwrap();

        assert_eq!(
            caller.requests()[0]["allowed_updates"],
            json!([
                "message",
                "edited_message",
                "channel_post",
                "edited_channel_post",
                "callback_query",
                "shipping_query",
                "pre_checkout_query",
                "poll",
                "poll_answer",
                "my_chat_member",
                "chat_member"
            ])
        );
    }

    #[tokio::test]
    async fn failed_login_is_a_startup_error() {
        let caller = ScriptedCaller::new()
            .respond("getMe", Err(ApiError::remote("Unauthorized", 401, None)));
        let runtime = TelebindRuntime::with_config(TelebindConfig::default());

        let err = runtime
            .run_with_bot(Bot::new(caller.clone()), std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::Startup { step: "getMe", .. }));
        assert_eq!(err.api_error().and_then(ApiError::error_code), Some(401));
        assert_eq!(caller.methods(), ["getMe"]);
    }

    #[tokio::test]
    async fn invalid_polling_config_is_rejected_before_any_call() {
        let caller = ScriptedCaller::new();
        let mut config = TelebindConfig::default();
        config.polling.limit = Some(500);
        let runtime = TelebindRuntime::with_config(config);

        let err = runtime
            .run_with_bot(Bot::new(caller.clone()), std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::Config(ConfigError::ValidationError { .. })));
        assert!(caller.methods().is_empty());
    }

    #[tokio::test]
    async fn second_concurrent_run_is_refused() {
        let caller = ScriptedCaller::new().respond("getMe", Ok(me()));
        let runtime = TelebindRuntime::with_config(TelebindConfig::default());

        let first = runtime.run_with_bot(
            Bot::new(caller.clone()),
            tokio::time::sleep(Duration::from_millis(50)),
        );
        let second = async {
            tokio::task::yield_now().await;
            runtime
                .run_with_bot(Bot::new(caller.clone()), std::future::pending())
                .await
        };

        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert!(matches!(second, Err(RuntimeError::AlreadyRunning)));
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn stop_ends_the_run() {
        let caller = ScriptedCaller::new().respond("getMe", Ok(me()));
        let runtime = TelebindRuntime::with_config(TelebindConfig::default());

        let run = runtime.run_with_bot(Bot::new(caller.clone()), std::future::pending());
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            runtime.stop();
        };
        let (result, ()) = tokio::join!(run, stopper);

        result.unwrap();
        assert_eq!(caller.offsets(), [0]);
    }

    #[test]
    fn connect_validates_configuration() {
        let runtime = TelebindRuntime::with_config(TelebindConfig::default());
        assert!(matches!(
            runtime.connect(),
            Err(RuntimeError::Config(ConfigError::MissingField { .. }))
        ));
    }

    #[test]
    fn builder_token_overrides_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let runtime = RuntimeBuilder::new()
            .without_env()
            .search_path(dir.path())
            .token("5:from-builder")
            .build()
            .unwrap();

        assert_eq!(runtime.config().bot.token, "5:from-builder");
    }
}

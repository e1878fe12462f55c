//! # telebind
//!
//! An async Telegram Bot API client with a long-poll update loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐  getUpdates(offset)  ┌─────────┐
//! │      Poller      │─────────────────────▶│ Bot API │
//! │ (offset cursor)  │◀─────────────────────│         │
//! └────────┬─────────┘       batch          └─────────┘
//!          │ one task per (update, matching handler)
//!          ▼
//! ┌──────────────────┐      ┌──────────────────────────────┐
//! │ UpdateDispatcher │─────▶│ handler(Bot, Arc<Update>)    │──▶ bot.send_message(..)
//! │                  │─────▶│ handler(Bot, Arc<Update>)    │──▶ ...
//! └──────────────────┘      └──────────────────────────────┘
//! ```
//!
//! - **core**: the `ApiCaller` seam, response envelope and error taxonomy
//! - **transport**: the reqwest-backed HTTP caller
//! - **api**: the data model, per-method parameters and the typed [`Bot`](api::Bot)
//! - **framework**: handlers, filters, the registry and the dispatcher
//! - **runtime**: the poller, configuration, logging and [`TelebindRuntime`](runtime::TelebindRuntime)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use telebind::prelude::*;
//!
//! async fn echo(bot: Bot, update: Arc<Update>) -> Result<(), ApiError> {
//!     if let Some(message) = update.message()
//!         && let Some(text) = message.text.as_deref()
//!     {
//!         bot.send_message(&message.reply(text)).await?;
//!     }
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = TelebindRuntime::new();
//!     runtime.handlers().on_message(echo);
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `http-client` *(default)*: the reqwest transport

pub use telebind_api as api;
pub use telebind_core as core;
pub use telebind_framework as framework;
pub use telebind_runtime as runtime;
pub use telebind_transport as transport;

/// Commonly used types for building a bot:
///
/// ```rust,ignore
/// use telebind::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime
    pub use telebind_runtime::{
        AdvancePolicy, FailurePolicy, Poller, RuntimeError, TelebindConfig, TelebindRuntime,
    };

    // Routing
    pub use telebind_framework::{HandlerFailure, HandlerRegistry, UpdateFilter};

    // Client and model
    pub use telebind_api::params::{
        AnswerCallbackQueryParams, EditMessageTextParams, MessageRef, SendMessageParams,
    };
    pub use telebind_api::{
        Bot, CallbackQuery, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, Message,
        ParseMode, ReplyMarkup, Update, UpdateKind, UpdateType, User, inline_row,
    };

    // Errors
    pub use telebind_core::{ApiError, ApiResult};

    // Logging
    pub use telebind_runtime::prelude::*;
}

//! # telebind API
//!
//! The Telegram Bot API as Rust types:
//!
//! - [`model`]: objects the service sends and accepts ([`Update`], [`Message`], keyboards, ...)
//! - [`params`]: one parameter record per remote method
//! - [`Bot`]: the client, one typed async method per remote method
//!
//! Updates decode into [`UpdateKind`], a closed sum of the modelled variants
//! plus [`UpdateKind::Unknown`] for anything newer; handlers match on
//! [`UpdateType`] rather than inspecting payloads.

pub mod bot;
pub mod model;
pub mod params;

pub use bot::Bot;
pub use model::{
    CallbackQuery, Chat, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, Message, ReplyMarkup,
    Update, UpdateKind, UpdateType, User, inline_row,
};
pub use params::{ParseMode, SendMessageParams};

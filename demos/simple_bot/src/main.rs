//! Simple Bot
//!
//! `/start` sends a greeting with an inline keyboard. The first button is a
//! callback that swaps the text for another one with a "Go back" button; the
//! other two open web pages.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package simple-bot -- --token 123:abc
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use telebind::prelude::*;
use tracing::{debug, warn};

const GREETING: &str = "<b>Hello World</b>";
const CALLBACK_TEXT: &str = "This is a cool callback";

#[derive(Debug, Parser)]
#[command(about = "Greets with an inline keyboard and handles its callbacks")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    token: Option<String>,
}

fn start_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        inline_row([InlineKeyboardButton::callback("I'm a button", "/callback")]),
        inline_row([
            InlineKeyboardButton::url("This is Google", "https://google.it"),
            InlineKeyboardButton::url("This is DuckDuckGo", "https://duckduckgo.com"),
        ]),
    ])
}

fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([inline_row([InlineKeyboardButton::callback(
        "Go back", "/back",
    )])])
}

async fn on_message(bot: Bot, update: Arc<Update>) -> Result<(), ApiError> {
    let Some(message) = update.message() else {
        return Ok(());
    };

    let reply = match message.text.as_deref() {
        Some("/start") => message.reply(GREETING).reply_markup(start_keyboard()),
        _ => message.reply("Unrecognised <i>command</i>, try with /start"),
    };
    bot.send_message(&reply).await?;
    Ok(())
}

async fn on_callback(bot: Bot, update: Arc<Update>) -> Result<(), ApiError> {
    let Some(query) = update.callback_query() else {
        return Ok(());
    };
    bot.answer_callback_query(&query.answer("", false)).await?;

    let Some(message) = query.message.as_deref() else {
        debug!(query_id = %query.id, "Callback from an inline message, nothing to edit");
        return Ok(());
    };

    let edit = match query.data.as_deref() {
        Some("/callback") => message.edit_text(CALLBACK_TEXT).reply_markup(back_keyboard()),
        Some("/back") => message.edit_text(GREETING).reply_markup(start_keyboard()),
        other => {
            warn!(data = ?other, "Unexpected callback data");
            return Ok(());
        }
    };
    bot.edit_message_text(&edit).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = TelebindRuntime::builder();
    if let Some(path) = args.config {
        builder = builder.config_file(path);
    }
    if let Some(token) = args.token {
        builder = builder.token(token);
    }
    let mut runtime = builder.build()?;

    runtime
        .handlers()
        .on_message(on_message)
        .on_callback_query(on_callback);

    runtime.run().await?;
    Ok(())
}

//! Echo Bot
//!
//! Replies to every text message with the same text.
//!
//! # Usage
//!
//! ```bash
//! TELEBIND_BOT__TOKEN=123:abc cargo run --package echo-bot
//! cargo run --package echo-bot -- --token 123:abc --config telebind.toml
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use telebind::prelude::*;
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Replies to every message with its own text")]
struct Args {
    /// Configuration file; defaults to telebind.toml in the working directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bot token; overrides the configuration file and environment.
    #[arg(short, long)]
    token: Option<String>,
}

async fn log_message(_bot: Bot, update: Arc<Update>) {
    if let Some(message) = update.message() {
        let sender = message
            .from
            .as_ref()
            .map(|user| user.first_name.as_str())
            .unwrap_or("unknown");
        info!(
            chat_id = message.chat.id,
            "{}: {}",
            sender,
            message.text_or_caption().unwrap_or_default()
        );
    }
}

async fn echo(bot: Bot, update: Arc<Update>) -> Result<(), ApiError> {
    if let Some(message) = update.message()
        && let Some(text) = message.text.as_deref()
    {
        bot.send_message(&message.reply(text).parse_mode(None)).await?;
    }
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

    runtime.handlers().on_message(log_message).on_message(echo);

    runtime.run().await?;
    info!("Echo bot stopped");
    Ok(())
}

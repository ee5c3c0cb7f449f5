//! Relay Bot Example
//!
//! Feeds chat messages from stdin into the hookwire router and prints the
//! replies the router would post back into the room.
//!
//! Each stdin line is either a JSON-encoded [`InboundEvent`] or plain text,
//! which is wrapped as a message from `--user` in `--room`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package relay-bot -- \
//!     --template gmail-sender=https://hook.eu1.make.com/abc123
//! ```
//!
//! Then type the template's sample message:
//!
//! ```text
//! @make gmail to:team@company.com subject:Meeting Notes body:Here are the notes from today's meeting...
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use hookwire::core::{BoxedChatSender, ChatError, ChatResult, now_millis};
use hookwire::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "relay-bot", version, about = "Route chat lines to automation webhooks")]
struct Args {
    /// Configuration file (defaults to config.toml in the search paths)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile
    #[arg(short, long)]
    profile: Option<String>,

    /// Legacy task webhook URL
    #[arg(long)]
    legacy_url: Option<String>,

    /// Sender used for plain-text lines and as the rule creator
    #[arg(short, long, default_value = "@relay:localhost")]
    user: String,

    /// Room used for plain-text lines and template scopes
    #[arg(short, long, default_value = "!demo:localhost")]
    room: String,

    /// Scope templates to `--room` instead of every room
    #[arg(long)]
    scoped: bool,

    /// Registers a webhook from a built-in template, as `TEMPLATE=URL`
    #[arg(short, long = "template", value_name = "TEMPLATE=URL")]
    templates: Vec<String>,
}

/// Prints replies to stdout.
struct StdoutChat;

#[async_trait]
impl ChatSender for StdoutChat {
    async fn send_message(&self, room_id: &str, body: &str) -> ChatResult<()> {
        let line = format!("[{room_id}] {body}\n");
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ChatError::send_failed(room_id, e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| ChatError::send_failed(room_id, e.to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout only carries replies.
    let mut builder = HookwireRuntime::builder().set("logging.output", "stderr");
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    if let Some(url) = &args.legacy_url {
        builder = builder.set("legacy.webhook_url", url);
    }
    let runtime = builder.build().context("failed to start hookwire")?;

    let scope = args.scoped.then_some(args.room.as_str());
    for entry in &args.templates {
        let (template, url) = entry
            .split_once('=')
            .with_context(|| format!("expected TEMPLATE=URL, got '{entry}'"))?;
        let rule = runtime
            .registry()
            .add_from_template(template, url, &args.user, scope)?;
        info!(id = %rule.id, service = %rule.service, "Registered webhook");
    }

    let (events, inbox) = runtime.event_channel();
    tokio::spawn(read_stdin(events, args.user, args.room));

    let chat: BoxedChatSender = Arc::new(StdoutChat);
    let stats = runtime.run(chat, inbox).await?;
    info!(
        received = stats.received,
        routed = stats.routed,
        dropped = stats.dropped,
        rooms = stats.rooms,
        "Relay bot stopped"
    );
    Ok(())
}

/// Forwards stdin lines as events until EOF.
async fn read_stdin(events: mpsc::Sender<InboundEvent>, user: String, room: String) {
    let mut counter = 0u64;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = if line.starts_with('{') {
            match serde_json::from_str::<InboundEvent>(line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed event");
                    continue;
                }
            }
        } else {
            counter += 1;
            InboundEvent::message(format!("$stdin-{counter}"), &room, &user, line, now_millis())
        };

        if events.send(event).await.is_err() {
            break;
        }
    }
}

//! Echo Bot Demo
//!
//! A self-contained demonstration of the Switchboard engine. All three
//! collaborators are in-process: a loopback transport fed from a channel, a
//! chat client that logs outbound messages, and an identity resolver that
//! knows no bots. The demo registers a handful of commands, feeds a scripted
//! conversation through the loop, and shuts down.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use switchboard::logging::LoggingBuilder;
use switchboard::prelude::*;
use switchboard_core::{
    ApiEnvelope, BotProfile, Envelope, IdentityError, IdentityResult, InnerEvent, MessagePayload,
    PostOptions, TransportResult,
};

/// Replays events pushed through an in-process channel.
struct LoopbackTransport {
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<RawEvent>>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn next_event(&self) -> Option<RawEvent> {
        self.events.lock().await.recv().await
    }

    async fn acknowledge(&self, envelope: &Envelope) -> TransportResult<()> {
        debug!(envelope = %envelope.id, "acknowledged");
        Ok(())
    }
}

/// Logs outbound messages instead of delivering them anywhere.
struct ConsoleChat;

#[async_trait]
impl ChatApi for ConsoleChat {
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        _options: &PostOptions,
    ) -> TransportResult<String> {
        info!(channel = %channel_id, "bot says: {text}");
        Ok("0.0".into())
    }
}

/// An identity resolver that recognizes no bots.
struct NoBots;

#[async_trait]
impl IdentityApi for NoBots {
    async fn bot_info(&self, bot_id: &str) -> IdentityResult<BotProfile> {
        Err(IdentityError::NotFound(bot_id.to_string()))
    }
}

fn user_message(user: &str, text: &str) -> RawEvent {
    RawEvent::Api(ApiEnvelope {
        envelope: Envelope::new(format!("demo-{user}-{}", text.len())),
        inner: InnerEvent::Message(MessagePayload {
            user_id: user.into(),
            channel_id: "general".into(),
            text: text.into(),
            ts: "0.0".into(),
            thread_ts: None,
            bot_id: None,
        }),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    LoggingBuilder::new()
        .with_level(tracing::Level::DEBUG)
        .directive("switchboard=debug")
        .init();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport {
        events: tokio::sync::Mutex::new(events_rx),
    });
    let chat: Arc<dyn ChatApi> = Arc::new(ConsoleChat);
    let identity: Arc<dyn IdentityApi> = Arc::new(NoBots);

    let engine = Switchboard::builder(transport, chat, identity)
        .default_message(|_, _, response| async move {
            let _ = response
                .reply("I didn't catch that; try `help`.", ReplyOptions::default())
                .await;
        })
        .build();

    engine.command(
        "ping",
        CommandDefinition::new(|_, _, response| async move {
            let _ = response.reply("pong", ReplyOptions::default()).await;
        })
        .description("check that the bot is alive"),
    );

    engine.command(
        "echo <words>",
        CommandDefinition::new(|_, request, response| async move {
            let words = request.properties().string_or("words", "");
            let _ = response.reply(&words, ReplyOptions::default()).await;
        })
        .description("repeat a phrase")
        .example("echo hello world"),
    );

    engine.command(
        "ban <user> for <reason>",
        CommandDefinition::new(|_, request, response| async move {
            let user = request.properties().string_or("user", "someone");
            let reason = request.properties().string_or("reason", "reasons");
            let _ = response
                .reply(&format!("banned {user}: {reason}"), ReplyOptions::threaded())
                .await;
        })
        .description("ban a user")
        .example("ban alice for spamming")
        .authorize(|ctx, _| ctx.event().is_some_and(|event| event.user_id == "U-admin")),
    );

    // Registered last so the pre-rendered listing covers everything above.
    let help_text = engine.help_message();
    engine.command(
        "help",
        CommandDefinition::new(move |_, _, response| {
            let help_text = help_text.clone();
            async move {
                let _ = response.reply(&help_text, ReplyOptions::default()).await;
            }
        })
        .hide_help(),
    );

    let mut records = engine
        .command_events()
        .context("records receiver already taken")?;
    tokio::spawn(async move {
        while let Some(record) = records.recv().await {
            debug!(usage = %record.usage, user = %record.event.user_id, "command dispatched");
        }
    });

    let cancel = CancellationToken::new();
    let loop_handle = tokio::spawn(Arc::clone(&engine).run(cancel.clone()));

    for (user, text) in [
        ("U-guest", "ping"),
        ("U-guest", "echo good morning"),
        ("U-guest", "ban bob for trolling"),
        ("U-admin", "ban bob for trolling"),
        ("U-guest", "help"),
        ("U-guest", "what can you do?"),
    ] {
        events_tx.send(user_message(user, text))?;
    }

    // Give the detached handlers a moment, then shut the loop down.
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    loop_handle.await?;

    Ok(())
}

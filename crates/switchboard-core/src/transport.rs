//! Boundary-collaborator traits.
//!
//! The dispatch engine never owns a wire protocol. Everything it needs from
//! the outside world is expressed through three object-safe traits:
//!
//! - [`Transport`] — the persistent connection that yields raw events and
//!   accepts acknowledgements. Reconnect, heartbeat, and retry policy all
//!   live behind this trait.
//! - [`ChatApi`] — outbound message posting.
//! - [`IdentityApi`] — resolving whether a sender bot belongs to this app.
//!
//! Concrete implementations are supplied by the embedder; the engine only
//! holds `Arc<dyn …>` handles.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{IdentityResult, TransportResult};
use crate::event::{Envelope, RawEvent};

/// The persistent event-producing connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Pulls the next raw event from the connection.
    ///
    /// Returns `None` once the event stream has closed; a closed stream never
    /// restarts, and the dispatch loop exits when it sees `None`.
    async fn next_event(&self) -> Option<RawEvent>;

    /// Acknowledges an event envelope back to the service.
    async fn acknowledge(&self, envelope: &Envelope) -> TransportResult<()>;
}

/// Named options for an outbound post.
///
/// All fields default to empty; callers set only what they need.
#[derive(Debug, Clone, Default)]
pub struct PostOptions {
    /// Legacy-style attachments, passed through verbatim.
    pub attachments: Vec<Value>,
    /// Rich layout blocks, passed through verbatim.
    pub blocks: Vec<Value>,
    /// When set, the message is threaded under this timestamp.
    pub thread_ts: Option<String>,
}

impl PostOptions {
    /// Options that thread the message under `ts`.
    pub fn in_thread(ts: impl Into<String>) -> Self {
        Self {
            thread_ts: Some(ts.into()),
            ..Self::default()
        }
    }
}

/// The outbound messaging collaborator.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Posts a message to a channel, returning the service timestamp of the
    /// posted message.
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        options: &PostOptions,
    ) -> TransportResult<String>;
}

/// Identity information for a bot sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotProfile {
    /// The bot identifier.
    pub id: String,
    /// The application the bot belongs to.
    pub app_id: String,
    /// Display name, when known.
    pub name: String,
}

/// The bot-identity lookup collaborator.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Resolves the profile of the bot with the given identifier.
    async fn bot_info(&self, bot_id: &str) -> IdentityResult<BotProfile>;
}

/// Connection credentials and tuning for concrete collaborator
/// implementations.
///
/// The engine itself never dials anything; this is the named-option surface
/// an embedder uses when constructing its transport and chat clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bot-level API token.
    pub bot_token: String,
    /// App-level (socket) token.
    pub app_token: String,
    /// Overrides the service's default API base URL.
    pub api_url: Option<String>,
    /// Enables verbose wire-level logging in collaborator implementations.
    pub debug: bool,
}

impl ClientConfig {
    /// Creates a config with the two required tokens and default options.
    pub fn new(bot_token: impl Into<String>, app_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            app_token: app_token.into(),
            api_url: None,
            debug: false,
        }
    }

    /// Overrides the API base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Enables debug logging in collaborators.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

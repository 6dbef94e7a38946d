//! Raw and canonical event models.
//!
//! The transport collaborator yields [`RawEvent`]s. Classification over that
//! enum is total: every raw event is exactly one of a lifecycle signal, an
//! API envelope carrying an inner event, a slash-style command, an
//! interactive callback, or an unknown payload. Message-shaped events are
//! normalized into a single canonical [`MessageEvent`] so the dispatch engine
//! never cares which transport shape a message arrived in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The originating request handle for events that require a transport-level
/// acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Opaque identifier assigned by the remote service.
    pub id: String,
}

impl Envelope {
    /// Creates an envelope with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Connection lifecycle signals emitted by the transport.
///
/// These drive logging and telemetry only; reconnection is the transport's
/// responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleSignal {
    /// A connection attempt has started.
    Connecting,
    /// The connection is established.
    Connected,
    /// The connection attempt failed; the transport will retry.
    ConnectionError {
        /// Human-readable failure reason.
        reason: String,
    },
    /// The service greeted the connection and assigned an app identifier.
    Hello {
        /// The service-assigned application identifier, recorded for
        /// bot-loop suppression.
        app_id: String,
    },
}

/// A message-shaped payload carried by an inner API event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Sender identity.
    pub user_id: String,
    /// Channel the message was posted in.
    pub channel_id: String,
    /// Raw message text.
    pub text: String,
    /// Service timestamp of the message.
    pub ts: String,
    /// Timestamp of the parent message, when threaded.
    #[serde(default)]
    pub thread_ts: Option<String>,
    /// Present when the message was produced by a bot.
    #[serde(default)]
    pub bot_id: Option<String>,
}

/// The domain sub-type carried inside an API envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InnerEvent {
    /// An ordinary channel message.
    Message(MessagePayload),
    /// A message that mentions the app directly.
    AppMention(MessagePayload),
    /// Any other inner event; forwarded to the default inner-event handler.
    Other {
        /// The sub-type name reported by the service.
        kind: String,
        /// The raw payload.
        payload: Value,
    },
}

/// An API event together with the envelope that must be acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    /// The acknowledgement handle.
    pub envelope: Envelope,
    /// The inner domain event.
    pub inner: InnerEvent,
}

/// A slash-style command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashCommand {
    /// The acknowledgement handle.
    pub envelope: Envelope,
    /// Sender identity.
    pub user_id: String,
    /// Channel the command was issued in.
    pub channel_id: String,
    /// The command name, including its leading slash.
    pub command: String,
    /// Everything the user typed after the command name.
    pub text: String,
    /// Service timestamp of the invocation.
    pub ts: String,
}

/// A single action reference inside an interactive callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    /// The action identifier the embedder attached to the interactive
    /// element, matched against a command's interactive-action binding.
    pub action_id: String,
    /// The surrounding block identifier, when present.
    #[serde(default)]
    pub block_id: Option<String>,
    /// The submitted value, when present.
    #[serde(default)]
    pub value: Option<String>,
}

/// An interactive callback (button press, select, and so on).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionCallback {
    /// The acknowledgement handle, when the transport requires one. The
    /// interactive handler is responsible for acknowledging it.
    #[serde(default)]
    pub envelope: Option<Envelope>,
    /// The user who triggered the interaction.
    pub user_id: String,
    /// The channel the interaction originated in, when known.
    #[serde(default)]
    pub channel_id: Option<String>,
    /// The actions carried by the callback.
    pub actions: Vec<ActionRef>,
    /// The raw callback payload.
    #[serde(default)]
    pub payload: Value,
}

/// A raw inbound event as produced by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawEvent {
    /// Connection lifecycle signal.
    Lifecycle(LifecycleSignal),
    /// An API event wrapped in an acknowledgeable envelope.
    Api(ApiEnvelope),
    /// A slash-style command invocation.
    SlashCommand(SlashCommand),
    /// An interactive callback.
    Interactive(InteractionCallback),
    /// Anything the classifier does not recognize.
    Unknown(Value),
}

/// The canonical, normalized view of any message-shaped inbound event.
///
/// Ownership transfers to the execution context built for the event; the
/// engine constructs exactly one per inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Sender identity.
    pub user_id: String,
    /// Channel the message belongs to.
    pub channel_id: String,
    /// Raw text, prior to sanitation.
    pub text: String,
    /// Service timestamp of the message.
    pub ts: String,
    /// Timestamp of the parent message, when threaded.
    pub thread_ts: Option<String>,
    /// Present when the message was produced by a bot.
    pub bot_id: Option<String>,
    /// Acknowledgement handle, when the originating shape requires one.
    pub envelope: Option<Envelope>,
}

impl MessageEvent {
    /// Normalizes an inner API message payload.
    pub fn from_payload(payload: MessagePayload) -> Self {
        Self {
            user_id: payload.user_id,
            channel_id: payload.channel_id,
            text: payload.text,
            ts: payload.ts,
            thread_ts: payload.thread_ts,
            bot_id: payload.bot_id,
            envelope: None,
        }
    }

    /// Normalizes a slash command. The command name loses its leading slash
    /// so that `/ban alice` matches the same `ban <user>` pattern a plain
    /// message would.
    pub fn from_slash(command: SlashCommand) -> Self {
        let name = command.command.trim_start_matches('/');
        let text = if command.text.is_empty() {
            name.to_string()
        } else {
            format!("{} {}", name, command.text)
        };
        Self {
            user_id: command.user_id,
            channel_id: command.channel_id,
            text,
            ts: command.ts,
            thread_ts: None,
            bot_id: None,
            envelope: Some(command.envelope),
        }
    }

    /// Whether this event was produced by a bot.
    pub fn is_bot(&self) -> bool {
        self.bot_id.is_some()
    }
}

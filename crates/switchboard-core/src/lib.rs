//! # Switchboard Core
//!
//! Foundation types for the Switchboard chat command-dispatch engine.
//!
//! This crate carries everything the engine crate builds on top of:
//!
//! - **Event model** — the raw event alphabet produced by the transport and
//!   the canonical [`MessageEvent`] every message-shaped event normalizes to
//!   ([`event`]).
//! - **Usage patterns** — the tokenizer and all-or-nothing matcher that turn
//!   `"ban <user> for <reason>"` into ordered tokens and extract parameter
//!   bindings ([`token`], [`properties`]).
//! - **Boundary traits** — the transport, outbound messaging, and
//!   bot-identity collaborators the engine consumes but never implements
//!   ([`transport`]).
//! - **Error taxonomy** — `thiserror` families per collaborator ([`error`]).
//!
//! The wire protocol of the remote service deliberately lives behind the
//! [`Transport`] trait; this crate owns no file or wire format.

pub mod error;
pub mod event;
pub mod properties;
pub mod token;
pub mod transport;

pub use error::{IdentityError, IdentityResult, TransportError, TransportResult};
pub use event::{
    ActionRef, ApiEnvelope, Envelope, InnerEvent, InteractionCallback, LifecycleSignal,
    MessageEvent, MessagePayload, RawEvent, SlashCommand,
};
pub use properties::Properties;
pub use token::{PARAMETER_SENTINEL, Token, match_tokens, tokenize};
pub use transport::{BotProfile, ChatApi, ClientConfig, IdentityApi, PostOptions, Transport};

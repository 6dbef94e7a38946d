//! Switchboard is a command-dispatch engine for chat bots.
//!
//! An embedder registers commands as human-readable usage patterns such as
//! `ban <user> for <reason>`, connects the engine to a transport, and the
//! engine routes each incoming message to the first registered command whose
//! pattern matches, with parameter words extracted into typed bindings.
//!
//! # Event flow
//!
//! ```text
//!   transport ──> run() ──> route() ─┬─ lifecycle ── log / record app id
//!                                    ├─ message ──── spawn ── dispatch_message()
//!                                    ├─ slash ────── spawn ── dispatch_message()
//!                                    ├─ interactive  spawn ── dispatch_interaction()
//!                                    └─ unknown ──── default handler
//! ```
//!
//! `dispatch_message` runs suppression, sanitization, first-match-wins
//! matching, the authorization gate, best-effort record publication, and
//! finally the handler. Handlers receive three capabilities: a
//! [`BotContext`], a [`Request`] carrying the extracted [`Properties`], and
//! a [`ResponseWriter`].
//!
//! # Example
//!
//! ```rust,ignore
//! use switchboard::{CommandDefinition, ReplyOptions, Switchboard};
//!
//! let engine = Switchboard::builder(transport, chat, identity).build();
//! engine.command(
//!     "echo <words>",
//!     CommandDefinition::new(|_ctx, request, response| async move {
//!         let words = request.properties().string_or("words", "");
//!         let _ = response.reply(&words, ReplyOptions::default()).await;
//!     })
//!     .description("repeat a phrase"),
//! );
//! engine.run(cancel).await;
//! ```

pub mod command;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod help;
pub mod logging;
pub mod registry;
pub mod response;

pub use command::{
    AuthorizationFn, BotCommand, Command, CommandDefinition, CommandFactory, CommandHandler,
    InteractiveHandler, default_command_factory,
};
pub use config::{
    BotInteractionMode, EngineConfig, ErrorCallback, InitFn, InnerEventHandler, SanitizerFn,
    UnknownEventHandler, default_sanitizer,
};
pub use context::{
    BotContext, BotContextFactory, DefaultBotContext, DefaultRequest, InteractiveContextFactory,
    Request, RequestFactory, default_context_factory, default_interactive_context_factory,
    default_request_factory,
};
pub use engine::{DispatchRecord, Switchboard, SwitchboardBuilder};
pub use error::{EngineError, ResponseError};
pub use help::render_help;
pub use registry::CommandRegistry;
pub use response::{
    ReplyOptions, ReportOptions, Response, ResponseFactory, ResponseWriter,
    default_response_factory,
};

pub use switchboard_core as core;
pub use switchboard_core::{Properties, Token, match_tokens, tokenize};

/// Commonly used items for embedders.
pub mod prelude {
    pub use crate::command::{Command, CommandDefinition};
    pub use crate::config::BotInteractionMode;
    pub use crate::context::{BotContext, Request};
    pub use crate::engine::{DispatchRecord, Switchboard, SwitchboardBuilder};
    pub use crate::response::{ReplyOptions, ReportOptions, ResponseWriter};
    pub use switchboard_core::{
        ChatApi, ClientConfig, IdentityApi, MessageEvent, Properties, RawEvent, Transport,
    };
}

//! Engine configuration.
//!
//! Every knob is a named option with a default; the embedder sets what it
//! needs through [`SwitchboardBuilder`](crate::SwitchboardBuilder). The
//! extensible roles (context, request, response, command) are strategies
//! with default implementations rather than assignable fields.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use switchboard_core::{ClientConfig, Envelope};

use crate::command::{CommandFactory, CommandHandler, InteractiveHandler, default_command_factory};
use crate::context::{
    BotContextFactory, InteractiveContextFactory, RequestFactory, default_context_factory,
    default_interactive_context_factory, default_request_factory,
};
use crate::error::EngineError;
use crate::response::{ResponseFactory, default_response_factory};

/// How the engine treats events that originate from bots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BotInteractionMode {
    /// Process bot-originated events like any other event.
    #[default]
    IgnoreNone,
    /// Drop every bot-originated event unconditionally.
    IgnoreAll,
    /// Drop only events originating from this app, resolving the sender
    /// through the identity collaborator. A failed lookup drops the event;
    /// the engine never processes past a failed identity check.
    IgnoreOwnApp,
}

/// Text-cleanup transform applied before matching.
pub type SanitizerFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Callback spawned detached on every "connecting" lifecycle signal.
pub type InitFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Callback invoked when the engine encounters a reportable failure.
pub type ErrorCallback = Arc<dyn Fn(EngineError) + Send + Sync>;

/// Handler for raw events the classifier does not recognize.
pub type UnknownEventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Handler for inner API events with an unsupported sub-type.
pub type InnerEventHandler = Arc<dyn Fn(&str, Value, Envelope) + Send + Sync>;

/// The default sanitizer: normalizes non-breaking spaces to ordinary spaces.
pub fn default_sanitizer(text: &str) -> String {
    text.replace('\u{a0}', " ")
}

pub(crate) const DEFAULT_UNAUTHORIZED: &str =
    "you are not authorized to execute this command";

pub(crate) const DEFAULT_RECORDS_CAPACITY: usize = 100;

/// The assembled engine configuration.
#[derive(Clone)]
pub struct EngineConfig {
    /// Credentials for concrete collaborator implementations.
    pub client: Option<ClientConfig>,
    /// Bot-loop suppression mode.
    pub bot_interaction_mode: BotInteractionMode,
    /// Text-cleanup transform applied before matching.
    pub sanitizer: SanitizerFn,
    /// Message sent through the error-report capability on a rejected
    /// authorization check.
    pub unauthorized_error: String,
    /// Reportable-failure callback.
    pub on_error: Option<ErrorCallback>,
    /// Detached callback for each connection attempt.
    pub on_init: Option<InitFn>,
    /// Fallback handler when no command matches a message.
    pub default_message: Option<CommandHandler>,
    /// Fallback for unrecognized raw events.
    pub default_event: Option<UnknownEventHandler>,
    /// Fallback for unsupported inner API events.
    pub default_inner_event: Option<InnerEventHandler>,
    /// Fallback for interactive callbacks no command claims.
    pub default_interactive: Option<InteractiveHandler>,
    /// Message execution-context strategy.
    pub context_factory: BotContextFactory,
    /// Interactive execution-context strategy.
    pub interactive_context_factory: InteractiveContextFactory,
    /// Request strategy.
    pub request_factory: RequestFactory,
    /// Response-writer strategy.
    pub response_factory: ResponseFactory,
    /// Command-construction strategy.
    pub command_factory: CommandFactory,
    /// Capacity of the bounded dispatch-record channel.
    pub records_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client: None,
            bot_interaction_mode: BotInteractionMode::default(),
            sanitizer: Arc::new(default_sanitizer),
            unauthorized_error: DEFAULT_UNAUTHORIZED.to_string(),
            on_error: None,
            on_init: None,
            default_message: None,
            default_event: None,
            default_inner_event: None,
            default_interactive: None,
            context_factory: default_context_factory(),
            interactive_context_factory: default_interactive_context_factory(),
            request_factory: default_request_factory(),
            response_factory: default_response_factory(),
            command_factory: default_command_factory(),
            records_capacity: DEFAULT_RECORDS_CAPACITY,
        }
    }
}

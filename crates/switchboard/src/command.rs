//! Command definitions and the [`Command`] trait.
//!
//! A command binds a usage pattern to an async handler plus optional
//! metadata: an authorization predicate, an interactive-action binding, a
//! description and examples for help synthesis, and a help-visibility flag.
//! The token sequence is derived exactly once, when the command is
//! constructed; commands are immutable after registration.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::debug;

use switchboard_core::{InteractionCallback, Properties, Token, match_tokens, tokenize};

use crate::context::{BotContext, Request};
use crate::response::ResponseWriter;

/// An async message handler.
pub type CommandHandler = Arc<
    dyn Fn(Arc<dyn BotContext>, Arc<dyn Request>, Arc<dyn ResponseWriter>) -> BoxFuture<'static, ()>
        + Send
        + Sync,
>;

/// An async interactive-action handler.
pub type InteractiveHandler =
    Arc<dyn Fn(Arc<dyn BotContext>, InteractionCallback) -> BoxFuture<'static, ()> + Send + Sync>;

/// An authorization predicate evaluated before the handler runs.
pub type AuthorizationFn = Arc<dyn Fn(&dyn BotContext, &dyn Request) -> bool + Send + Sync>;

/// Everything a command carries besides its usage pattern.
#[derive(Clone)]
pub struct CommandDefinition {
    /// Short description rendered by help synthesis.
    pub description: String,
    /// Example invocations rendered by help synthesis.
    pub examples: Vec<String>,
    /// Excludes the command from help synthesis.
    pub hide_help: bool,
    /// Binds the command to interactive callbacks carrying this action id.
    pub action_id: Option<String>,
    /// Gate evaluated before the handler; rejection reports the configured
    /// unauthorized error and the handler never runs.
    pub authorize: Option<AuthorizationFn>,
    /// The message handler.
    pub handler: CommandHandler,
    /// The interactive handler, when the command participates in
    /// interactive flows.
    pub interactive: Option<InteractiveHandler>,
}

impl CommandDefinition {
    /// Creates a definition around a message handler.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Arc<dyn BotContext>, Arc<dyn Request>, Arc<dyn ResponseWriter>) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            description: String::new(),
            examples: Vec::new(),
            hide_help: false,
            action_id: None,
            authorize: None,
            handler: Arc::new(move |ctx, request, response| {
                Box::pin(handler(ctx, request, response))
            }),
            interactive: None,
        }
    }

    /// Sets the help description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds an example invocation.
    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    /// Hides the command from help synthesis.
    pub fn hide_help(mut self) -> Self {
        self.hide_help = true;
        self
    }

    /// Installs an authorization predicate.
    pub fn authorize<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn BotContext, &dyn Request) -> bool + Send + Sync + 'static,
    {
        self.authorize = Some(Arc::new(predicate));
        self
    }

    /// Binds the command to an interactive action identifier.
    pub fn action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    /// Installs an interactive handler.
    pub fn interactive<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<dyn BotContext>, InteractionCallback) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.interactive = Some(Arc::new(move |ctx, callback| {
            Box::pin(handler(ctx, callback))
        }));
        self
    }
}

/// A registered command.
///
/// The default implementation is [`BotCommand`]; embedders can substitute
/// their own through the engine's command factory.
#[async_trait]
pub trait Command: Send + Sync {
    /// The usage pattern the command was registered under.
    fn usage(&self) -> &str;

    /// The command's definition.
    fn definition(&self) -> &CommandDefinition;

    /// The token sequence derived from the usage pattern.
    fn tokens(&self) -> &[Token];

    /// Matches sanitized input text, extracting parameter bindings.
    fn matches(&self, text: &str) -> Option<Properties>;

    /// Runs the message handler.
    async fn execute(
        &self,
        ctx: Arc<dyn BotContext>,
        request: Arc<dyn Request>,
        response: Arc<dyn ResponseWriter>,
    );

    /// Runs the interactive handler, if one is installed.
    async fn execute_interactive(&self, ctx: Arc<dyn BotContext>, callback: InteractionCallback);
}

/// The default [`Command`] implementation.
pub struct BotCommand {
    usage: String,
    tokens: Vec<Token>,
    definition: CommandDefinition,
}

impl BotCommand {
    /// Tokenizes the usage pattern and binds it to the definition.
    pub fn new(usage: impl Into<String>, definition: CommandDefinition) -> Self {
        let usage = usage.into();
        let tokens = tokenize(&usage);
        Self {
            usage,
            tokens,
            definition,
        }
    }
}

#[async_trait]
impl Command for BotCommand {
    fn usage(&self) -> &str {
        &self.usage
    }

    fn definition(&self) -> &CommandDefinition {
        &self.definition
    }

    fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    fn matches(&self, text: &str) -> Option<Properties> {
        match_tokens(&self.tokens, text)
    }

    async fn execute(
        &self,
        ctx: Arc<dyn BotContext>,
        request: Arc<dyn Request>,
        response: Arc<dyn ResponseWriter>,
    ) {
        (self.definition.handler)(ctx, request, response).await;
    }

    async fn execute_interactive(&self, ctx: Arc<dyn BotContext>, callback: InteractionCallback) {
        match &self.definition.interactive {
            Some(handler) => handler(ctx, callback).await,
            None => debug!(
                usage = %self.usage,
                "interactive callback matched a command without an interactive handler"
            ),
        }
    }
}

/// Strategy for constructing commands at registration time.
pub type CommandFactory =
    Arc<dyn Fn(String, CommandDefinition) -> Arc<dyn Command> + Send + Sync>;

/// The default command factory.
pub fn default_command_factory() -> CommandFactory {
    Arc::new(|usage, definition| {
        let command: Arc<dyn Command> = Arc::new(BotCommand::new(usage, definition));
        command
    })
}

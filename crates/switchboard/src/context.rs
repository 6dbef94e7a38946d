//! Per-event execution contexts and request views.
//!
//! A fresh context is built for every dispatched event and discarded when the
//! handler returns; the dispatch loop never waits for that to happen. The
//! context's lifetime token is the *loop's* token, not a per-handler one —
//! cancelling it stops consumption of new events but already-running handlers
//! are free to finish.
//!
//! Both roles here are extensible: the engine constructs contexts and
//! requests through factory strategies ([`BotContextFactory`],
//! [`RequestFactory`]) that default to [`DefaultBotContext`] and
//! [`DefaultRequest`] but can be replaced by the embedder at startup.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use switchboard_core::{ChatApi, InteractionCallback, MessageEvent, Properties, Transport};

/// The per-event execution context handed to handlers.
///
/// `event()` is `None` for synthesized contexts, such as interactive flows
/// that have no originating message event.
pub trait BotContext: Send + Sync {
    /// The cancellable lifetime shared with the dispatch loop.
    fn lifetime(&self) -> &CancellationToken;

    /// The canonical event this context was built for, if any.
    fn event(&self) -> Option<&MessageEvent>;

    /// The outbound messaging collaborator.
    fn chat(&self) -> &Arc<dyn ChatApi>;

    /// The transport collaborator, for acknowledgement from handlers that
    /// own their envelope (interactive flows).
    fn transport(&self) -> &Arc<dyn Transport>;
}

/// The default [`BotContext`] implementation.
pub struct DefaultBotContext {
    lifetime: CancellationToken,
    chat: Arc<dyn ChatApi>,
    transport: Arc<dyn Transport>,
    event: Option<Arc<MessageEvent>>,
}

impl DefaultBotContext {
    /// Creates a context bound to a canonical message event.
    pub fn for_message(
        lifetime: CancellationToken,
        chat: Arc<dyn ChatApi>,
        transport: Arc<dyn Transport>,
        event: Arc<MessageEvent>,
    ) -> Self {
        Self {
            lifetime,
            chat,
            transport,
            event: Some(event),
        }
    }

    /// Creates a synthesized context with no originating message event.
    pub fn for_interaction(
        lifetime: CancellationToken,
        chat: Arc<dyn ChatApi>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            lifetime,
            chat,
            transport,
            event: None,
        }
    }
}

impl BotContext for DefaultBotContext {
    fn lifetime(&self) -> &CancellationToken {
        &self.lifetime
    }

    fn event(&self) -> Option<&MessageEvent> {
        self.event.as_deref()
    }

    fn chat(&self) -> &Arc<dyn ChatApi> {
        &self.chat
    }

    fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

/// Strategy for constructing message execution contexts.
pub type BotContextFactory = Arc<
    dyn Fn(
            CancellationToken,
            Arc<dyn ChatApi>,
            Arc<dyn Transport>,
            Arc<MessageEvent>,
        ) -> Arc<dyn BotContext>
        + Send
        + Sync,
>;

/// Strategy for constructing interactive execution contexts.
pub type InteractiveContextFactory = Arc<
    dyn Fn(
            CancellationToken,
            Arc<dyn ChatApi>,
            Arc<dyn Transport>,
            &InteractionCallback,
        ) -> Arc<dyn BotContext>
        + Send
        + Sync,
>;

/// The default message-context factory.
pub fn default_context_factory() -> BotContextFactory {
    Arc::new(|lifetime, chat, transport, event| {
        let ctx: Arc<dyn BotContext> = Arc::new(DefaultBotContext::for_message(
            lifetime, chat, transport, event,
        ));
        ctx
    })
}

/// The default interactive-context factory. The callback itself travels to
/// the interactive handler separately; the default context only carries the
/// collaborator handles.
pub fn default_interactive_context_factory() -> InteractiveContextFactory {
    Arc::new(|lifetime, chat, transport, _callback: &InteractionCallback| {
        let ctx: Arc<dyn BotContext> =
            Arc::new(DefaultBotContext::for_interaction(lifetime, chat, transport));
        ctx
    })
}

/// The read-only request view handed to handlers alongside the context.
pub trait Request: Send + Sync {
    /// The parameter bindings extracted by the matcher. Empty for default
    /// (no-match) dispatches.
    fn properties(&self) -> &Properties;

    /// Convenience accessor for a single bound parameter.
    fn param(&self, name: &str) -> Option<&str> {
        self.properties().get(name)
    }
}

/// The default [`Request`] implementation.
pub struct DefaultRequest {
    properties: Properties,
}

impl DefaultRequest {
    /// Wraps a set of extracted bindings.
    pub fn new(properties: Properties) -> Self {
        Self { properties }
    }
}

impl Request for DefaultRequest {
    fn properties(&self) -> &Properties {
        &self.properties
    }
}

/// Strategy for constructing requests.
pub type RequestFactory =
    Arc<dyn Fn(&Arc<dyn BotContext>, Properties) -> Arc<dyn Request> + Send + Sync>;

/// The default request factory.
pub fn default_request_factory() -> RequestFactory {
    Arc::new(|_ctx, properties| {
        let request: Arc<dyn Request> = Arc::new(DefaultRequest::new(properties));
        request
    })
}

//! The dispatch engine.
//!
//! [`Switchboard`] owns the command registry, the engine configuration, the
//! recorded application identifier, and the bounded dispatch-record channel.
//! [`Switchboard::run`] is the central control loop: it consumes classified
//! raw events from the transport in arrival order and fans each
//! message-shaped or interactive event out to a detached task.
//!
//! # Concurrency
//!
//! The loop suspends only while waiting on the transport or the cancellation
//! token; handlers run in independent spawned tasks and never block the loop
//! or each other. Completion order of handlers is therefore unspecified.
//! Cancelling the shared token stops consumption of new events but does
//! *not* interrupt already-spawned handler tasks — they run to completion on
//! their own. Shutdown does not wait for them; this is a known limitation,
//! not an oversight.
//!
//! The registry and the recorded application identifier are the only state
//! mutated after startup; both sit behind short-hold mutexes that are never
//! held across an await.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchboard_core::{
    ApiEnvelope, ChatApi, Envelope, IdentityApi, IdentityError, InnerEvent, InteractionCallback,
    LifecycleSignal, MessageEvent, Properties, RawEvent, Transport,
};

use crate::command::{Command, CommandDefinition};
use crate::config::{BotInteractionMode, EngineConfig};
use crate::error::EngineError;
use crate::help::render_help;
use crate::registry::CommandRegistry;
use crate::response::ReportOptions;

/// An observability-only record emitted after a successful command match,
/// just before the handler runs.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    /// The matched command's usage pattern.
    pub usage: String,
    /// The extracted parameter bindings.
    pub properties: Properties,
    /// The originating canonical event.
    pub event: Arc<MessageEvent>,
}

/// The command-dispatch engine.
///
/// Construct one through [`Switchboard::builder`], register commands with
/// [`Switchboard::command`], and drive it with [`Switchboard::run`].
pub struct Switchboard {
    transport: Arc<dyn Transport>,
    chat: Arc<dyn ChatApi>,
    identity: Arc<dyn IdentityApi>,
    config: EngineConfig,
    registry: CommandRegistry,
    /// Service-assigned app identifier, recorded from the hello signal.
    app_id: Mutex<Option<String>>,
    records_tx: mpsc::Sender<DispatchRecord>,
    records_rx: Mutex<Option<mpsc::Receiver<DispatchRecord>>>,
}

impl Switchboard {
    /// Starts building an engine around the three boundary collaborators.
    pub fn builder(
        transport: Arc<dyn Transport>,
        chat: Arc<dyn ChatApi>,
        identity: Arc<dyn IdentityApi>,
    ) -> SwitchboardBuilder {
        SwitchboardBuilder {
            transport,
            chat,
            identity,
            config: EngineConfig::default(),
        }
    }

    /// Registers a command under a usage pattern.
    ///
    /// Registration is append-only and may race with concurrent dispatch;
    /// commands registered while the loop is running become visible to the
    /// next dispatched event.
    pub fn command(&self, usage: impl Into<String>, definition: CommandDefinition) {
        let command = (self.config.command_factory)(usage.into(), definition);
        self.registry.register(command);
    }

    /// Returns a snapshot of the registered commands in registration order.
    pub fn commands(&self) -> Vec<Arc<dyn Command>> {
        self.registry.snapshot()
    }

    /// Renders the help listing for the current registry.
    pub fn help_message(&self) -> String {
        render_help(&self.registry.snapshot())
    }

    /// Hands out the single-consumer receiver of [`DispatchRecord`]s.
    ///
    /// Returns `None` after the first call. Publishing is best-effort: when
    /// the bounded channel is full the new record is dropped rather than
    /// blocking dispatch.
    pub fn command_events(&self) -> Option<mpsc::Receiver<DispatchRecord>> {
        self.records_rx.lock().take()
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs the dispatch loop until the token is cancelled or the transport's
    /// event stream closes.
    ///
    /// Cancellation wins ties against a pending event and never waits for
    /// in-flight handler tasks.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!("dispatch loop started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("dispatch loop cancelled; in-flight handlers continue detached");
                    return;
                }
                event = self.transport.next_event() => match event {
                    Some(event) => Arc::clone(&self).route(event, &cancel),
                    None => {
                        info!("event stream closed, dispatch loop exiting");
                        return;
                    }
                },
            }
        }
    }

    /// Classifies one raw event and hands it to the matching path.
    ///
    /// Classification is total: every raw event reaches a handler or a
    /// logged-unsupported path. This method never awaits; all blocking work
    /// is spawned.
    fn route(self: Arc<Self>, event: RawEvent, cancel: &CancellationToken) {
        match event {
            RawEvent::Lifecycle(signal) => self.handle_lifecycle(signal),

            RawEvent::Api(ApiEnvelope { envelope, inner }) => match inner {
                InnerEvent::Message(payload) | InnerEvent::AppMention(payload) => {
                    let message = MessageEvent::from_payload(payload);
                    let cancel = cancel.clone();
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        this.acknowledge(&envelope).await;
                        this.dispatch_message(message, cancel).await;
                    });
                }
                InnerEvent::Other { kind, payload } => {
                    if let Some(handler) = &self.config.default_inner_event {
                        handler(&kind, payload, envelope.clone());
                    } else {
                        debug!(kind = %kind, "unsupported inner event");
                    }
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        this.acknowledge(&envelope).await;
                    });
                }
            },

            RawEvent::SlashCommand(command) => {
                let message = MessageEvent::from_slash(command);
                let cancel = cancel.clone();
                let this = Arc::clone(&self);
                tokio::spawn(async move {
                    this.dispatch_message(message, cancel).await;
                });
            }

            RawEvent::Interactive(callback) => {
                let cancel = cancel.clone();
                let this = Arc::clone(&self);
                tokio::spawn(async move {
                    this.dispatch_interaction(callback, cancel).await;
                });
            }

            RawEvent::Unknown(payload) => {
                if let Some(handler) = &self.config.default_event {
                    handler(payload);
                } else {
                    debug!("unsupported event received");
                }
            }
        }
    }

    /// Lifecycle signals drive logging and the recorded app identifier only.
    fn handle_lifecycle(&self, signal: LifecycleSignal) {
        match signal {
            LifecycleSignal::Connecting => {
                info!("connecting to the messaging service");
                if let Some(init) = &self.config.on_init {
                    let init = Arc::clone(init);
                    tokio::spawn(async move { init().await });
                }
            }
            LifecycleSignal::ConnectionError { reason } => {
                warn!(reason = %reason, "connection attempt failed, transport will retry");
            }
            LifecycleSignal::Connected => {
                info!("connected to the messaging service");
            }
            LifecycleSignal::Hello { app_id } => {
                info!(app_id = %app_id, "connected as app");
                *self.app_id.lock() = Some(app_id);
            }
        }
    }

    /// Dispatches one canonical message event. Runs inside a detached task.
    async fn dispatch_message(self: Arc<Self>, event: MessageEvent, cancel: CancellationToken) {
        if event.is_bot() && self.suppress_bot_event(&event).await {
            return;
        }

        let event = Arc::new(event);
        let ctx = (self.config.context_factory)(
            cancel,
            Arc::clone(&self.chat),
            Arc::clone(&self.transport),
            Arc::clone(&event),
        );
        let response = (self.config.response_factory)(&ctx);
        let text = (self.config.sanitizer)(&event.text);

        for command in self.registry.snapshot() {
            let Some(properties) = command.matches(&text) else {
                continue;
            };
            let request = (self.config.request_factory)(&ctx, properties.clone());

            if let Some(authorize) = &command.definition().authorize
                && !authorize(ctx.as_ref(), request.as_ref())
            {
                response
                    .report_error(&self.config.unauthorized_error, ReportOptions::default())
                    .await;
                return;
            }

            // Best-effort publish: a full channel drops the record, never
            // the dispatch.
            let record = DispatchRecord {
                usage: command.usage().to_string(),
                properties,
                event: Arc::clone(&event),
            };
            if self.records_tx.try_send(record).is_err() {
                debug!(usage = %command.usage(), "dispatch record channel full, record dropped");
            }

            if let Some(envelope) = &event.envelope {
                self.acknowledge(envelope).await;
            }

            command.execute(ctx, request, response).await;
            return;
        }

        if let Some(default_message) = &self.config.default_message {
            let request = (self.config.request_factory)(&ctx, Properties::new());
            default_message(ctx, request, response).await;
        }
    }

    /// Dispatches one interactive callback. Runs inside a detached task.
    async fn dispatch_interaction(
        self: Arc<Self>,
        callback: InteractionCallback,
        cancel: CancellationToken,
    ) {
        let ctx = (self.config.interactive_context_factory)(
            cancel,
            Arc::clone(&self.chat),
            Arc::clone(&self.transport),
            &callback,
        );

        for command in self.registry.snapshot() {
            let Some(action_id) = command.definition().action_id.as_deref() else {
                continue;
            };
            if callback
                .actions
                .iter()
                .any(|action| action.action_id == action_id)
            {
                command.execute_interactive(ctx, callback).await;
                return;
            }
        }

        match &self.config.default_interactive {
            Some(handler) => handler(ctx, callback).await,
            None => debug!(user_id = %callback.user_id, "interactive callback matched no command"),
        }
    }

    /// Bot-loop suppression. Returns `true` when the event must be dropped.
    async fn suppress_bot_event(&self, event: &MessageEvent) -> bool {
        let bot_id = event.bot_id.as_deref().unwrap_or_default();
        match self.config.bot_interaction_mode {
            BotInteractionMode::IgnoreNone => false,
            BotInteractionMode::IgnoreAll => {
                debug!(bot_id = %bot_id, "ignoring bot-originated event");
                true
            }
            BotInteractionMode::IgnoreOwnApp => match self.identity.bot_info(bot_id).await {
                Ok(profile) => {
                    let own = self.app_id.lock().as_deref() == Some(profile.app_id.as_str());
                    if own {
                        debug!(app_id = %profile.app_id, "ignoring event originating from own app");
                    }
                    own
                }
                Err(IdentityError::PermissionDenied) => {
                    let source = IdentityError::PermissionDenied;
                    warn!(bot_id = %bot_id, "cannot tell whether a bot event is our own: {source}");
                    self.report(EngineError::IdentityLookup {
                        bot_id: bot_id.to_string(),
                        source,
                    });
                    true
                }
                Err(source) => {
                    debug!(bot_id = %bot_id, error = %source, "bot identity lookup failed, dropping event");
                    self.report(EngineError::IdentityLookup {
                        bot_id: bot_id.to_string(),
                        source,
                    });
                    true
                }
            },
        }
    }

    /// Acknowledges an envelope, logging and reporting failures.
    async fn acknowledge(&self, envelope: &Envelope) {
        if let Err(err) = self.transport.acknowledge(envelope).await {
            warn!(envelope = %envelope.id, error = %err, "failed to acknowledge event");
            self.report(EngineError::Acknowledge(err));
        }
    }

    fn report(&self, error: EngineError) {
        if let Some(callback) = &self.config.on_error {
            callback(error);
        }
    }
}

/// Builder for [`Switchboard`].
pub struct SwitchboardBuilder {
    transport: Arc<dyn Transport>,
    chat: Arc<dyn ChatApi>,
    identity: Arc<dyn IdentityApi>,
    config: EngineConfig,
}

impl SwitchboardBuilder {
    /// Supplies collaborator credentials (tokens, API URL override, debug).
    pub fn client_config(mut self, client: switchboard_core::ClientConfig) -> Self {
        self.config.client = Some(client);
        self
    }

    /// Sets the bot-loop suppression mode.
    pub fn bot_interaction_mode(mut self, mode: BotInteractionMode) -> Self {
        self.config.bot_interaction_mode = mode;
        self
    }

    /// Replaces the pre-match text-cleanup transform.
    pub fn sanitizer<F>(mut self, sanitizer: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.config.sanitizer = Arc::new(sanitizer);
        self
    }

    /// Replaces the message reported on a rejected authorization check.
    pub fn unauthorized_error(mut self, message: impl Into<String>) -> Self {
        self.config.unauthorized_error = message.into();
        self
    }

    /// Installs the reportable-failure callback.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(EngineError) + Send + Sync + 'static,
    {
        self.config.on_error = Some(Arc::new(callback));
        self
    }

    /// Installs a callback spawned detached on every connection attempt.
    pub fn on_init<F, Fut>(mut self, init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.config.on_init = Some(Arc::new(move || Box::pin(init())));
        self
    }

    /// Installs the fallback handler for messages no command matches.
    pub fn default_message<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(
                Arc<dyn crate::context::BotContext>,
                Arc<dyn crate::context::Request>,
                Arc<dyn crate::response::ResponseWriter>,
            ) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.config.default_message = Some(Arc::new(move |ctx, request, response| {
            Box::pin(handler(ctx, request, response))
        }));
        self
    }

    /// Installs the fallback for unrecognized raw events.
    pub fn default_event<F>(mut self, handler: F) -> Self
    where
        F: Fn(serde_json::Value) + Send + Sync + 'static,
    {
        self.config.default_event = Some(Arc::new(handler));
        self
    }

    /// Installs the fallback for unsupported inner API events.
    pub fn default_inner_event<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, serde_json::Value, Envelope) + Send + Sync + 'static,
    {
        self.config.default_inner_event = Some(Arc::new(handler));
        self
    }

    /// Installs the fallback for interactive callbacks no command claims.
    pub fn default_interactive<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<dyn crate::context::BotContext>, InteractionCallback) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.config.default_interactive = Some(Arc::new(move |ctx, callback| {
            Box::pin(handler(ctx, callback))
        }));
        self
    }

    /// Replaces the message execution-context strategy.
    pub fn context_factory(mut self, factory: crate::context::BotContextFactory) -> Self {
        self.config.context_factory = factory;
        self
    }

    /// Replaces the interactive execution-context strategy.
    pub fn interactive_context_factory(
        mut self,
        factory: crate::context::InteractiveContextFactory,
    ) -> Self {
        self.config.interactive_context_factory = factory;
        self
    }

    /// Replaces the request strategy.
    pub fn request_factory(mut self, factory: crate::context::RequestFactory) -> Self {
        self.config.request_factory = factory;
        self
    }

    /// Replaces the response-writer strategy.
    pub fn response_factory(mut self, factory: crate::response::ResponseFactory) -> Self {
        self.config.response_factory = factory;
        self
    }

    /// Replaces the command-construction strategy.
    pub fn command_factory(mut self, factory: crate::command::CommandFactory) -> Self {
        self.config.command_factory = factory;
        self
    }

    /// Overrides the dispatch-record channel capacity.
    pub fn records_capacity(mut self, capacity: usize) -> Self {
        self.config.records_capacity = capacity;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Arc<Switchboard> {
        let (records_tx, records_rx) = mpsc::channel(self.config.records_capacity);
        Arc::new(Switchboard {
            transport: self.transport,
            chat: self.chat,
            identity: self.identity,
            config: self.config,
            registry: CommandRegistry::new(),
            app_id: Mutex::new(None),
            records_tx,
            records_rx: Mutex::new(Some(records_rx)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::{Notify, mpsc as tokio_mpsc};
    use tokio::time::{sleep, timeout};

    use switchboard_core::{
        ActionRef, BotProfile, IdentityResult, MessagePayload, PostOptions, SlashCommand,
        TransportResult,
    };

    // ------------------------------------------------------------------
    // Mock collaborators
    // ------------------------------------------------------------------

    struct ScriptedTransport {
        events: tokio::sync::Mutex<tokio_mpsc::UnboundedReceiver<RawEvent>>,
        acks: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new() -> (Arc<Self>, tokio_mpsc::UnboundedSender<RawEvent>) {
            let (tx, rx) = tokio_mpsc::unbounded_channel();
            let transport = Arc::new(Self {
                events: tokio::sync::Mutex::new(rx),
                acks: Mutex::new(Vec::new()),
            });
            (transport, tx)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn next_event(&self) -> Option<RawEvent> {
            self.events.lock().await.recv().await
        }

        async fn acknowledge(&self, envelope: &Envelope) -> TransportResult<()> {
            self.acks.lock().push(envelope.id.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingChat {
        posts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChatApi for RecordingChat {
        async fn post_message(
            &self,
            channel_id: &str,
            text: &str,
            _options: &PostOptions,
        ) -> TransportResult<String> {
            self.posts.lock().push((channel_id.into(), text.into()));
            Ok("1.0".into())
        }
    }

    #[derive(Default)]
    struct StaticIdentity {
        profiles: HashMap<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityApi for StaticIdentity {
        async fn bot_info(&self, bot_id: &str) -> IdentityResult<BotProfile> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.profiles.get(bot_id) {
                Some(app_id) => Ok(BotProfile {
                    id: bot_id.to_string(),
                    app_id: app_id.clone(),
                    name: "bot".into(),
                }),
                None => Err(IdentityError::NotFound(bot_id.to_string())),
            }
        }
    }

    // ------------------------------------------------------------------
    // Harness
    // ------------------------------------------------------------------

    struct Harness {
        engine: Arc<Switchboard>,
        events: tokio_mpsc::UnboundedSender<RawEvent>,
        chat: Arc<RecordingChat>,
        transport: Arc<ScriptedTransport>,
        identity: Arc<StaticIdentity>,
        cancel: CancellationToken,
        loop_handle: tokio::task::JoinHandle<()>,
    }

    impl Harness {
        fn send(&self, event: RawEvent) {
            self.events.send(event).expect("loop is running");
        }

        fn send_message(&self, text: &str) {
            self.send(api_message(text, None));
        }

        fn send_bot_message(&self, text: &str, bot_id: &str) {
            self.send(api_message(text, Some(bot_id.to_string())));
        }
    }

    fn api_message(text: &str, bot_id: Option<String>) -> RawEvent {
        RawEvent::Api(ApiEnvelope {
            envelope: Envelope::new("env"),
            inner: InnerEvent::Message(MessagePayload {
                user_id: "U1".into(),
                channel_id: "C1".into(),
                text: text.into(),
                ts: "100.1".into(),
                thread_ts: None,
                bot_id,
            }),
        })
    }

    fn start(mode: BotInteractionMode, identity: StaticIdentity) -> Harness {
        start_with(mode, identity, |builder| builder)
    }

    fn start_with(
        mode: BotInteractionMode,
        identity: StaticIdentity,
        customize: impl FnOnce(SwitchboardBuilder) -> SwitchboardBuilder,
    ) -> Harness {
        let (transport, events) = ScriptedTransport::new();
        let chat = Arc::new(RecordingChat::default());
        let identity = Arc::new(identity);

        let builder = Switchboard::builder(
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&chat) as Arc<dyn ChatApi>,
            Arc::clone(&identity) as Arc<dyn IdentityApi>,
        )
        .bot_interaction_mode(mode);

        let engine = customize(builder).build();
        let cancel = CancellationToken::new();
        let loop_handle = tokio::spawn(Arc::clone(&engine).run(cancel.clone()));

        Harness {
            engine,
            events,
            chat,
            transport,
            identity,
            cancel,
            loop_handle,
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }

    // ------------------------------------------------------------------
    // Dispatch semantics
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn first_match_wins_follows_registration_order() {
        let h = start(BotInteractionMode::IgnoreNone, StaticIdentity::default());
        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<&'static str>();

        let tx_general = tx.clone();
        h.engine.command(
            "hi",
            CommandDefinition::new(move |_, _, _| {
                let tx = tx_general.clone();
                async move {
                    tx.send("general").ok();
                }
            }),
        );
        let tx_specific = tx.clone();
        h.engine.command(
            "hi there",
            CommandDefinition::new(move |_, _, _| {
                let tx = tx_specific.clone();
                async move {
                    tx.send("specific").ok();
                }
            }),
        );

        // "hi there" is a better fit for the second command, but patterns
        // ignore trailing input words and order wins: "hi" was registered
        // first, it matches "hi there", and the more specific command never
        // gets a look.
        h.send_message("hi there");
        let winner = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("a handler ran")
            .unwrap();
        assert_eq!(winner, "general");
        sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "only one command may run");

        h.send_message("hi");
        let winner = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("a handler ran")
            .unwrap();
        assert_eq!(winner, "general");

        // Message events arrive in an envelope that must be acknowledged.
        wait_until(|| h.transport.acks.lock().len() >= 2).await;
    }

    #[tokio::test]
    async fn overlapping_parameter_patterns_resolve_by_registration_order() {
        let h = start(BotInteractionMode::IgnoreNone, StaticIdentity::default());
        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<&'static str>();

        let tx_first = tx.clone();
        h.engine.command(
            "hi <rest>",
            CommandDefinition::new(move |_, _, _| {
                let tx = tx_first.clone();
                async move {
                    tx.send("loose").ok();
                }
            }),
        );
        let tx_second = tx.clone();
        h.engine.command(
            "hi there",
            CommandDefinition::new(move |_, _, _| {
                let tx = tx_second.clone();
                async move {
                    tx.send("exact").ok();
                }
            }),
        );

        // Both patterns match "hi there"; the one registered first wins even
        // though the second is more specific.
        h.send_message("hi there");
        let winner = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("a handler ran")
            .unwrap();
        assert_eq!(winner, "loose");

        sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "only one command may run");
    }

    #[tokio::test]
    async fn sanitizer_runs_before_matching() {
        let h = start(BotInteractionMode::IgnoreNone, StaticIdentity::default());
        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<String>();

        let tx = tx.clone();
        h.engine.command(
            "ping <who>",
            CommandDefinition::new(move |_, request, _| {
                let tx = tx.clone();
                async move {
                    tx.send(request.properties().string_or("who", "")).ok();
                }
            }),
        );

        // Non-breaking space between the words; the default sanitizer
        // normalizes it before matching.
        h.send_message("ping\u{a0}alice");
        let who = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("handler ran")
            .unwrap();
        assert_eq!(who, "alice");
    }

    #[tokio::test]
    async fn unmatched_messages_fall_through_to_the_default_handler() {
        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<bool>();
        let h = start_with(
            BotInteractionMode::IgnoreNone,
            StaticIdentity::default(),
            move |builder| {
                builder.default_message(move |_, request, _| {
                    let tx = tx.clone();
                    async move {
                        tx.send(request.properties().is_empty()).ok();
                    }
                })
            },
        );
        h.engine
            .command("ping", CommandDefinition::new(|_, _, _| async {}));

        h.send_message("completely unrelated text");
        let empty_bindings = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("default handler ran")
            .unwrap();
        assert!(empty_bindings);
    }

    // ------------------------------------------------------------------
    // Bot-loop suppression
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn own_app_events_are_dropped_and_foreign_app_events_dispatched() {
        let mut identity = StaticIdentity::default();
        identity.profiles.insert("B1".into(), "A100".into());
        identity.profiles.insert("B2".into(), "A200".into());
        let h = start(BotInteractionMode::IgnoreOwnApp, identity);
        let mut records = h.engine.command_events().expect("first take");

        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<&'static str>();
        let tx = tx.clone();
        h.engine.command(
            "ping",
            CommandDefinition::new(move |_, _, _| {
                let tx = tx.clone();
                async move {
                    tx.send("ran").ok();
                }
            }),
        );

        h.send(RawEvent::Lifecycle(LifecycleSignal::Hello {
            app_id: "A100".into(),
        }));

        // Our own app's bot: dropped before matching, no record published.
        h.send_bot_message("ping", "B1");
        wait_until(|| h.identity.calls.load(Ordering::SeqCst) >= 1).await;
        sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "own-app event must not dispatch");
        assert!(records.try_recv().is_err(), "no record for a dropped event");

        // A different app's bot: dispatched normally.
        h.send_bot_message("ping", "B2");
        let ran = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("foreign-app event dispatches")
            .unwrap();
        assert_eq!(ran, "ran");
        let record = timeout(Duration::from_secs(1), records.recv())
            .await
            .expect("record published")
            .unwrap();
        assert_eq!(record.usage, "ping");
        assert_eq!(record.event.bot_id.as_deref(), Some("B2"));
    }

    #[tokio::test]
    async fn failed_identity_lookup_drops_the_event_and_reports() {
        let (err_tx, mut err_rx) = tokio_mpsc::unbounded_channel::<EngineError>();
        let h = start_with(
            BotInteractionMode::IgnoreOwnApp,
            StaticIdentity::default(),
            move |builder| {
                builder.on_error(move |error| {
                    err_tx.send(error).ok();
                })
            },
        );
        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<()>();
        let tx = tx.clone();
        h.engine.command(
            "ping",
            CommandDefinition::new(move |_, _, _| {
                let tx = tx.clone();
                async move {
                    tx.send(()).ok();
                }
            }),
        );

        // The identity mock knows no profiles, so the lookup fails.
        h.send_bot_message("ping", "B404");
        let reported = timeout(Duration::from_secs(1), err_rx.recv())
            .await
            .expect("failure reported")
            .unwrap();
        assert!(matches!(reported, EngineError::IdentityLookup { .. }));

        sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "event must be dropped on failure");
    }

    #[tokio::test]
    async fn ignore_all_drops_bot_events_without_identity_lookups() {
        let h = start(BotInteractionMode::IgnoreAll, StaticIdentity::default());
        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<()>();
        let tx = tx.clone();
        h.engine.command(
            "ping",
            CommandDefinition::new(move |_, _, _| {
                let tx = tx.clone();
                async move {
                    tx.send(()).ok();
                }
            }),
        );

        h.send_bot_message("ping", "B1");
        // A non-bot message afterwards proves the loop kept going.
        h.send_message("ping");
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("human message dispatches")
            .unwrap();
        assert_eq!(h.identity.calls.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "bot message stays dropped");
    }

    // ------------------------------------------------------------------
    // Authorization
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn rejected_authorization_reports_once_and_never_runs_the_handler() {
        let h = start(BotInteractionMode::IgnoreNone, StaticIdentity::default());
        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<()>();
        let tx = tx.clone();
        h.engine.command(
            "secret",
            CommandDefinition::new(move |_, _, _| {
                let tx = tx.clone();
                async move {
                    tx.send(()).ok();
                }
            })
            .authorize(|_, _| false),
        );

        h.send_message("secret");
        wait_until(|| !h.chat.posts.lock().is_empty()).await;
        sleep(Duration::from_millis(50)).await;

        let posts = h.chat.posts.lock().clone();
        assert_eq!(posts.len(), 1, "exactly one error report");
        assert_eq!(posts[0].0, "C1");
        assert!(posts[0].1.contains("not authorized"));
        assert!(rx.try_recv().is_err(), "handler must never run");
    }

    #[tokio::test]
    async fn granted_authorization_runs_the_handler_exactly_once() {
        let h = start(BotInteractionMode::IgnoreNone, StaticIdentity::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_handler = Arc::clone(&calls);
        h.engine.command(
            "secret",
            CommandDefinition::new(move |_, _, _| {
                let calls = Arc::clone(&calls_handler);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                }
            })
            .authorize(|ctx, _| ctx.event().is_some_and(|event| event.user_id == "U1")),
        );

        h.send_message("secret");
        wait_until(|| calls.load(Ordering::SeqCst) == 1).await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(h.chat.posts.lock().is_empty(), "no unauthorized report");
    }

    // ------------------------------------------------------------------
    // Observability channel
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn record_channel_overflow_never_blocks_dispatch() {
        let h = start(BotInteractionMode::IgnoreNone, StaticIdentity::default());
        let mut records = h.engine.command_events().expect("first take");

        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<()>();
        let tx = tx.clone();
        h.engine.command(
            "ping",
            CommandDefinition::new(move |_, _, _| {
                let tx = tx.clone();
                async move {
                    tx.send(()).ok();
                }
            }),
        );

        // One more event than the channel holds; nobody consumes records.
        for _ in 0..101 {
            h.send_message("ping");
        }
        for _ in 0..101 {
            timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("every dispatch completes, loop never blocked")
                .unwrap();
        }

        let mut kept = 0;
        while records.try_recv().is_ok() {
            kept += 1;
        }
        assert_eq!(kept, 100, "capacity records kept, the overflow dropped");
    }

    #[tokio::test]
    async fn records_carry_usage_and_bindings() {
        let h = start(BotInteractionMode::IgnoreNone, StaticIdentity::default());
        let mut records = h.engine.command_events().expect("first take");
        h.engine.command(
            "ban <user> for <reason>",
            CommandDefinition::new(|_, _, _| async {}),
        );

        h.send_message("ban alice for spamming the channel");
        let record = timeout(Duration::from_secs(1), records.recv())
            .await
            .expect("record published")
            .unwrap();
        assert_eq!(record.usage, "ban <user> for <reason>");
        assert_eq!(record.properties.get("user"), Some("alice"));
        assert_eq!(
            record.properties.get("reason"),
            Some("spamming the channel")
        );
    }

    // ------------------------------------------------------------------
    // Slash commands and acknowledgement
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn slash_commands_are_acknowledged_before_the_handler_runs() {
        let h = start(BotInteractionMode::IgnoreNone, StaticIdentity::default());
        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<(Vec<String>, String)>();
        let transport = Arc::clone(&h.transport);
        let tx = tx.clone();
        h.engine.command(
            "deploy <env>",
            CommandDefinition::new(move |_, request, _| {
                let tx = tx.clone();
                let acks = transport.acks.lock().clone();
                let env = request.properties().string_or("env", "");
                async move {
                    tx.send((acks, env)).ok();
                }
            }),
        );

        h.send(RawEvent::SlashCommand(SlashCommand {
            envelope: Envelope::new("slash-1"),
            user_id: "U1".into(),
            channel_id: "C1".into(),
            command: "/deploy".into(),
            text: "prod".into(),
            ts: "200.0".into(),
        }));

        let (acks_at_handler, env) = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("handler ran")
            .unwrap();
        assert!(
            acks_at_handler.contains(&"slash-1".to_string()),
            "envelope acknowledged before the handler"
        );
        assert_eq!(env, "prod");
    }

    // ------------------------------------------------------------------
    // Interactive callbacks
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn interactive_callbacks_route_by_action_id() {
        let h = start(BotInteractionMode::IgnoreNone, StaticIdentity::default());
        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<String>();
        let tx = tx.clone();
        h.engine.command(
            "approve <request>",
            CommandDefinition::new(|_, _, _| async {})
                .action_id("approve-button")
                .interactive(move |_, callback| {
                    let tx = tx.clone();
                    async move {
                        tx.send(callback.user_id).ok();
                    }
                }),
        );

        h.send(RawEvent::Interactive(InteractionCallback {
            envelope: None,
            user_id: "U7".into(),
            channel_id: Some("C1".into()),
            actions: vec![ActionRef {
                action_id: "approve-button".into(),
                block_id: None,
                value: Some("42".into()),
            }],
            payload: json!({}),
        }));

        let user = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("interactive handler ran")
            .unwrap();
        assert_eq!(user, "U7");
    }

    #[tokio::test]
    async fn unclaimed_interactions_reach_the_default_interactive_handler() {
        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<String>();
        let h = start_with(
            BotInteractionMode::IgnoreNone,
            StaticIdentity::default(),
            move |builder| {
                builder.default_interactive(move |_, callback| {
                    let tx = tx.clone();
                    async move {
                        tx.send(callback.user_id).ok();
                    }
                })
            },
        );
        h.engine.command(
            "approve <request>",
            CommandDefinition::new(|_, _, _| async {}).action_id("approve-button"),
        );

        h.send(RawEvent::Interactive(InteractionCallback {
            envelope: None,
            user_id: "U9".into(),
            channel_id: None,
            actions: vec![ActionRef {
                action_id: "unrelated-button".into(),
                block_id: None,
                value: None,
            }],
            payload: json!({}),
        }));

        let user = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("default interactive handler ran")
            .unwrap();
        assert_eq!(user, "U9");
    }

    // ------------------------------------------------------------------
    // Lifecycle and unsupported events
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn connecting_spawns_the_init_callback_detached() {
        let (tx, mut rx) = tokio_mpsc::unbounded_channel::<()>();
        let h = start_with(
            BotInteractionMode::IgnoreNone,
            StaticIdentity::default(),
            move |builder| {
                builder.on_init(move || {
                    let tx = tx.clone();
                    async move {
                        tx.send(()).ok();
                    }
                })
            },
        );

        h.send(RawEvent::Lifecycle(LifecycleSignal::Connecting));
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("init callback ran")
            .unwrap();
    }

    #[tokio::test]
    async fn unsupported_events_reach_the_default_handlers() {
        let (unknown_tx, mut unknown_rx) = tokio_mpsc::unbounded_channel::<serde_json::Value>();
        let (inner_tx, mut inner_rx) = tokio_mpsc::unbounded_channel::<String>();
        let h = start_with(
            BotInteractionMode::IgnoreNone,
            StaticIdentity::default(),
            move |builder| {
                builder
                    .default_event(move |payload| {
                        unknown_tx.send(payload).ok();
                    })
                    .default_inner_event(move |kind, _payload, _envelope| {
                        inner_tx.send(kind.to_string()).ok();
                    })
            },
        );

        h.send(RawEvent::Unknown(json!({"type": "mystery"})));
        h.send(RawEvent::Api(ApiEnvelope {
            envelope: Envelope::new("env-other"),
            inner: InnerEvent::Other {
                kind: "reaction_added".into(),
                payload: json!({"reaction": "wave"}),
            },
        }));

        let payload = timeout(Duration::from_secs(1), unknown_rx.recv())
            .await
            .expect("unknown handler ran")
            .unwrap();
        assert_eq!(payload["type"], "mystery");

        let kind = timeout(Duration::from_secs(1), inner_rx.recv())
            .await
            .expect("inner handler ran")
            .unwrap();
        assert_eq!(kind, "reaction_added");

        // Unsupported inner events still get their envelope acknowledged.
        wait_until(|| h.transport.acks.lock().contains(&"env-other".to_string())).await;
    }

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn cancellation_stops_the_loop_but_not_in_flight_handlers() {
        let h = start(BotInteractionMode::IgnoreNone, StaticIdentity::default());
        let gate = Arc::new(Notify::new());
        let (started_tx, mut started_rx) = tokio_mpsc::unbounded_channel::<()>();
        let done = Arc::new(AtomicUsize::new(0));

        let gate_handler = Arc::clone(&gate);
        let done_handler = Arc::clone(&done);
        h.engine.command(
            "slow",
            CommandDefinition::new(move |_, _, _| {
                let gate = Arc::clone(&gate_handler);
                let done = Arc::clone(&done_handler);
                let started = started_tx.clone();
                async move {
                    started.send(()).ok();
                    gate.notified().await;
                    done.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );

        h.send_message("slow");
        timeout(Duration::from_secs(1), started_rx.recv())
            .await
            .expect("handler started")
            .unwrap();

        // Cancel while the handler is parked on the gate. The loop exits;
        // the handler keeps running.
        h.cancel.cancel();
        timeout(Duration::from_secs(1), h.loop_handle)
            .await
            .expect("loop exits promptly")
            .unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 0);

        gate.notify_one();
        wait_until(|| done.load(Ordering::SeqCst) == 1).await;
    }

    #[tokio::test]
    async fn closed_event_stream_ends_the_loop() {
        let h = start(BotInteractionMode::IgnoreNone, StaticIdentity::default());
        drop(h.events);
        timeout(Duration::from_secs(1), h.loop_handle)
            .await
            .expect("loop exits on stream close")
            .unwrap();
    }

    #[tokio::test]
    async fn command_events_receiver_can_be_taken_only_once() {
        let h = start(BotInteractionMode::IgnoreNone, StaticIdentity::default());
        assert!(h.engine.command_events().is_some());
        assert!(h.engine.command_events().is_none());
    }
}

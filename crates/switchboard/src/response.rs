//! Outbound reply capability.
//!
//! Every dispatched event gets a fresh [`ResponseWriter`] bound to the
//! event's channel. Send failures on the error-report path are logged and
//! swallowed; retry policy, if any, belongs to the outbound collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use switchboard_core::{ChatApi, MessageEvent, PostOptions, TransportResult};

use crate::context::BotContext;
use crate::error::ResponseError;

/// Named options for [`ResponseWriter::reply`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplyOptions {
    /// Thread the reply under the originating message's timestamp.
    pub in_thread: bool,
}

impl ReplyOptions {
    /// Options that thread the reply under the originating message.
    pub fn threaded() -> Self {
        Self { in_thread: true }
    }
}

/// Named options for [`ResponseWriter::report_error`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// Thread the report under the originating message's timestamp.
    pub in_thread: bool,
}

/// The outbound reply capability handed to handlers.
#[async_trait]
pub trait ResponseWriter: Send + Sync {
    /// Replies in the originating channel.
    ///
    /// Fails with [`ResponseError::NoOriginatingEvent`] when the context was
    /// synthesized and no message event is bound.
    async fn reply(&self, text: &str, options: ReplyOptions) -> Result<(), ResponseError>;

    /// Posts a visibly error-styled message into the originating channel.
    ///
    /// Send failures are logged here, never propagated.
    async fn report_error(&self, message: &str, options: ReportOptions);

    /// Posts to an arbitrary channel with full options.
    async fn post(&self, channel_id: &str, text: &str, options: &PostOptions)
    -> TransportResult<String>;
}

/// The default [`ResponseWriter`] implementation.
pub struct Response {
    chat: Arc<dyn ChatApi>,
    event: Option<Arc<MessageEvent>>,
}

impl Response {
    /// Creates a writer bound to the given event, if any.
    pub fn new(chat: Arc<dyn ChatApi>, event: Option<Arc<MessageEvent>>) -> Self {
        Self { chat, event }
    }

    fn thread_ts(&self, in_thread: bool) -> Option<String> {
        if !in_thread {
            return None;
        }
        self.event
            .as_ref()
            .map(|event| event.thread_ts.clone().unwrap_or_else(|| event.ts.clone()))
    }
}

#[async_trait]
impl ResponseWriter for Response {
    async fn reply(&self, text: &str, options: ReplyOptions) -> Result<(), ResponseError> {
        let event = self
            .event
            .as_ref()
            .ok_or(ResponseError::NoOriginatingEvent)?;
        let post_options = PostOptions {
            thread_ts: self.thread_ts(options.in_thread),
            ..PostOptions::default()
        };
        self.chat
            .post_message(&event.channel_id, text, &post_options)
            .await?;
        Ok(())
    }

    async fn report_error(&self, message: &str, options: ReportOptions) {
        let Some(event) = self.event.as_ref() else {
            error!(message, "cannot report error: no originating event");
            return;
        };
        let post_options = PostOptions {
            thread_ts: self.thread_ts(options.in_thread),
            ..PostOptions::default()
        };
        let styled = format!(":warning: _{message}_");
        if let Err(err) = self
            .chat
            .post_message(&event.channel_id, &styled, &post_options)
            .await
        {
            error!(error = %err, "failed to deliver error report");
        }
    }

    async fn post(
        &self,
        channel_id: &str,
        text: &str,
        options: &PostOptions,
    ) -> TransportResult<String> {
        self.chat.post_message(channel_id, text, options).await
    }
}

/// Strategy for constructing response writers.
pub type ResponseFactory =
    Arc<dyn Fn(&Arc<dyn BotContext>) -> Arc<dyn ResponseWriter> + Send + Sync>;

/// The default response factory, binding the writer to the context's event.
pub fn default_response_factory() -> ResponseFactory {
    Arc::new(|ctx| {
        let event = ctx.event().cloned().map(Arc::new);
        let response: Arc<dyn ResponseWriter> = Arc::new(Response::new(Arc::clone(ctx.chat()), event));
        response
    })
}

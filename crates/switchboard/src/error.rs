//! Engine-level error types.

use thiserror::Error;

use switchboard_core::{IdentityError, TransportError};

/// Failures surfaced through the engine's error callback.
///
/// The dispatch loop never terminates on these; they are logged, reported,
/// and the loop proceeds to the next event.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// A bot-identity lookup failed during bot-loop suppression. The
    /// triggering event is dropped rather than processed past a failed
    /// identity check.
    #[error("identity lookup for bot '{bot_id}' failed: {source}")]
    IdentityLookup {
        /// The bot whose identity could not be resolved.
        bot_id: String,
        /// The underlying lookup failure.
        source: IdentityError,
    },

    /// A transport-level acknowledgement failed.
    #[error("acknowledgement failed: {0}")]
    Acknowledge(#[from] TransportError),
}

/// Failures returned by [`ResponseWriter::reply`](crate::ResponseWriter::reply).
#[derive(Debug, Clone, Error)]
pub enum ResponseError {
    /// The context was synthesized (for example for an interactive flow)
    /// and carries no originating message event to reply to.
    #[error("no originating message event is bound to this context")]
    NoOriginatingEvent,

    /// The outbound send failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

//! Error types shared across the Switchboard crates.
//!
//! Each boundary collaborator gets its own error family. Absence of a command
//! match is deliberately *not* represented here: a non-match is a normal
//! control path, expressed as `Option` by the matcher.

use thiserror::Error;

/// Errors produced by the transport and outbound messaging collaborators.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The persistent connection could not be established.
    #[error("connection failed: {reason}")]
    ConnectionFailed {
        /// Reason for failure.
        reason: String,
    },

    /// The persistent connection was closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// An outbound message could not be sent.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// An event acknowledgement could not be delivered.
    #[error("failed to acknowledge envelope '{envelope_id}': {reason}")]
    AckFailed {
        /// The envelope that could not be acknowledged.
        envelope_id: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Errors produced by the bot-identity lookup collaborator.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// No bot with the given identifier exists.
    #[error("bot '{0}' not found")]
    NotFound(String),

    /// The app lacks the scope required to resolve bot identities.
    #[error("missing scope: add the users:read scope to your app to resolve bot identities")]
    PermissionDenied,

    /// Any other lookup failure.
    #[error("identity lookup failed: {0}")]
    Lookup(String),
}

/// Result type for transport and outbound messaging operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for bot-identity lookups.
pub type IdentityResult<T> = Result<T, IdentityError>;

//! Shell error types.

use thiserror::Error;

/// Top-level error type shared by the substrate and its collaborators.
///
/// Nothing in the shell treats these as fatal: the bus logs handler
/// failures, the service locator turns them into "unavailable", and the chat
/// controller converts them into displayed text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellError {
    /// Malformed command or argument.
    #[error("validation error: {0}")]
    Validation(String),

    /// A collaborator could not resolve the requested target (e.g. NPC id).
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// A collaborator call failed in transit.
    #[error("transport error: {0}")]
    Transport(String),

    /// A service or collaborator is missing or misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Service resolution re-entered a service that is still resolving.
    #[error("circular dependency while resolving service `{0}`")]
    CircularDependency(String),

    /// An event payload did not match the shape its handler expects.
    #[error("invalid payload for event `{event}`: {reason}")]
    InvalidPayload {
        /// The event whose payload failed to decode.
        event: String,
        /// Decoder message.
        reason: String,
    },

    /// Key/value storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}

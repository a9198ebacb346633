use std::sync::Arc;

/// Result type used throughout the SDK core.
///
/// The error variant is the flagship-specific [`Error`] enum. Note that "nil
/// decisions" (audience mismatch, bucketing miss) are not errors; they are
/// `Ok` decisions without a variation, explained through decision reasons.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the SDK core.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// A decision context was missing a required entity. Surfaced to the
    /// caller instead of being converted into a nil decision.
    #[error("decision context is missing {0}")]
    InvalidDecisionContext(&'static str),

    /// An audience condition referenced a match kind that is not registered.
    #[error("unknown match type {0:?}")]
    UnknownMatchType(String),

    /// A user attribute required by a condition is absent (or null).
    #[error("attribute {0:?} is missing")]
    MissingAttribute(String),

    /// A user attribute exists but its type cannot satisfy the operation.
    #[error("attribute {key:?} has an invalid type for this operation")]
    InvalidAttribute {
        /// Name of the offending attribute.
        key: String,
    },

    /// A condition carries a value the matcher cannot interpret. Usually a
    /// sign of a malformed datafile.
    #[error("condition {0:?} has a malformed value")]
    MalformedCondition(String),

    /// The event queue is at capacity; the event was dropped.
    #[error("event queue is at capacity ({capacity})")]
    QueueFull {
        /// Declared capacity of the queue.
        capacity: usize,
    },

    /// The event processor has not been started, or has already shut down.
    #[error("event processor is not running")]
    ProcessorNotRunning,

    /// The configured events endpoint is not a valid URL.
    #[error("invalid events endpoint")]
    InvalidEndpoint(#[source] url::ParseError),

    /// The events endpoint answered with a non-success status. The batch is
    /// retained in the queue for a later attempt.
    #[error("events endpoint returned status {status}")]
    Dispatch {
        /// HTTP status code returned by the endpoint.
        status: u16,
    },

    /// Network error.
    #[error(transparent)]
    // reqwest::Error is not clonable, so we're wrapping it in an Arc.
    Network(Arc<reqwest::Error>),
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

//! Error taxonomy for store operations.
//!
//! Every fallible operation returns [`Result`]. Nothing is retried inside the
//! store; callers own retry policy. Variants carry enough context (key,
//! revisions) for the REST layer to map them onto wire-level status codes.

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Create-path conflict: the key already holds a live object.
    #[error("key '{key}' already exists")]
    KeyExists { key: String },

    /// The key holds no live object.
    #[error("key '{key}' not found")]
    KeyNotFound { key: String },

    /// A caller-supplied precondition (UID / resource version) did not match
    /// the current object, or an optimistic update lost the race.
    #[error("precondition failed for '{key}': {reason}")]
    PreconditionFailed { key: String, reason: String },

    /// A resource version string that is neither empty nor a decimal u64.
    #[error("invalid resource version '{given}'")]
    InvalidResourceVersion { given: String },

    /// A malformed key: empty, or containing empty path segments.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// A continue token that does not decode, carries an unsupported version,
    /// or is combined with options that contradict it.
    #[error("invalid continue token: {reason}")]
    InvalidContinueToken { reason: String },

    /// A minimum resource version ahead of anything the store has seen.
    #[error("resource version {requested} is greater than current revision {current}")]
    TooLargeResourceVersion { requested: u64, current: u64 },

    /// A resource version match mode string the store does not recognize.
    #[error("unknown resource version match mode '{0}'")]
    UnknownMatchMode(String),

    /// CreateOrUpdate hit an existing object but no merge function was given.
    #[error("no merge function provided to update existing object at '{key}'")]
    MergeUnsupported { key: String },

    /// Invariant violations and failures that do not fit the taxonomy above.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether this error is the not-found kind, for callers that branch on it.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound { .. })
    }

    /// Whether this error is the conflict kind (exists / precondition).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::KeyExists { .. } | Error::PreconditionFailed { .. }
        )
    }
}

//! Error types for SchemaForge core
//!
//! Provides error handling for:
//! - Configuration loading and validation
//! - The external generation contract and the tiered pipeline
//! - Content buffer invariants
//! - Persistence and session-level failures

use crate::persistence::SessionSnapshot;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Errors raised by a [`Generator`](crate::generation::Generator) backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorError {
    /// Backend rejected or failed the request
    #[error("backend error: {0}")]
    Backend(String),

    /// Backend is not reachable or not configured
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Backend answered with something unusable
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GeneratorError {
    /// Check if a later attempt could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Unavailable(_))
    }
}

/// Pipeline-level generation errors
///
/// All of these are recovered inside the pipeline by falling through the
/// tiers; they are kept on the outcome for logging and insights.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Soft wait or hard ceiling exceeded
    #[error("generation timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Elapsed wait
        after: Duration,
    },

    /// The generation contract failed
    #[error("generation failed: {0}")]
    Failure(#[from] GeneratorError),

    /// Content below the minimum content policy
    #[error("content too short: {len} chars (minimum {min})")]
    ContentTooShort {
        /// Clean content length in chars
        len: usize,
        /// Required minimum
        min: usize,
    },
}

impl GenerationError {
    /// Short label for logs
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Failure(_) => "failure",
            Self::ContentTooShort { .. } => "too_short",
        }
    }
}

/// Content buffer invariant violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// Raw content may only be written once
    #[error("raw content already written")]
    AlreadyWritten,

    /// Reveal attempted before content exists
    #[error("no content to reveal")]
    NoSource,

    /// Chunk would duplicate or skip characters
    #[error("reveal out of order: buffer at {revealed} chars, chunk ends at {cursor}")]
    OutOfOrder {
        /// Chars revealed so far
        revealed: usize,
        /// Cursor reported with the chunk
        cursor: usize,
    },

    /// Chunk does not match the source at the cursor
    #[error("reveal chunk does not match source at char {at}")]
    Mismatch {
        /// Char offset of the mismatch
        at: usize,
    },
}

/// Persistence collaborator errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be serialized
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Store-specific failure
    #[error("store error: {0}")]
    Backend(String),
}

/// Session-level errors returned by [`SessionHandle::wait`](crate::SessionHandle::wait)
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Saving failed; the snapshot holds every in-memory result
    #[error("persistence failed: {source}")]
    Persistence {
        /// Underlying error
        #[source]
        source: PersistenceError,
        /// Final session state for retry or manual export
        snapshot: Box<SessionSnapshot>,
    },

    /// The session driver task died
    #[error("session driver failed: {0}")]
    Internal(String),
}

impl SessionError {
    /// Snapshot retained for retry, if any
    #[must_use]
    pub fn snapshot(&self) -> Option<&SessionSnapshot> {
        match self {
            Self::Persistence { snapshot, .. } => Some(snapshot.as_ref()),
            Self::Internal(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_display() {
        let err = GenerationError::Timeout {
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "generation timed out after 1500ms");

        let err = GenerationError::from(GeneratorError::Backend("rate limited".into()));
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(err.label(), "failure");
    }

    #[test]
    fn retryable_classification() {
        assert!(GeneratorError::Unavailable("offline".into()).is_retryable());
        assert!(!GeneratorError::InvalidResponse("empty".into()).is_retryable());
    }

    #[test]
    fn too_short_label() {
        assert_eq!(GenerationError::ContentTooShort { len: 3, min: 80 }.label(), "too_short");
    }

    #[test]
    fn buffer_error_display() {
        let err = BufferError::OutOfOrder {
            revealed: 4,
            cursor: 10,
        };
        assert!(err.to_string().contains("at 4 chars"));
    }

    #[test]
    fn internal_session_error_has_no_snapshot() {
        assert!(SessionError::Internal("panicked".into()).snapshot().is_none());
    }
}

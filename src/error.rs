//! Custom error types for the handoff layer.
//!
//! This module defines the single error type, `HandoffError`, shared by every
//! structure in the crate. Using the `thiserror` crate, it provides a centralized
//! and consistent way to handle the four kinds of failure the handoff layer knows
//! about.
//!
//! ## Error Hierarchy
//!
//! - **Configuration errors** (`InvalidCapacity`, `InvalidChunkSize`, `InvalidMaxSize`,
//!   `InvalidPriorityClass`, `Config`, `ConfigValidation`): raised synchronously by the
//!   call that violates them. Values are never silently clamped.
//! - **`Cancelled`**: a blocking wait was released by a [`CancelToken`](crate::cancel::CancelToken).
//!   This is a control signal, the structure that was waited on is still consistent and
//!   can be reused after the token is reset.
//! - **`StructuralMismatch`**: a pull-side grammar check found the wrong event. The
//!   offending event stays queued so the caller can inspect it or try another branch.
//! - **`ProducerFailed`**: the push-side producer of a bridge returned an error or
//!   panicked. It is reported once the consumer reaches the end-of-input sentinel.

use crate::bridge::{Event, EventKind};
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type HandoffResult<T> = std::result::Result<T, HandoffError>;

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("Invalid capacity {0}: capacity must be at least 1")]
    InvalidCapacity(usize),

    #[error("Invalid chunk size {0}: chunk size must be at least 1")]
    InvalidChunkSize(usize),

    #[error("Invalid max size {max_size}: a bounded buffer must hold at least one chunk ({chunk_size})")]
    InvalidMaxSize { max_size: usize, chunk_size: usize },

    #[error("Invalid priority class {class}: channel has {classes} classes")]
    InvalidPriorityClass { class: usize, classes: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    ConfigValidation(String),

    #[error("Blocking operation cancelled")]
    Cancelled,

    #[error("Expected {expected_kind} '{expected}' but found {found} (near {near})")]
    StructuralMismatch {
        expected_kind: EventKind,
        expected: String,
        found: Event,
        near: String,
    },

    #[error("Event producer failed: {0}")]
    ProducerFailed(String),

    #[error("Failed to spawn producer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl HandoffError {
    /// Whether the caller can keep using the structure that returned this error.
    ///
    /// Cancellation and structural mismatches leave everything intact. Configuration
    /// errors and producer failures mean the object (or the bridge) has to be discarded.
    #[must_use]
    pub fn can_recover(&self) -> bool {
        matches!(
            self,
            HandoffError::Cancelled | HandoffError::StructuralMismatch { .. }
        )
    }

    /// True for [`HandoffError::Cancelled`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HandoffError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_not_recoverable() {
        assert!(!HandoffError::InvalidCapacity(0).can_recover());
        assert!(!HandoffError::InvalidChunkSize(0).can_recover());
        assert!(!HandoffError::InvalidPriorityClass { class: 4, classes: 2 }.can_recover());
        assert!(!HandoffError::ConfigValidation("bad".into()).can_recover());
    }

    #[test]
    fn cancellation_is_recoverable() {
        let err = HandoffError::Cancelled;
        assert!(err.can_recover());
        assert!(err.is_cancelled());
    }

    #[test]
    fn producer_failure_is_terminal() {
        let err = HandoffError::ProducerFailed("parse error".into());
        assert!(!err.can_recover());
        assert!(err.to_string().contains("parse error"));
    }

    #[test]
    fn mismatch_message_names_expected_and_found() {
        let err = HandoffError::StructuralMismatch {
            expected_kind: EventKind::StartElement,
            expected: "x".into(),
            found: Event::start("a"),
            near: "<a>".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'x'"));
        assert!(msg.contains("<a>"));
        assert!(err.can_recover());
    }
}

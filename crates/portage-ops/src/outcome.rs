//! Final result of a completed operation.

use serde::Serialize;
use tracing::{info, warn};

use crate::OperationKind;

/// What an operation worker reports when it exits.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    pub kind: OperationKind,
    /// Top-level items completed successfully.
    pub succeeded: usize,
    /// Top-level items that failed.
    pub errors: usize,
    /// Whether the operation stopped on a user cancel request.
    pub cancelled: bool,
}

impl OperationOutcome {
    pub fn new(kind: OperationKind, succeeded: usize, errors: usize, cancelled: bool) -> Self {
        Self {
            kind,
            succeeded,
            errors,
            cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors == 0 && !self.cancelled
    }

    /// Exactly one of the three user-visible summaries, or the
    /// nothing-happened line when everything was skipped.
    pub fn summary(&self) -> String {
        let verb = self.kind.past_tense();
        if self.cancelled {
            format!(
                "{} cancelled: {} items {verb} before cancellation",
                self.kind, self.succeeded
            )
        } else if self.errors > 0 {
            format!(
                "{} completed: {} items {verb}, {} errors",
                self.kind, self.succeeded, self.errors
            )
        } else if self.succeeded > 0 {
            format!("Successfully {verb} {} items", self.succeeded)
        } else {
            format!("No items {verb}")
        }
    }

    /// Default logging used when the caller supplied no completion
    /// callback.
    pub fn log(&self) {
        if !self.cancelled && self.errors > 0 {
            warn!("{}", self.summary());
        } else {
            info!("{}", self.summary());
        }
    }
}

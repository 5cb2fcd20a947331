// 10.0.2: outcome and error types for signal handling.

use crate::audit::{AuditError, Note};
use crate::store::StoreError;
use crate::venue::VenueError;
use rust_decimal::Decimal;

/// What handling one signal ended in. Every variant except `Ignored` left an audit row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    // not a signal, or a symbol outside the tradable list
    Ignored,
    Applied {
        fills: usize,
        realized_total: Decimal,
    },
    // nothing was traded; a sentinel row carries the reason
    Skipped(Note),
    // a step failed; the error row carries the detail
    Failed(Note),
}

impl SignalOutcome {
    pub fn note(&self) -> Option<&Note> {
        match self {
            SignalOutcome::Skipped(note) | SignalOutcome::Failed(note) => Some(note),
            SignalOutcome::Ignored | SignalOutcome::Applied { .. } => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, SignalOutcome::Applied { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("ledger: {0}")]
    Store(#[from] StoreError),

    #[error("venue: {0}")]
    Venue(#[from] VenueError),

    #[error("audit: {0}")]
    Audit(#[from] AuditError),
}

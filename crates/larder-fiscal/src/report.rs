//! # Operation Reports
//!
//! The flat outcome the back office shows after a fiscal operation.
//!
//! ## Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service result                          OutcomeKind                    │
//! │  ─────────────────────────────────────   ─────────────────              │
//! │  Ok, no follow-up failure                completed                      │
//! │  Ok, follow-up failed                    degraded                       │
//! │  Err(Rejected { .. })                    rejected                       │
//! │  Err(Network { .. })                     network_failure                │
//! │  Err(Validation(..))                     invalid                        │
//! │  anything else                           internal                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::FiscalError;
use crate::service::{CompletedTransaction, FollowUpFailure, RecipeRegistration, Submission};

/// Coarse outcome for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Completed,
    /// The main submission went through; a follow-on step did not.
    Degraded,
    Rejected,
    NetworkFailure,
    Invalid,
    Internal,
}

impl OutcomeKind {
    /// Whether the primary submission reached the authority and was accepted.
    pub const fn is_accepted(&self) -> bool {
        matches!(self, OutcomeKind::Completed | OutcomeKind::Degraded)
    }
}

/// One operation's outcome as the UI receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OperationReport {
    pub outcome: OutcomeKind,
    pub message: String,
    /// Ledger entry of the primary submission, when one was written.
    pub ledger_id: Option<String>,
    /// Authority result code, or `NETWORK_ERROR`.
    pub result_code: Option<String>,
}

impl OperationReport {
    pub fn completed(message: impl Into<String>, ledger_id: impl Into<String>) -> Self {
        OperationReport {
            outcome: OutcomeKind::Completed,
            message: message.into(),
            ledger_id: Some(ledger_id.into()),
            result_code: Some(larder_core::RESULT_CODE_SUCCESS.to_string()),
        }
    }

    fn degraded(ledger_id: &str, follow_up: &FollowUpFailure) -> Self {
        OperationReport {
            outcome: OutcomeKind::Degraded,
            message: follow_up.to_string(),
            ledger_id: Some(ledger_id.to_string()),
            result_code: Some(larder_core::RESULT_CODE_SUCCESS.to_string()),
        }
    }
}

impl From<&FiscalError> for OperationReport {
    fn from(error: &FiscalError) -> Self {
        let outcome = match error {
            FiscalError::Rejected { .. } => OutcomeKind::Rejected,
            FiscalError::Network { .. } => OutcomeKind::NetworkFailure,
            FiscalError::Validation(_) => OutcomeKind::Invalid,
            _ => OutcomeKind::Internal,
        };

        OperationReport {
            outcome,
            message: error.to_string(),
            ledger_id: None,
            result_code: error.result_code().map(str::to_string),
        }
    }
}

impl From<&Submission> for OperationReport {
    fn from(submission: &Submission) -> Self {
        OperationReport::completed(
            format!("{} accepted", submission.reference_no),
            &submission.ledger_id,
        )
    }
}

impl From<&CompletedTransaction> for OperationReport {
    fn from(done: &CompletedTransaction) -> Self {
        match &done.follow_up {
            Some(follow_up) => OperationReport::degraded(&done.submission.ledger_id, follow_up),
            None => OperationReport::from(&done.submission),
        }
    }
}

impl From<&RecipeRegistration> for OperationReport {
    fn from(done: &RecipeRegistration) -> Self {
        let ledger_id = &done.registration.ledger_id;
        match &done.follow_up {
            Some(follow_up) => OperationReport::degraded(ledger_id, follow_up),
            None => OperationReport::completed(
                format!(
                    "{} registered with {} component(s)",
                    done.registration.item_code, done.compositions
                ),
                ledger_id,
            ),
        }
    }
}

/// Folds any service result into a report.
pub fn report<T>(result: &Result<T, FiscalError>) -> OperationReport
where
    for<'a> &'a T: Into<OperationReport>,
{
    match result {
        Ok(value) => value.into(),
        Err(error) => OperationReport::from(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::FollowUpStep;
    use larder_core::ValidationError;

    #[test]
    fn test_error_outcomes() {
        let rejected = OperationReport::from(&FiscalError::Rejected {
            code: "910".into(),
            message: "Request parameter error".into(),
        });
        assert_eq!(rejected.outcome, OutcomeKind::Rejected);
        assert_eq!(rejected.result_code.as_deref(), Some("910"));

        let network = OperationReport::from(&FiscalError::Network {
            message: "connection refused".into(),
            attempts: 3,
        });
        assert_eq!(network.outcome, OutcomeKind::NetworkFailure);
        assert_eq!(network.result_code.as_deref(), Some("NETWORK_ERROR"));

        let invalid = OperationReport::from(&FiscalError::Validation(ValidationError::Required {
            field: "itemList".into(),
        }));
        assert_eq!(invalid.outcome, OutcomeKind::Invalid);
        assert!(invalid.ledger_id.is_none());

        let internal = OperationReport::from(&FiscalError::Internal("boom".into()));
        assert_eq!(internal.outcome, OutcomeKind::Internal);
    }

    #[test]
    fn test_follow_up_failure_is_degraded() {
        let done = CompletedTransaction {
            submission: Submission {
                ledger_id: "abc".into(),
                reference_no: "42".into(),
                receipt: None,
            },
            stock: None,
            follow_up: Some(FollowUpFailure {
                step: FollowUpStep::StockOut,
                message: "Network failure after 3 attempt(s): timeout".into(),
            }),
        };

        let report = OperationReport::from(&done);
        assert_eq!(report.outcome, OutcomeKind::Degraded);
        assert!(report.outcome.is_accepted());
        assert_eq!(report.ledger_id.as_deref(), Some("abc"));
        assert!(report.message.starts_with("stock_out failed"));
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let json = serde_json::to_string(&OutcomeKind::NetworkFailure).unwrap();
        assert_eq!(json, "\"network_failure\"");
    }
}

// ── Vitalis Engine — Response Validation ───────────────────────────────────
// Post-hoc hallucination detection over the final response of each turn.
//
//   numeric.rs — (number, unit?) extraction + tolerance matching against
//                the turn's raw tool transcript (ground truth)
//   date.rs    — month/day(/year) mentions, query vs. response
//   retry.rs   — the single corrective re-invocation, date > numeric
//
// The validator never raises: a failed check degrades to a reported score
// plus (at most) the one retry.

pub mod date;
pub mod numeric;
pub mod retry;

use serde::Serialize;

use crate::engine::config::ValidationConfig;

pub use date::{check_dates, extract_dates, DateMention, DateMismatch};
pub use numeric::{check_numbers, extract_numbers, NumberMention, NumericCheck, NumericStats};
pub use retry::{validate_and_correct, ValidationOutcome};

/// Why a corrective retry fired. Everything else is reported only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RetryReason {
    DateMismatch,
    NumericZeroScore,
}

/// Combined verdict for one response. Derived, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub numeric: NumericCheck,
    pub date_mismatches: Vec<DateMismatch>,
    pub retry_reason: Option<RetryReason>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.numeric.valid && self.date_mismatches.is_empty()
    }

    pub fn score(&self) -> f32 {
        self.numeric.score
    }
}

/// Run both checks and decide whether a retry is warranted.
///
/// Retry priority: date mismatch first, then a zero-score numeric result —
/// but only when there *is* ground truth to correct against; a response
/// that invented numbers with no tool results is reported, not retried.
pub fn validate_turn(
    query: &str,
    response: &str,
    ground_truth: &str,
    config: &ValidationConfig,
) -> ValidationReport {
    if !config.enabled {
        return ValidationReport {
            numeric: check_numbers("", "", config),
            date_mismatches: Vec::new(),
            retry_reason: None,
        };
    }

    let numeric = check_numbers(response, ground_truth, config);
    let date_mismatches = check_dates(query, response);

    let retry_reason = if !date_mismatches.is_empty() {
        Some(RetryReason::DateMismatch)
    } else if numeric.score == 0.0 && numeric.stats.response_numbers > 0 && !numeric.ground_truth_empty {
        Some(RetryReason::NumericZeroScore)
    } else {
        None
    };

    ValidationReport { numeric, date_mismatches, retry_reason }
}

// ── Vitalis Validation — Corrective Retry ──────────────────────────────────
// At most one corrective re-invocation of the model per turn, without tool
// access. Priority: a date mismatch outranks a zero-score numeric mismatch;
// every other shortfall (partial mismatch, no tool results) is reported but
// not retried. The retry prompt quotes the expected value/date. A failed
// retry leaves the original response in place with its low score recorded.

use log::{info, warn};

use crate::atoms::types::Message;
use crate::engine::config::ValidationConfig;
use crate::engine::providers::ModelProvider;
use crate::engine::validation::numeric::extract_numbers;
use crate::engine::validation::{validate_turn, RetryReason, ValidationReport};

/// The final word on one turn's response.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// Validation of the answer actually returned to the user.
    pub report: ValidationReport,
    pub final_text: String,
    /// True when the corrective retry replaced the original response.
    pub corrected: bool,
}

/// Render the correction request the model sees on retry.
fn build_correction_prompt(report: &ValidationReport, ground_truth: &str) -> Option<String> {
    match report.retry_reason? {
        RetryReason::DateMismatch => {
            let mismatch = report.date_mismatches.first()?;
            Some(format!(
                "Your previous answer referred to {found}, but the user asked about {expected}. \
                 Rewrite your answer for {expected}, keeping every value consistent with the tool \
                 results already provided. Reply with the corrected answer only.",
                found = mismatch.found.display(),
                expected = mismatch.expected.display(),
            ))
        }
        RetryReason::NumericZeroScore => {
            let expected: Vec<String> = extract_numbers(ground_truth)
                .into_iter()
                .map(|n| match n.unit {
                    Some(unit) => format!("{} {}", n.value, unit),
                    None => n.value.to_string(),
                })
                .collect();
            Some(format!(
                "None of the numbers in your previous answer match the tool results. The correct \
                 values are: {}. Rewrite your answer using exactly these values. Reply with the \
                 corrected answer only.",
                expected.join(", ")
            ))
        }
    }
}

/// Validate a response and, when warranted, run the single corrective
/// retry. Never raises: any failure inside the retry degrades to the
/// original response with its low score recorded.
pub async fn validate_and_correct(
    provider: &dyn ModelProvider,
    query: &str,
    response: &str,
    ground_truth: &str,
    turn_messages: &[Message],
    config: &ValidationConfig,
) -> ValidationOutcome {
    let report = validate_turn(query, response, ground_truth, config);
    if report.retry_reason.is_none() {
        return ValidationOutcome { report, final_text: response.to_string(), corrected: false };
    }

    let Some(correction) = build_correction_prompt(&report, ground_truth) else {
        return ValidationOutcome { report, final_text: response.to_string(), corrected: false };
    };

    info!(
        "[validate] Corrective retry ({:?}): score {:.2}, {} date mismatches",
        report.retry_reason,
        report.numeric.score,
        report.date_mismatches.len()
    );

    let mut messages = turn_messages.to_vec();
    messages.push(Message::system(correction));

    // No tool access on the retry.
    match provider.chat(&messages, &[]).await {
        Ok(turn) if !turn.text.is_empty() => {
            let corrected_report = validate_turn(query, &turn.text, ground_truth, config);
            info!(
                "[validate] Retry accepted: score {:.2} → {:.2}",
                report.numeric.score, corrected_report.numeric.score
            );
            ValidationOutcome { report: corrected_report, final_text: turn.text, corrected: true }
        }
        Ok(_) => {
            warn!("[validate] Retry produced an empty turn; keeping original response");
            ValidationOutcome { report, final_text: response.to_string(), corrected: false }
        }
        Err(e) => {
            warn!("[validate] Retry failed ({e}); keeping original response");
            ValidationOutcome { report, final_text: response.to_string(), corrected: false }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::ModelTurn;
    use crate::engine::providers::ScriptedProvider;

    fn cfg() -> ValidationConfig {
        ValidationConfig::default()
    }

    #[tokio::test]
    async fn valid_responses_skip_the_retry() {
        let provider = ScriptedProvider::repeating(ModelTurn::default());
        let outcome = validate_and_correct(
            &provider,
            "average heart rate last week?",
            "Your average heart rate last week was 72.5 bpm",
            r#"{"average": "72.5 bpm"}"#,
            &[],
            &cfg(),
        )
        .await;
        assert!(!outcome.corrected);
        assert!(outcome.report.is_valid());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn date_mismatch_triggers_exactly_one_retry() {
        let provider = ScriptedProvider::repeating(ModelTurn {
            text: "On October 15 your average heart rate was 72.5 bpm.".into(),
            ..Default::default()
        });
        let outcome = validate_and_correct(
            &provider,
            "What was my heart rate on October 15th?",
            "On October 11 your average heart rate was 72.5 bpm.",
            r#"{"average": "72.5 bpm"}"#,
            &[Message::user("What was my heart rate on October 15th?")],
            &cfg(),
        )
        .await;
        assert!(outcome.corrected);
        assert_eq!(provider.call_count(), 1);
        assert!(outcome.final_text.contains("October 15"));
        assert!(outcome.report.is_valid());

        // The correction quoted the expected date.
        let retry_messages = &provider.calls.lock()[0];
        let correction = &retry_messages.last().unwrap().content;
        assert!(correction.contains("October 15"));
        assert!(correction.contains("October 11"));
    }

    #[tokio::test]
    async fn zero_score_numeric_triggers_retry_quoting_values() {
        let provider = ScriptedProvider::repeating(ModelTurn {
            text: "Your average was 72.5 bpm.".into(),
            ..Default::default()
        });
        let outcome = validate_and_correct(
            &provider,
            "average heart rate last week?",
            "Your average was 99 bpm.",
            r#"{"average": "72.5 bpm"}"#,
            &[],
            &cfg(),
        )
        .await;
        assert!(outcome.corrected);
        let calls = provider.calls.lock();
        let correction = &calls[0].last().unwrap().content;
        assert!(correction.contains("72.5 bpm"));
    }

    #[tokio::test]
    async fn empty_ground_truth_is_reported_not_retried() {
        let provider = ScriptedProvider::repeating(ModelTurn::default());
        let outcome = validate_and_correct(
            &provider,
            "average heart rate?",
            "Your average was 72.5 bpm.",
            "",
            &[],
            &cfg(),
        )
        .await;
        assert!(!outcome.corrected);
        assert_eq!(provider.call_count(), 0);
        assert_eq!(outcome.report.numeric.score, 0.0);
        assert!(!outcome.report.is_valid());
    }

    #[tokio::test]
    async fn failed_retry_keeps_the_original() {
        // Scripted provider with empty text: retry yields nothing usable.
        let provider = ScriptedProvider::repeating(ModelTurn::default());
        let outcome = validate_and_correct(
            &provider,
            "heart rate on October 15th?",
            "On October 11 it was 72.5 bpm.",
            r#"{"average": "72.5 bpm"}"#,
            &[],
            &cfg(),
        )
        .await;
        assert!(!outcome.corrected);
        assert!(outcome.final_text.contains("October 11"));
        assert_eq!(provider.call_count(), 1);
    }
}

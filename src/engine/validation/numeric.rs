// ── Vitalis Validation — Numeric Check ─────────────────────────────────────
// Extract every (number, unit?) mention from the final response and from
// the turn's raw tool transcript, then verify each response number against
// that ground truth. A number nobody's tool produced is a hallucination.
//
// Date-shaped numbers (ordinal suffixes, month-adjacent days, slash dates,
// 4-digit years) are excluded here — a wrong date is reported once, by the
// date check, which also owns the higher-priority retry.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::atoms::constants::NUMERIC_ABSOLUTE_SLACK;
use crate::engine::config::ValidationConfig;

/// One extracted numeric mention with its local text context.
#[derive(Debug, Clone, Serialize)]
pub struct NumberMention {
    pub value: f64,
    pub unit: Option<String>,
    pub context: String,
}

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        (\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)          # value, 1,234.5 or 72.5
        (?:
            \s*(bpm|lbs|lb|kg|steps|hours|hrs|minutes|min|kcal|calories|cal|km|miles|mi|percent|mmhg|ms)\b
          | \s*(%)
        )?",
    )
    .expect("number regex")
});

static MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep",
    "sept", "oct", "nov", "dec",
];

fn canonical_unit(unit: &str) -> String {
    match unit.to_lowercase().as_str() {
        "lb" => "lbs".to_string(),
        "hrs" => "hours".to_string(),
        "min" => "minutes".to_string(),
        "cal" | "calories" => "kcal".to_string(),
        "mi" => "miles".to_string(),
        "percent" => "%".to_string(),
        other => other.to_string(),
    }
}

/// True when the match at `[start, end)` is part of a date mention rather
/// than a measurement.
fn is_date_number(text: &str, start: usize, end: usize, raw: &str) -> bool {
    let after = &text[end..];
    let before = &text[..start];

    // Ordinal day: "15th", "3rd".
    let lowered_after = after.to_lowercase();
    if ["st", "nd", "rd", "th"].iter().any(|s| lowered_after.starts_with(s)) {
        return true;
    }

    // Slash dates: "10/15" or "10/15/2024" — either side of a slash.
    if after.starts_with('/') && after[1..].starts_with(|c: char| c.is_ascii_digit()) {
        return true;
    }
    if before.ends_with('/') && before.trim_end_matches('/').ends_with(|c: char| c.is_ascii_digit()) {
        return true;
    }

    // Month-adjacent day: "October 15".
    let tail: String = before
        .chars()
        .rev()
        .take(12)
        .collect::<String>()
        .chars()
        .rev()
        .collect::<String>()
        .to_lowercase();
    let tail = tail.trim_end();
    if MONTHS.iter().any(|m| tail.ends_with(m)) {
        return true;
    }

    // Bare year.
    if raw.len() == 4 && !raw.contains('.') {
        if let Ok(y) = raw.parse::<i64>() {
            if (1900..=2100).contains(&y) {
                return true;
            }
        }
    }

    false
}

/// Extract all numeric mentions from free text, with ±30 chars of context.
pub fn extract_numbers(text: &str) -> Vec<NumberMention> {
    let mut mentions = Vec::new();
    for caps in NUMBER_RE.captures_iter(text) {
        let (whole, raw) = match (caps.get(0), caps.get(1)) {
            (Some(w), Some(v)) => (w, v.as_str()),
            _ => continue,
        };
        if is_date_number(text, whole.start(), whole.end(), raw) {
            continue;
        }
        let value: f64 = match raw.replace(',', "").parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let unit = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| canonical_unit(m.as_str()));

        let ctx_start = text[..whole.start()].char_indices().rev().nth(29).map(|(i, _)| i).unwrap_or(0);
        let ctx_end = text[whole.end()..]
            .char_indices()
            .nth(30)
            .map(|(i, _)| whole.end() + i)
            .unwrap_or(text.len());

        mentions.push(NumberMention {
            value,
            unit,
            context: text[ctx_start..ctx_end].to_string(),
        });
    }
    mentions
}

// ── Matching ───────────────────────────────────────────────────────────────

/// Per-check accounting, surfaced alongside the verdict.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NumericStats {
    pub response_numbers: usize,
    pub ground_truth_numbers: usize,
    pub matched_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NumericCheck {
    pub valid: bool,
    pub score: f32,
    pub matched: Vec<NumberMention>,
    pub hallucinations: Vec<NumberMention>,
    pub stats: NumericStats,
    /// Set when the response carried numbers but no tool produced any —
    /// reported, but not retried (there is nothing to correct against).
    pub ground_truth_empty: bool,
}

fn values_close(response: f64, truth: f64, tolerance: f32) -> bool {
    let diff = (response - truth).abs();
    if diff < NUMERIC_ABSOLUTE_SLACK {
        return true;
    }
    response != 0.0 && diff / response.abs() <= tolerance as f64
}

fn units_compatible(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

/// Verify the response's numbers against tool-transcript ground truth.
pub fn check_numbers(response: &str, ground_truth: &str, config: &ValidationConfig) -> NumericCheck {
    let response_numbers = extract_numbers(response);
    let truth_numbers = extract_numbers(ground_truth);

    let stats = NumericStats {
        response_numbers: response_numbers.len(),
        ground_truth_numbers: truth_numbers.len(),
        matched_count: 0,
    };

    // No numbers: nothing to hallucinate.
    if response_numbers.is_empty() {
        return NumericCheck {
            valid: true,
            score: 1.0,
            matched: Vec::new(),
            hallucinations: Vec::new(),
            stats,
            ground_truth_empty: truth_numbers.is_empty(),
        };
    }

    // Numbers with no ground truth at all: immediately invalid.
    if truth_numbers.is_empty() {
        return NumericCheck {
            valid: false,
            score: 0.0,
            matched: Vec::new(),
            hallucinations: response_numbers,
            stats,
            ground_truth_empty: true,
        };
    }

    let mut matched = Vec::new();
    let mut hallucinations = Vec::new();
    for mention in response_numbers {
        let hit = truth_numbers.iter().any(|t| {
            values_close(mention.value, t.value, config.tolerance) && units_compatible(&mention.unit, &t.unit)
        });
        if hit {
            matched.push(mention);
        } else {
            hallucinations.push(mention);
        }
    }

    let total = matched.len() + hallucinations.len();
    let score = matched.len() as f32 / total as f32;
    NumericCheck {
        valid: score >= config.pass_score && hallucinations.is_empty(),
        score,
        stats: NumericStats { matched_count: matched.len(), ..stats },
        matched,
        hallucinations,
        ground_truth_empty: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ValidationConfig {
        ValidationConfig::default()
    }

    #[test]
    fn extracts_value_unit_pairs() {
        let nums = extract_numbers("Your average heart rate was 72.5 bpm over 7 hours of sleep.");
        assert_eq!(nums.len(), 2);
        assert_eq!(nums[0].value, 72.5);
        assert_eq!(nums[0].unit.as_deref(), Some("bpm"));
        assert_eq!(nums[1].value, 7.0);
        assert_eq!(nums[1].unit.as_deref(), Some("hours"));
    }

    #[test]
    fn thousands_separators_parse() {
        let nums = extract_numbers("You walked 12,345 steps.");
        assert_eq!(nums[0].value, 12_345.0);
        assert_eq!(nums[0].unit.as_deref(), Some("steps"));
    }

    #[test]
    fn date_numbers_are_excluded() {
        assert!(extract_numbers("on October 15th you rested").is_empty());
        assert!(extract_numbers("on October 15 you rested").is_empty());
        assert!(extract_numbers("back in 2024 things were different").is_empty());
        assert!(extract_numbers("on 10/15 you walked a lot").is_empty());
    }

    #[test]
    fn zero_numbers_is_always_valid() {
        let check = check_numbers("You slept well last night.", "", &cfg());
        assert!(check.valid);
        assert_eq!(check.score, 1.0);
    }

    #[test]
    fn numbers_without_ground_truth_score_zero() {
        let check = check_numbers("Your heart rate was 72 bpm.", "", &cfg());
        assert!(!check.valid);
        assert_eq!(check.score, 0.0);
        assert!(check.ground_truth_empty);
        assert_eq!(check.hallucinations.len(), 1);
    }

    #[test]
    fn exact_and_tolerant_matches() {
        let truth = r#"{"average": "72.5 bpm"}"#;
        let check = check_numbers("Your average heart rate last week was 72.5 bpm", truth, &cfg());
        assert!(check.valid);
        assert_eq!(check.stats.matched_count, 1);
        assert_eq!(check.score, 1.0);

        // Within absolute slack of 1.0.
        let check = check_numbers("about 73 bpm on average", truth, &cfg());
        assert!(check.valid);

        // Within 10% relative tolerance.
        let check = check_numbers("roughly 75 bpm", truth, &cfg());
        assert!(check.valid);

        // Far off: hallucination.
        let check = check_numbers("roughly 95 bpm", truth, &cfg());
        assert!(!check.valid);
        assert_eq!(check.hallucinations.len(), 1);
    }

    #[test]
    fn unit_mismatch_fails_when_both_present() {
        let check = check_numbers("you lost 72.5 lbs", r#"{"average": "72.5 bpm"}"#, &cfg());
        assert!(!check.valid);
        // Unit-less ground truth matches anything numeric.
        let check = check_numbers("around 72.5 bpm", r#"{"average": 72.5}"#, &cfg());
        assert!(check.valid);
    }

    #[test]
    fn partial_match_scores_fractionally() {
        let truth = r#"{"average": "72.5 bpm", "total": "12000 steps"}"#;
        let check = check_numbers("72.5 bpm average and 9000 steps", truth, &cfg());
        assert_eq!(check.stats.matched_count, 1);
        assert_eq!(check.hallucinations.len(), 1);
        assert!((check.score - 0.5).abs() < 1e-6);
        assert!(!check.valid);
    }
}

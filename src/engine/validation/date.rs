// ── Vitalis Validation — Date Check ────────────────────────────────────────
// Extract month/day(/year) mentions from the user query and from the final
// response. When the query names a date and the response names a different
// month/day, that's a date hallucination — the highest-priority trigger for
// the corrective retry. Years are ignored in comparison unless both sides
// specify one.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateMention {
    pub month: u32,
    pub day: u32,
    pub year: Option<i32>,
    /// The text as it appeared.
    pub text: String,
}

impl DateMention {
    /// Month/day equality; years only compared when both sides carry one.
    pub fn same_date(&self, other: &DateMention) -> bool {
        if self.month != other.month || self.day != other.day {
            return false;
        }
        match (self.year, other.year) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Human rendering for the corrective-retry prompt.
    pub fn display(&self) -> String {
        let month = MONTH_NAMES.get(self.month as usize - 1).copied().unwrap_or("Unknown");
        match self.year {
            Some(y) => format!("{month} {}, {y}", self.day),
            None => format!("{month} {}", self.day),
        }
    }
}

/// A response date that matched nothing the user asked about.
#[derive(Debug, Clone, Serialize)]
pub struct DateMismatch {
    pub expected: DateMention,
    pub found: DateMention,
}

const MONTH_NAMES: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

static NAMED_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(january|february|march|april|may|june|july|august|september|october|november|december|
           jan|feb|mar|apr|jun|jul|aug|sep|sept|oct|nov|dec)\.?
        \s+(\d{1,2})(?:st|nd|rd|th)?\b
        (?:,?\s*(\d{4}))?",
    )
    .expect("named date regex")
});

static NUMERIC_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\b").expect("numeric date regex"));

fn month_number(name: &str) -> Option<u32> {
    let n = name.to_lowercase();
    let idx = MONTH_NAMES.iter().position(|m| {
        let full = m.to_lowercase();
        full == n || (n.len() >= 3 && full.starts_with(&n[..3]) && n.len() <= 4)
    })?;
    Some(idx as u32 + 1)
}

/// Extract every month/day(/year) mention from free text.
pub fn extract_dates(text: &str) -> Vec<DateMention> {
    let mut dates = Vec::new();

    for caps in NAMED_DATE_RE.captures_iter(text) {
        let (Some(whole), Some(month_raw), Some(day_raw)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(month) = month_number(month_raw.as_str()) else { continue };
        let Ok(day) = day_raw.as_str().parse::<u32>() else { continue };
        if !(1..=31).contains(&day) {
            continue;
        }
        let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
        dates.push(DateMention { month, day, year, text: whole.as_str().to_string() });
    }

    for caps in NUMERIC_DATE_RE.captures_iter(text) {
        let (Some(whole), Some(month_raw), Some(day_raw)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let Ok(month) = month_raw.as_str().parse::<u32>() else { continue };
        let Ok(day) = day_raw.as_str().parse::<u32>() else { continue };
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            continue;
        }
        let year = caps.get(3).and_then(|y| {
            let raw = y.as_str();
            let parsed: i32 = raw.parse().ok()?;
            Some(if raw.len() == 2 { 2000 + parsed } else { parsed })
        });
        dates.push(DateMention { month, day, year, text: whole.as_str().to_string() });
    }

    dates
}

/// Flag every response date that matches none of the query's dates.
/// A query without dates constrains nothing.
pub fn check_dates(query: &str, response: &str) -> Vec<DateMismatch> {
    let query_dates = extract_dates(query);
    if query_dates.is_empty() {
        return Vec::new();
    }
    let response_dates = extract_dates(response);

    response_dates
        .into_iter()
        .filter(|r| !query_dates.iter().any(|q| q.same_date(r)))
        .map(|found| DateMismatch { expected: query_dates[0].clone(), found })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_dates_parse() {
        let dates = extract_dates("What did I do on October 15th?");
        assert_eq!(dates.len(), 1);
        assert_eq!((dates[0].month, dates[0].day, dates[0].year), (10, 15, None));
    }

    #[test]
    fn abbreviated_month_and_year() {
        let dates = extract_dates("Back on Oct 15, 2024 you walked a lot");
        assert_eq!(dates.len(), 1);
        assert_eq!((dates[0].month, dates[0].day, dates[0].year), (10, 15, Some(2024)));
    }

    #[test]
    fn numeric_dates_parse() {
        let dates = extract_dates("on 10/15 and again on 3/7/24");
        assert_eq!(dates.len(), 2);
        assert_eq!((dates[0].month, dates[0].day), (10, 15));
        assert_eq!((dates[1].month, dates[1].day, dates[1].year), (3, 7, Some(2024)));
    }

    #[test]
    fn matching_dates_produce_no_mismatch() {
        let mismatches =
            check_dates("heart rate on October 15th?", "On October 15 your average was 72 bpm.");
        assert!(mismatches.is_empty());
    }

    #[test]
    fn different_day_is_flagged() {
        let mismatches =
            check_dates("heart rate on October 15th?", "On October 11 your average was 72 bpm.");
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].found.day, 11);
        assert_eq!(mismatches[0].expected.day, 15);
    }

    #[test]
    fn year_ignored_unless_both_present() {
        let mismatches = check_dates("sleep on October 15, 2024?", "On October 15 you slept 7 hours.");
        assert!(mismatches.is_empty());
        let mismatches = check_dates("sleep on October 15, 2024?", "On October 15, 2023 you slept 7 hours.");
        assert_eq!(mismatches.len(), 1);
    }

    #[test]
    fn bare_month_year_is_not_a_day() {
        assert!(extract_dates("throughout December 2024").is_empty());
    }

    #[test]
    fn query_without_dates_constrains_nothing() {
        assert!(check_dates("how did I sleep?", "On October 15 you slept 7 hours.").is_empty());
    }

    #[test]
    fn display_renders_month_names() {
        let d = DateMention { month: 10, day: 15, year: None, text: "October 15".into() };
        assert_eq!(d.display(), "October 15");
    }
}

//! Alternative area codes suggested inside upstream rejection bodies.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::phone_number::Candidate;

// NANP area codes never start with 0 or 1.
const HINT_PATTERN: &str = r"\b[2-9][0-9]{2}\b";
// `"statusCode":400`, `status_code=404`, `status: 409` and friends.
const STATUS_FIELD_PATTERN: &str = r#"(?i)"?\bstatus(?:_?code)?"?\s*[:=]\s*"?[0-9]{3}\b"#;

static HINT_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static STATUS_FIELD_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn hint_regex() -> Option<&'static Regex> {
    HINT_REGEX.get_or_init(|| Regex::new(HINT_PATTERN).ok()).as_ref()
}

fn status_field_regex() -> Option<&'static Regex> {
    STATUS_FIELD_REGEX.get_or_init(|| Regex::new(STATUS_FIELD_PATTERN).ok()).as_ref()
}

/// Returns every standalone token in `text` shaped like an area code, once
/// each, in the order first seen.
///
/// Not hints: digits embedded in longer numbers (`+15185551234`), values of
/// HTTP status fields (`"statusCode":400`) and N11 service codes (`911`).
pub fn extract_hints(text: &str) -> Vec<Candidate> {
    let Some(regex) = hint_regex() else {
        return Vec::new();
    };
    let text = match status_field_regex() {
        Some(status_field) => status_field.replace_all(text, " "),
        None => text.into(),
    };

    let mut seen = HashSet::new();
    regex
        .find_iter(&text)
        .map(|found| found.as_str())
        .filter(|token| !token.ends_with("11"))
        .map(Candidate::new)
        .filter(|candidate| seen.insert(candidate.dedup_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::extract_hints;
    use crate::domain::phone_number::Candidate;

    fn values(text: &str) -> Vec<String> {
        extract_hints(text).into_iter().map(|candidate: Candidate| candidate.0).collect()
    }

    #[test]
    fn collapses_repeats_and_keeps_first_seen_order() {
        assert_eq!(values("Try 518, 510, or 518 again"), vec!["518", "510"]);
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "Area code 415 unavailable. Try 628 or 669.";
        assert_eq!(values(text), values(text));
        assert_eq!(values(text), vec!["415", "628", "669"]);
    }

    #[test]
    fn ignores_digits_inside_longer_numbers() {
        assert!(values("assigned +15185551234 at 2025").is_empty());
    }

    #[test]
    fn reads_hints_out_of_json_bodies() {
        let body = r#"{"message":"numberDesiredAreaCode not available. Try one of: 904, 305","statusCode":400}"#;
        assert_eq!(values(body), vec!["904", "305"]);
    }

    #[test]
    fn skips_status_code_fields() {
        assert_eq!(values(r#"{"statusCode": 404, "message": "try 628"}"#), vec!["628"]);
        assert_eq!(values("status_code=409; try 669"), vec!["669"]);
        assert_eq!(values(r#"{"status":"422","error":"use 415"}"#), vec!["415"]);
    }

    #[test]
    fn skips_tokens_that_cannot_be_area_codes() {
        assert!(values("codes 011, 123 and 911 are reserved").is_empty());
        assert_eq!(values("dial 411 or try 212"), vec!["212"]);
    }

    #[test]
    fn returns_empty_without_matches() {
        assert!(values("").is_empty());
        assert!(values("no numbers available right now").is_empty());
    }
}

//! Overview parsing: four scalars out of a JSON object or a labeled block.
//!
//! Two shapes are tried in order, each as an independent attempt that
//! returns `Option<Overview>`:
//!
//! 1. **JSON**: an object with `Geography`, `Industry`, `Stage` and
//!    `OverallScore` (what the JSON-mode prompt asks for). Tried on the raw
//!    text, then on the fenced payload, then on each `{ … }` value in the
//!    surrounding prose.
//! 2. **Labeled text**: the bulleted form older prompts produced:
//!
//! ```text
//! - Geography: [Germany]
//! - Industry: [Energy storage]
//! - Stage: [Seed]
//! - Overall Score: [7/10]
//! ```
//!
//! Labels are case-sensitive. Only the leading digits of the score are used.

use crate::error::ParseMiss;
use crate::output::{Overview, NOT_MENTIONED};
use crate::pipeline::normalize::{extract_payload, json_candidates, normalise_line_endings};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

const KEYS: [&str; 4] = ["Geography", "Industry", "Stage", "OverallScore"];

/// Parse an overview response, or report which response missed.
pub fn try_parse_overview(raw: &str) -> Result<Overview, ParseMiss> {
    let payload = extract_payload(raw);
    [raw.trim(), payload]
        .into_iter()
        .chain(json_candidates(raw, '{'))
        .find_map(from_json)
        .or_else(|| from_labeled_text(raw))
        .ok_or_else(|| ParseMiss::overview(raw))
}

/// Parse an overview response, falling back to the sentinel record.
pub fn parse_overview(raw: &str) -> Overview {
    try_parse_overview(raw).unwrap_or_else(|miss| {
        warn!("{miss}; using default overview");
        Overview::default()
    })
}

// ── Shape 1: JSON object ─────────────────────────────────────────────────────

pub(crate) fn from_json(text: &str) -> Option<Overview> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    from_object(value.as_object()?)
}

fn from_object(obj: &Map<String, Value>) -> Option<Overview> {
    if !KEYS.iter().any(|k| obj.contains_key(*k)) {
        // Stored artifacts wrap the record as {"Overview": {...}}.
        return obj.get("Overview")?.as_object().and_then(from_object);
    }
    Some(Overview {
        geography: text_field(obj.get("Geography")),
        industry: text_field(obj.get("Industry")),
        stage: text_field(obj.get("Stage")),
        overall_score: score_field(obj.get("OverallScore")),
    })
}

fn text_field(value: Option<&Value>) -> String {
    let text = match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => return NOT_MENTIONED.to_string(),
    };
    clean_value(&text)
}

fn score_field(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(u) = n.as_u64() {
                u32::try_from(u).unwrap_or(0)
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => f as u32,
                    _ => 0,
                }
            }
        }
        Some(Value::String(s)) => strip_brackets(s.trim()).trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Trim, drop one surrounding `[ … ]`, and map empty to the sentinel.
fn clean_value(s: &str) -> String {
    let v = strip_brackets(s.trim()).trim();
    if v.is_empty() {
        NOT_MENTIONED.to_string()
    } else {
        v.to_string()
    }
}

fn strip_brackets(s: &str) -> &str {
    s.strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(s)
}

// ── Shape 2: labeled text ────────────────────────────────────────────────────

static RE_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"Geography:[ \t]*\[?(.+?)\]?[ \t]*\n",
        r"[ \t]*-[ \t]*Industry:[ \t]*\[?(.+?)\]?[ \t]*\n",
        r"[ \t]*-[ \t]*Stage:[ \t]*\[?(.+?)\]?[ \t]*\n",
        r"[ \t]*-[ \t]*Overall Score:[ \t]*\[?[ \t]*(\d+)",
    ))
    .unwrap()
});

pub(crate) fn from_labeled_text(text: &str) -> Option<Overview> {
    let text = normalise_line_endings(text);
    let caps = RE_LABELED.captures(&text)?;
    Some(Overview {
        geography: clean_value(&caps[1]),
        industry: clean_value(&caps[2]),
        stage: clean_value(&caps[3]),
        overall_score: caps[4].parse().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ov(g: &str, i: &str, s: &str, score: u32) -> Overview {
        Overview {
            geography: g.into(),
            industry: i.into(),
            stage: s.into(),
            overall_score: score,
        }
    }

    #[test]
    fn empty_input_yields_sentinel() {
        assert_eq!(parse_overview(""), Overview::default());
        assert!(try_parse_overview("").is_err());
    }

    #[test]
    fn strict_json() {
        let raw = r#"{"Geography": "Germany", "Industry": "Energy storage", "Stage": "Seed", "OverallScore": 7}"#;
        assert_eq!(parse_overview(raw), ov("Germany", "Energy storage", "Seed", 7));
    }

    #[test]
    fn json_and_labeled_shapes_agree() {
        let json = r#"{"Geography": "France", "Industry": "AgriTech", "Stage": "Series A", "OverallScore": 6}"#;
        let labeled = "Overview:\n- Geography: [France]\n- Industry: [AgriTech]\n- Stage: [Series A]\n- Overall Score: [6/10]\n";
        assert_eq!(parse_overview(json), parse_overview(labeled));
    }

    #[test]
    fn fenced_json_with_prose() {
        let raw = "Here is the overview:\n```json\n{\"Geography\": \"Spain\", \"Industry\": \"Mobility\", \"Stage\": \"Pre-seed\", \"OverallScore\": 5}\n```\nLet me know!";
        assert_eq!(parse_overview(raw), ov("Spain", "Mobility", "Pre-seed", 5));
    }

    #[test]
    fn unfenced_json_inside_prose() {
        let raw = "Sure. {\"Geography\": \"Italy\", \"OverallScore\": 4} That is all.";
        assert_eq!(parse_overview(raw), ov("Italy", NOT_MENTIONED, NOT_MENTIONED, 4));
    }

    #[test]
    fn score_coercion() {
        let parse = |score: &str| {
            parse_overview(&format!(r#"{{"Geography": "X", "OverallScore": {score}}}"#)).overall_score
        };
        assert_eq!(parse("8"), 8);
        assert_eq!(parse("8.0"), 8);
        assert_eq!(parse("\"9\""), 9);
        assert_eq!(parse("\"[3]\""), 3);
        assert_eq!(parse("7.5"), 0);
        assert_eq!(parse("-2"), 0);
        assert_eq!(parse("\"high\""), 0);
        assert_eq!(parse("null"), 0);
    }

    #[test]
    fn blank_and_bracketed_values() {
        let raw = r#"{"Geography": "  [Nordics] ", "Industry": "", "Stage": null, "OverallScore": 2}"#;
        assert_eq!(parse_overview(raw), ov("Nordics", NOT_MENTIONED, NOT_MENTIONED, 2));
    }

    #[test]
    fn wrapped_artifact_shape() {
        let raw = r#"{"Overview": {"Geography": "UK", "Industry": "Fintech", "Stage": "Seed", "OverallScore": 6}}"#;
        assert_eq!(parse_overview(raw), ov("UK", "Fintech", "Seed", 6));
    }

    #[test]
    fn labeled_plain_values_and_crlf() {
        let raw = "- Geography: Netherlands\r\n- Industry: Water\r\n- Stage: Seed\r\n- Overall Score: 8 out of 10\r\n";
        assert_eq!(parse_overview(raw), ov("Netherlands", "Water", "Seed", 8));
    }

    #[test]
    fn labels_are_case_sensitive() {
        let raw = "- geography: [X]\n- industry: [Y]\n- stage: [Z]\n- overall score: [5]";
        assert!(try_parse_overview(raw).is_err());
    }

    #[test]
    fn json_without_known_keys_is_a_miss() {
        assert!(try_parse_overview(r#"{"Country": "Germany"}"#).is_err());
        assert!(try_parse_overview("[1, 2, 3]").is_err());
    }

    #[test]
    fn bracketed_prose_before_json_object() {
        let raw = "Labels in [brackets] are {approximate}:\n{\"Geography\": \"Chile\", \"Industry\": \"Mining\", \"Stage\": \"Seed\", \"OverallScore\": 6}\nSee {appendix}.";
        assert_eq!(try_parse_overview(raw).unwrap(), ov("Chile", "Mining", "Seed", 6));
    }

    #[test]
    fn labeled_values_keep_nested_brackets() {
        let raw = "- Geography: [EU [DACH]]\n- Industry: [Robotics [B2B]]\n- Stage: [Seed]\n- Overall Score: [7/10]\n";
        assert_eq!(parse_overview(raw), ov("EU [DACH]", "Robotics [B2B]", "Seed", 7));
    }
}

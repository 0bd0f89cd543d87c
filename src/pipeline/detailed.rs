//! Detailed-analysis parsing: scored criteria rows into category buckets.
//!
//! ## Accepted shapes
//!
//! 1. **JSON array** of `{Category, Criteria, Score, Explanation}` objects,
//!    optionally fenced or surrounded by prose. An object wrapping a single
//!    array (what JSON-mode completions tend to return) is unwrapped.
//! 2. **Pipe table** with four columns,
//!    `| category | criteria | score | explanation |`. Header, separator and
//!    prose lines simply do not match the row pattern and are skipped.
//!
//! ## Row policy
//!
//! Rows are validated one at a time. A bad row is dropped and counted, never
//! fatal to its siblings:
//!
//! | Field            | JSON                              | Table                 |
//! |------------------|-----------------------------------|-----------------------|
//! | Category missing | `Uncategorized`                   | `Uncategorized`       |
//! | Unknown category | own bucket, appended              | own bucket, appended  |
//! | Score missing    | `0`, row kept                     | n/a (row not matched) |
//! | Score not 1–10   | row dropped                       | row dropped           |
//!
//! Category matching is exact string equality. `"Team."` is not `"Team"`.

use crate::error::ParseMiss;
use crate::output::{CriterionEntry, DetailedAnalysis};
use crate::pipeline::normalize::{extract_payload, json_candidates, normalise_line_endings};
use crate::schema::{ScoringSchema, UNCATEGORIZED};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// Which shape a successful parse came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    Json,
    Table,
}

/// A successful parse plus the rows it had to drop.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailedParse {
    pub analysis: DetailedAnalysis,
    pub shape: PayloadShape,
    pub dropped_rows: usize,
}

/// Parse a detailed-analysis response against `schema`.
///
/// Returns a miss when the payload is neither an array of objects nor a table
/// with at least one row-shaped line. An empty JSON array is a valid (empty)
/// result, not a miss.
pub fn try_parse_detailed_analysis(
    raw: &str,
    schema: &ScoringSchema,
) -> Result<DetailedParse, ParseMiss> {
    from_json(raw, schema)
        .or_else(|| from_table(raw, schema))
        .ok_or_else(|| ParseMiss::detailed_analysis(raw))
}

/// Parse a detailed-analysis response, falling back to an all-empty schema.
pub fn parse_detailed_analysis(raw: &str, schema: &ScoringSchema) -> DetailedAnalysis {
    match try_parse_detailed_analysis(raw, schema) {
        Ok(parse) => {
            if parse.dropped_rows > 0 {
                warn!("Dropped {} malformed analysis row(s)", parse.dropped_rows);
            }
            parse.analysis
        }
        Err(miss) => {
            warn!("{miss}; using empty analysis");
            DetailedAnalysis::for_schema(schema)
        }
    }
}

fn in_range(score: u64) -> Option<u8> {
    u8::try_from(score)
        .ok()
        .filter(|s| (MIN_SCORE..=MAX_SCORE).contains(s))
}

// ── Shape 1: JSON array ──────────────────────────────────────────────────────

fn from_json(raw: &str, schema: &ScoringSchema) -> Option<DetailedParse> {
    let payload = extract_payload(raw);
    let items = std::iter::once(payload.trim())
        .chain(json_candidates(payload, '['))
        .find_map(row_array)?;

    let mut analysis = DetailedAnalysis::for_schema(schema);
    let mut dropped_rows = 0;
    for (index, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            debug!(index, "skipping non-object analysis element");
            dropped_rows += 1;
            continue;
        };
        let score = match obj.get("Score") {
            None | Some(Value::Null) => 0,
            Some(value) => match json_score(value) {
                Some(score) => score,
                None => {
                    debug!(index, score = %value, "dropping row with invalid score");
                    dropped_rows += 1;
                    continue;
                }
            },
        };
        let entry = CriterionEntry {
            criteria: json_text(obj.get("Criteria")),
            score,
            explanation: json_text(obj.get("Explanation")),
        };
        analysis.push(&json_category(obj), entry);
    }

    Some(DetailedParse {
        analysis,
        shape: PayloadShape::Json,
        dropped_rows,
    })
}

/// The rows of `text` when it is a JSON array that could hold analysis rows.
///
/// A non-empty array without a single object (e.g. `[1]` lifted out of an
/// explanation cell) is not an analysis payload.
fn row_array(text: &str) -> Option<Vec<Value>> {
    let items = match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => items,
        Value::Object(obj) => unwrap_single_array(obj)?,
        _ => return None,
    };
    (items.is_empty() || items.iter().any(Value::is_object)).then_some(items)
}

fn unwrap_single_array(obj: Map<String, Value>) -> Option<Vec<Value>> {
    let mut arrays = obj.into_iter().filter_map(|(_, v)| match v {
        Value::Array(items) => Some(items),
        _ => None,
    });
    let first = arrays.next()?;
    arrays.next().is_none().then_some(first)
}

fn json_category(obj: &Map<String, Value>) -> String {
    match obj.get("Category") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => UNCATEGORIZED.to_string(),
    }
}

fn json_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn json_score(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(u) => in_range(u),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .and_then(|f| in_range(f as u64)),
        },
        Value::String(s) => s.trim().parse::<u64>().ok().and_then(in_range),
        _ => None,
    }
}

// ── Shape 2: pipe table ──────────────────────────────────────────────────────

static RE_TABLE_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\|\s*(.*?)\s*\|\s*(.*?)\s*\|\s*(\d+)\s*\|\s*(.*?)\s*\|").unwrap()
});

fn from_table(raw: &str, schema: &ScoringSchema) -> Option<DetailedParse> {
    let payload = normalise_line_endings(extract_payload(raw));
    let mut analysis = DetailedAnalysis::for_schema(schema);
    let mut matched = 0usize;
    let mut dropped_rows = 0usize;

    for (line_no, line) in payload.lines().enumerate() {
        let Some(caps) = RE_TABLE_ROW.captures(line) else {
            continue;
        };
        matched += 1;
        let Some(score) = caps[3].parse::<u64>().ok().and_then(in_range) else {
            debug!(line = line_no + 1, score = &caps[3], "dropping row with out-of-range score");
            dropped_rows += 1;
            continue;
        };
        let category = match caps[1].trim() {
            "" => UNCATEGORIZED,
            name => name,
        };
        analysis.push(
            category,
            CriterionEntry::new(caps[2].trim(), score, caps[4].trim()),
        );
    }

    (matched > 0).then_some(DetailedParse {
        analysis,
        shape: PayloadShape::Table,
        dropped_rows,
    })
}

//! Result types: parsed records, raw responses and the per-request outcome.
//!
//! Field names serialise in the PascalCase the client already consumes
//! (`Geography`, `OverallScore`, `Criteria`, …).

use crate::error::ParseMiss;
use crate::schema::{Round, ScoringSchema};
use crate::store::Folder;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Sentinel for overview fields the model did not provide.
pub const NOT_MENTIONED: &str = "Not mentioned";

/// One scored criterion as echoed back by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CriterionEntry {
    pub criteria: String,
    /// 1–10, or 0 for a JSON row that omitted its score.
    pub score: u8,
    pub explanation: String,
}

impl CriterionEntry {
    pub fn new(criteria: impl Into<String>, score: u8, explanation: impl Into<String>) -> Self {
        Self {
            criteria: criteria.into(),
            score,
            explanation: explanation.into(),
        }
    }
}

/// Entries for one category, in response order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBucket {
    pub name: String,
    pub entries: Vec<CriterionEntry>,
}

/// Category name → ordered entries.
///
/// Built from a [`ScoringSchema`] so every schema category is present (empty
/// when the model skipped it). Labels outside the schema get their own bucket
/// appended after the schema ones, in first-seen order. Names are matched by
/// exact string equality.
///
/// Serialises as a JSON object whose key order is the bucket order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailedAnalysis {
    buckets: Vec<CategoryBucket>,
}

impl DetailedAnalysis {
    /// One empty bucket per schema category.
    pub fn for_schema(schema: &ScoringSchema) -> Self {
        Self {
            buckets: schema
                .category_names()
                .map(|name| CategoryBucket {
                    name: name.to_string(),
                    entries: Vec::new(),
                })
                .collect(),
        }
    }

    /// Append `entry` to `category`, creating the bucket if needed.
    pub fn push(&mut self, category: &str, entry: CriterionEntry) {
        match self.buckets.iter_mut().find(|b| b.name == category) {
            Some(bucket) => bucket.entries.push(entry),
            None => self.buckets.push(CategoryBucket {
                name: category.to_string(),
                entries: vec![entry],
            }),
        }
    }

    /// Entries for `category`; empty when the category is unknown.
    pub fn entries(&self, category: &str) -> &[CriterionEntry] {
        self.buckets
            .iter()
            .find(|b| b.name == category)
            .map(|b| b.entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.buckets.iter().any(|b| b.name == category)
    }

    pub fn buckets(&self) -> &[CategoryBucket] {
        &self.buckets
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.name.as_str())
    }

    pub fn total_entries(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_entries() == 0
    }

    /// Mean score over entries that carry one (score > 0).
    pub fn average_score(&self) -> Option<f64> {
        let scores: Vec<u8> = self
            .buckets
            .iter()
            .flat_map(|b| b.entries.iter().map(|e| e.score))
            .filter(|s| *s > 0)
            .collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().map(|s| *s as f64).sum::<f64>() / scores.len() as f64)
        }
    }

    /// Render as the four-column pipe table the parser accepts.
    ///
    /// Pipes and line breaks inside cells are replaced so every entry stays
    /// on one row.
    pub fn to_markdown_table(&self) -> String {
        let mut out = String::from("| Category | Criteria | Score | Explanation |\n");
        out.push_str("|---|---|---|---|\n");
        for bucket in &self.buckets {
            for e in &bucket.entries {
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    table_cell(&bucket.name),
                    table_cell(&e.criteria),
                    e.score,
                    table_cell(&e.explanation)
                ));
            }
        }
        out
    }
}

fn table_cell(s: &str) -> String {
    s.replace('|', "/").replace(['\r', '\n'], " ").trim().to_string()
}

impl Serialize for DetailedAnalysis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for bucket in &self.buckets {
            map.serialize_entry(&bucket.name, &bucket.entries)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DetailedAnalysis {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BucketsVisitor;

        impl<'de> Visitor<'de> for BucketsVisitor {
            type Value = DetailedAnalysis;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of category name to criterion entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut analysis = DetailedAnalysis::default();
                while let Some((name, entries)) = map.next_entry::<String, Vec<CriterionEntry>>()? {
                    match analysis.buckets.iter_mut().find(|b| b.name == name) {
                        Some(bucket) => bucket.entries.extend(entries),
                        None => analysis.buckets.push(CategoryBucket { name, entries }),
                    }
                }
                Ok(analysis)
            }
        }

        deserializer.deserialize_map(BucketsVisitor)
    }
}

/// The four overview scalars. Never has missing keys: absent values hold
/// [`NOT_MENTIONED`] / `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Overview {
    pub geography: String,
    pub industry: String,
    pub stage: String,
    pub overall_score: u32,
}

impl Default for Overview {
    fn default() -> Self {
        Self {
            geography: NOT_MENTIONED.to_string(),
            industry: NOT_MENTIONED.to_string(),
            stage: NOT_MENTIONED.to_string(),
            overall_score: 0,
        }
    }
}

/// Model responses exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawResponses {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub overview: Option<String>,
    pub detailed_analysis: String,
}

/// Where one artifact write landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetStatus {
    Saved,
    /// Target disabled or not configured.
    Skipped,
    Failed { reason: String },
}

impl TargetStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, TargetStatus::Failed { .. })
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, TargetStatus::Saved)
    }

    /// The failure reason, if this target failed.
    pub fn failure(&self) -> Option<&str> {
        match self {
            TargetStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Local and remote result for one persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistOutcome {
    pub folder: Folder,
    pub name: String,
    pub local: TargetStatus,
    pub remote: TargetStatus,
}

/// Token and timing figures for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub extracted_chars: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

/// Everything one analysis request produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub filename: String,
    pub round: Round,
    /// `None` for Round 2, which does not request an overview.
    pub overview: Option<Overview>,
    pub detailed_analysis: DetailedAnalysis,
    pub raw: RawResponses,
    pub misses: Vec<ParseMiss>,
    /// Rows discarded for an invalid score.
    pub dropped_rows: usize,
    pub persistence: Vec<PersistOutcome>,
    pub stats: AnalysisStats,
}

impl AnalysisOutcome {
    pub fn persistence_failures(&self) -> impl Iterator<Item = &PersistOutcome> {
        self.persistence
            .iter()
            .filter(|p| p.local.is_failed() || p.remote.is_failed())
    }
}

impl PersistOutcome {
    /// At least one target holds the object.
    pub fn saved_anywhere(&self) -> bool {
        self.local.is_saved() || self.remote.is_saved()
    }

    /// The first target failure, local before remote.
    pub fn failure(&self) -> Option<&str> {
        self.local.failure().or_else(|| self.remote.failure())
    }
}

/// Result of copying decks into the successful folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyReport {
    /// Names stored on at least one target.
    pub copied: Vec<String>,
    /// Requested names with no matching upload.
    pub skipped: Vec<String>,
    /// Names that could not be read or were stored nowhere.
    #[serde(default)]
    pub failed: Vec<String>,
    /// Per-target outcome of every attempted write.
    #[serde(default)]
    pub persistence: Vec<PersistOutcome>,
}

/// Result of deleting one or more objects from both targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    /// Names removed from at least one target.
    pub deleted: Vec<String>,
    /// One line per target that failed, as `"<target> <folder>/<name>: <reason>"`.
    pub failures: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn schema_buckets_start_empty() {
        let a = DetailedAnalysis::for_schema(&ScoringSchema::round_one());
        assert_eq!(a.buckets().len(), 5);
        assert!(a.is_empty());
        assert!(a.entries("Impact").is_empty());
        assert!(a.entries("Nonexistent").is_empty());
    }

    #[test]
    fn push_creates_dynamic_bucket_after_schema() {
        let mut a = DetailedAnalysis::for_schema(&ScoringSchema::round_two());
        a.push("Team", CriterionEntry::new("q1", 7, "ok"));
        a.push("Team.", CriterionEntry::new("q2", 5, "typo"));
        assert_eq!(
            a.category_names().collect::<Vec<_>>(),
            vec!["Team", "Market", "Product/Technology", "Team."]
        );
        assert_eq!(a.entries("Team").len(), 1);
        assert_eq!(a.entries("Team.").len(), 1);
    }

    #[test]
    fn serialises_in_bucket_order() {
        let mut a = DetailedAnalysis::for_schema(&ScoringSchema::round_two());
        a.push("Market", CriterionEntry::new("TAM", 8, "big"));
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(
            json,
            r#"{"Team":[],"Market":[{"Criteria":"TAM","Score":8,"Explanation":"big"}],"Product/Technology":[]}"#
        );
    }

    #[test]
    fn deserialise_keeps_order() {
        let json = r#"{"Zeta":[],"Alpha":[{"Criteria":"c","Score":3,"Explanation":"e"}]}"#;
        let a: DetailedAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(a.category_names().collect::<Vec<_>>(), vec!["Zeta", "Alpha"]);
        assert_eq!(a.entries("Alpha")[0].score, 3);
    }

    #[test]
    fn overview_default_is_sentinel() {
        let json = serde_json::to_value(Overview::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Geography": "Not mentioned",
                "Industry": "Not mentioned",
                "Stage": "Not mentioned",
                "OverallScore": 0
            })
        );
    }

    #[test]
    fn table_cells_are_sanitised() {
        let mut a = DetailedAnalysis::default();
        a.push("Team", CriterionEntry::new("a | b", 4, "line\nbreak"));
        let table = a.to_markdown_table();
        assert!(table.contains("| Team | a / b | 4 | line break |"), "{table}");
    }

    #[test]
    fn average_ignores_unscored_rows() {
        let mut a = DetailedAnalysis::default();
        a.push("Team", CriterionEntry::new("a", 6, ""));
        a.push("Team", CriterionEntry::new("b", 0, ""));
        a.push("Team", CriterionEntry::new("c", 8, ""));
        assert_eq!(a.average_score(), Some(7.0));
        assert_eq!(DetailedAnalysis::default().average_score(), None);
    }
}

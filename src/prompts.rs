//! Prompts sent to the completion provider.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: the criteria questions come from
//!    [`crate::schema::ScoringSchema`], so editing a schema changes the prompt
//!    and the parser's bucket set together.
//!
//! 2. **Testability**: unit tests inspect the prompts directly without a live
//!    model, and the scripted test client routes on their distinctive
//!    first lines.

use crate::schema::{Round, ScoringSchema};

/// System message shared by every request.
pub const SYSTEM_PROMPT: &str = "You are a venture capital analyst evaluating startup pitch decks. \
Be critical: name weaknesses, risks and missing information as readily as strengths. \
Answer only in the exact format requested.";

/// First line of the overview prompt.
pub const OVERVIEW_HEADER: &str = "Extract the overview of this pitch deck as JSON.";

/// First line of every detailed-analysis prompt.
pub const DETAILED_HEADER: &str = "Score this pitch deck against the criteria below.";

/// Build the overview request for the extracted deck text.
pub fn overview_prompt(deck_text: &str) -> String {
    format!(
        r#"{OVERVIEW_HEADER}

Respond with a single JSON object and nothing else:

{{
    "Geography": "<where the startup operates, e.g. Europe>",
    "Industry": "<industry, e.g. Agricultural Robotics>",
    "Stage": "<funding stage, e.g. Pre-Seed>",
    "OverallScore": <integer score out of 10, e.g. 7>
}}

Use "Not mentioned" for anything the deck does not state. No headings, no markdown, no code fences.

Deck text:
{deck_text}"#
    )
}

/// Build the detailed-analysis request for `schema`.
///
/// Every `(category, criterion)` pair of the schema is listed once, in order.
pub fn detailed_prompt(schema: &ScoringSchema, deck_text: &str) -> String {
    let intro = match schema.round() {
        Round::One => "Score each criterion from 1 to 10 and explain the score in one or two sentences.",
        Round::Two => "This is a second-round, in-depth evaluation. Score each criterion from 1 to 10 and \
give a thorough explanation covering risks, red flags, strengths and overall potential.",
    };

    let (example_category, example_criterion) = schema
        .pairs()
        .next()
        .unwrap_or(("Team", "Does the founding team look complete?"));

    format!(
        r#"{DETAILED_HEADER}

{intro}

Respond with a JSON array only, one object per criterion:

[
    {{
        "Category": "{example_category}",
        "Criteria": "{example_criterion}",
        "Score": 8,
        "Explanation": "..."
    }}
]

Use the category and criterion text exactly as written below. No extra text, no code fences.

{checklist}
Deck text:
{deck_text}"#,
        checklist = criteria_checklist(schema)
    )
}

/// Markdown checklist of the schema's categories and criteria.
pub fn criteria_checklist(schema: &ScoringSchema) -> String {
    let mut out = String::new();
    for category in schema.categories() {
        out.push_str(&format!("- **{}**:\n", category.name));
        for criterion in category.criteria {
            out.push_str(&format!("    - {criterion}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overview_prompt_embeds_text_and_keys() {
        let p = overview_prompt("ACME builds batteries");
        assert!(p.starts_with(OVERVIEW_HEADER));
        assert!(p.ends_with("ACME builds batteries"));
        for key in ["Geography", "Industry", "Stage", "OverallScore"] {
            assert!(p.contains(key), "missing {key}");
        }
    }

    #[test]
    fn detailed_prompt_lists_every_criterion() {
        for schema in [ScoringSchema::round_one(), ScoringSchema::round_two()] {
            let p = detailed_prompt(&schema, "deck");
            assert!(p.starts_with(DETAILED_HEADER));
            for (category, criterion) in schema.pairs() {
                assert!(p.contains(&format!("**{category}**")));
                assert!(p.contains(criterion), "missing {criterion}");
            }
        }
    }

    #[test]
    fn round_two_prompt_has_no_round_one_only_categories() {
        let p = detailed_prompt(&ScoringSchema::round_two(), "deck");
        assert!(!p.contains("Investment Opportunity"));
        assert!(p.contains("second-round"));
    }

    #[test]
    fn checklist_shape() {
        let list = criteria_checklist(&ScoringSchema::round_one());
        assert_eq!(list.lines().filter(|l| l.starts_with("- **")).count(), 5);
        assert_eq!(list.lines().filter(|l| l.starts_with("    - ")).count(), 16);
    }
}

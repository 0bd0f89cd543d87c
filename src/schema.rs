//! The fixed scoring schemas for both evaluation rounds.
//!
//! A schema is an ordered list of categories, each with the ordered criteria
//! questions that go into the outbound prompt. The parser only uses the
//! category names: it pre-creates one bucket per category and accepts
//! whatever criterion text the model echoes back.
//!
//! Round 2 deliberately covers only Team, Market and Product/Technology;
//! Impact and Investment Opportunity are first-round screening concerns.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bucket name for rows whose category is missing or blank.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Which evaluation pass an analysis belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Round {
    /// First-pass screening over five categories.
    #[default]
    One,
    /// Deep-dive over three categories.
    Two,
}

impl Round {
    /// Only the first round asks the model for an overview block.
    pub fn requests_overview(&self) -> bool {
        matches!(self, Round::One)
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Round::One => f.write_str("round 1"),
            Round::Two => f.write_str("round 2"),
        }
    }
}

/// One category and its criteria questions, in prompt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySpec {
    pub name: &'static str,
    pub criteria: &'static [&'static str],
}

/// An ordered list of categories for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringSchema {
    round: Round,
    categories: &'static [CategorySpec],
}

const ROUND_ONE: &[CategorySpec] = &[
    CategorySpec {
        name: "Team",
        criteria: &[
            "Does the founding team look complete?",
            "Does the team look strong and right to compete in this space?",
            "(Team) Suitable for next step?",
        ],
    },
    CategorySpec {
        name: "Market",
        criteria: &[
            "Is the top-down TAM above €1B?",
            "Does the team create a new market or unlock a shadow market?",
            "Is it a growing market? (Market Growth Rate > 5%)",
            "Is the timing right for this kind of business?",
            "(Market) Suitable for next step?",
        ],
    },
    CategorySpec {
        name: "Product/Technology",
        criteria: &[
            "Is the TRL above 3?",
            "(Product/Technology) Suitable for next step?",
        ],
    },
    CategorySpec {
        name: "Impact",
        criteria: &[
            "Does the team aim to achieve climate impact through a scalable and innovative approach?",
            "Could there be a conflict with EU Taxonomy alignment?",
            "(Impact) Suitable for next step?",
        ],
    },
    CategorySpec {
        name: "Investment Opportunity",
        criteria: &[
            "Could a minimum equity stake of 8% be achieved given the round size and company funding history?",
            "Could there be a conflict of interest with an existing portfolio company?",
            "(Investment Opportunity) Suitable for next step?",
        ],
    },
];

const ROUND_TWO: &[CategorySpec] = &[
    CategorySpec {
        name: "Team",
        criteria: &[
            "Founder-Market Fit: Relevant prior experience to build this company?",
            "Deep Knowledge: Do the founders show deep knowledge in their operating space?",
            "Previous Collaboration: Have the founders worked together or known each other before?",
            "VC Mindset: Do they have a 10x mindset suitable for a VC-backed company?",
            "Entrepreneurial Experience: Does anyone have entrepreneurial experience?",
            "Completeness: Is the founding team complete?",
            "Full-time Commitment: Are they working full-time or planning to post-investment?",
            "Persuasiveness: Do they demonstrate strong persuasion and conviction abilities?",
            "Self-Critical: Are they self-aware, open to feedback, and aware of their strengths and weaknesses?",
            "Innovator Mentality: Do they demonstrate first-principle thinking, efficiency, etc.?",
            "Engineering Approach: Do they iterate and test the product pre-launch?",
            "Founder Appeal: Would you want to work with this team?",
        ],
    },
    CategorySpec {
        name: "Market",
        criteria: &[
            "Top-Down TAM: Is it above €10B?",
            "Bottom-Up TAM: Is it above €500m?",
            "Market Tailwinds: Are there favorable market dynamics or regulatory benefits?",
            "Timing: Is the timing favorable for this company's entry into the market?",
        ],
    },
    CategorySpec {
        name: "Product/Technology",
        criteria: &[
            "Problem-Solution Fit: Does the product create real value?",
            "Defensibility: Does it have IP, patents, or other defensibility factors?",
            "Scalability: Can it scale, considering factors like delivery complexity and capital intensity?",
            "Competitive Advantage: If not novel, does it improve processes in a way that competes with novel solutions?",
            "TRL Level: Is the Technology Readiness Level (TRL) above 3?",
        ],
    },
];

impl ScoringSchema {
    /// Five categories, sixteen criteria.
    pub const fn round_one() -> Self {
        Self {
            round: Round::One,
            categories: ROUND_ONE,
        }
    }

    /// Three categories, twenty-one criteria.
    pub const fn round_two() -> Self {
        Self {
            round: Round::Two,
            categories: ROUND_TWO,
        }
    }

    pub const fn for_round(round: Round) -> Self {
        match round {
            Round::One => Self::round_one(),
            Round::Two => Self::round_two(),
        }
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn categories(&self) -> &'static [CategorySpec] {
        self.categories
    }

    pub fn category_names(&self) -> impl Iterator<Item = &'static str> {
        self.categories.iter().map(|c| c.name)
    }

    /// Exact, case-sensitive membership test.
    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c.name == category)
    }

    pub fn criteria_count(&self) -> usize {
        self.categories.iter().map(|c| c.criteria.len()).sum()
    }

    /// `(category, criterion)` pairs in prompt order.
    pub fn pairs(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        self.categories
            .iter()
            .flat_map(|c| c.criteria.iter().map(move |q| (c.name, *q)))
    }
}

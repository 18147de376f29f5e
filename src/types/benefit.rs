//! Benefit-related types
//!
//! A benefit is a recurring statement-credit allowance attached to a card,
//! with an ordered rule table for recognizing the merchant charges it covers
//! and the statement credits that reimburse them.

use super::card::CardId;
use super::error::EngineError;
use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Benefit identifier, unique across the catalog
pub type BenefitId = String;

/// How often a benefit's credit limit resets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl PeriodKind {
    /// Number of windows per anniversary year
    pub fn periods_per_year(self) -> u32 {
        match self {
            PeriodKind::Monthly => 12,
            PeriodKind::Quarterly => 4,
            PeriodKind::Semiannual => 2,
            PeriodKind::Annual => 1,
        }
    }

    /// Length of one window in months
    pub fn months(self) -> u32 {
        12 / self.periods_per_year()
    }
}

impl FromStr for PeriodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Ok(PeriodKind::Monthly),
            "quarterly" => Ok(PeriodKind::Quarterly),
            "semiannual" | "semi-annual" => Ok(PeriodKind::Semiannual),
            "annual" | "yearly" => Ok(PeriodKind::Annual),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeriodKind::Monthly => "monthly",
            PeriodKind::Quarterly => "quarterly",
            PeriodKind::Semiannual => "semiannual",
            PeriodKind::Annual => "annual",
        };
        f.write_str(name)
    }
}

/// How a rule pattern is compared against a merchant description
///
/// All kinds are case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Pattern appears anywhere in the description
    Contains,
    /// Pattern's words appear as a contiguous run of whole words
    Token,
    /// Description starts with the pattern
    Prefix,
    /// Pattern is a regular expression
    Regex,
}

impl FromStr for MatchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contains" | "substring" => Ok(MatchKind::Contains),
            "token" | "word" => Ok(MatchKind::Token),
            "prefix" | "starts_with" => Ok(MatchKind::Prefix),
            "regex" => Ok(MatchKind::Regex),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Contains(String),
    Token(Vec<String>),
    Prefix(String),
    Regex(Regex),
}

/// One row of a benefit's or card's rule table
#[derive(Debug, Clone)]
pub struct MatchRule {
    pattern: String,
    kind: MatchKind,
    matcher: Matcher,
}

impl MatchRule {
    /// Compile a rule, failing on empty patterns and bad regexes
    ///
    /// `owner` is only used for error context.
    pub fn new(owner: &str, pattern: &str, kind: MatchKind) -> Result<Self, EngineError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(EngineError::invalid_pattern(owner, pattern, "pattern is empty"));
        }

        let matcher = match kind {
            MatchKind::Contains => Matcher::Contains(trimmed.to_uppercase()),
            MatchKind::Prefix => Matcher::Prefix(trimmed.to_uppercase()),
            MatchKind::Token => {
                let tokens = tokenize(trimmed);
                if tokens.is_empty() {
                    return Err(EngineError::invalid_pattern(
                        owner,
                        pattern,
                        "pattern has no word characters",
                    ));
                }
                Matcher::Token(tokens)
            }
            MatchKind::Regex => {
                let regex = RegexBuilder::new(trimmed)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| EngineError::invalid_pattern(owner, pattern, &e.to_string()))?;
                Matcher::Regex(regex)
            }
        };

        Ok(Self {
            pattern: trimmed.to_string(),
            kind,
            matcher,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    /// Tie-break weight: longer patterns are more specific
    pub fn specificity(&self) -> usize {
        self.pattern.chars().count()
    }

    /// Whether the rule matches a raw merchant description
    pub fn matches(&self, description: &str) -> bool {
        match &self.matcher {
            Matcher::Contains(needle) => description.to_uppercase().contains(needle.as_str()),
            Matcher::Prefix(needle) => description.trim().to_uppercase().starts_with(needle.as_str()),
            Matcher::Token(needle) => {
                let haystack = tokenize(description);
                haystack
                    .windows(needle.len())
                    .any(|window| window == needle.as_slice())
            }
            Matcher::Regex(regex) => regex.is_match(description),
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_uppercase)
        .collect()
}

/// Longest matching rule in a table, if any
pub(crate) fn best_match<'r>(rules: &'r [MatchRule], description: &str) -> Option<&'r MatchRule> {
    rules
        .iter()
        .filter(|rule| rule.matches(description))
        .fold(None, |best: Option<&MatchRule>, rule| match best {
            Some(current) if current.specificity() >= rule.specificity() => Some(current),
            _ => Some(rule),
        })
}

/// A recurring benefit definition
///
/// Immutable catalog data; built and validated by [`crate::core::Catalog`].
#[derive(Debug, Clone)]
pub struct Benefit {
    pub id: BenefitId,

    /// Card this benefit belongs to
    pub card_id: CardId,

    /// Human-readable name, for reports
    pub name: String,

    /// Reset cadence
    pub period: PeriodKind,

    /// Credit allowance per period
    pub limit: Decimal,

    /// Rules recognizing eligible charges
    pub charge_rules: Vec<MatchRule>,

    /// Rules recognizing the statement credits that reimburse them
    pub credit_rules: Vec<MatchRule>,

    /// Slack allowed when fitting a credit against a period's usage
    pub credit_tolerance: Decimal,
}

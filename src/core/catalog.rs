//! Benefit catalog
//!
//! This module provides the `Catalog`, a pure lookup structure over the
//! tracked cards and their benefits. It is built once from a
//! [`CatalogConfig`] (usually deserialized from JSON) and validated up front:
//! any malformed entry fails construction with a configuration error, so a
//! partially valid catalog is never used.
//!
//! The catalog has no mutable state and is passed explicitly to every engine
//! entry point.

use crate::types::{Benefit, BenefitId, Card, CardId, EngineError, FeePattern, MatchKind, MatchRule, PeriodKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fee amounts within a dollar of the expected fee are accepted by default
pub const DEFAULT_FEE_TOLERANCE: Decimal = Decimal::ONE;

/// Credits must fit a period's usage exactly unless a benefit says otherwise
pub const DEFAULT_CREDIT_TOLERANCE: Decimal = Decimal::ZERO;

fn default_match_kind() -> String {
    "contains".to_string()
}

/// One `(pattern, match kind)` row as written in catalog data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub pattern: String,
    #[serde(default = "default_match_kind")]
    pub match_kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeePatternConfig {
    pub pattern: String,
    #[serde(default = "default_match_kind")]
    pub match_kind: String,
    /// Defaults to the card's annual fee
    #[serde(default)]
    pub expected_amount: Option<Decimal>,
    /// Defaults to [`DEFAULT_FEE_TOLERANCE`]
    #[serde(default)]
    pub tolerance: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitConfig {
    pub id: BenefitId,
    #[serde(default)]
    pub name: Option<String>,
    /// Kept as text so an unknown kind is a configuration error, not a parse error
    pub period: String,
    pub limit: Decimal,
    #[serde(default)]
    pub charge_patterns: Vec<RuleConfig>,
    #[serde(default)]
    pub credit_patterns: Vec<RuleConfig>,
    #[serde(default)]
    pub credit_tolerance: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardConfig {
    pub id: CardId,
    #[serde(default)]
    pub name: Option<String>,
    pub annual_fee: Decimal,
    #[serde(default)]
    pub anniversary: Option<NaiveDate>,
    #[serde(default)]
    pub fee_patterns: Vec<FeePatternConfig>,
    #[serde(default)]
    pub benefits: Vec<BenefitConfig>,
}

/// Raw catalog data, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub cards: Vec<CardConfig>,
}

#[derive(Debug, Clone)]
struct CatalogCard {
    card: Card,
    benefits: Vec<Benefit>,
}

/// Validated, immutable card and benefit definitions
#[derive(Debug, Clone)]
pub struct Catalog {
    cards: Vec<CatalogCard>,
    card_index: HashMap<CardId, usize>,
    benefit_index: HashMap<BenefitId, (usize, usize)>,
}

impl Catalog {
    /// Validate raw catalog data and build the lookup structure
    ///
    /// # Errors
    ///
    /// Returns a configuration error on the first malformed entry:
    /// unknown period or match kinds, empty pattern sets, bad patterns,
    /// non-positive limits, negative tolerances or duplicate ids.
    pub fn new(config: CatalogConfig) -> Result<Self, EngineError> {
        let mut cards = Vec::with_capacity(config.cards.len());
        let mut card_index = HashMap::new();
        let mut benefit_index = HashMap::new();

        for card_config in config.cards {
            let card_position = cards.len();
            if card_index.contains_key(&card_config.id) {
                return Err(EngineError::duplicate_catalog_entry("card", &card_config.id));
            }

            let card = build_card(&card_config)?;
            let mut benefits = Vec::with_capacity(card_config.benefits.len());
            for benefit_config in &card_config.benefits {
                if benefit_index.contains_key(&benefit_config.id) {
                    return Err(EngineError::duplicate_catalog_entry(
                        "benefit",
                        &benefit_config.id,
                    ));
                }
                benefit_index.insert(benefit_config.id.clone(), (card_position, benefits.len()));
                benefits.push(build_benefit(&card.id, benefit_config)?);
            }

            card_index.insert(card.id.clone(), card_position);
            cards.push(CatalogCard { card, benefits });
        }

        Ok(Self {
            cards,
            card_index,
            benefit_index,
        })
    }

    /// Parse and validate a JSON catalog document
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: CatalogConfig = serde_json::from_str(json).map_err(EngineError::catalog_parse)?;
        Self::new(config)
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.card_index.get(card_id).map(|&i| &self.cards[i].card)
    }

    pub fn contains_card(&self, card_id: &str) -> bool {
        self.card_index.contains_key(card_id)
    }

    /// Cards in catalog order
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().map(|entry| &entry.card)
    }

    /// Benefits of a card in catalog order; empty for unknown cards
    pub fn benefits_for_card(&self, card_id: &str) -> &[Benefit] {
        self.card_index
            .get(card_id)
            .map(|&i| self.cards[i].benefits.as_slice())
            .unwrap_or(&[])
    }

    /// Fee patterns of a card; empty for unknown cards
    pub fn fee_patterns_for_card(&self, card_id: &str) -> &[FeePattern] {
        self.card(card_id)
            .map(|card| card.fee_patterns.as_slice())
            .unwrap_or(&[])
    }

    pub fn benefit(&self, benefit_id: &str) -> Option<&Benefit> {
        self.benefit_index
            .get(benefit_id)
            .map(|&(card, benefit)| &self.cards[card].benefits[benefit])
    }
}

fn parse_match_kind(owner: &str, pattern: &str, kind: &str) -> Result<MatchKind, EngineError> {
    kind.parse::<MatchKind>()
        .map_err(|kind| EngineError::unknown_match_kind(owner, pattern, &kind))
}

fn build_rules(owner: &str, side: &str, rules: &[RuleConfig]) -> Result<Vec<MatchRule>, EngineError> {
    if rules.is_empty() {
        return Err(EngineError::missing_patterns(owner, side));
    }
    rules
        .iter()
        .map(|rule| {
            let kind = parse_match_kind(owner, &rule.pattern, &rule.match_kind)?;
            MatchRule::new(owner, &rule.pattern, kind)
        })
        .collect()
}

fn build_card(config: &CardConfig) -> Result<Card, EngineError> {
    if config.id.trim().is_empty() {
        return Err(EngineError::invalid_catalog_value(&config.id, "id", "<empty>"));
    }
    if config.annual_fee < Decimal::ZERO {
        return Err(EngineError::invalid_catalog_value(
            &config.id,
            "annual_fee",
            config.annual_fee,
        ));
    }
    if config.annual_fee > Decimal::ZERO && config.fee_patterns.is_empty() {
        return Err(EngineError::missing_patterns(&config.id, "fee"));
    }

    let mut fee_patterns = Vec::with_capacity(config.fee_patterns.len());
    for pattern in &config.fee_patterns {
        let kind = parse_match_kind(&config.id, &pattern.pattern, &pattern.match_kind)?;
        let expected_amount = pattern.expected_amount.unwrap_or(config.annual_fee);
        if expected_amount <= Decimal::ZERO {
            return Err(EngineError::invalid_catalog_value(
                &config.id,
                "expected_amount",
                expected_amount,
            ));
        }
        let tolerance = pattern.tolerance.unwrap_or(DEFAULT_FEE_TOLERANCE);
        if tolerance < Decimal::ZERO {
            return Err(EngineError::invalid_catalog_value(&config.id, "tolerance", tolerance));
        }
        fee_patterns.push(FeePattern {
            rule: MatchRule::new(&config.id, &pattern.pattern, kind)?,
            expected_amount,
            tolerance,
        });
    }

    Ok(Card {
        id: config.id.clone(),
        name: config.name.clone().unwrap_or_else(|| config.id.clone()),
        annual_fee: config.annual_fee,
        fee_patterns,
        anniversary: config.anniversary,
    })
}

fn build_benefit(card_id: &str, config: &BenefitConfig) -> Result<Benefit, EngineError> {
    if config.id.trim().is_empty() {
        return Err(EngineError::invalid_catalog_value(card_id, "benefit id", "<empty>"));
    }
    let period = config
        .period
        .parse::<PeriodKind>()
        .map_err(|kind| EngineError::unknown_period_kind(&config.id, &kind))?;
    if config.limit <= Decimal::ZERO {
        return Err(EngineError::invalid_catalog_value(&config.id, "limit", config.limit));
    }
    let credit_tolerance = config.credit_tolerance.unwrap_or(DEFAULT_CREDIT_TOLERANCE);
    if credit_tolerance < Decimal::ZERO {
        return Err(EngineError::invalid_catalog_value(
            &config.id,
            "credit_tolerance",
            credit_tolerance,
        ));
    }

    Ok(Benefit {
        id: config.id.clone(),
        card_id: card_id.to_string(),
        name: config.name.clone().unwrap_or_else(|| config.id.clone()),
        period,
        limit: config.limit,
        charge_rules: build_rules(&config.id, "charge", &config.charge_patterns)?,
        credit_rules: build_rules(&config.id, "credit", &config.credit_patterns)?,
        credit_tolerance,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;

    /// Small two-card catalog shared by the core unit tests
    pub(crate) const TEST_CATALOG: &str = r#"{
        "cards": [
            {
                "id": "amex-plat",
                "name": "Platinum",
                "annual_fee": "695.00",
                "anniversary": "2025-01-22",
                "fee_patterns": [{ "pattern": "annual membership fee" }],
                "benefits": [
                    {
                        "id": "lululemon",
                        "period": "quarterly",
                        "limit": "75.00",
                        "charge_patterns": [{ "pattern": "lululemon" }],
                        "credit_patterns": [{ "pattern": "platinum lululemon credit" }, { "pattern": "amex shop credit" }]
                    },
                    {
                        "id": "saks",
                        "period": "semiannual",
                        "limit": "50.00",
                        "charge_patterns": [{ "pattern": "saks", "match_kind": "token" }],
                        "credit_patterns": [{ "pattern": "saks credit" }, { "pattern": "amex shop credit" }]
                    },
                    {
                        "id": "uber-cash",
                        "period": "monthly",
                        "limit": "15.00",
                        "charge_patterns": [{ "pattern": "uber" }],
                        "credit_patterns": [{ "pattern": "uber cash" }]
                    },
                    {
                        "id": "uber-eats",
                        "period": "monthly",
                        "limit": "10.00",
                        "charge_patterns": [{ "pattern": "uber eats" }],
                        "credit_patterns": [{ "pattern": "uber eats credit" }]
                    }
                ]
            },
            {
                "id": "gold",
                "annual_fee": "325.00",
                "fee_patterns": [{ "pattern": "annual fee", "tolerance": "0.50" }],
                "benefits": [
                    {
                        "id": "dining",
                        "period": "monthly",
                        "limit": "10.00",
                        "charge_patterns": [{ "pattern": "grubhub" }],
                        "credit_patterns": [{ "pattern": "dining credit" }],
                        "credit_tolerance": "1.00"
                    }
                ]
            }
        ]
    }"#;

    pub(crate) fn test_catalog() -> Catalog {
        Catalog::from_json(TEST_CATALOG).unwrap()
    }

    #[test]
    fn test_lookup_preserves_catalog_order() {
        let catalog = test_catalog();
        let ids: Vec<&str> = catalog
            .benefits_for_card("amex-plat")
            .iter()
            .map(|b| b.id.as_str())
            .collect();
        assert_eq!(ids, vec!["lululemon", "saks", "uber-cash", "uber-eats"]);
        assert_eq!(catalog.cards().count(), 2);
    }

    #[test]
    fn test_defaults_are_applied() {
        let catalog = test_catalog();
        let gold_fee = &catalog.fee_patterns_for_card("gold")[0];
        assert_eq!(gold_fee.expected_amount, Decimal::new(32500, 2));
        assert_eq!(gold_fee.tolerance, Decimal::new(50, 2));

        let plat_fee = &catalog.fee_patterns_for_card("amex-plat")[0];
        assert_eq!(plat_fee.tolerance, DEFAULT_FEE_TOLERANCE);

        let gold = catalog.card("gold").unwrap();
        assert_eq!(gold.name, "gold");
        assert_eq!(gold.anniversary, None);

        assert_eq!(catalog.benefit("saks").unwrap().credit_tolerance, DEFAULT_CREDIT_TOLERANCE);
        assert_eq!(catalog.benefit("dining").unwrap().card_id, "gold");
    }

    #[test]
    fn test_unknown_card_lookups_are_empty() {
        let catalog = test_catalog();
        assert!(catalog.card("nope").is_none());
        assert!(catalog.benefits_for_card("nope").is_empty());
        assert!(catalog.fee_patterns_for_card("nope").is_empty());
    }

    fn single_benefit(benefit: &str) -> String {
        format!(
            r#"{{ "cards": [{{ "id": "c", "annual_fee": "0", "benefits": [{}] }}] }}"#,
            benefit
        )
    }

    #[rstest]
    #[case::unknown_period(
        r#"{ "id": "b", "period": "weekly", "limit": "10", "charge_patterns": [{"pattern": "x"}], "credit_patterns": [{"pattern": "y"}] }"#
    )]
    #[case::missing_charge_patterns(
        r#"{ "id": "b", "period": "monthly", "limit": "10", "credit_patterns": [{"pattern": "y"}] }"#
    )]
    #[case::missing_credit_patterns(
        r#"{ "id": "b", "period": "monthly", "limit": "10", "charge_patterns": [{"pattern": "x"}] }"#
    )]
    #[case::zero_limit(
        r#"{ "id": "b", "period": "monthly", "limit": "0", "charge_patterns": [{"pattern": "x"}], "credit_patterns": [{"pattern": "y"}] }"#
    )]
    #[case::unknown_match_kind(
        r#"{ "id": "b", "period": "monthly", "limit": "10", "charge_patterns": [{"pattern": "x", "match_kind": "fuzzy"}], "credit_patterns": [{"pattern": "y"}] }"#
    )]
    #[case::bad_regex(
        r#"{ "id": "b", "period": "monthly", "limit": "10", "charge_patterns": [{"pattern": "(", "match_kind": "regex"}], "credit_patterns": [{"pattern": "y"}] }"#
    )]
    #[case::negative_tolerance(
        r#"{ "id": "b", "period": "monthly", "limit": "10", "charge_patterns": [{"pattern": "x"}], "credit_patterns": [{"pattern": "y"}], "credit_tolerance": "-1" }"#
    )]
    fn test_malformed_benefit_fails_fast(#[case] benefit: &str) {
        let result = Catalog::from_json(&single_benefit(benefit));
        let error = result.unwrap_err();
        assert!(error.is_configuration(), "unexpected error: {}", error);
    }

    #[test]
    fn test_unknown_period_kind_names_the_benefit() {
        let json = single_benefit(
            r#"{ "id": "clear", "period": "fortnightly", "limit": "189", "charge_patterns": [{"pattern": "clear"}], "credit_patterns": [{"pattern": "clear credit"}] }"#,
        );
        assert_eq!(
            Catalog::from_json(&json).unwrap_err(),
            EngineError::unknown_period_kind("clear", "fortnightly")
        );
    }

    #[test]
    fn test_fee_card_without_fee_patterns_rejected() {
        let json = r#"{ "cards": [{ "id": "c", "annual_fee": "95" }] }"#;
        assert_eq!(
            Catalog::from_json(json).unwrap_err(),
            EngineError::missing_patterns("c", "fee")
        );
    }

    #[rstest]
    #[case::duplicate_card(
        r#"{ "cards": [{ "id": "c", "annual_fee": "0" }, { "id": "c", "annual_fee": "0" }] }"#,
        EngineError::duplicate_catalog_entry("card", "c")
    )]
    #[case::duplicate_benefit_across_cards(
        r#"{ "cards": [
            { "id": "a", "annual_fee": "0", "benefits": [{ "id": "b", "period": "annual", "limit": "1", "charge_patterns": [{"pattern": "x"}], "credit_patterns": [{"pattern": "y"}] }] },
            { "id": "c", "annual_fee": "0", "benefits": [{ "id": "b", "period": "annual", "limit": "1", "charge_patterns": [{"pattern": "x"}], "credit_patterns": [{"pattern": "y"}] }] }
        ] }"#,
        EngineError::duplicate_catalog_entry("benefit", "b")
    )]
    fn test_duplicate_ids_rejected(#[case] json: &str, #[case] expected: EngineError) {
        assert_eq!(Catalog::from_json(json).unwrap_err(), expected);
    }

    #[test]
    fn test_unparseable_catalog_is_configuration_error() {
        let error = Catalog::from_json(r#"{ "cards": [{ "id": 7 }] }"#).unwrap_err();
        assert!(matches!(error, EngineError::CatalogParse { .. }));
    }
}

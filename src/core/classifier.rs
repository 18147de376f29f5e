//! Transaction classifier
//!
//! Labels each incoming transaction as an annual fee, a benefit charge, a
//! statement credit or unrelated noise. Classification is a pure function of
//! (transaction, card, catalog): no hidden state, fully deterministic.
//!
//! # Precedence
//!
//! - Charges are checked against the card's fee patterns first; a fee line
//!   whose amount is outside the tolerance band falls through to benefit
//!   matching.
//! - When several benefits' charge rules match, the longest matching pattern
//!   wins; equal lengths resolve to the benefit listed first in the catalog.
//! - Credits are never collapsed to a single benefit here. Every benefit with
//!   a matching credit rule is returned as a candidate and the usage ledger
//!   picks among them with open-period context.

use crate::core::catalog::Catalog;
use crate::types::benefit::best_match;
use crate::types::{AnnualFeeEvent, BenefitId, Card, Transaction};

/// What a transaction means for the card's benefits
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The card's annual fee posted
    AnnualFee(AnnualFeeEvent),

    /// An eligible charge for one benefit
    BenefitCharge(BenefitId),

    /// A statement credit; candidates are in catalog order and never empty
    BenefitCredit(Vec<BenefitId>),

    /// Nothing matched; recorded for visibility only
    Unmatched,
}

/// Classify one transaction for `card`
pub fn classify(transaction: &Transaction, card: &Card, catalog: &Catalog) -> Classification {
    if transaction.is_charge() {
        if let Some(event) = match_annual_fee(transaction, card) {
            return Classification::AnnualFee(event);
        }
        return match_benefit_charge(transaction, card, catalog)
            .map(Classification::BenefitCharge)
            .unwrap_or(Classification::Unmatched);
    }

    if transaction.is_credit() {
        let candidates = match_credit_candidates(transaction, card, catalog);
        if !candidates.is_empty() {
            return Classification::BenefitCredit(candidates);
        }
    }

    Classification::Unmatched
}

fn match_annual_fee(transaction: &Transaction, card: &Card) -> Option<AnnualFeeEvent> {
    card.fee_patterns
        .iter()
        .find(|pattern| {
            pattern.accepts_amount(transaction.amount) && pattern.rule.matches(&transaction.description)
        })
        .and_then(|_| {
            AnnualFeeEvent::new(&card.id, &transaction.id, transaction.date, transaction.amount)
        })
}

fn match_benefit_charge(transaction: &Transaction, card: &Card, catalog: &Catalog) -> Option<BenefitId> {
    let mut best: Option<(usize, &str)> = None;
    for benefit in catalog.benefits_for_card(&card.id) {
        let Some(rule) = best_match(&benefit.charge_rules, &transaction.description) else {
            continue;
        };
        match best {
            Some((specificity, _)) if specificity >= rule.specificity() => {}
            _ => best = Some((rule.specificity(), benefit.id.as_str())),
        }
    }
    best.map(|(_, id)| id.to_string())
}

fn match_credit_candidates(transaction: &Transaction, card: &Card, catalog: &Catalog) -> Vec<BenefitId> {
    catalog
        .benefits_for_card(&card.id)
        .iter()
        .filter(|benefit| best_match(&benefit.credit_rules, &transaction.description).is_some())
        .map(|benefit| benefit.id.clone())
        .collect()
}

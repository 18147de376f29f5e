//! Benchmark suite for comparing reconcile strategies
//!
//! Compares sequential and parallel per-card reconciliation with the divan
//! benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! # Workloads
//!
//! Synthetic catalogs with a fixed set of benefits per card and a year of
//! generated charges and credits per card:
//! - small: 4 cards
//! - medium: 32 cards
//! - large: 256 cards

use benefit_sync_engine::config::{EngineConfig, ParallelConfig, StrategyType};
use benefit_sync_engine::core::{Catalog, SyncReconciler, SyncSnapshot};
use benefit_sync_engine::strategy::create_strategy;
use benefit_sync_engine::types::{SyncMode, Transaction};
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;

fn main() {
    divan::main();
}

const CARD_COUNTS: &[usize] = &[4, 32, 256];

fn catalog(cards: usize) -> Arc<Catalog> {
    let cards: Vec<_> = (0..cards)
        .map(|i| {
            json!({
                "id": format!("card-{}", i),
                "annual_fee": "250.00",
                "anniversary": "2025-03-15",
                "fee_patterns": [{ "pattern": "annual fee" }],
                "benefits": [
                    {
                        "id": format!("card-{}-dining", i),
                        "period": "monthly",
                        "limit": "10.00",
                        "charge_patterns": [{ "pattern": "grubhub" }, { "pattern": "seamless" }],
                        "credit_patterns": [{ "pattern": "dining credit" }, { "pattern": "shop credit" }]
                    },
                    {
                        "id": format!("card-{}-retail", i),
                        "period": "quarterly",
                        "limit": "50.00",
                        "charge_patterns": [{ "pattern": "saks", "match_kind": "token" }],
                        "credit_patterns": [{ "pattern": "retail credit" }, { "pattern": "shop credit" }]
                    },
                    {
                        "id": format!("card-{}-airline", i),
                        "period": "annual",
                        "limit": "200.00",
                        "charge_patterns": [{ "pattern": "^(DELTA|UNITED) .*BAG", "match_kind": "regex" }],
                        "credit_patterns": [{ "pattern": "airline credit" }]
                    }
                ]
            })
        })
        .collect();
    let json = json!({ "cards": cards }).to_string();
    Arc::new(Catalog::from_json(&json).expect("generated catalog is valid"))
}

fn history(cards: usize) -> Vec<Transaction> {
    let start = NaiveDate::from_ymd_opt(2025, 3, 15).expect("valid date");
    let descriptions = [
        ("GRUBHUB ORDER", Decimal::new(850, 2)),
        ("SAKS FIFTH AVENUE", Decimal::new(2500, 2)),
        ("COFFEE SHOP", Decimal::new(475, 2)),
        ("DINING CREDIT", Decimal::new(-850, 2)),
        ("DELTA AIR LINES BAG FEE", Decimal::new(3500, 2)),
        ("SHOP CREDIT", Decimal::new(-2500, 2)),
        ("SEAMLESS NYC", Decimal::new(600, 2)),
    ];

    let mut transactions = Vec::new();
    for card in 0..cards {
        let card_id = format!("card-{}", card);
        for day in 0..365u64 {
            let (description, amount) = descriptions[(day as usize + card) % descriptions.len()];
            let date = start + Days::new(day);
            transactions.push(Transaction::new(None, &card_id, date, amount, description));
        }
    }
    transactions
}

fn run(strategy: StrategyType, cards: usize, bencher: divan::Bencher) {
    let catalog = catalog(cards);
    let config = EngineConfig::default();
    let now = NaiveDate::from_ymd_opt(2026, 3, 15).expect("valid date");

    bencher
        .with_inputs(|| history(cards))
        .bench_local_values(|transactions| {
            let mut reconciler = SyncReconciler::new(
                SyncSnapshot::new("bench"),
                create_strategy(strategy, Some(ParallelConfig::default())),
            );
            reconciler
                .reconcile(&catalog, &config, transactions, SyncMode::Full, now)
                .expect("reconciliation failed")
        });
}

/// Reconcile a year of history card by card on one thread
#[divan::bench(args = CARD_COUNTS)]
fn sequential_strategy(bencher: divan::Bencher, cards: usize) {
    run(StrategyType::Sequential, cards, bencher);
}

/// Reconcile a year of history with one task per card
#[divan::bench(args = CARD_COUNTS)]
fn parallel_strategy(bencher: divan::Bencher, cards: usize) {
    run(StrategyType::Parallel, cards, bencher);
}

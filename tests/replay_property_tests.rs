//! Property-based tests for chain integrity and state replay.
//!
//! The replay engine is the system's single source of truth: bugs in the
//! fold corrupt every snapshot, and bugs in verification hide tampering.
//! These properties hold regardless of the specific transaction sequence,
//! catching edge cases that manual case selection would miss.
//!
//! Covered here:
//!
//! 1. Verification round trip - sequentially sealed chains always verify
//! 2. Tamper detection - any single mutated digest is localized exactly
//! 3. Determinism - replay is byte-identical across runs
//! 4. Count semantics - every non-genesis entry in the prefix is counted
//! 5. Genesis immutability - the pre-activity state is always empty
//! 6. Monotonic consistency - products never vanish as the cutoff grows
//!
//! Deliberately not covered: persistence (scenarios.rs) and rule-by-rule
//! anomaly outcomes (unit tests; the rules are plain predicates).

use chrono::{Duration, TimeZone, Utc};
use inventory_ledger::{
    block::{Block, TimeStamp},
    chain::verify,
    replay::rebuild_state_at,
    transaction::{Actor, ItemPatch, Transaction},
};
use proptest::prelude::*;

const SKUS: [&str; 3] = ["sku_a", "sku_b", "sku_c"];
const LOCATIONS: [&str; 3] = ["Supplier", "Warehouse", "Retailer"];

/// Strategy to generate one inventory-affecting transaction against the
/// fixed sku/location pools. Creations are emitted separately so every
/// movement references a known sku.
fn transaction_strategy() -> impl Strategy<Value = Transaction> {
    let sku = 0..SKUS.len();
    let location = 0..LOCATIONS.len();
    let quantity = 1..50u64;

    prop_oneof![
        (sku.clone(), quantity.clone(), location.clone()).prop_map(|(s, q, l)| {
            Transaction::StockIn {
                item_sku: SKUS[s].into(),
                quantity: q,
                location: LOCATIONS[l].into(),
                actor: Actor::new("asha", 1),
            }
        }),
        (sku.clone(), quantity.clone(), location.clone()).prop_map(|(s, q, l)| {
            Transaction::StockOut {
                item_sku: SKUS[s].into(),
                quantity: q,
                location: LOCATIONS[l].into(),
                actor: Actor::new("asha", 1),
            }
        }),
        (sku.clone(), quantity, 0..LOCATIONS.len(), location).prop_map(|(s, q, from, to)| {
            Transaction::Move {
                item_sku: SKUS[s].into(),
                quantity: q,
                from_location: LOCATIONS[from].into(),
                to_location: LOCATIONS[to].into(),
                actor: Actor::new("asha", 1),
            }
        }),
        (sku.clone(), 1..100u64).prop_map(|(s, price)| {
            Transaction::EditItem {
                item_sku: SKUS[s].into(),
                patch: ItemPatch {
                    price: Some(price),
                    ..ItemPatch::default()
                },
                actor: Actor::new("asha", 1),
            }
        }),
        sku.prop_map(|s| Transaction::DeleteItem {
            item_sku: SKUS[s].into(),
            actor: Actor::new("asha", 1),
        }),
        "[A-Z_]{4,12}".prop_map(|action| Transaction::Administrative {
            action,
            detail: "generated".into(),
            actor: Actor::new("asha", 1),
        }),
    ]
}

/// Strategy for a full valid workflow: every sku created up front, then
/// 0..=15 generated transactions.
fn workflow_strategy() -> impl Strategy<Value = Vec<Transaction>> {
    prop::collection::vec(transaction_strategy(), 0..=15).prop_map(|rest| {
        let mut transactions: Vec<Transaction> = SKUS
            .iter()
            .enumerate()
            .map(|(i, sku)| Transaction::CreateItem {
                item_sku: (*sku).into(),
                product_name: format!("Product {i}"),
                category: "Hardware".into(),
                price: 10 * (i as u64 + 1),
                image_url: None,
                actor: Actor::new("asha", 1),
            })
            .collect();
        transactions.extend(rest);
        transactions
    })
}

/// Seal transactions into a correctly linked chain, one entry per minute.
fn build_chain(transactions: Vec<Transaction>) -> Vec<Block> {
    let base = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
    let mut chain = vec![Block::genesis(base.into()).unwrap()];

    for (i, transaction) in transactions.into_iter().enumerate() {
        let previous = chain.last().unwrap();
        let timestamp: TimeStamp<Utc> = (base + Duration::minutes(i as i64 + 1)).into();
        chain.push(
            Block::seal(previous.index + 1, timestamp, transaction, previous.hash.clone())
                .unwrap(),
        );
    }
    chain
}

fn end_of_time() -> TimeStamp<Utc> {
    TimeStamp::new_with(2030, 1, 1, 0, 0, 0)
}

proptest! {
    /// Property: a chain built by sequentially sealing entries always
    /// verifies, whatever the transactions were.
    #[test]
    fn prop_sealed_chains_verify(transactions in workflow_strategy()) {
        let chain = build_chain(transactions);
        let report = verify(&chain).unwrap();

        prop_assert!(report.is_valid);
        prop_assert_eq!(report.broken_at, None);
    }

    /// Property: flipping a single byte of any entry's stored digest is
    /// detected, and the reported break is exactly that entry.
    #[test]
    fn prop_tampered_digest_is_localized(
        transactions in workflow_strategy(),
        target in any::<prop::sample::Index>(),
    ) {
        let mut chain = build_chain(transactions);
        let i = target.index(chain.len());

        let mut raw = hex::decode(&chain[i].hash).unwrap();
        raw[0] ^= 0xff;
        chain[i].hash = hex::encode(raw);

        let report = verify(&chain).unwrap();

        prop_assert!(!report.is_valid);
        prop_assert_eq!(report.broken_at, Some(i as u64));
    }

    /// Property: rewriting an entry's payload after sealing is detected at
    /// that entry, never downstream.
    #[test]
    fn prop_rewritten_payload_is_localized(
        transactions in workflow_strategy(),
        target in any::<prop::sample::Index>(),
    ) {
        let mut chain = build_chain(transactions);
        // Skip genesis: its payload is the fixed sentinel.
        let i = 1 + target.index(chain.len() - 1);

        chain[i].transaction = Transaction::StockIn {
            item_sku: "sku_forged".into(),
            quantity: 9_999,
            location: "Warehouse".into(),
            actor: Actor::new("mallory", 666),
        };

        let report = verify(&chain).unwrap();

        prop_assert!(!report.is_valid);
        prop_assert_eq!(report.broken_at, Some(i as u64));
    }

    /// Property: replay is deterministic down to the encoded bytes.
    #[test]
    fn prop_replay_is_byte_identical(transactions in workflow_strategy()) {
        let chain = build_chain(transactions);
        let as_of = end_of_time();

        let first = rebuild_state_at(&chain, &as_of).unwrap();
        let second = rebuild_state_at(&chain, &as_of).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            minicbor::to_vec(&first).unwrap(),
            minicbor::to_vec(&second).unwrap()
        );
    }

    /// Property: the transaction count is the number of non-genesis
    /// entries at or before the cutoff, inventory-affecting or not.
    #[test]
    fn prop_count_matches_included_prefix(
        transactions in workflow_strategy(),
        cut in any::<prop::sample::Index>(),
    ) {
        let chain = build_chain(transactions);
        let i = cut.index(chain.len());
        let as_of = chain[i].timestamp.clone();

        let snapshot = rebuild_state_at(&chain, &as_of).unwrap();

        prop_assert_eq!(snapshot.kpis.transaction_count, i as u64);
    }

    /// Property: any cutoff before the first transaction yields the empty
    /// state, however much history follows.
    #[test]
    fn prop_genesis_prefix_is_empty(transactions in workflow_strategy()) {
        let chain = build_chain(transactions);
        let as_of = chain[0].timestamp.clone();

        let snapshot = rebuild_state_at(&chain, &as_of).unwrap();

        prop_assert!(snapshot.products.is_empty());
        prop_assert_eq!(snapshot.kpis.transaction_count, 0);
    }

    /// Property: products present at an earlier cutoff are still present
    /// at every later one; soft deletion never removes a record.
    #[test]
    fn prop_products_never_vanish(
        transactions in workflow_strategy(),
        earlier in any::<prop::sample::Index>(),
    ) {
        let chain = build_chain(transactions);
        let i = earlier.index(chain.len());

        let early = rebuild_state_at(&chain, &chain[i].timestamp).unwrap();
        let late = rebuild_state_at(&chain, &end_of_time()).unwrap();

        for (sku, _) in early.products.iter() {
            prop_assert!(late.products.get(sku).is_some(), "{} vanished", sku);
        }
    }
}

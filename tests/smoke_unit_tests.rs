//! Smoke screen unit tests for the inventory ledger components.
//!
//! These tests span the codebase, testing behavior in isolation from
//! integration scenarios. They are intended as smoke-screen coverage and
//! generally test the happy path plus the documented boundaries.

use chrono::{Duration, TimeZone, Utc};
use inventory_ledger::{
    anomaly,
    block::{Block, TimeStamp, compute_hash},
    chain,
    forecast::{self, DEFAULT_THRESHOLD_DAYS},
    registry::Role,
    replay::rebuild_state_at,
    transaction::{Actor, Transaction},
    utils::{mint_id, mint_sku},
};
use std::collections::HashMap;

fn actor() -> Actor {
    Actor::new("asha", 1)
}

fn create(sku: &str, name: &str, price: u64) -> Transaction {
    Transaction::CreateItem {
        item_sku: sku.into(),
        product_name: name.into(),
        category: "Hardware".into(),
        price,
        image_url: None,
        actor: actor(),
    }
}

fn stock_in(sku: &str, quantity: u64, location: &str) -> Transaction {
    Transaction::StockIn {
        item_sku: sku.into(),
        quantity,
        location: location.into(),
        actor: actor(),
    }
}

fn stock_out(sku: &str, quantity: u64, location: &str) -> Transaction {
    Transaction::StockOut {
        item_sku: sku.into(),
        quantity,
        location: location.into(),
        actor: actor(),
    }
}

/// Seal `transactions` into a chain, one entry per minute from a fixed
/// base instant.
fn build_chain(transactions: Vec<Transaction>) -> Vec<Block> {
    let base = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
    let mut chain = vec![Block::genesis(base.into()).unwrap()];

    for (i, transaction) in transactions.into_iter().enumerate() {
        let previous = chain.last().unwrap();
        let timestamp: TimeStamp<Utc> = (base + Duration::minutes(i as i64 + 1)).into();
        chain.push(
            Block::seal(previous.index + 1, timestamp, transaction, previous.hash.clone()).unwrap(),
        );
    }
    chain
}

// UTILS MODULE TESTS
mod utils_tests {
    use super::*;

    /// Sku minting produces bech32 strings under the sku prefix, unique
    /// per call.
    #[test]
    fn mints_valid_skus() {
        let encoded = mint_sku().unwrap();

        assert!(encoded.starts_with("sku1"));
        assert!(encoded.len() > 10);
    }

    #[test]
    fn rejects_blank_prefixes() {
        assert!(mint_id("").is_err());
        assert!(mint_id("  ").is_err());
    }

    #[test]
    fn normalizes_prefix_case() {
        let id = mint_id("Loc").unwrap();

        assert!(id.starts_with("loc1"));
    }

    #[test]
    fn mints_unique_ids() {
        let id1 = mint_sku().unwrap();
        let id2 = mint_sku().unwrap();

        assert_ne!(id1, id2);
    }
}

// HASH CHAIN TESTS
mod block_tests {
    use super::*;

    /// The content digest is a pure function of the four hashed fields:
    /// identical inputs agree, any changed field disagrees.
    #[test]
    fn hash_is_deterministic_and_content_sensitive() {
        let ts = TimeStamp::new_with(2025, 5, 1, 9, 0, 0);
        let tx = create("sku_a", "Bolt", 10);

        let h1 = compute_hash(1, &ts, &tx, "prev").unwrap();
        let h2 = compute_hash(1, &ts, &tx, "prev").unwrap();
        let different_index = compute_hash(2, &ts, &tx, "prev").unwrap();
        let different_prev = compute_hash(1, &ts, &tx, "other").unwrap();
        let different_tx = compute_hash(1, &ts, &create("sku_a", "Bolt", 11), "prev").unwrap();

        assert_eq!(h1, h2);
        assert_ne!(h1, different_index);
        assert_ne!(h1, different_prev);
        assert_ne!(h1, different_tx);
    }

    /// A sealed successor links to its predecessor; an unrelated entry
    /// does not.
    #[test]
    fn link_validation() {
        let chain = build_chain(vec![
            create("sku_a", "Bolt", 10),
            stock_in("sku_a", 5, "Warehouse"),
        ]);

        assert!(chain[1].is_valid_link(&chain[0]).unwrap());
        assert!(chain[2].is_valid_link(&chain[1]).unwrap());
        assert!(!chain[2].is_valid_link(&chain[0]).unwrap());
    }
}

// VERIFIER TESTS
mod chain_tests {
    use super::*;

    /// Editing a mid-chain transaction breaks verification at exactly that
    /// entry, not anywhere downstream.
    #[test]
    fn mutation_reported_at_first_affected_index() {
        let mut blocks = build_chain(vec![
            create("sku_a", "Bolt", 10),
            stock_in("sku_a", 50, "Warehouse"),
            stock_out("sku_a", 10, "Warehouse"),
        ]);

        blocks[2].transaction = stock_in("sku_a", 5000, "Warehouse");
        let report = chain::verify(&blocks).unwrap();

        assert!(!report.is_valid);
        assert_eq!(report.broken_at, Some(2));
    }

    /// A tampered genesis is caught by the base case.
    #[test]
    fn tampered_genesis_reported_at_zero() {
        let mut blocks = build_chain(vec![create("sku_a", "Bolt", 10)]);
        blocks[0].previous_hash = "sneaky".into();

        let report = chain::verify(&blocks).unwrap();

        assert!(!report.is_valid);
        assert_eq!(report.broken_at, Some(0));
    }
}

// REPLAY ENGINE TESTS
mod replay_tests {
    use super::*;

    /// State at T2 equals state at T1 plus the effects of entries in
    /// (T1, T2]; nothing present at T1 disappears.
    #[test]
    fn snapshots_are_monotonically_consistent() {
        let blocks = build_chain(vec![
            create("sku_a", "Bolt", 10),
            stock_in("sku_a", 50, "Warehouse"),
            create("sku_b", "Nut", 5),
            stock_out("sku_a", 20, "Warehouse"),
        ]);

        // T1 lands after the first stock-in, T2 after everything.
        let t1 = blocks[2].timestamp.clone();
        let t2 = blocks[4].timestamp.clone();

        let early = rebuild_state_at(&blocks, &t1).unwrap();
        let late = rebuild_state_at(&blocks, &t2).unwrap();

        assert_eq!(early.products.get("sku_a").unwrap().total_stock(), 50);
        assert!(early.products.get("sku_b").is_none());
        assert_eq!(late.products.get("sku_a").unwrap().total_stock(), 30);
        assert!(late.products.get("sku_b").is_some());

        for (sku, _) in early.products.iter() {
            assert!(late.products.get(sku).is_some(), "{sku} vanished");
        }
    }

    /// Entries touching disjoint skus commute: swapping their relative
    /// position leaves the final per-sku state unchanged.
    #[test]
    fn independent_skus_fold_order_free() {
        let forward = build_chain(vec![
            create("sku_a", "Bolt", 10),
            create("sku_b", "Nut", 5),
            stock_in("sku_a", 7, "Warehouse"),
            stock_in("sku_b", 9, "Retailer"),
        ]);
        let swapped = build_chain(vec![
            create("sku_b", "Nut", 5),
            create("sku_a", "Bolt", 10),
            stock_in("sku_b", 9, "Retailer"),
            stock_in("sku_a", 7, "Warehouse"),
        ]);

        let as_of = TimeStamp::new_with(2025, 5, 2, 0, 0, 0);
        let a = rebuild_state_at(&forward, &as_of).unwrap();
        let b = rebuild_state_at(&swapped, &as_of).unwrap();

        assert_eq!(a.products.get("sku_a"), b.products.get("sku_a"));
        assert_eq!(a.products.get("sku_b"), b.products.get("sku_b"));
        assert_eq!(a.kpis, b.kpis);
    }
}

// ANOMALY SCANNER TESTS
mod anomaly_tests {
    use super::*;

    /// A daytime Admin move through the warehouse trips exactly the role
    /// rule; the other rules stay quiet.
    #[test]
    fn admin_move_flags_role_rule_only() {
        let blocks = build_chain(vec![Transaction::Move {
            item_sku: "sku_a".into(),
            quantity: 3,
            from_location: "Warehouse".into(),
            to_location: "Retailer".into(),
            actor: Actor::new("priya", 7),
        }]);
        let roles = HashMap::from([("priya".to_string(), Role::Admin)]);

        let flags = anomaly::scan(&blocks, &roles);

        assert_eq!(flags.len(), 1);
        assert_eq!(
            flags[0].reasons,
            vec!["MOVE operation performed by an Admin, not a Manager.".to_string()]
        );
    }

    /// Unknown actors have no role; only role-independent rules can fire.
    #[test]
    fn unknown_actor_skips_role_rule() {
        let blocks = build_chain(vec![Transaction::Move {
            item_sku: "sku_a".into(),
            quantity: 3,
            from_location: "Warehouse".into(),
            to_location: "Retailer".into(),
            actor: Actor::new("ghost", 404),
        }]);

        assert!(anomaly::scan(&blocks, &HashMap::new()).is_empty());
    }
}

// PREDICTOR TESTS
mod forecast_tests {
    use super::*;

    /// The end-to-end projection example: 5 units left after a 95-unit
    /// outflow projects empty in one day.
    #[test]
    fn projects_one_day_for_fast_depletion() {
        let blocks = build_chain(vec![
            create("sku_a", "Bolt", 10),
            stock_in("sku_a", 100, "W1"),
            stock_out("sku_a", 95, "W1"),
        ]);
        let snapshot =
            rebuild_state_at(&blocks, &TimeStamp::new_with(2025, 5, 2, 0, 0, 0)).unwrap();

        let projections = forecast::predict(&snapshot, &blocks, DEFAULT_THRESHOLD_DAYS);

        assert_eq!(snapshot.products.get("sku_a").unwrap().total_stock(), 5);
        assert_eq!(snapshot.kpis.total_value, 50);
        assert_eq!(projections.len(), 1);
        assert_eq!(projections[0].days_to_empty, 1);
    }
}

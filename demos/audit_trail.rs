//! Walkthrough: seed a ledger, rebuild state, then audit it.
//!
//! Run with `RUST_LOG=info cargo run --example audit_trail`.

use inventory_ledger::forecast::DEFAULT_THRESHOLD_DAYS;
use inventory_ledger::registry::{Registry, Role};
use inventory_ledger::service::LedgerService;
use inventory_ledger::transaction::Actor;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let temp_dir = std::env::temp_dir().join("inventory-ledger-demo");
    let db = Arc::new(sled::open(&temp_dir)?);
    db.drop_tree("chain")?;
    db.drop_tree("users")?;
    db.drop_tree("categories")?;
    db.drop_tree("locations")?;
    db.drop_tree("counters")?;

    let service = LedgerService::open(Arc::clone(&db))?;
    let registry = Registry::open(Arc::clone(&db))?;

    // Seed people and places.
    let admin = registry.add_user("Priya", "priya@example.com", Role::Admin)?;
    let manager = registry.add_user("Arun", "arun@example.com", Role::Manager)?;
    registry.upsert_location("Supplier")?;
    registry.upsert_location("Warehouse")?;
    registry.upsert_location("Retailer")?;
    registry.upsert_category("Hardware")?;
    service.record_admin_action(
        "USER_CREATED",
        &manager.name,
        Actor::new(admin.name.clone(), admin.id),
    )?;

    // Inventory activity.
    let manager_actor = Actor::new(manager.name.clone(), manager.id);
    let created = service.create_item(
        None,
        "M8 Hex Bolt (200 pack)",
        "Hardware",
        1250,
        None,
        manager_actor.clone(),
    )?;
    let sku = created
        .transaction
        .item_sku()
        .expect("create carries a sku")
        .to_string();

    service.stock_in(&sku, 100, "Warehouse", manager_actor.clone())?;
    service.stock_out(&sku, 95, "Warehouse", manager_actor.clone())?;
    // An admin shortcutting the logistics path; the scanner should mind.
    service.move_stock(&sku, 2, "Supplier", "Retailer", Actor::new(admin.name.clone(), admin.id))?;

    // Derived state.
    let snapshot = service.current_snapshot()?;
    println!("== snapshot ==");
    for (sku, product) in snapshot.products.iter() {
        println!(
            "{sku}: {} [{}] stock={} price={}",
            product.product_name,
            product.category,
            product.total_stock(),
            product.price
        );
    }
    println!("kpis: {:?}", snapshot.kpis);

    // Integrity and analytics.
    let report = service.verify_chain()?;
    println!("chain valid: {}", report.is_valid);

    let flags = service.scan_anomalies(&registry.user_roles()?)?;
    println!("== anomalies ({}) ==", flags.len());
    for flag in &flags {
        println!("entry {} [{}]:", flag.entry.index, flag.entry.transaction.label());
        for reason in &flag.reasons {
            println!("  - {reason}");
        }
    }

    let projections = service.low_stock(DEFAULT_THRESHOLD_DAYS)?;
    println!("== low stock projections ({}) ==", projections.len());
    for projection in &projections {
        println!(
            "{} ({}): stock={} days_to_empty={}",
            projection.name, projection.sku, projection.stock, projection.days_to_empty
        );
    }

    Ok(())
}

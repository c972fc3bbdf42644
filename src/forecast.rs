//! Trend-based low-stock projection.
//!
//! Signals depletion risk from measured stock-out velocity, not absolute
//! stock levels. A product with no recorded outflow in the window is never
//! projected, even at zero stock; absolute low-stock display is a separate
//! presentation concern.
use super::block::Block;
use super::replay::InventorySnapshot;
use super::transaction::Transaction;
use std::collections::HashMap;

/// Trailing window over which stock-out velocity is measured, in days.
pub const VELOCITY_WINDOW_DAYS: i64 = 30;

/// Default urgency cutoff: only products projected to empty within this
/// many days are reported.
pub const DEFAULT_THRESHOLD_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct StockProjection {
    #[n(0)]
    pub sku: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub stock: i64,
    #[n(3)]
    pub days_to_empty: i64,
}

/// Project days-to-empty for every product with measured outflow in the
/// recent window, most urgent first.
///
/// `recent_window` is the slice of the chain spanning the last
/// [`VELOCITY_WINDOW_DAYS`]; the caller selects it from one bulk fetch.
/// Division by zero is structurally impossible: projection is gated on a
/// positive stock-out total.
pub fn predict(
    snapshot: &InventorySnapshot,
    recent_window: &[Block],
    threshold_days: i64,
) -> Vec<StockProjection> {
    let mut velocity: HashMap<&str, u64> = HashMap::new();
    for block in recent_window {
        if let Transaction::StockOut {
            item_sku, quantity, ..
        } = &block.transaction
        {
            *velocity.entry(item_sku.as_str()).or_insert(0) += quantity;
        }
    }

    let mut projections = Vec::new();
    for (sku, product) in snapshot.products.iter() {
        let total_stock_out = velocity.get(sku.as_str()).copied().unwrap_or(0);
        if total_stock_out == 0 {
            continue;
        }

        let daily_velocity = total_stock_out as f64 / VELOCITY_WINDOW_DAYS as f64;
        let days_to_empty = (product.total_stock() as f64 / daily_velocity).floor() as i64;

        if days_to_empty <= threshold_days {
            projections.push(StockProjection {
                sku: sku.clone(),
                name: product.product_name.clone(),
                stock: product.total_stock(),
                days_to_empty,
            });
        }
    }

    projections.sort_by_key(|projection| projection.days_to_empty);
    projections
}

//! State reconstruction by ledger replay.
//!
//! There is no maintained "current state" table anywhere in the system.
//! Inventory as of any instant is the left-to-right fold of every entry at
//! or before that instant, so historical snapshots are correct by
//! construction rather than by synchronization.
use super::block::{Block, TimeStamp};
use super::error::LedgerError;
use super::transaction::Transaction;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};

/// A product as derived from the ledger. Never persisted independently.
///
/// Location quantities are signed: replay is a faithful function of
/// committed history, and an over-drawn location surfaces as a negative
/// value instead of being clamped. Write-time validation is the append
/// path's concern.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Product {
    #[n(0)]
    pub product_name: String,
    #[n(1)]
    pub category: String,
    #[n(2)]
    pub price: u64,
    #[n(3)]
    pub image_url: Option<String>,
    #[n(4)]
    pub locations: BTreeMap<String, i64>,
    #[n(5)]
    pub is_deleted: bool,
}

impl Product {
    pub fn total_stock(&self) -> i64 {
        self.locations.values().sum()
    }
}

/// Sku to product mapping that preserves the order of first appearance in
/// the chain. Iteration order is stable and deterministic for a given
/// chain and cutoff; presentation layers may re-reverse for newest-first
/// display.
///
/// Encodes as an array of `[sku, product]` pairs, which is also the
/// transport shape consumed by presentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    order: Vec<String>,
    items: HashMap<String, Product>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace. A sku keeps its original position on
    /// re-insertion, so first appearance wins for ordering.
    pub fn insert(&mut self, sku: String, product: Product) {
        if self.items.insert(sku.clone(), product).is_none() {
            self.order.push(sku);
        }
    }

    pub fn get(&self, sku: &str) -> Option<&Product> {
        self.items.get(sku)
    }

    pub fn get_mut(&mut self, sku: &str) -> Option<&mut Product> {
        self.items.get_mut(sku)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Product)> {
        self.order
            .iter()
            .filter_map(|sku| self.items.get(sku).map(|product| (sku, product)))
    }
}

impl<C> minicbor::Encode<C> for Inventory {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(self.order.len() as u64)?;
        for (sku, product) in self.iter() {
            e.array(2)?;
            e.str(sku)?;
            minicbor::Encode::encode(product, e, ctx)?;
        }
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Inventory {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let Some(len) = d.array()? else {
            return Err(minicbor::decode::Error::message(
                "expected definite-length inventory array",
            ));
        };

        let mut inventory = Inventory::new();
        for _ in 0..len {
            if d.array()? != Some(2) {
                return Err(minicbor::decode::Error::message(
                    "expected [sku, product] pair",
                ));
            }
            let sku = d.str()?.to_string();
            let product: Product = minicbor::Decode::decode(d, ctx)?;
            inventory.insert(sku, product);
        }

        Ok(inventory)
    }
}

/// Aggregate figures over the non-deleted portion of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Kpis {
    #[n(0)]
    pub total_value: i64,
    #[n(1)]
    pub total_units: i64,
    #[n(2)]
    pub transaction_count: u64,
}

/// Derived inventory state as of a specific instant. Constructed fresh per
/// request, never mutated afterwards, always rederivable.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct InventorySnapshot {
    #[n(0)]
    pub as_of: TimeStamp<Utc>,
    #[n(1)]
    pub products: Inventory,
    #[n(2)]
    pub kpis: Kpis,
}

/// Fold every entry with `timestamp <= as_of` into an inventory snapshot.
///
/// Entries after the cutoff are excluded entirely, not just their effects.
/// Within the included set, chain index order is authoritative, including
/// for timestamp ties. The fold fails fast on a structurally invalid
/// transaction or a stock movement naming a sku with no prior creation; a
/// snapshot is either fully computed or not returned at all.
pub fn rebuild_state_at(
    chain: &[Block],
    as_of: &TimeStamp<Utc>,
) -> Result<InventorySnapshot, LedgerError> {
    let mut products = Inventory::new();
    let mut transaction_count = 0u64;

    for block in chain {
        if block.timestamp > *as_of {
            continue;
        }
        if block.is_genesis() {
            continue;
        }
        transaction_count += 1;

        block
            .transaction
            .validate()
            .map_err(|source| LedgerError::MalformedTransaction {
                index: block.index,
                source,
            })?;

        apply(&mut products, block)?;
    }

    let kpis = compute_kpis(&products, transaction_count);

    Ok(InventorySnapshot {
        as_of: as_of.clone(),
        products,
        kpis,
    })
}

fn apply(products: &mut Inventory, block: &Block) -> Result<(), LedgerError> {
    match &block.transaction {
        Transaction::CreateItem {
            item_sku,
            product_name,
            category,
            price,
            image_url,
            ..
        } => {
            // Re-creation after deletion replaces the record wholesale;
            // latest-wins attribute state, history untouched.
            products.insert(
                item_sku.clone(),
                Product {
                    product_name: product_name.clone(),
                    category: category.clone(),
                    price: *price,
                    image_url: image_url.clone(),
                    locations: BTreeMap::new(),
                    is_deleted: false,
                },
            );
        }
        Transaction::StockIn {
            item_sku,
            quantity,
            location,
            ..
        } => {
            let product = known_product(products, block.index, item_sku)?;
            *product.locations.entry(location.clone()).or_insert(0) += *quantity as i64;
        }
        Transaction::StockOut {
            item_sku,
            quantity,
            location,
            ..
        } => {
            let product = known_product(products, block.index, item_sku)?;
            *product.locations.entry(location.clone()).or_insert(0) -= *quantity as i64;
        }
        Transaction::Move {
            item_sku,
            quantity,
            from_location,
            to_location,
            ..
        } => {
            let product = known_product(products, block.index, item_sku)?;
            *product.locations.entry(from_location.clone()).or_insert(0) -= *quantity as i64;
            *product.locations.entry(to_location.clone()).or_insert(0) += *quantity as i64;
        }
        Transaction::EditItem {
            item_sku, patch, ..
        } => {
            let product = known_product(products, block.index, item_sku)?;
            if let Some(product_name) = &patch.product_name {
                product.product_name = product_name.clone();
            }
            if let Some(category) = &patch.new_category {
                product.category = category.clone();
            }
            if let Some(price) = patch.price {
                product.price = price;
            }
            if let Some(image_url) = &patch.image_url {
                product.image_url = Some(image_url.clone());
            }
        }
        Transaction::DeleteItem { item_sku, .. } => {
            let product = known_product(products, block.index, item_sku)?;
            product.is_deleted = true;
        }
        // Administrative and user-management kinds never touch inventory;
        // they were already counted above.
        Transaction::Genesis | Transaction::Administrative { .. } => {}
    }

    Ok(())
}

fn known_product<'a>(
    products: &'a mut Inventory,
    index: u64,
    sku: &str,
) -> Result<&'a mut Product, LedgerError> {
    products.get_mut(sku).ok_or_else(|| LedgerError::UnknownSku {
        index,
        sku: sku.to_string(),
    })
}

fn compute_kpis(products: &Inventory, transaction_count: u64) -> Kpis {
    let mut kpis = Kpis {
        transaction_count,
        ..Kpis::default()
    };

    for (_, product) in products.iter() {
        if product.is_deleted {
            continue;
        }
        let stock = product.total_stock();
        kpis.total_units += stock;
        kpis.total_value += product.price as i64 * stock;
    }

    kpis
}

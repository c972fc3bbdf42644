//! Service layer over the persisted chain.
//!
//! The system is single-writer: appends are serialized behind a mutex so
//! no two entries can claim the same predecessor. Reads are one bulk scan
//! of the chain tree; the core never issues per-entry queries.
use super::anomaly::{self, AnomalyFlag};
use super::block::{Block, TimeStamp};
use super::chain::{self, ChainReport};
use super::forecast::{self, StockProjection, VELOCITY_WINDOW_DAYS};
use super::registry::Role;
use super::replay::{self, InventorySnapshot};
use super::transaction::{Actor, ItemPatch, Transaction};
use super::utils;
use anyhow::Context;
use chrono::{Duration, Utc};
use sled::{Db, Tree};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub struct LedgerService {
    chain: Tree,
    append_lock: Mutex<()>,
}

impl LedgerService {
    /// Open the chain tree and write Genesis exactly once on first use.
    pub fn open(instance: Arc<Db>) -> anyhow::Result<Self> {
        let chain = instance.open_tree("chain")?;
        let service = Self {
            chain,
            append_lock: Mutex::new(()),
        };

        if service.chain.is_empty() {
            let genesis = Block::genesis(TimeStamp::new())?;
            service.persist(&genesis)?;
            info!(hash = utils::short_digest(&genesis.hash), "genesis entry written");
        }

        Ok(service)
    }

    /// Append one transaction as a new sealed entry.
    ///
    /// Field validation happens here, at write time; availability is not
    /// checked against current stock (committed history is replayed as
    /// recorded, and the anomaly scanner owns business-rule review).
    pub fn append(&self, transaction: Transaction) -> anyhow::Result<Block> {
        if matches!(transaction, Transaction::Genesis) {
            return Err(anyhow::anyhow!(
                "genesis can only be written at initialization"
            ));
        }
        transaction
            .validate()
            .context("rejected transaction at append time")?;

        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("append lock poisoned"))?;

        let previous = self
            .last_entry()?
            .ok_or_else(|| anyhow::anyhow!("chain has no genesis entry"))?;
        let block = Block::seal(
            previous.index + 1,
            TimeStamp::new(),
            transaction,
            previous.hash.clone(),
        )?;
        self.persist(&block)?;

        info!(
            index = block.index,
            tx = block.transaction.label(),
            hash = utils::short_digest(&block.hash),
            "ledger entry appended"
        );
        Ok(block)
    }

    // Operation wrappers mirroring the inventory routes.

    /// Record a new item. Mints a sku when none is supplied.
    pub fn create_item(
        &self,
        item_sku: Option<String>,
        product_name: &str,
        category: &str,
        price: u64,
        image_url: Option<String>,
        actor: Actor,
    ) -> anyhow::Result<Block> {
        let item_sku = match item_sku {
            Some(sku) => sku,
            None => utils::mint_sku()?,
        };

        self.append(Transaction::CreateItem {
            item_sku,
            product_name: product_name.to_string(),
            category: category.to_string(),
            price,
            image_url,
            actor,
        })
    }

    pub fn edit_item(&self, item_sku: &str, patch: ItemPatch, actor: Actor) -> anyhow::Result<Block> {
        self.append(Transaction::EditItem {
            item_sku: item_sku.to_string(),
            patch,
            actor,
        })
    }

    pub fn delete_item(&self, item_sku: &str, actor: Actor) -> anyhow::Result<Block> {
        self.append(Transaction::DeleteItem {
            item_sku: item_sku.to_string(),
            actor,
        })
    }

    pub fn stock_in(
        &self,
        item_sku: &str,
        quantity: u64,
        location: &str,
        actor: Actor,
    ) -> anyhow::Result<Block> {
        self.append(Transaction::StockIn {
            item_sku: item_sku.to_string(),
            quantity,
            location: location.to_string(),
            actor,
        })
    }

    pub fn stock_out(
        &self,
        item_sku: &str,
        quantity: u64,
        location: &str,
        actor: Actor,
    ) -> anyhow::Result<Block> {
        self.append(Transaction::StockOut {
            item_sku: item_sku.to_string(),
            quantity,
            location: location.to_string(),
            actor,
        })
    }

    pub fn move_stock(
        &self,
        item_sku: &str,
        quantity: u64,
        from_location: &str,
        to_location: &str,
        actor: Actor,
    ) -> anyhow::Result<Block> {
        self.append(Transaction::Move {
            item_sku: item_sku.to_string(),
            quantity,
            from_location: from_location.to_string(),
            to_location: to_location.to_string(),
            actor,
        })
    }

    /// Record an administrative action (user or record management). These
    /// entries are counted by replay but never touch inventory.
    pub fn record_admin_action(
        &self,
        action: &str,
        detail: &str,
        actor: Actor,
    ) -> anyhow::Result<Block> {
        self.append(Transaction::Administrative {
            action: action.to_string(),
            detail: detail.to_string(),
            actor,
        })
    }

    // Query surface.

    /// One bulk fetch of the whole chain, index ascending, Genesis first.
    pub fn entries(&self) -> anyhow::Result<Vec<Block>> {
        let mut entries = Vec::with_capacity(self.chain.len());
        for kv in self.chain.iter() {
            let (_, bytes) = kv?;
            entries.push(Block::from_cbor(bytes.as_ref())?);
        }
        Ok(entries)
    }

    pub fn verify_chain(&self) -> anyhow::Result<ChainReport> {
        let entries = self.entries()?;
        let report = chain::verify(&entries)?;

        if let Some(index) = report.broken_at {
            warn!(index, "chain verification failed, tampering suspected");
        } else {
            debug!(entries = entries.len(), "chain verified");
        }
        Ok(report)
    }

    /// Inventory state as of an ISO-8601 instant (UTC-normalized).
    pub fn snapshot_at(&self, timestamp: &str) -> anyhow::Result<InventorySnapshot> {
        let as_of = TimeStamp::parse_utc(timestamp)?;
        let entries = self.entries()?;
        let snapshot = replay::rebuild_state_at(&entries, &as_of)
            .context("failed to rebuild state for snapshot")?;

        debug!(
            products = snapshot.products.len(),
            transactions = snapshot.kpis.transaction_count,
            "snapshot rebuilt"
        );
        Ok(snapshot)
    }

    pub fn current_snapshot(&self) -> anyhow::Result<InventorySnapshot> {
        let entries = self.entries()?;
        let snapshot = replay::rebuild_state_at(&entries, &TimeStamp::new())
            .context("failed to rebuild current state")?;
        Ok(snapshot)
    }

    /// Run the anomaly rule set over the full chain, newest first. The
    /// role mapping comes from the registry's `user_roles`.
    pub fn scan_anomalies(
        &self,
        roles: &HashMap<String, Role>,
    ) -> anyhow::Result<Vec<AnomalyFlag>> {
        let entries = self.entries()?;
        let flags = anomaly::scan(&entries, roles);

        info!(flags = flags.len(), "anomaly scan complete");
        Ok(flags)
    }

    /// Low-stock projections from stock-out velocity over the trailing
    /// window.
    pub fn low_stock(&self, threshold_days: i64) -> anyhow::Result<Vec<StockProjection>> {
        let entries = self.entries()?;
        if entries.len() <= 1 {
            return Ok(Vec::new());
        }

        let snapshot = replay::rebuild_state_at(&entries, &TimeStamp::new())
            .context("failed to rebuild current state")?;

        let cutoff: TimeStamp<Utc> = (Utc::now() - Duration::days(VELOCITY_WINDOW_DAYS)).into();
        let recent_window: Vec<Block> = entries
            .iter()
            .filter(|block| block.timestamp > cutoff)
            .cloned()
            .collect();
        let projections = forecast::predict(&snapshot, &recent_window, threshold_days);

        info!(warnings = projections.len(), "low-stock projection complete");
        Ok(projections)
    }

    /// Administrative full-chain reset: wipe every entry and write a fresh
    /// Genesis. The only path that ever removes entries.
    pub fn reset(&self) -> anyhow::Result<Block> {
        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("append lock poisoned"))?;

        self.chain.clear()?;
        let genesis = Block::genesis(TimeStamp::new())?;
        self.persist(&genesis)?;

        warn!("chain reset, all entries cleared");
        Ok(genesis)
    }

    fn last_entry(&self) -> anyhow::Result<Option<Block>> {
        let Some((_, bytes)) = self.chain.last()? else {
            return Ok(None);
        };
        Ok(Some(Block::from_cbor(bytes.as_ref())?))
    }

    fn persist(&self, block: &Block) -> anyhow::Result<()> {
        self.chain
            .insert(block.index.to_be_bytes(), block.to_cbor()?)?;
        Ok(())
    }
}

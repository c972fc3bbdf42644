//! Record store for users, categories and locations.
//!
//! Ordinary CRUD over dedicated sled trees, kept apart from the ledger
//! core. The one place it touches the chain is the smart-delete check:
//! a category or location with ledger history is archived, never removed,
//! so historical snapshots keep resolving. The chain is handed in as a
//! slice from one bulk fetch; this module never issues its own entry
//! queries.
use super::block::Block;
use super::transaction::Transaction;
use super::utils;
use anyhow::Context;
use sled::{Db, Tree};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum Role {
    #[n(0)]
    Admin,
    #[n(1)]
    Manager,
    #[n(2)]
    Auditor,
    #[n(3)]
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Auditor => "Auditor",
            Role::Staff => "Staff",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct User {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub employee_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub email: String,
    #[n(4)]
    pub role: Role,
}

/// A category or location row. Both share the same shape and the same
/// archive-instead-of-delete lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct NamedRecord {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub is_archived: bool,
}

/// How a smart delete resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Archived,
    Deleted,
}

pub struct Registry {
    users: Tree,
    categories: Tree,
    locations: Tree,
    counters: Tree,
}

impl Registry {
    pub fn open(db: Arc<Db>) -> anyhow::Result<Self> {
        let users = db.open_tree("users")?;
        let categories = db.open_tree("categories")?;
        let locations = db.open_tree("locations")?;
        let counters = db.open_tree("counters")?;

        Ok(Self {
            users,
            categories,
            locations,
            counters,
        })
    }

    /// Draw the next id from the named sequence. Each record kind has its
    /// own counter, so employee numbering tracks user creation order and
    /// ids are never reused after a delete.
    fn next_id(&self, sequence: &str) -> anyhow::Result<u64> {
        let bytes = self
            .counters
            .update_and_fetch(sequence, bump_counter)?
            .ok_or_else(|| anyhow::anyhow!("sequence vanished on increment: {sequence}"))?;
        let raw: [u8; 8] = bytes.as_ref().try_into()?;
        Ok(u64::from_be_bytes(raw))
    }

    // USERS

    pub fn add_user(&self, name: &str, email: &str, role: Role) -> anyhow::Result<User> {
        if name.is_empty() || email.is_empty() {
            return Err(anyhow::anyhow!("name and email are required"));
        }
        if self.users()?.iter().any(|user| user.email == email) {
            return Err(anyhow::anyhow!("email already exists: {email}"));
        }

        let id = self.next_id("user")?;
        let user = User {
            id,
            employee_id: utils::employee_handle(id),
            name: name.to_string(),
            email: email.to_string(),
            role,
        };
        self.put_user(&user)?;

        info!(user = %user.name, employee_id = %user.employee_id, "user created");
        Ok(user)
    }

    pub fn user(&self, id: u64) -> anyhow::Result<Option<User>> {
        let Some(bytes) = self.users.get(id.to_be_bytes())? else {
            return Ok(None);
        };
        let user = minicbor::decode(bytes.as_ref()).context("failed to decode user record")?;
        Ok(Some(user))
    }

    pub fn users(&self) -> anyhow::Result<Vec<User>> {
        let mut users = Vec::new();
        for kv in self.users.iter() {
            let (_, bytes) = kv?;
            users.push(minicbor::decode(bytes.as_ref()).context("failed to decode user record")?);
        }
        Ok(users)
    }

    pub fn set_role(&self, id: u64, role: Role) -> anyhow::Result<User> {
        let mut user = self
            .user(id)?
            .ok_or_else(|| anyhow::anyhow!("user not found: {id}"))?;
        user.role = role;
        self.put_user(&user)?;

        info!(user = %user.name, role = role.as_str(), "role updated");
        Ok(user)
    }

    pub fn set_email(&self, id: u64, email: &str) -> anyhow::Result<User> {
        if self
            .users()?
            .iter()
            .any(|user| user.email == email && user.id != id)
        {
            return Err(anyhow::anyhow!("email already exists: {email}"));
        }

        let mut user = self
            .user(id)?
            .ok_or_else(|| anyhow::anyhow!("user not found: {id}"))?;
        user.email = email.to_string();
        self.put_user(&user)?;

        Ok(user)
    }

    pub fn delete_user(&self, id: u64) -> anyhow::Result<User> {
        let user = self
            .user(id)?
            .ok_or_else(|| anyhow::anyhow!("user not found: {id}"))?;
        self.users.remove(id.to_be_bytes())?;

        info!(user = %user.name, "user deleted");
        Ok(user)
    }

    /// The role-source contract consumed by the anomaly scanner: a mapping
    /// from user name to role.
    pub fn user_roles(&self) -> anyhow::Result<HashMap<String, Role>> {
        Ok(self
            .users()?
            .into_iter()
            .map(|user| (user.name, user.role))
            .collect())
    }

    fn put_user(&self, user: &User) -> anyhow::Result<()> {
        let bytes = minicbor::to_vec(user)?;
        self.users.insert(user.id.to_be_bytes(), bytes)?;
        Ok(())
    }

    // CATEGORIES

    pub fn upsert_category(&self, name: &str) -> anyhow::Result<NamedRecord> {
        self.upsert_named(&self.categories, "category", name)
    }

    pub fn rename_category(&self, id: u64, name: &str) -> anyhow::Result<NamedRecord> {
        self.rename_named(&self.categories, "category", id, name)
    }

    pub fn categories(&self) -> anyhow::Result<Vec<NamedRecord>> {
        self.list_named(&self.categories)
    }

    /// Archive the category when any ledger entry references it, hard
    /// delete otherwise.
    pub fn remove_category(&self, id: u64, chain: &[Block]) -> anyhow::Result<RemoveOutcome> {
        self.remove_named(&self.categories, "category", id, chain, category_referenced)
    }

    // LOCATIONS

    pub fn upsert_location(&self, name: &str) -> anyhow::Result<NamedRecord> {
        self.upsert_named(&self.locations, "location", name)
    }

    pub fn rename_location(&self, id: u64, name: &str) -> anyhow::Result<NamedRecord> {
        self.rename_named(&self.locations, "location", id, name)
    }

    pub fn locations(&self) -> anyhow::Result<Vec<NamedRecord>> {
        self.list_named(&self.locations)
    }

    /// Archive the location when any stock movement touched it, hard
    /// delete otherwise. Item creation alone does not count as usage.
    pub fn remove_location(&self, id: u64, chain: &[Block]) -> anyhow::Result<RemoveOutcome> {
        self.remove_named(&self.locations, "location", id, chain, location_referenced)
    }

    // Shared category/location plumbing.

    fn upsert_named(&self, tree: &Tree, kind: &str, name: &str) -> anyhow::Result<NamedRecord> {
        if name.is_empty() {
            return Err(anyhow::anyhow!("{kind} name is required"));
        }

        if let Some(mut existing) = self.find_named(tree, name)? {
            if !existing.is_archived {
                return Err(anyhow::anyhow!(
                    "{kind} name already exists and is active: {name}"
                ));
            }
            existing.is_archived = false;
            self.put_named(tree, &existing)?;
            info!(kind, name, "record un-archived");
            return Ok(existing);
        }

        let record = NamedRecord {
            id: self.next_id(kind)?,
            name: name.to_string(),
            is_archived: false,
        };
        self.put_named(tree, &record)?;

        info!(kind, name, "record created");
        Ok(record)
    }

    fn rename_named(
        &self,
        tree: &Tree,
        kind: &str,
        id: u64,
        name: &str,
    ) -> anyhow::Result<NamedRecord> {
        if self
            .find_named(tree, name)?
            .is_some_and(|existing| existing.id != id)
        {
            return Err(anyhow::anyhow!("{kind} name already exists: {name}"));
        }

        let mut record = self
            .get_named(tree, id)?
            .ok_or_else(|| anyhow::anyhow!("{kind} not found: {id}"))?;
        record.name = name.to_string();
        self.put_named(tree, &record)?;

        Ok(record)
    }

    fn remove_named(
        &self,
        tree: &Tree,
        kind: &str,
        id: u64,
        chain: &[Block],
        referenced: fn(&Transaction, &str) -> bool,
    ) -> anyhow::Result<RemoveOutcome> {
        let record = self
            .get_named(tree, id)?
            .ok_or_else(|| anyhow::anyhow!("{kind} not found: {id}"))?;

        let has_history = chain
            .iter()
            .any(|block| referenced(&block.transaction, &record.name));

        if has_history {
            let archived = NamedRecord {
                is_archived: true,
                ..record
            };
            self.put_named(tree, &archived)?;
            info!(kind, name = %archived.name, "record archived, has ledger history");
            return Ok(RemoveOutcome::Archived);
        }

        tree.remove(id.to_be_bytes())?;
        info!(kind, name = %record.name, "record permanently deleted");
        Ok(RemoveOutcome::Deleted)
    }

    fn list_named(&self, tree: &Tree) -> anyhow::Result<Vec<NamedRecord>> {
        let mut records = Vec::new();
        for kv in tree.iter() {
            let (_, bytes) = kv?;
            records.push(minicbor::decode(bytes.as_ref()).context("failed to decode record")?);
        }
        records.sort_by(|a: &NamedRecord, b: &NamedRecord| {
            (a.is_archived, &a.name).cmp(&(b.is_archived, &b.name))
        });
        Ok(records)
    }

    fn get_named(&self, tree: &Tree, id: u64) -> anyhow::Result<Option<NamedRecord>> {
        let Some(bytes) = tree.get(id.to_be_bytes())? else {
            return Ok(None);
        };
        let record = minicbor::decode(bytes.as_ref()).context("failed to decode record")?;
        Ok(Some(record))
    }

    fn find_named(&self, tree: &Tree, name: &str) -> anyhow::Result<Option<NamedRecord>> {
        Ok(self
            .list_named(tree)?
            .into_iter()
            .find(|record| record.name == name))
    }

    fn put_named(&self, tree: &Tree, record: &NamedRecord) -> anyhow::Result<()> {
        let bytes = minicbor::to_vec(record)?;
        tree.insert(record.id.to_be_bytes(), bytes)?;
        Ok(())
    }
}

// Sled merge callback for a big-endian u64 sequence. A missing or
// malformed counter restarts the sequence rather than poisoning it.
fn bump_counter(current: Option<&[u8]>) -> Option<Vec<u8>> {
    let current = current
        .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
        .map(u64::from_be_bytes)
        .unwrap_or(0);
    Some((current + 1).to_be_bytes().to_vec())
}

fn category_referenced(transaction: &Transaction, name: &str) -> bool {
    match transaction {
        Transaction::CreateItem { category, .. } => category == name,
        Transaction::EditItem { patch, .. } => patch.new_category.as_deref() == Some(name),
        _ => false,
    }
}

fn location_referenced(transaction: &Transaction, name: &str) -> bool {
    match transaction {
        Transaction::StockIn { location, .. } | Transaction::StockOut { location, .. } => {
            location == name
        }
        Transaction::Move {
            from_location,
            to_location,
            ..
        } => from_location == name || to_location == name,
        _ => false,
    }
}

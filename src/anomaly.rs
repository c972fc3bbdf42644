//! Business-rule anomaly scanning over the full chain.
//!
//! Every entry is run through a fixed, ordered list of independent rules.
//! Rules are pure predicates over the entry and the actor's role; adding a
//! rule never changes the outcome of an existing one.
use super::block::Block;
use super::registry::Role;
use super::transaction::Transaction;
use std::collections::HashMap;

/// An entry that tripped at least one rule, with human-readable reasons in
/// rule order.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyFlag {
    pub entry: Block,
    pub reasons: Vec<String>,
}

type Rule = fn(&Block, Option<&Role>) -> Option<String>;

const RULES: [Rule; 3] = [unusual_hour, admin_performed_move, skipped_warehouse];

/// Scan the chain against the rule set, newest entries first.
///
/// Genesis is skipped. An entry appears in the output iff it accumulated at
/// least one reason. Newest-first ordering is part of the contract, not a
/// presentation-side sort.
pub fn scan(chain: &[Block], roles: &HashMap<String, Role>) -> Vec<AnomalyFlag> {
    let mut flags = Vec::new();

    for block in chain {
        if block.is_genesis() {
            continue;
        }

        let role = block
            .transaction
            .actor()
            .and_then(|actor| roles.get(&actor.user_name));

        let reasons: Vec<String> = RULES.iter().filter_map(|rule| rule(block, role)).collect();
        if !reasons.is_empty() {
            flags.push(AnomalyFlag {
                entry: block.clone(),
                reasons,
            });
        }
    }

    flags.reverse();
    flags
}

// Activity between 22:00 and 06:00 UTC is outside business hours.
fn unusual_hour(block: &Block, _role: Option<&Role>) -> Option<String> {
    let hour = block.timestamp.utc_hour();
    if hour < 6 || hour > 22 {
        return Some(format!(
            "Transaction occurred at an unusual time ({hour}:00 UTC)."
        ));
    }
    None
}

// Moves are a Manager-tier task.
fn admin_performed_move(block: &Block, role: Option<&Role>) -> Option<String> {
    if matches!(block.transaction, Transaction::Move { .. }) && role == Some(&Role::Admin) {
        return Some("MOVE operation performed by an Admin, not a Manager.".to_string());
    }
    None
}

// The expected logistics path passes through a warehouse stage.
fn skipped_warehouse(block: &Block, _role: Option<&Role>) -> Option<String> {
    if let Transaction::Move {
        from_location,
        to_location,
        ..
    } = &block.transaction
    {
        if from_location == "Supplier" && to_location == "Retailer" {
            return Some("Logistics anomaly: Skipped Warehouse (Supplier -> Retailer).".to_string());
        }
    }
    None
}

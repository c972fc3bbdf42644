//! Whole-chain integrity verification.
use super::block::{Block, GENESIS_PREVIOUS_HASH};
use super::error::LedgerError;

/// Outcome of an integrity scan. `broken_at` names the first entry whose
/// content or link failed, when any did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub is_valid: bool,
    pub broken_at: Option<u64>,
}

impl ChainReport {
    fn valid() -> Self {
        Self {
            is_valid: true,
            broken_at: None,
        }
    }

    fn broken_at(index: u64) -> Self {
        Self {
            is_valid: false,
            broken_at: Some(index),
        }
    }

    /// Convert a broken report into its typed error.
    pub fn ensure(&self) -> Result<(), LedgerError> {
        match self.broken_at {
            None => Ok(()),
            Some(index) => Err(LedgerError::BrokenChain(index)),
        }
    }
}

/// Walk the full sequence and confirm it is unbroken and untampered.
///
/// The genesis entry is the base case: sentinel previous hash plus a
/// self-consistent content hash, never checked against a predecessor.
/// Every later entry must link to the one before it. Verification stops at
/// the first failure and reports that index; nothing is ever auto-repaired.
/// An empty chain is vacuously valid.
pub fn verify(chain: &[Block]) -> Result<ChainReport, LedgerError> {
    let Some(genesis) = chain.first() else {
        return Ok(ChainReport::valid());
    };

    if genesis.previous_hash != GENESIS_PREVIOUS_HASH || !genesis.has_valid_hash()? {
        return Ok(ChainReport::broken_at(genesis.index));
    }

    for pair in chain.windows(2) {
        if !pair[1].is_valid_link(&pair[0])? {
            return Ok(ChainReport::broken_at(pair[1].index));
        }
    }

    Ok(ChainReport::valid())
}

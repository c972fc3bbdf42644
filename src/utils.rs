//! Identifier minting and display helpers.

use bech32::{Bech32m, Hrp};
use uuid7::uuid7;

/// Prefix carried by every minted sku.
pub const SKU_PREFIX: &str = "sku";

/// Mint a ledger identifier: a uuid7 payload, bech32m-encoded under the
/// given prefix. Prefixes are normalized to lowercase before encoding;
/// ledger ids are compared byte-for-byte, and bech32 rejects mixed case.
pub fn mint_id(prefix: &str) -> anyhow::Result<String> {
    let prefix = prefix.trim().to_ascii_lowercase();
    if prefix.is_empty() {
        return Err(anyhow::anyhow!("identifier prefix is required"));
    }

    let hrp = Hrp::parse(&prefix)?;
    Ok(bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?)
}

/// Mint a sku for a newly created item.
pub fn mint_sku() -> anyhow::Result<String> {
    mint_id(SKU_PREFIX)
}

/// Format a users-sequence number as an employee handle. Numbers are
/// zero-padded to four digits and grow past that without truncation.
pub fn employee_handle(sequence: u64) -> String {
    format!("EMP-{sequence:04}")
}

/// Leading slice of a content digest, for log lines.
pub fn short_digest(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}

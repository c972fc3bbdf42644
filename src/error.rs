//! Error taxonomy for the ledger core.

/// Failures surfaced by the chain verifier and the replay engine.
///
/// Replay is all-or-nothing: a snapshot is either fully computed or one of
/// these comes back instead. There is no negative-stock variant; replay
/// passes committed history through as recorded.
#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("chain integrity broken at entry {0}")]
    BrokenChain(u64),
    #[error("entry {index}: {source}")]
    MalformedTransaction {
        index: u64,
        #[source]
        source: TransactionError,
    },
    #[error("entry {index}: stock movement for unknown sku {sku}")]
    UnknownSku { index: u64, sku: String },
    #[error("invalid snapshot timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("ledger entry serialization failed: {0}")]
    Codec(String),
}

/// A transaction missing required fields for its kind. Checked at append
/// time and again during replay (fail fast, never silently skip).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("{0} requires a non-empty item sku")]
    EmptySku(&'static str),
    #[error("{0} requires a non-empty product name")]
    EmptyName(&'static str),
    #[error("{0} requires a quantity greater than zero")]
    ZeroQuantity(&'static str),
    #[error("{0} requires a non-empty location")]
    EmptyLocation(&'static str),
}

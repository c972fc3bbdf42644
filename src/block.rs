//! Ledger entries and hash-chain primitives.
use super::error::LedgerError;
use super::transaction::Transaction;
use chrono::{DateTime, TimeZone, Timelike, Utc};

/// Sentinel `previous_hash` carried by the Genesis entry.
pub const GENESIS_PREVIOUS_HASH: &str = "";

/// One immutable, hash-linked record of a single transaction.
///
/// `hash` commits to the canonical CBOR encoding of
/// `(index, timestamp, transaction, previous_hash)`, and `previous_hash`
/// must equal the predecessor's `hash`. Entries are never mutated after
/// they are appended.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Block {
    #[n(0)]
    pub index: u64,
    #[n(1)]
    pub timestamp: TimeStamp<Utc>,
    #[n(2)]
    pub transaction: Transaction,
    #[n(3)]
    pub previous_hash: String,
    #[n(4)]
    pub hash: String,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// Ordering delegates to the wrapped instant; cutoff comparisons in the
// replay engine rely on it.
impl<T: TimeZone + PartialEq> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

impl<T: TimeZone + Eq> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    /// Parse an ISO-8601 instant and normalize it to UTC. Callers supply
    /// wall-clock conversions; comparisons here are always UTC-to-UTC.
    pub fn parse_utc(value: &str) -> Result<Self, LedgerError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|_| LedgerError::InvalidTimestamp(value.to_string()))
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    pub fn utc_hour(&self) -> u32 {
        self.0.hour()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

// Entry timestamps travel as UTC nanoseconds so hashed bytes are stable
// across platforms. The i64 range covers 1677..2262; an instant outside
// it cannot be sealed into an entry.
impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let nanos = self.0.timestamp_nanos_opt().ok_or_else(|| {
            minicbor::encode::Error::message(
                "ledger entry timestamp outside the nanosecond-encodable range",
            )
        })?;

        e.i64(nanos)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(TimeStamp(DateTime::from_timestamp_nanos(d.i64()?)))
    }
}

// Hashed fields in canonical order. Field indices are part of the wire
// contract; hashes are compared byte-for-byte during verification.
#[derive(minicbor::Encode)]
struct HashPayload<'a> {
    #[n(0)]
    index: u64,
    #[n(1)]
    timestamp: &'a TimeStamp<Utc>,
    #[n(2)]
    transaction: &'a Transaction,
    #[n(3)]
    previous_hash: &'a str,
}

/// Deterministic content digest over the canonical serialization of an
/// entry's four hashed fields.
pub fn compute_hash(
    index: u64,
    timestamp: &TimeStamp<Utc>,
    transaction: &Transaction,
    previous_hash: &str,
) -> Result<String, LedgerError> {
    let payload = HashPayload {
        index,
        timestamp,
        transaction,
        previous_hash,
    };
    let cbor = minicbor::to_vec(&payload).map_err(|e| LedgerError::Codec(e.to_string()))?;

    Ok(sha256::digest(&cbor))
}

impl Block {
    /// Construct an entry and compute its content hash in one step.
    pub fn seal(
        index: u64,
        timestamp: TimeStamp<Utc>,
        transaction: Transaction,
        previous_hash: String,
    ) -> Result<Self, LedgerError> {
        let hash = compute_hash(index, &timestamp, &transaction, &previous_hash)?;

        Ok(Self {
            index,
            timestamp,
            transaction,
            previous_hash,
            hash,
        })
    }

    /// The entry every chain starts with. Written once at initialization.
    pub fn genesis(timestamp: TimeStamp<Utc>) -> Result<Self, LedgerError> {
        Self::seal(
            0,
            timestamp,
            Transaction::Genesis,
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// True iff the stored hash matches a recomputation over the entry's
    /// own content.
    pub fn has_valid_hash(&self) -> Result<bool, LedgerError> {
        let expected = compute_hash(
            self.index,
            &self.timestamp,
            &self.transaction,
            &self.previous_hash,
        )?;

        Ok(self.hash == expected)
    }

    /// True iff this entry links to `previous` and its own hash is
    /// self-consistent.
    pub fn is_valid_link(&self, previous: &Block) -> Result<bool, LedgerError> {
        Ok(self.previous_hash == previous.hash && self.has_valid_hash()?)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, LedgerError> {
        minicbor::to_vec(self).map_err(|e| LedgerError::Codec(e.to_string()))
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, LedgerError> {
        minicbor::decode(bytes).map_err(|e| LedgerError::Codec(e.to_string()))
    }
}

/// Record identity and timestamp helpers.
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{SecondsFormat, Utc};

use crate::validate::RecordKind;

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new record id: a kind prefix plus 12 hex chars.
/// Uses an atomic counter for intra-process uniqueness combined with a
/// nanosecond timestamp, hashed via SHA-256 for uniform distribution.
pub fn generate_id(kind: RecordKind) -> String {
    use sha2::{Digest, Sha256};
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut hasher = Sha256::new();
    hasher.update(seq.to_le_bytes());
    hasher.update(ts.to_le_bytes());
    let hash = hasher.finalize();
    let prefix = match kind {
        RecordKind::Board => "b",
        RecordKind::Column => "c",
        RecordKind::Card => "k",
    };
    format!("{}-{}", prefix, hex::encode(&hash[..6]))
}

/// Current time as an ISO-8601 UTC string with millisecond precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

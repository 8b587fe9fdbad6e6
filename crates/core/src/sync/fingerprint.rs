//! Content fingerprints for drift detection

use calsync_domain::SyncableItem;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Scheme marker prepended to every fingerprint.
pub const FINGERPRINT_VERSION: &str = "v1";

const FIELD_SEPARATOR: char = '\u{1f}';

/// Stable hash over the event-relevant content of `item`.
///
/// Whitespace-only edits and sub-second timestamp noise do not change the
/// result.
pub fn fingerprint(item: &SyncableItem) -> String {
    let description = item.description.as_deref().unwrap_or_default();
    let mut canonical = [
        normalize_text(&item.title),
        normalize_text(description),
        normalize_instant(item.start_at),
        normalize_instant(item.end_at),
    ]
    .join(&FIELD_SEPARATOR.to_string());
    // Only marked when set so timed items keep their existing hashes.
    if item.all_day {
        canonical.push(FIELD_SEPARATOR);
        canonical.push_str("all-day");
    }

    let digest = Sha256::digest(canonical.as_bytes());
    format!("{FINGERPRINT_VERSION}:{}", hex::encode(digest))
}

/// Trim, unify line endings and collapse runs of blanks. Line breaks are kept
/// so that reflowing a description still counts as a change.
fn normalize_text(value: &str) -> String {
    value
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn normalize_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

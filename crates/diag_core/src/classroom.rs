//! Classroom session helpers: room codes, magic tokens, join rules.
//!
//! Tokens are never stored in plaintext; only their SHA-256 hex digest is
//! kept, and verification compares digests in constant time.

use chrono::{DateTime, Duration, Timelike, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::types::SessionStatus;

/// Short, easy-to-type code alphabet with ambiguous characters removed
/// (no I/L/O/0/1).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

pub const CODE_LEN: usize = 6;

/// Generate a 6-character room code.
pub fn generate_room_code() -> String {
    let mut bytes = [0u8; CODE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
        .iter()
        .map(|b| CODE_ALPHABET[*b as usize % CODE_ALPHABET.len()] as char)
        .collect()
}

/// Generate a magic token for in-room use: 12 random bytes as 24 hex chars.
pub fn generate_magic_token() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 hex digest of a token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Constant-time comparison of a presented token against the stored digest.
pub fn verify_token(token: &str, stored_hash: &str) -> bool {
    let given = hash_token(token);
    let (a, b) = (given.as_bytes(), stored_hash.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Normalize a user-entered code for lookup: trimmed, uppercased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Participants may join while the session is being prepared or is active.
pub fn can_join(status: SessionStatus) -> bool {
    matches!(status, SessionStatus::Preparing | SessionStatus::Active)
}

pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(expires_at, Some(t) if t < now)
}

/// Default session expiry: today at 18:00; if that has already passed,
/// tomorrow at 18:00, so a freshly created room is never born expired.
pub fn default_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    let closing = now
        .with_hour(18)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    if closing <= now {
        closing + Duration::days(1)
    } else {
        closing
    }
}

//! Record ids and placeholder external references.
//!
//! Ids are millisecond timestamps forced to be strictly increasing, so sorting
//! by id is sorting by creation order.
//!
//! Placeholder references have a fixed textual shape so tests and downstream
//! consumers can pattern-match on them:
//! - fingerprint: `bafy` followed by 32 lowercase base32 characters
//! - external reference: `0x` followed by 64 lowercase hex characters

use std::{
    fmt::{self, Write},
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FINGERPRINT_PREFIX: &str = "bafy";
pub const EXTERNAL_REF_PREFIX: &str = "0x";

const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";
const FINGERPRINT_SUFFIX_LEN: usize = 32;

/// Identifier of a certified track.
///
/// Displayed as a zero-padded decimal so lexical and numeric order agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackId(pub u64);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid track id '{0}'")]
pub struct InvalidTrackId(pub String);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:013}", self.0)
    }
}

impl FromStr for TrackId {
    type Err = InvalidTrackId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidTrackId(s.to_string()));
        }
        let id = s
            .parse::<u64>()
            .map(TrackId)
            .map_err(|_| InvalidTrackId(s.to_string()))?;

        // one spelling per id, the padded one ids are displayed with
        if id.to_string() != s {
            return Err(InvalidTrackId(s.to_string()));
        }
        Ok(id)
    }
}

impl TryFrom<String> for TrackId {
    type Error = InvalidTrackId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TrackId> for String {
    fn from(id: TrackId) -> Self {
        id.to_string()
    }
}

/// Output of one [`IdGenerator::mint`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Minted {
    pub id: TrackId,
    pub fingerprint: String,
    pub external_ref: String,
}

/// Hands out strictly increasing track ids.
///
/// Not thread safe on its own; the certificate store keeps it behind its
/// writer lock.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    /// Generator that will never return `last` or anything below it
    pub fn resume_after(last: Option<TrackId>) -> Self {
        Self {
            last: last.map(|id| id.0).unwrap_or(0),
        }
    }

    pub fn next_id(&mut self) -> TrackId {
        let next = now_millis().max(self.last.saturating_add(1));
        self.last = next;
        TrackId(next)
    }

    pub fn mint(&mut self) -> Minted {
        Minted {
            id: self.next_id(),
            fingerprint: placeholder_fingerprint(),
            external_ref: placeholder_external_ref(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn placeholder_fingerprint() -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(FINGERPRINT_PREFIX.len() + FINGERPRINT_SUFFIX_LEN);
    out.push_str(FINGERPRINT_PREFIX);
    for _ in 0..FINGERPRINT_SUFFIX_LEN {
        out.push(BASE32_ALPHABET[rng.gen_range(0..BASE32_ALPHABET.len())] as char);
    }
    out
}

pub fn placeholder_external_ref() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    let mut out = String::with_capacity(EXTERNAL_REF_PREFIX.len() + 64);
    out.push_str(EXTERNAL_REF_PREFIX);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

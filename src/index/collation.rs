//! Locale-aware ordering and hashing for [`Key`].
//!
//! Three collations are supported:
//!
//! - [`Collation::Binary`] - bytewise order ("C", "POSIX", "ucs_basic")
//! - [`Collation::Linguistic`] - case-folded primary order, lowercase before
//!   uppercase on ties, bytewise as the final tie-break. This is the default
//!   when the host supplies no collation or one we do not recognize.
//! - [`Collation::CaseInsensitive`] - case-folded order only; keys differing
//!   only in case compare equal (a total preorder).

use crate::index::types::Key;
use ahash::RandomState;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{BuildHasher, Hasher};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collation {
    Binary,
    #[default]
    Linguistic,
    CaseInsensitive,
}

impl Collation {
    pub const DEFAULT: Collation = Collation::Linguistic;

    /// Look up a collation by the name the host uses for it
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        match lowered.as_str() {
            "c" | "posix" | "ucs_basic" | "binary" => Some(Collation::Binary),
            "" | "default" | "und" | "und-x-icu" | "linguistic" => Some(Collation::Linguistic),
            "nocase" | "case_insensitive" | "und-u-ks-level2" => Some(Collation::CaseInsensitive),
            // Any language_TERRITORY[.encoding] locale orders linguistically
            other if is_posix_locale_name(other) => Some(Collation::Linguistic),
            _ => None,
        }
    }

    /// Resolve a host-supplied name, falling back to the default locale
    pub fn resolve(name: Option<&str>) -> Self {
        match name {
            None => Self::DEFAULT,
            Some(name) => Self::from_name(name).unwrap_or_else(|| {
                warn!(collation = name, "unknown collation, using default");
                Self::DEFAULT
            }),
        }
    }

    /// Whether equal keys are always byte-identical
    pub fn is_deterministic(self) -> bool {
        !matches!(self, Collation::CaseInsensitive)
    }

    #[inline]
    pub fn compare(self, a: &Key, b: &Key) -> Ordering {
        self.compare_str(a.as_str(), b.as_str())
    }

    pub fn compare_str(self, a: &str, b: &str) -> Ordering {
        match self {
            Collation::Binary => a.as_bytes().cmp(b.as_bytes()),
            Collation::Linguistic => fold_cmp(a, b)
                .then_with(|| case_cmp(a, b))
                .then_with(|| a.as_bytes().cmp(b.as_bytes())),
            Collation::CaseInsensitive => fold_cmp(a, b),
        }
    }

    /// Hash consistent with `compare(a, b) == Equal` under this collation
    pub fn hash(self, key: &Key) -> u32 {
        if self.is_deterministic() {
            return hash_key(key);
        }
        let mut hasher = key_hasher();
        let mut buf = [0u8; 4];
        for ch in key.as_str().chars().flat_map(char::to_lowercase) {
            hasher.write(ch.encode_utf8(&mut buf).as_bytes());
        }
        fold_hash(hasher.finish())
    }
}

/// Three-way comparison in the host's `{-1, 0, 1}` convention
pub fn compare(a: &Key, b: &Key, collation: Collation) -> i32 {
    match collation.compare(a, b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Bytewise 32-bit hash, stable across processes
pub fn hash_key(key: &Key) -> u32 {
    let mut hasher = key_hasher();
    hasher.write(key.as_bytes());
    let value = fold_hash(hasher.finish());
    debug!(hash = value, "hashed key");
    value
}

pub fn key_lt(a: &Key, b: &Key, collation: Collation) -> bool {
    collation.compare(a, b) == Ordering::Less
}

pub fn key_le(a: &Key, b: &Key, collation: Collation) -> bool {
    collation.compare(a, b) != Ordering::Greater
}

pub fn key_eq(a: &Key, b: &Key, collation: Collation) -> bool {
    collation.compare(a, b) == Ordering::Equal
}

pub fn key_ge(a: &Key, b: &Key, collation: Collation) -> bool {
    collation.compare(a, b) != Ordering::Less
}

pub fn key_gt(a: &Key, b: &Key, collation: Collation) -> bool {
    collation.compare(a, b) == Ordering::Greater
}

/// Fixed seeds so hashes persisted by the host stay valid
fn key_hasher() -> ahash::AHasher {
    RandomState::with_seeds(
        0x517cc1b727220a95,
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
    )
    .build_hasher()
}

#[inline]
fn fold_hash(h: u64) -> u32 {
    (h ^ (h >> 32)) as u32
}

fn fold_cmp(a: &str, b: &str) -> Ordering {
    if a.is_ascii() && b.is_ascii() {
        return a
            .bytes()
            .map(|c| c.to_ascii_lowercase())
            .cmp(b.bytes().map(|c| c.to_ascii_lowercase()));
    }
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Lowercase sorts before uppercase at the first position where case differs
fn case_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(char::is_uppercase)
        .cmp(b.chars().map(char::is_uppercase))
}

fn is_posix_locale_name(name: &str) -> bool {
    let base = name.split('.').next().unwrap_or(name);
    let mut parts = base.split(['_', '-']);
    let lang = parts.next().unwrap_or("");
    let territory = parts.next().unwrap_or("");
    (2..=3).contains(&lang.len())
        && lang.bytes().all(|b| b.is_ascii_alphabetic())
        && territory.len() == 2
        && territory.bytes().all(|b| b.is_ascii_alphabetic())
        && parts.next().is_none()
}

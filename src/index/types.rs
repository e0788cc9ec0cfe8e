use crate::error::{Error, Result};
use crate::index::collation::Collation;
use crate::utils::encoding::{
    MAX_PREFIXED_LEN, read_length_prefixed, varint_len, write_length_prefixed,
};
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of a row in the host table
pub type RowId = u32;

/// Identifier of a storage block (a fixed run of rows)
pub type BlockId = u32;

/// An immutable, UTF-8 validated text key.
///
/// The payload is a `Bytes` handle, so a key may be a slice of a larger page
/// buffer owned by the host. `materialize` detaches it from that buffer.
/// `PartialEq` is byte identity; ordering always goes through a `Collation`.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Key {
    data: Bytes,
}

impl Key {
    /// Create a key by copying `text`
    pub fn new(text: &str) -> Self {
        Self {
            data: Bytes::copy_from_slice(text.as_bytes()),
        }
    }

    /// Wrap host bytes without copying. Fails if the bytes are not UTF-8.
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        if data.len() > MAX_PREFIXED_LEN {
            return Err(Error::MalformedKey(format!(
                "key of {} bytes exceeds the length prefix range",
                data.len()
            )));
        }
        std::str::from_utf8(&data)
            .map_err(|e| Error::MalformedKey(format!("invalid UTF-8: {}", e)))?;
        Ok(Self { data })
    }

    /// Decode a canonical (length-prefixed) key from the front of `buf`.
    /// Returns the key and the number of bytes consumed. The key shares
    /// nothing with `buf`.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let (payload, consumed) = read_length_prefixed(buf).ok_or_else(|| {
            Error::MalformedKey(format!(
                "bad length prefix or truncated payload ({} bytes available)",
                buf.len()
            ))
        })?;
        let key = Self::from_bytes(Bytes::copy_from_slice(payload))?;
        Ok((key, consumed))
    }

    /// Like `decode`, but the returned key is a zero-copy slice of `page`
    pub fn decode_shared(page: &Bytes, offset: usize) -> Result<(Self, usize)> {
        let tail = page.get(offset..).ok_or_else(|| {
            Error::MalformedKey(format!("offset {} past end of page", offset))
        })?;
        let (payload, consumed) = read_length_prefixed(tail)
            .ok_or_else(|| Error::MalformedKey(format!("bad key at offset {}", offset)))?;
        let start = offset + (consumed - payload.len());
        let key = Self::from_bytes(page.slice(start..offset + consumed))?;
        Ok((key, consumed))
    }

    /// Append the canonical encoding: varint length followed by the UTF-8 payload
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        write_length_prefixed(&self.data, buf);
    }

    /// Size of the canonical encoding in bytes
    pub fn encoded_len(&self) -> usize {
        varint_len(self.data.len() as u32) + self.data.len()
    }

    /// Copy the payload into a buffer owned by this key alone
    pub fn materialize(&self) -> Self {
        Self {
            data: Bytes::copy_from_slice(&self.data),
        }
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: every constructor validates UTF-8
        unsafe { std::str::from_utf8_unchecked(&self.data) }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Leading byte, used by picksplit
    pub fn first_byte(&self) -> Option<u8> {
        self.data.first().copied()
    }
}

impl From<&str> for Key {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Key {
    fn from(text: String) -> Self {
        Self {
            data: Bytes::from(text.into_bytes()),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Key::from)
    }
}

/// Operator strategy numbers understood by the adapters.
///
/// The host passes raw numbers; `TryFrom<u16>` is the only place they are
/// interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Strategy {
    Less = 1,
    LessEqual = 2,
    Equal = 3,
    GreaterEqual = 4,
    Greater = 5,
    /// Value has a token equal to the argument
    Contains = 6,
    /// SQL LIKE with `%` and `_` wildcards
    Like = 7,
    /// Regular expression match
    Regex = 8,
}

impl Strategy {
    pub const ALL: [Strategy; 8] = [
        Strategy::Less,
        Strategy::LessEqual,
        Strategy::Equal,
        Strategy::GreaterEqual,
        Strategy::Greater,
        Strategy::Contains,
        Strategy::Like,
        Strategy::Regex,
    ];

    pub fn number(self) -> u16 {
        self as u16
    }

    /// True for the five ordering operators
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Strategy::Less
                | Strategy::LessEqual
                | Strategy::Equal
                | Strategy::GreaterEqual
                | Strategy::Greater
        )
    }

    pub fn is_pattern(self) -> bool {
        matches!(self, Strategy::Like | Strategy::Regex)
    }

    /// Evaluate `value <op> argument` given `value.cmp(argument)`.
    /// Returns None for non-comparison strategies.
    pub fn holds(self, ord: Ordering) -> Option<bool> {
        let result = match self {
            Strategy::Less => ord == Ordering::Less,
            Strategy::LessEqual => ord != Ordering::Greater,
            Strategy::Equal => ord == Ordering::Equal,
            Strategy::GreaterEqual => ord != Ordering::Less,
            Strategy::Greater => ord == Ordering::Greater,
            Strategy::Contains | Strategy::Like | Strategy::Regex => return None,
        };
        Some(result)
    }
}

impl TryFrom<u16> for Strategy {
    type Error = Error;

    fn try_from(number: u16) -> Result<Self> {
        Strategy::ALL
            .iter()
            .copied()
            .find(|s| s.number() == number)
            .ok_or(Error::UnknownStrategyNumber(number))
    }
}

/// One predicate of a scan: `column <strategy> argument`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanKey {
    pub strategy: Strategy,
    pub argument: Key,
}

impl ScanKey {
    pub fn new(strategy: Strategy, argument: impl Into<Key>) -> Self {
        Self {
            strategy,
            argument: argument.into(),
        }
    }

    /// Build from a raw host strategy number
    pub fn from_raw(number: u16, argument: impl Into<Key>) -> Result<Self> {
        Ok(Self::new(Strategy::try_from(number)?, argument))
    }
}

/// Decision returned by a `consistent` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consistency {
    pub result: bool,
    /// The host must re-evaluate the predicate against the row
    pub recheck: bool,
}

/// Per-call context the host threads alongside keys.
///
/// Carries the collation for every comparison and, where the host knows it,
/// the operator that triggered the call. The tree adapter evaluates this
/// operator in preference to the scan key's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallContext {
    pub collation: Collation,
    pub strategy: Option<Strategy>,
}

impl CallContext {
    pub fn new(collation: Collation) -> Self {
        Self {
            collation,
            strategy: None,
        }
    }

    /// Resolve a host-supplied collation name (absent or unknown names fall back)
    pub fn for_locale(name: Option<&str>) -> Self {
        Self::new(Collation::resolve(name))
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    #[inline]
    pub fn compare(&self, a: &Key, b: &Key) -> Ordering {
        self.collation.compare(a, b)
    }
}

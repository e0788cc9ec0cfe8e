//! Token adapter for the inverted index.
//!
//! Stored values become one or more keys (`extract_value`); query arguments
//! become keys to look up, exactly or by substring (`extract_query`). The host
//! reports which query keys matched a row and `consistent` turns those flags
//! into a row decision plus a recheck flag.
//!
//! Key identity in this index is byte identity, independent of collation:
//! equality answers are exact for the deterministic collations only.

use crate::error::{Error, Result};
use crate::index::options::{IndexOptions, ValueMode};
use crate::index::types::{Consistency, Key, ScanKey, Strategy};
use crate::utils::tokenizer::{PatternMode, pattern_tokens, value_tokens};
use memchr::memmem;
use std::cmp::Ordering;

/// Keys emitted for one stored value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedValue {
    pub keys: Vec<Key>,
    /// Per-key null flags; the adapter never emits null keys
    pub nulls: Vec<bool>,
}

/// Keys to look up for one scan key
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedQuery {
    pub keys: Vec<Key>,
    /// Per-key: look up by substring (`compare_partial`) rather than exactly
    pub partial_match: Vec<bool>,
}

impl ExtractedQuery {
    /// No keys: every row is a candidate
    pub fn matches_everything(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Outcome of comparing a partial-match query key with a stored key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialMatch {
    Match,
    NoMatch,
}

#[derive(Debug, Clone, Default)]
pub struct InvertedIndexAdapter {
    options: IndexOptions,
}

impl InvertedIndexAdapter {
    const NAME: &'static str = "inverted";

    pub fn new(options: IndexOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn value_mode(&self) -> ValueMode {
        self.options.value_mode
    }

    /// Keys to store for `value`
    pub fn extract_value(&self, value: &Key) -> ExtractedValue {
        let keys = match self.options.value_mode {
            ValueMode::Whole => vec![value.materialize()],
            ValueMode::Tokenize => value_tokens(value.as_str(), self.options.min_token_len),
        };
        let nulls = vec![false; keys.len()];
        ExtractedValue { keys, nulls }
    }

    /// Keys to look up for `query`
    pub fn extract_query(&self, query: &ScanKey) -> Result<ExtractedQuery> {
        let (keys, partial) = match query.strategy {
            Strategy::Equal | Strategy::Contains => (vec![query.argument.materialize()], false),
            Strategy::Like => (self.pattern_keys(&query.argument, PatternMode::Like), true),
            Strategy::Regex => (
                self.pattern_keys(&query.argument, PatternMode::Expression),
                true,
            ),
            other => return Err(Error::unsupported(Self::NAME, other)),
        };
        let partial_match = vec![partial; keys.len()];
        Ok(ExtractedQuery {
            keys,
            partial_match,
        })
    }

    /// Decide a row from the per-key match flags the host collected.
    /// No keys means the row is a candidate that must be rechecked.
    pub fn consistent(
        &self,
        match_flags: &[bool],
        strategy: Strategy,
        key_count: usize,
    ) -> Result<Consistency> {
        let supported = matches!(
            strategy,
            Strategy::Equal | Strategy::Contains | Strategy::Like | Strategy::Regex
        );
        if !supported {
            return Err(Error::unsupported(Self::NAME, strategy));
        }

        debug_assert!(match_flags.len() >= key_count);
        let flags = &match_flags[..key_count.min(match_flags.len())];
        if flags.is_empty() {
            return Ok(Consistency {
                result: true,
                recheck: true,
            });
        }

        let decision = match strategy {
            // A token match is only a value match when the value is the key
            Strategy::Equal => Consistency {
                result: flags[0],
                recheck: self.options.value_mode == ValueMode::Tokenize,
            },
            Strategy::Contains | Strategy::Regex => Consistency {
                result: flags.iter().any(|&f| f),
                recheck: true,
            },
            Strategy::Like => Consistency {
                result: flags.iter().all(|&f| f),
                recheck: true,
            },
            other => return Err(Error::unsupported(Self::NAME, other)),
        };
        Ok(decision)
    }

    /// Total order used to place keys in the index's lookup structure.
    /// Bytewise; not a collation-aware equality check.
    pub fn compare_keys(&self, a: &Key, b: &Key) -> Ordering {
        a.as_bytes().cmp(b.as_bytes())
    }

    /// Does the stored key satisfy a partial-match query key?
    pub fn compare_partial(&self, query: &Key, stored: &Key) -> PartialMatch {
        if memmem::find(stored.as_bytes(), query.as_bytes()).is_some() {
            PartialMatch::Match
        } else {
            PartialMatch::NoMatch
        }
    }

    fn pattern_keys(&self, pattern: &Key, mode: PatternMode) -> Vec<Key> {
        pattern_tokens(pattern.as_str(), mode, self.options.min_token_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizing() -> InvertedIndexAdapter {
        InvertedIndexAdapter::new(IndexOptions {
            value_mode: ValueMode::Tokenize,
            ..IndexOptions::default()
        })
    }

    fn strs(keys: &[Key]) -> Vec<&str> {
        keys.iter().map(Key::as_str).collect()
    }

    #[test]
    fn test_extract_value_whole() {
        let adapter = InvertedIndexAdapter::default();
        let extracted = adapter.extract_value(&Key::new("sql server"));
        assert_eq!(strs(&extracted.keys), ["sql server"]);
        assert_eq!(extracted.nulls, [false]);
    }

    #[test]
    fn test_extract_value_tokenize() {
        let extracted = tokenizing().extract_value(&Key::new("my-sql"));
        assert_eq!(strs(&extracted.keys), ["my", "sql", "my-sql"]);
        assert_eq!(extracted.nulls.len(), 3);
    }

    #[test]
    fn test_extract_query() {
        let adapter = InvertedIndexAdapter::default();

        let eq = adapter.extract_query(&ScanKey::new(Strategy::Equal, "mango")).unwrap();
        assert_eq!(strs(&eq.keys), ["mango"]);
        assert_eq!(eq.partial_match, [false]);

        let like = adapter
            .extract_query(&ScanKey::new(Strategy::Like, "%sql%server%"))
            .unwrap();
        assert_eq!(strs(&like.keys), ["sql", "server"]);
        assert_eq!(like.partial_match, [true, true]);

        let all = adapter.extract_query(&ScanKey::new(Strategy::Like, "%%")).unwrap();
        assert!(all.matches_everything());

        let re = adapter
            .extract_query(&ScanKey::new(Strategy::Regex, "^sql.*server"))
            .unwrap();
        assert_eq!(strs(&re.keys), ["sql", "server"]);
        assert_eq!(re.partial_match, [true, true]);
    }

    #[test]
    fn test_extract_query_unsupported() {
        let adapter = InvertedIndexAdapter::default();
        let result = adapter.extract_query(&ScanKey::new(Strategy::Less, "m"));
        assert!(matches!(
            result,
            Err(Error::UnsupportedStrategy {
                strategy: Strategy::Less,
                ..
            })
        ));
    }

    #[test]
    fn test_consistent_equality() {
        let adapter = InvertedIndexAdapter::default();
        assert_eq!(
            adapter.consistent(&[true], Strategy::Equal, 1).unwrap(),
            Consistency {
                result: true,
                recheck: false
            }
        );
        assert_eq!(
            adapter.consistent(&[false], Strategy::Equal, 1).unwrap(),
            Consistency {
                result: false,
                recheck: false
            }
        );
    }

    #[test]
    fn test_consistent_equality_tokenized() {
        let decision = tokenizing().consistent(&[true], Strategy::Equal, 1).unwrap();
        assert!(decision.result && decision.recheck);
    }

    #[test]
    fn test_consistent_patterns() {
        let adapter = InvertedIndexAdapter::default();

        let like = adapter.consistent(&[true, false], Strategy::Like, 2).unwrap();
        assert!(!like.result);
        assert!(like.recheck);
        assert!(adapter.consistent(&[true, true], Strategy::Like, 2).unwrap().result);

        let re = adapter.consistent(&[false, true], Strategy::Regex, 2).unwrap();
        assert!(re.result && re.recheck);

        let contains = adapter.consistent(&[false], Strategy::Contains, 1).unwrap();
        assert!(!contains.result && contains.recheck);

        let none = adapter.consistent(&[], Strategy::Like, 0).unwrap();
        assert!(none.result && none.recheck);
    }

    #[test]
    fn test_consistent_unsupported() {
        let adapter = InvertedIndexAdapter::default();
        assert!(adapter.consistent(&[true], Strategy::Greater, 1).is_err());
    }

    #[test]
    fn test_key_ordering_and_partial() {
        let adapter = InvertedIndexAdapter::default();
        let (a, b) = (Key::new("Zebra"), Key::new("apple"));
        assert_eq!(adapter.compare_keys(&a, &b), Ordering::Less);
        assert_eq!(adapter.compare_keys(&a, &a), Ordering::Equal);

        let stored = Key::new("postgresql");
        assert_eq!(
            adapter.compare_partial(&Key::new("sql"), &stored),
            PartialMatch::Match
        );
        assert_eq!(
            adapter.compare_partial(&Key::new("mysql"), &stored),
            PartialMatch::NoMatch
        );
    }
}

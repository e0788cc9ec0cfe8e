//! Exact predicate evaluation for rows the indexes flag as lossy.

use crate::index::collation::Collation;
use crate::index::options::{IndexOptions, ValueMode};
use crate::index::types::{CallContext, Key, ScanKey, Strategy};
use crate::utils::tokenizer::value_tokens;
use anyhow::{Context, Result, anyhow};
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Compiled patterns kept per evaluator
const PATTERN_CACHE_SIZE: NonZeroUsize = NonZeroUsize::new(64).unwrap();

/// Evaluates `value <strategy> argument` exactly, under one collation
pub struct Recheck {
    collation: Collation,
    value_mode: ValueMode,
    min_token_len: usize,
    patterns: Mutex<LruCache<(Strategy, String), Arc<Regex>>>,
}

impl Recheck {
    pub fn new(ctx: &CallContext, options: &IndexOptions) -> Self {
        Self {
            collation: ctx.collation,
            value_mode: options.value_mode,
            min_token_len: options.min_token_len,
            patterns: Mutex::new(LruCache::new(PATTERN_CACHE_SIZE)),
        }
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }

    /// Does the row value satisfy the predicate? NULL never does.
    pub fn matches(&self, value: Option<&Key>, key: &ScanKey) -> Result<bool> {
        let Some(value) = value else {
            return Ok(false);
        };

        match key.strategy {
            Strategy::Contains => Ok(self.contains(value, &key.argument)),
            Strategy::Like | Strategy::Regex => {
                let re = self.pattern(key.strategy, key.argument.as_str())?;
                Ok(re.is_match(value.as_str()))
            }
            comparison => {
                let ord = self.collation.compare(value, &key.argument);
                comparison
                    .holds(ord)
                    .ok_or_else(|| anyhow!("strategy {:?} has no exact evaluation", comparison))
            }
        }
    }

    /// Contains: the argument is one of the value's tokens
    fn contains(&self, value: &Key, argument: &Key) -> bool {
        match self.value_mode {
            ValueMode::Whole => value.as_bytes() == argument.as_bytes(),
            ValueMode::Tokenize => value_tokens(value.as_str(), self.min_token_len)
                .iter()
                .any(|t| t.as_bytes() == argument.as_bytes()),
        }
    }

    fn pattern(&self, strategy: Strategy, source: &str) -> Result<Arc<Regex>> {
        let cache_key = (strategy, source.to_string());
        let mut cache = self.patterns.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(re) = cache.get(&cache_key) {
            return Ok(Arc::clone(re));
        }

        let compiled = match strategy {
            Strategy::Like => Regex::new(&like_to_regex(source))
                .with_context(|| format!("invalid LIKE pattern {:?}", source))?,
            _ => Regex::new(source)
                .with_context(|| format!("invalid regular expression {:?}", source))?,
        };
        let compiled = Arc::new(compiled);
        cache.put(cache_key, Arc::clone(&compiled));
        Ok(compiled)
    }
}

/// Translate a LIKE pattern into an anchored regular expression.
/// `%` matches any run, `_` one character, `\` escapes the next character.
pub fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");
    let mut chars = pattern.chars();
    let mut buf = [0u8; 4];
    while let Some(ch) = chars.next() {
        match ch {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => {
                let literal = chars.next().unwrap_or('\\');
                out.push_str(&regex::escape(literal.encode_utf8(&mut buf)));
            }
            c => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

//! Inverted index built on [`InvertedIndexAdapter`].
//!
//! Postings are kept in a vector sorted by the adapter's key order. Exact
//! query keys are found by binary search; partial keys are substrings, which
//! no sort order can bound, so they are compared against every stored key.

use crate::index::inverted::{InvertedIndexAdapter, PartialMatch};
use crate::index::options::IndexOptions;
use crate::index::types::{CallContext, Key, RowId, ScanKey, Strategy};
use crate::query::range_scan::matches_all;
use crate::query::recheck::Recheck;
use crate::query::stats::{ScanResult, ScanStats};
use crate::query::table::Table;
use anyhow::{Context, Result};
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

/// Candidates produced by one scan key
#[derive(Debug, Default)]
struct KeyCandidates {
    rows: RoaringBitmap,
    /// Subset of `rows` that must be rechecked
    lossy: RoaringBitmap,
}

#[derive(Debug, Clone)]
pub struct TokenIndex {
    adapter: InvertedIndexAdapter,
    ctx: CallContext,
    postings: Vec<(Key, RoaringBitmap)>,
}

impl TokenIndex {
    pub fn build(table: &Table, options: IndexOptions, ctx: CallContext) -> Result<Self> {
        options.validate().context("building token index")?;
        if !ctx.collation.is_deterministic() {
            warn!(
                collation = ?ctx.collation,
                "token index keys are byte-exact; equality scans fall back to full rechecks"
            );
        }

        let adapter = InvertedIndexAdapter::new(options);
        let mut grouped: FxHashMap<Key, RoaringBitmap> = FxHashMap::default();
        for (row, value) in table.rows() {
            let Some(value) = value else { continue };
            for key in adapter.extract_value(value).keys {
                grouped.entry(key).or_default().insert(row);
            }
        }

        let mut postings: Vec<_> = grouped.into_iter().collect();
        postings.sort_by(|a, b| adapter.compare_keys(&a.0, &b.0));

        info!(
            keys = postings.len(),
            rows = table.len(),
            mode = ?adapter.value_mode(),
            "built token index"
        );
        Ok(Self {
            adapter,
            ctx,
            postings,
        })
    }

    /// Number of distinct stored keys
    pub fn key_count(&self) -> usize {
        self.postings.len()
    }

    /// Rows stored under exactly `key`
    pub fn posting(&self, key: &Key) -> Option<&RoaringBitmap> {
        self.find(key).ok().map(|i| &self.postings[i].1)
    }

    /// Index a newly appended row
    pub fn insert(&mut self, row: RowId, value: Option<&Key>) {
        let Some(value) = value else { return };
        for key in self.adapter.extract_value(value).keys {
            match self.find(&key) {
                Ok(i) => {
                    self.postings[i].1.insert(row);
                }
                Err(i) => {
                    let mut rows = RoaringBitmap::new();
                    rows.insert(row);
                    self.postings.insert(i, (key, rows));
                }
            }
        }
    }

    /// Rows satisfying every key
    pub fn scan(&self, table: &Table, keys: &[ScanKey], recheck: &Recheck) -> Result<ScanResult> {
        let mut stats = ScanStats::default();
        let mut combined: Option<KeyCandidates> = None;
        for key in keys {
            let found = self
                .candidates(table, key, &mut stats)
                .with_context(|| format!("scanning token index for {:?}", key))?;
            combined = Some(match combined {
                None => found,
                Some(mut acc) => {
                    acc.rows &= &found.rows;
                    acc.lossy |= found.lossy;
                    acc.lossy &= &acc.rows;
                    acc
                }
            });
        }
        let Some(candidates) = combined else {
            return Ok(ScanResult::default());
        };

        let mut rows = Vec::new();
        for row in &candidates.rows {
            stats.candidates += 1;
            if candidates.lossy.contains(row) {
                stats.rechecked += 1;
                if !matches_all(recheck, table.get(row), keys)? {
                    continue;
                }
            }
            rows.push(row);
        }
        stats.matches = rows.len();
        debug!(?stats, "token scan finished");
        Ok(ScanResult { rows, stats })
    }

    fn candidates(
        &self,
        table: &Table,
        key: &ScanKey,
        stats: &mut ScanStats,
    ) -> Result<KeyCandidates> {
        let query = self.adapter.extract_query(key)?;
        let byte_exact = self.ctx.collation.is_deterministic() || key.strategy != Strategy::Equal;

        if query.matches_everything() || !byte_exact {
            let mut all = RoaringBitmap::new();
            all.insert_range(0..table.len() as u32);
            return Ok(KeyCandidates {
                rows: all.clone(),
                lossy: all,
            });
        }

        let per_key: Vec<RoaringBitmap> = query
            .keys
            .iter()
            .zip(&query.partial_match)
            .map(|(k, &partial)| {
                if partial {
                    self.partial_lookup(k, stats)
                } else {
                    stats.entries_visited += 1;
                    self.posting(k).cloned().unwrap_or_default()
                }
            })
            .collect();

        let mut union = RoaringBitmap::new();
        for rows in &per_key {
            union |= rows;
        }

        let mut found = KeyCandidates::default();
        let mut flags = vec![false; per_key.len()];
        for row in &union {
            for (flag, rows) in flags.iter_mut().zip(&per_key) {
                *flag = rows.contains(row);
            }
            let decision = self.adapter.consistent(&flags, key.strategy, per_key.len())?;
            if decision.result {
                found.rows.insert(row);
                if decision.recheck {
                    found.lossy.insert(row);
                }
            }
        }
        Ok(found)
    }

    fn partial_lookup(&self, query: &Key, stats: &mut ScanStats) -> RoaringBitmap {
        let mut rows = RoaringBitmap::new();
        for (stored, posting) in &self.postings {
            stats.entries_visited += 1;
            if self.adapter.compare_partial(query, stored) == PartialMatch::Match {
                rows |= posting;
            }
        }
        rows
    }

    fn find(&self, key: &Key) -> std::result::Result<usize, usize> {
        self.postings
            .binary_search_by(|(stored, _)| self.adapter.compare_keys(stored, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::collation::Collation;
    use crate::index::options::ValueMode;

    fn products() -> Table {
        Table::from_values(
            [
                Some("ms sql server"),
                Some("postgresql"),
                None,
                Some("mysql"),
                Some("sqlite"),
                Some("oracle"),
            ],
            4,
        )
        .unwrap()
    }

    fn scan(index: &TokenIndex, table: &Table, key: ScanKey, options: &IndexOptions) -> ScanResult {
        let recheck = Recheck::new(&CallContext::default(), options);
        index.scan(table, &[key], &recheck).unwrap()
    }

    #[test]
    fn test_equality_is_exact() {
        let table = products();
        let options = IndexOptions::default();
        let index = TokenIndex::build(&table, options.clone(), CallContext::default()).unwrap();
        assert_eq!(index.key_count(), 5);

        let result = scan(&index, &table, ScanKey::new(Strategy::Equal, "mysql"), &options);
        assert_eq!(result.rows, [3]);
        assert_eq!(result.stats.rechecked, 0);
    }

    #[test]
    fn test_like_uses_partial_lookup() {
        let table = products();
        let options = IndexOptions::default();
        let index = TokenIndex::build(&table, options.clone(), CallContext::default()).unwrap();

        let result = scan(&index, &table, ScanKey::new(Strategy::Like, "%sql%"), &options);
        assert_eq!(result.rows, [0, 1, 3, 4]);

        let result = scan(&index, &table, ScanKey::new(Strategy::Like, "%sql%server%"), &options);
        assert_eq!(result.rows, [0]);
        assert_eq!(result.stats.candidates, 1);

        let result = scan(&index, &table, ScanKey::new(Strategy::Like, "sql%"), &options);
        assert_eq!(result.rows, [4]);
        assert!(result.stats.candidates > result.stats.matches);
    }

    #[test]
    fn test_regex_and_full_scan() {
        let table = products();
        let options = IndexOptions::default();
        let index = TokenIndex::build(&table, options.clone(), CallContext::default()).unwrap();

        let result = scan(&index, &table, ScanKey::new(Strategy::Regex, "^my.ql$"), &options);
        assert_eq!(result.rows, [3]);

        let result = scan(&index, &table, ScanKey::new(Strategy::Like, "%"), &options);
        assert_eq!(result.rows, [0, 1, 3, 4, 5]);
        assert_eq!(result.stats.candidates, 6);
    }

    #[test]
    fn test_contains_in_tokenize_mode() {
        let table = products();
        let options = IndexOptions {
            value_mode: ValueMode::Tokenize,
            ..IndexOptions::default()
        };
        let mut index = TokenIndex::build(&table, options.clone(), CallContext::default()).unwrap();

        let key = ScanKey::new(Strategy::Contains, "ms sql server");
        let result = scan(&index, &table, key, &options);
        assert_eq!(result.rows, [0]);

        let mut table = table;
        let row = table.push(Some("sql-server".into())).unwrap();
        index.insert(row, table.get(row));
        let result = scan(&index, &table, ScanKey::new(Strategy::Contains, "server"), &options);
        assert_eq!(result.rows, [row]);
    }

    #[test]
    fn test_nondeterministic_equality_falls_back() {
        let table = Table::from_values([Some("SQL"), Some("sql"), Some("pg")], 4).unwrap();
        let ctx = CallContext::new(Collation::CaseInsensitive);
        let options = IndexOptions::default();
        let index = TokenIndex::build(&table, options.clone(), ctx).unwrap();
        let recheck = Recheck::new(&ctx, &options);

        let result = index
            .scan(&table, &[ScanKey::new(Strategy::Equal, "sql")], &recheck)
            .unwrap();
        assert_eq!(result.rows, [0, 1]);
    }

    #[test]
    fn test_comparison_strategy_rejected() {
        let table = products();
        let options = IndexOptions::default();
        let index = TokenIndex::build(&table, options.clone(), CallContext::default()).unwrap();
        let recheck = Recheck::new(&CallContext::default(), &options);
        let key = ScanKey::new(Strategy::Less, "m");
        assert!(index.scan(&table, &[key], &recheck).is_err());
    }
}

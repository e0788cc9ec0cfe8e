//! Adapter for the balanced extensible tree index.
//!
//! Leaf entries hold real keys. Internal entries hold a representative key
//! produced by [`TreeIndexAdapter::union`], which is the minimum of the
//! subtree's keys rather than a two-sided bound. Descent therefore cannot
//! prune on internal keys: `consistent` answers true for every internal
//! entry and every answer is rechecked at the leaves.

use crate::error::{Error, Result};
use crate::index::options::IndexOptions;
use crate::index::types::{CallContext, Consistency, Key, ScanKey};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// One entry on a tree page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub key: Key,
    pub is_leaf: bool,
}

impl TreeEntry {
    pub fn leaf(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            is_leaf: true,
        }
    }

    pub fn internal(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            is_leaf: false,
        }
    }
}

/// Result of splitting an overflowing page
#[derive(Debug, Clone, PartialEq)]
pub struct PickSplit {
    /// Positions (into the input slice) that go to the left page
    pub left: Vec<usize>,
    pub right: Vec<usize>,
    /// Key of the first left member
    pub left_key: Option<Key>,
    /// Key of the first right member
    pub right_key: Option<Key>,
}

#[derive(Debug, Clone, Default)]
pub struct TreeIndexAdapter {
    options: IndexOptions,
}

impl TreeIndexAdapter {
    const NAME: &'static str = "tree";

    pub fn new(options: IndexOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Leaf keys are copied out of whatever buffer the host handed us
    pub fn compress(&self, entry: &TreeEntry) -> TreeEntry {
        if entry.is_leaf {
            TreeEntry {
                key: entry.key.materialize(),
                is_leaf: true,
            }
        } else {
            entry.clone()
        }
    }

    pub fn decompress(&self, entry: TreeEntry) -> TreeEntry {
        entry
    }

    /// Representative key for a set of entries: the smallest key.
    ///
    /// This biases coverage toward the low end and is not a bound on the
    /// subtree; see the module docs. Returns None for an empty set.
    pub fn union(&self, entries: &[TreeEntry], ctx: &CallContext) -> Option<Key> {
        entries
            .iter()
            .map(|e| &e.key)
            .min_by(|a, b| ctx.compare(a, b))
            .cloned()
    }

    /// Cost of inserting `inserted` under `original`: the difference in
    /// key length, scaled
    pub fn penalty(&self, original: &TreeEntry, inserted: &TreeEntry) -> f32 {
        let diff = original.key.len().abs_diff(inserted.key.len());
        diff as f32 * self.options.penalty_scale
    }

    /// Split entries by their leading byte around the configured pivot.
    ///
    /// Entries whose key starts below the pivot (or is empty) go left. If
    /// that leaves a side empty the split re-pivots at the largest leading
    /// byte present; if every key shares its leading byte the entries are
    /// halved by position.
    pub fn picksplit(&self, entries: &[TreeEntry]) -> PickSplit {
        let n = entries.len();
        let (mut left, mut right): (Vec<usize>, Vec<usize>) = if n < 2 {
            ((0..n).collect(), Vec::new())
        } else {
            let pivot = self.options.pivot;
            (0..n).partition(|&i| entries[i].key.first_byte().is_none_or(|b| b < pivot))
        };

        if n >= 2 && (left.is_empty() || right.is_empty()) {
            let top = entries.iter().map(|e| e.key.first_byte()).max().flatten();
            let all_same = entries
                .iter()
                .all(|e| e.key.first_byte() == entries[0].key.first_byte());

            if all_same {
                debug!(entries = n, "picksplit: shared leading byte, halving");
                left = (0..n / 2).collect();
                right = (n / 2..n).collect();
            } else {
                debug!(
                    entries = n,
                    pivot = top,
                    "picksplit: pivot left a side empty, re-pivoting"
                );
                (left, right) = (0..n).partition(|&i| entries[i].key.first_byte() < top);
            }
        }

        let key_of = |side: &[usize]| side.first().map(|&i| entries[i].key.clone());
        PickSplit {
            left_key: key_of(&left),
            right_key: key_of(&right),
            left,
            right,
        }
    }

    pub fn same(&self, a: &TreeEntry, b: &TreeEntry, ctx: &CallContext) -> bool {
        ctx.compare(&a.key, &b.key) == Ordering::Equal
    }

    /// Leaf entries are tested directly; internal entries always descend.
    /// Every answer needs a recheck.
    ///
    /// The operator is the one threaded through `ctx` when the host set it,
    /// otherwise the scan key's own.
    pub fn consistent(
        &self,
        entry: &TreeEntry,
        query: &ScanKey,
        ctx: &CallContext,
    ) -> Result<Consistency> {
        let strategy = ctx.strategy.unwrap_or(query.strategy);
        if !strategy.is_comparison() {
            return Err(Error::unsupported(Self::NAME, strategy));
        }

        let result = if entry.is_leaf {
            let ord = ctx.compare(&entry.key, &query.argument);
            strategy
                .holds(ord)
                .ok_or_else(|| Error::unsupported(Self::NAME, strategy))?
        } else {
            true
        };
        Ok(Consistency {
            result,
            recheck: true,
        })
    }

    /// Original leaf key for index-only scans
    pub fn fetch(&self, entry: &TreeEntry) -> TreeEntry {
        entry.clone()
    }
}

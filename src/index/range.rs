//! Per-block min/max summaries for the range-summary index.
//!
//! A block's summary bounds every non-null value ever added to it. Queries
//! consult only the bounds, so answers over-approximate and the host
//! rechecks rows of every block we report as a candidate.

use crate::error::{Error, Result};
use crate::index::types::{CallContext, Key, ScanKey, Strategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, trace};

/// Lowest and highest value seen in a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Key,
    pub max: Key,
}

/// Lifecycle of a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryState {
    /// Nothing but (possibly) nulls added
    Uninitialized,
    HasValues,
    /// Summarized for the last time; no further additions
    Closed,
}

/// Summary attached to one storage block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeSummary {
    bounds: Option<Bounds>,
    has_nulls: bool,
    #[serde(default)]
    closed: bool,
}

impl RangeSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    pub fn min(&self) -> Option<&Key> {
        self.bounds.as_ref().map(|b| &b.min)
    }

    pub fn max(&self) -> Option<&Key> {
        self.bounds.as_ref().map(|b| &b.max)
    }

    pub fn has_nulls(&self) -> bool {
        self.has_nulls
    }

    /// Only nulls have been added so far
    pub fn all_nulls(&self) -> bool {
        self.has_nulls && self.bounds.is_none()
    }

    pub fn state(&self) -> SummaryState {
        if self.closed {
            SummaryState::Closed
        } else if self.bounds.is_some() {
            SummaryState::HasValues
        } else {
            SummaryState::Uninitialized
        }
    }

    /// Mark the block as summarized for the last time
    pub fn close(&mut self) {
        self.closed = true;
    }
}

/// Static description of what a summary stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcInfo {
    /// Keys stored per summary (min and max)
    pub stored_keys: usize,
}

/// Min/max adapter for the range-summary index
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeSummaryAdapter;

impl RangeSummaryAdapter {
    const NAME: &'static str = "range summary";

    pub fn new() -> Self {
        Self
    }

    pub fn opcinfo(&self) -> OpcInfo {
        OpcInfo { stored_keys: 2 }
    }

    /// Fold one value (`None` for SQL NULL) into the summary.
    /// Returns true iff the summary changed.
    pub fn add_value(
        &self,
        summary: &mut RangeSummary,
        value: Option<&Key>,
        ctx: &CallContext,
    ) -> Result<bool> {
        if summary.closed {
            return Err(Error::SummaryClosed);
        }

        let Some(value) = value else {
            let changed = !summary.has_nulls;
            summary.has_nulls = true;
            return Ok(changed);
        };

        let Some(bounds) = summary.bounds.as_mut() else {
            debug!(value = %value, "initializing range summary");
            summary.bounds = Some(Bounds {
                min: value.materialize(),
                max: value.materialize(),
            });
            // The first value resets the null flag
            summary.has_nulls = false;
            return Ok(true);
        };

        let mut changed = false;
        if ctx.compare(value, &bounds.min) == Ordering::Less {
            trace!(old = %bounds.min, new = %value, "lowering min");
            bounds.min = value.materialize();
            changed = true;
        }
        if ctx.compare(value, &bounds.max) == Ordering::Greater {
            trace!(old = %bounds.max, new = %value, "raising max");
            bounds.max = value.materialize();
            changed = true;
        }
        Ok(changed)
    }

    /// Build a summary from a block's values
    pub fn summarize<'a, I>(&self, values: I, ctx: &CallContext) -> Result<RangeSummary>
    where
        I: IntoIterator<Item = Option<&'a Key>>,
    {
        let mut summary = RangeSummary::new();
        for value in values {
            self.add_value(&mut summary, value, ctx)?;
        }
        Ok(summary)
    }

    /// Could the block hold a row satisfying `key`?
    ///
    /// False only when no summarized value can satisfy the predicate; a
    /// summary without bounds has nothing comparable and answers false.
    pub fn consistent(
        &self,
        summary: &RangeSummary,
        key: &ScanKey,
        ctx: &CallContext,
    ) -> Result<bool> {
        if !key.strategy.is_comparison() {
            return Err(Error::unsupported(Self::NAME, key.strategy));
        }
        let Some(Bounds { min, max }) = summary.bounds.as_ref() else {
            return Ok(false);
        };

        let query = &key.argument;
        let result = match key.strategy {
            Strategy::Less => ctx.compare(min, query) == Ordering::Less,
            Strategy::LessEqual => ctx.compare(min, query) != Ordering::Greater,
            Strategy::Equal => {
                ctx.compare(min, query) != Ordering::Greater
                    && ctx.compare(max, query) != Ordering::Less
            }
            Strategy::GreaterEqual => ctx.compare(max, query) != Ordering::Less,
            Strategy::Greater => ctx.compare(max, query) == Ordering::Greater,
            other => return Err(Error::unsupported(Self::NAME, other)),
        };
        Ok(result)
    }

    /// Merge `other` into `target` so the result bounds both value sets.
    /// Returns true iff `target` changed.
    pub fn union(
        &self,
        target: &mut RangeSummary,
        other: &RangeSummary,
        ctx: &CallContext,
    ) -> Result<bool> {
        if target.closed {
            return Err(Error::SummaryClosed);
        }

        let mut changed = false;
        if other.has_nulls && !target.has_nulls {
            target.has_nulls = true;
            changed = true;
        }

        match (target.bounds.as_mut(), other.bounds.as_ref()) {
            (_, None) => {}
            (None, Some(theirs)) => {
                target.bounds = Some(theirs.clone());
                changed = true;
            }
            (Some(ours), Some(theirs)) => {
                if ctx.compare(&theirs.min, &ours.min) == Ordering::Less {
                    ours.min = theirs.min.clone();
                    changed = true;
                }
                if ctx.compare(&theirs.max, &ours.max) == Ordering::Greater {
                    ours.max = theirs.max.clone();
                    changed = true;
                }
            }
        }
        Ok(changed)
    }

    /// Cost of widening `original` to also cover `candidate`.
    ///
    /// 1.0 when the ranges coincide, one side contains the other, or either
    /// has no bounds; each bound that must move adds 1.0 plus how far the
    /// keys diverge (0..1].
    pub fn penalty(
        &self,
        original: &RangeSummary,
        candidate: &RangeSummary,
        ctx: &CallContext,
    ) -> f32 {
        let (Some(ours), Some(theirs)) = (original.bounds(), candidate.bounds()) else {
            return 1.0;
        };

        let mut penalty = 1.0;
        if ctx.compare(&theirs.min, &ours.min) == Ordering::Less {
            penalty += 1.0 + divergence(&theirs.min, &ours.min);
        }
        if ctx.compare(&theirs.max, &ours.max) == Ordering::Greater {
            penalty += 1.0 + divergence(&theirs.max, &ours.max);
        }
        penalty
    }
}

/// Share of the longer key that lies past the common prefix
fn divergence(a: &Key, b: &Key) -> f32 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }
    let common = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .take_while(|(x, y)| x == y)
        .count();
    (longest - common) as f32 / longest as f32
}

//! Block range index built on [`RangeSummaryAdapter`].

use crate::index::range::{RangeSummary, RangeSummaryAdapter};
use crate::index::types::{BlockId, CallContext, Key, RowId, ScanKey};
use crate::query::recheck::Recheck;
use crate::query::stats::{ScanResult, ScanStats};
use crate::query::table::Table;
use anyhow::{Context, Result};
use rayon::prelude::*;
use roaring::RoaringBitmap;
use tracing::{debug, info};

/// One summary per table block
#[derive(Debug, Clone)]
pub struct RangeIndex {
    adapter: RangeSummaryAdapter,
    ctx: CallContext,
    summaries: Vec<RangeSummary>,
}

impl RangeIndex {
    /// Summarize every block of `table` in parallel
    pub fn build(table: &Table, ctx: CallContext) -> Result<Self> {
        let adapter = RangeSummaryAdapter::new();
        let summaries = (0..table.block_count())
            .into_par_iter()
            .map(|block| {
                let values = table.block_rows(block).map(|row| table.get(row));
                adapter
                    .summarize(values, &ctx)
                    .with_context(|| format!("summarizing block {}", block))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            blocks = summaries.len(),
            rows = table.len(),
            collation = ?ctx.collation,
            "built range index"
        );
        Ok(Self {
            adapter,
            ctx,
            summaries,
        })
    }

    pub fn summaries(&self) -> &[RangeSummary] {
        &self.summaries
    }

    /// Fold a newly appended row into its block's summary.
    /// Returns true iff the summary changed.
    pub fn insert(&mut self, table: &Table, row: RowId) -> Result<bool> {
        let block = table.block_of(row) as usize;
        if block >= self.summaries.len() {
            self.summaries.resize_with(block + 1, RangeSummary::new);
        }
        self.adapter
            .add_value(&mut self.summaries[block], table.get(row), &self.ctx)
            .with_context(|| format!("adding row {} to block {}", row, block))
    }

    /// Blocks that may hold rows satisfying every key.
    ///
    /// Blocks the table has but the index has not summarized yet are
    /// always candidates.
    pub fn candidate_blocks(&self, table: &Table, keys: &[ScanKey]) -> Result<RoaringBitmap> {
        let mut blocks = RoaringBitmap::new();
        blocks.insert_range(0..table.block_count());

        for key in keys {
            let mut matching = RoaringBitmap::new();
            for (block, summary) in self.summaries.iter().enumerate() {
                let keep = self
                    .adapter
                    .consistent(summary, key, &self.ctx)
                    .with_context(|| format!("checking block {} against {:?}", block, key))?;
                if keep {
                    matching.insert(block as BlockId);
                }
            }
            let summarized = self.summaries.len() as u32;
            matching.insert_range(summarized..table.block_count().max(summarized));
            blocks &= matching;
        }
        Ok(blocks)
    }

    /// Rows satisfying every key. Each row of a candidate block is rechecked.
    pub fn scan(&self, table: &Table, keys: &[ScanKey], recheck: &Recheck) -> Result<ScanResult> {
        let blocks = self.candidate_blocks(table, keys)?;
        let mut stats = ScanStats {
            entries_visited: self.summaries.len(),
            ..ScanStats::default()
        };

        let mut rows = Vec::new();
        for block in &blocks {
            for row in table.block_rows(block) {
                stats.candidates += 1;
                stats.rechecked += 1;
                let value = table.get(row);
                if matches_all(recheck, value, keys)? {
                    rows.push(row);
                }
            }
        }
        stats.matches = rows.len();
        debug!(blocks = blocks.len(), ?stats, "range scan finished");
        Ok(ScanResult { rows, stats })
    }

    /// Summary covering all of `blocks`
    pub fn merge_blocks(&self, blocks: &[BlockId]) -> Result<RangeSummary> {
        let mut merged = RangeSummary::new();
        for &block in blocks {
            let summary = self
                .summaries
                .get(block as usize)
                .with_context(|| format!("block {} is not summarized", block))?;
            self.adapter.union(&mut merged, summary, &self.ctx)?;
        }
        Ok(merged)
    }
}

/// Conjunction of exact checks for one row
pub(crate) fn matches_all(
    recheck: &Recheck,
    value: Option<&Key>,
    keys: &[ScanKey],
) -> Result<bool> {
    for key in keys {
        if !recheck.matches(value, key)? {
            return Ok(false);
        }
    }
    Ok(true)
}

use crate::index::types::{BlockId, Key, RowId};
use anyhow::{Result, bail};
use std::ops::Range;

/// Default number of rows summarized per block
pub const DEFAULT_ROWS_PER_BLOCK: u32 = 128;

/// An append-only, single-column heap of nullable text values.
///
/// Rows are grouped into fixed-size blocks for the range-summary index.
#[derive(Debug, Clone)]
pub struct Table {
    rows: Vec<Option<Key>>,
    rows_per_block: u32,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            rows_per_block: DEFAULT_ROWS_PER_BLOCK,
        }
    }
}

impl Table {
    pub fn new(rows_per_block: u32) -> Result<Self> {
        if rows_per_block == 0 {
            bail!("rows_per_block must be at least 1");
        }
        Ok(Self {
            rows: Vec::new(),
            rows_per_block,
        })
    }

    /// Build a table from values in row order
    pub fn from_values<I, V>(values: I, rows_per_block: u32) -> Result<Self>
    where
        I: IntoIterator<Item = Option<V>>,
        V: Into<Key>,
    {
        let mut table = Self::new(rows_per_block)?;
        for value in values {
            table.push(value.map(Into::into))?;
        }
        Ok(table)
    }

    /// Append a row and return its id
    pub fn push(&mut self, value: Option<Key>) -> Result<RowId> {
        let Ok(row) = RowId::try_from(self.rows.len()) else {
            bail!("table is full ({} rows)", self.rows.len());
        };
        self.rows.push(value);
        Ok(row)
    }

    /// Value of a row; `None` for NULL or a missing row
    pub fn get(&self, row: RowId) -> Option<&Key> {
        self.rows.get(row as usize).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows_per_block(&self) -> u32 {
        self.rows_per_block
    }

    pub fn block_of(&self, row: RowId) -> BlockId {
        row / self.rows_per_block
    }

    /// Number of blocks, counting a trailing partial block
    pub fn block_count(&self) -> u32 {
        (self.rows.len() as u32).div_ceil(self.rows_per_block)
    }

    /// Row ids stored in `block`
    pub fn block_rows(&self, block: BlockId) -> Range<RowId> {
        let len = self.rows.len() as u32;
        let start = block.saturating_mul(self.rows_per_block).min(len);
        let end = start.saturating_add(self.rows_per_block).min(len);
        start..end
    }

    /// Iterate `(row, value)` pairs in row order
    pub fn rows(&self) -> impl Iterator<Item = (RowId, Option<&Key>)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, v)| (i as RowId, v.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks() {
        let table = Table::from_values(
            ["a", "b", "c", "d", "e"].map(Some),
            2,
        )
        .unwrap();

        assert_eq!(table.len(), 5);
        assert_eq!(table.block_count(), 3);
        assert_eq!(table.block_of(3), 1);
        assert_eq!(table.block_rows(0), 0..2);
        assert_eq!(table.block_rows(2), 4..5);
        assert!(table.block_rows(7).is_empty());
    }

    #[test]
    fn test_nulls_and_missing_rows() {
        let table = Table::from_values([Some("x"), None::<&str>], 4).unwrap();
        assert_eq!(table.get(0).map(Key::as_str), Some("x"));
        assert!(table.get(1).is_none());
        assert!(table.get(9).is_none());
        assert_eq!(table.rows().filter(|(_, v)| v.is_none()).count(), 1);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        assert!(Table::new(0).is_err());
    }
}

use crate::index::types::RowId;
use serde::Serialize;

/// Counters collected while scanning through an index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Index entries (blocks, postings, tree pages) visited
    pub entries_visited: usize,
    /// Rows the index could not exclude
    pub candidates: usize,
    /// Candidates that went through exact evaluation
    pub rechecked: usize,
    /// Rows returned
    pub matches: usize,
}

impl ScanStats {
    /// Fraction of candidates that turned out to match (1.0 with no candidates)
    pub fn precision(&self) -> f64 {
        if self.candidates == 0 {
            1.0
        } else {
            self.matches as f64 / self.candidates as f64
        }
    }
}

/// Rows matching a scan, in ascending row order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    pub rows: Vec<RowId>,
    pub stats: ScanStats,
}

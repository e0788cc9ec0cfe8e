//! Reference host for the adapters.
//!
//! A single-column in-memory table plus one index per adapter family. Each
//! index narrows a scan through its adapter's callbacks and then rechecks
//! the lossy candidates exactly, the way a database engine would.

pub mod range_scan;
pub mod recheck;
pub mod stats;
pub mod table;
pub mod token_scan;
pub mod tree_scan;

pub use range_scan::RangeIndex;
pub use recheck::{Recheck, like_to_regex};
pub use stats::{ScanResult, ScanStats};
pub use table::Table;
pub use token_scan::TokenIndex;
pub use tree_scan::TreeIndex;

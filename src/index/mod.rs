pub mod collation;
pub mod inverted;
pub mod options;
pub mod range;
pub mod tree;
pub mod types;

pub use collation::Collation;
pub use inverted::InvertedIndexAdapter;
pub use options::{IndexOptions, ValueMode};
pub use range::{RangeSummary, RangeSummaryAdapter};
pub use tree::{TreeEntry, TreeIndexAdapter};
pub use types::*;

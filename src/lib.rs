//! # lexkey - Collation-aware text key adapters for extensible indexes
//!
//! lexkey supplies the operator-class logic a database engine needs to index
//! a locale-ordered text type with three index families: block range
//! summaries, inverted (token) indexes, and balanced search trees. The
//! engine owns pages, WAL and scans; lexkey only answers its callbacks.
//!
//! ## Architecture
//!
//! - [`index`] - The key type, collations, and the three adapters
//! - [`query`] - A small in-memory reference host that drives the adapters
//!   end to end and rechecks candidates
//! - [`utils`] - Varint encoding and pattern tokenization
//! - [`error`] - Errors returned from adapter calls
//!
//! ## Quick Start
//!
//! ```
//! use lexkey::index::{CallContext, Key, RangeSummaryAdapter, ScanKey, Strategy};
//!
//! let ctx = CallContext::for_locale(None);
//! let adapter = RangeSummaryAdapter::new();
//!
//! let block = [Key::new("apple"), Key::new("mango"), Key::new("zebra")];
//! let summary = adapter.summarize(block.iter().map(Some), &ctx).unwrap();
//!
//! let probe = ScanKey::new(Strategy::Equal, "banana");
//! assert!(adapter.consistent(&summary, &probe, &ctx).unwrap());
//! ```
//!
//! ## Correctness
//!
//! No adapter may exclude a row that satisfies the predicate. Lossy answers
//! carry a recheck flag and the host re-evaluates those rows exactly.

pub mod error;
pub mod index;
pub mod query;
pub mod utils;

pub use error::{Error, Result};
pub use index::{
    CallContext, Collation, IndexOptions, InvertedIndexAdapter, Key, RangeSummaryAdapter,
    ScanKey, Strategy, TreeIndexAdapter,
};

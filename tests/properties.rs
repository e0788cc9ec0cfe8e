//! Property tests: ordering laws and the no-false-negative guarantee of every
//! index family, checked against exhaustive evaluation.

#[path = "fixtures/utils.rs"]
mod utils;

use lexkey::index::range::RangeSummaryAdapter;
use lexkey::index::{
    CallContext, Collation, IndexOptions, Key, RangeSummary, ScanKey, Strategy as Op, TreeEntry,
    TreeIndexAdapter, ValueMode,
};
use lexkey::query::{RangeIndex, Recheck, Table, TokenIndex, TreeIndex};
use proptest::prelude::*;
use std::cmp::Ordering;
use utils::brute_force;

const COLLATIONS: [Collation; 3] = [
    Collation::Binary,
    Collation::Linguistic,
    Collation::CaseInsensitive,
];

fn word() -> impl Strategy<Value = String> {
    "[a-dA-DéÉ ]{0,6}"
}

fn collation() -> impl Strategy<Value = Collation> {
    prop::sample::select(COLLATIONS.to_vec())
}

fn comparison() -> impl Strategy<Value = Op> {
    prop::sample::select(vec![
        Op::Less,
        Op::LessEqual,
        Op::Equal,
        Op::GreaterEqual,
        Op::Greater,
    ])
}

/// Random expressions over literals, anchors, alternation, stacked
/// quantifiers, classes and groups
fn expression() -> impl Strategy<Value = String> {
    let piece = prop::sample::select(vec![
        "a", "b", "c", " ", "-", "ab", "bc", "ca", "|", ".", "^", "$", "+", "*", "?", "+*",
        "{0,1}", "{2}", "{,2}", "+?", "[ab]", "[^c]", "(", ")", "(?:", r"\d", r"\b",
    ]);
    prop::collection::vec(piece, 1..10).prop_map(|pieces| pieces.concat())
}

fn column() -> impl Strategy<Value = Vec<Option<String>>> {
    prop::collection::vec(prop::option::weighted(0.9, word()), 0..60)
}

proptest! {
    #[test]
    fn compare_is_a_total_preorder(a in word(), b in word(), c in word(), coll in collation()) {
        let (a, b, c) = (Key::from(a), Key::from(b), Key::from(c));
        prop_assert_eq!(coll.compare(&a, &a), Ordering::Equal);
        prop_assert_eq!(coll.compare(&a, &b), coll.compare(&b, &a).reverse());
        if coll.compare(&a, &b) == Ordering::Less && coll.compare(&b, &c) == Ordering::Less {
            prop_assert_eq!(coll.compare(&a, &c), Ordering::Less);
        }
    }

    #[test]
    fn equal_keys_hash_equally(a in word(), b in word(), coll in collation()) {
        let (a, b) = (Key::from(a), Key::from(b));
        if coll.compare(&a, &b) == Ordering::Equal {
            prop_assert_eq!(coll.hash(&a), coll.hash(&b));
        }
    }

    #[test]
    fn summary_tracks_true_min_and_max(
        values in prop::collection::vec(word(), 1..40),
        coll in collation(),
    ) {
        let ctx = CallContext::new(coll);
        let keys: Vec<Key> = values.into_iter().map(Key::from).collect();
        let summary = RangeSummaryAdapter::new()
            .summarize(keys.iter().map(Some), &ctx)
            .unwrap();

        let min = keys.iter().min_by(|a, b| ctx.compare(a, b)).unwrap();
        let max = keys.iter().max_by(|a, b| ctx.compare(a, b)).unwrap();
        prop_assert_eq!(ctx.compare(summary.min().unwrap(), min), Ordering::Equal);
        prop_assert_eq!(ctx.compare(summary.max().unwrap(), max), Ordering::Equal);
        prop_assert!(!summary.has_nulls());
    }

    #[test]
    fn union_contains_both_ranges(
        left in column(),
        right in column(),
        coll in collation(),
    ) {
        let ctx = CallContext::new(coll);
        let adapter = RangeSummaryAdapter::new();
        let summarize = |values: &[Option<String>]| -> RangeSummary {
            let keys: Vec<Option<Key>> =
                values.iter().map(|v| v.as_deref().map(Key::new)).collect();
            adapter.summarize(keys.iter().map(Option::as_ref), &ctx).unwrap()
        };
        let (a, b) = (summarize(&left), summarize(&right));

        let mut merged = a.clone();
        adapter.union(&mut merged, &b, &ctx).unwrap();
        prop_assert_eq!(merged.has_nulls(), a.has_nulls() || b.has_nulls());
        for part in [&a, &b] {
            if let (Some(min), Some(max)) = (part.min(), part.max()) {
                prop_assert_ne!(ctx.compare(merged.min().unwrap(), min), Ordering::Greater);
                prop_assert_ne!(ctx.compare(merged.max().unwrap(), max), Ordering::Less);
            }
        }
    }

    #[test]
    fn range_index_has_no_false_negatives(
        values in column(),
        probe in word(),
        strategy in comparison(),
        coll in collation(),
        rows_per_block in 1u32..8,
    ) {
        let ctx = CallContext::new(coll);
        let table = Table::from_values(values, rows_per_block).unwrap();
        let index = RangeIndex::build(&table, ctx).unwrap();
        let recheck = Recheck::new(&ctx, &IndexOptions::default());
        let keys = [ScanKey::new(strategy, probe)];

        let result = index.scan(&table, &keys, &recheck).unwrap();
        prop_assert_eq!(result.rows, brute_force(&table, &keys, &recheck));
    }

    #[test]
    fn token_index_has_no_false_negatives(
        values in prop::collection::vec(prop::option::weighted(0.9, "[a-c -]{0,8}"), 0..40),
        pattern in "[a-c%_ ]{0,6}",
        strategy in prop::sample::select(vec![Op::Like, Op::Equal, Op::Contains]),
        tokenize in any::<bool>(),
    ) {
        let ctx = CallContext::default();
        let options = IndexOptions {
            value_mode: if tokenize { ValueMode::Tokenize } else { ValueMode::Whole },
            ..IndexOptions::default()
        };
        let table = Table::from_values(values, 8).unwrap();
        let index = TokenIndex::build(&table, options.clone(), ctx).unwrap();
        let recheck = Recheck::new(&ctx, &options);
        let keys = [ScanKey::new(strategy, pattern)];

        let result = index.scan(&table, &keys, &recheck).unwrap();
        prop_assert_eq!(result.rows, brute_force(&table, &keys, &recheck));
    }

    #[test]
    fn token_index_regex_has_no_false_negatives(
        values in prop::collection::vec(prop::option::of("[a-c -]{0,8}"), 0..40),
        expression in expression(),
    ) {
        // Only expressions a host would accept reach the index
        if regex::Regex::new(&expression).is_err() {
            return Ok(());
        }
        let ctx = CallContext::default();
        let options = IndexOptions::default();
        let table = Table::from_values(values, 8).unwrap();
        let index = TokenIndex::build(&table, options.clone(), ctx).unwrap();
        let recheck = Recheck::new(&ctx, &options);
        let keys = [ScanKey::new(Op::Regex, expression)];

        let result = index.scan(&table, &keys, &recheck).unwrap();
        prop_assert_eq!(result.rows, brute_force(&table, &keys, &recheck));
    }

    #[test]
    fn tree_index_has_no_false_negatives(
        values in column(),
        low in word(),
        high in word(),
        capacity in 2usize..6,
        coll in collation(),
    ) {
        let ctx = CallContext::new(coll);
        let options = IndexOptions::default();
        let table = Table::from_values(values, 8).unwrap();
        let index = TreeIndex::build(&table, options.clone(), ctx, capacity).unwrap();
        let recheck = Recheck::new(&ctx, &options);
        let keys = [
            ScanKey::new(Op::GreaterEqual, low),
            ScanKey::new(Op::LessEqual, high),
        ];

        let result = index.scan(&table, &keys, &recheck).unwrap();
        prop_assert_eq!(result.rows, brute_force(&table, &keys, &recheck));
    }

    #[test]
    fn picksplit_partitions_every_entry(
        values in prop::collection::vec(word(), 2..30),
        pivot in any::<u8>(),
    ) {
        let adapter = TreeIndexAdapter::new(IndexOptions { pivot, ..IndexOptions::default() });
        let entries: Vec<TreeEntry> = values.iter().map(|v| TreeEntry::leaf(v.as_str())).collect();
        let split = adapter.picksplit(&entries);

        let mut seen: Vec<usize> = split.left.iter().chain(&split.right).copied().collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..entries.len()).collect::<Vec<_>>());
        prop_assert!(!split.left.is_empty());
        prop_assert!(!split.right.is_empty());
    }
}

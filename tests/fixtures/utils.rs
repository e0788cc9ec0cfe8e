// Shared helpers for integration tests
#![allow(dead_code)]

use lexkey::index::Key;
use lexkey::query::Table;
use std::sync::Once;

static TRACING: Once = Once::new();

/// Route adapter logs to the test harness; honors RUST_LOG
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn keys(values: &[&str]) -> Vec<Key> {
    values.iter().map(|v| Key::new(v)).collect()
}

/// Deterministic mix of words, mixed case, punctuation and NULLs
pub fn sample_values(count: usize) -> Vec<Option<String>> {
    const WORDS: [&str; 12] = [
        "apple", "Mango", "zebra", "sql server", "postgresql", "my-sql", "Éclair", "kiwi",
        "SQLite", "", "banana split", "ápple",
    ];
    (0..count)
        .map(|i| {
            if i % 13 == 7 {
                None
            } else {
                Some(format!("{}{}", WORDS[i % WORDS.len()], i % 7))
            }
        })
        .collect()
}

pub fn sample_table(count: usize, rows_per_block: u32) -> Table {
    Table::from_values(sample_values(count), rows_per_block).unwrap()
}

/// Rows matching every key, by exhaustive evaluation
pub fn brute_force(
    table: &Table,
    keys: &[lexkey::index::ScanKey],
    recheck: &lexkey::query::Recheck,
) -> Vec<u32> {
    table
        .rows()
        .filter(|(_, value)| keys.iter().all(|k| recheck.matches(*value, k).unwrap()))
        .map(|(row, _)| row)
        .collect()
}

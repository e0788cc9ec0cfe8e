//! Shared helpers for the adapters.
//!
//! ## Modules
//!
//! - [`encoding`] - Varint and length-prefixed encoding for canonical keys
//! - [`tokenizer`] - Literal runs of LIKE patterns and regular expressions,
//!   and the tokens stored for a value
//!
//! ## Key Functions
//!
//! ```
//! use lexkey::utils::{like_tokens, regex_tokens};
//!
//! let tokens = like_tokens("%sql%server%");
//! assert_eq!(tokens.len(), 2); // "sql", "server"
//!
//! let tokens = regex_tokens("^colou?r");
//! assert_eq!(tokens[0].as_str(), "colo");
//! ```

pub mod encoding;
pub mod tokenizer;

pub use encoding::*;
pub use tokenizer::*;

use crate::error::{Error, Result};
use crate::index::collation::Collation;
use serde::{Deserialize, Serialize};

/// How the inverted adapter turns a stored value into index keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueMode {
    /// The whole value is the only key (equality and contains)
    #[default]
    Whole,
    /// Sub-tokens of the value plus the value itself (pattern queries)
    Tokenize,
}

/// Options attached to an index at creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Collation used when the host supplies none
    #[serde(default = "default_locale")]
    pub default_locale: String,

    #[serde(default)]
    pub value_mode: ValueMode,

    /// Leading byte that separates the two halves of a tree split
    #[serde(default = "default_pivot")]
    pub pivot: u8,

    /// Tree penalty per byte of length difference
    #[serde(default = "default_penalty_scale")]
    pub penalty_scale: f32,

    /// Shortest literal run kept as a token
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,
}

fn default_locale() -> String {
    "und".to_string()
}

fn default_pivot() -> u8 {
    b'm'
}

fn default_penalty_scale() -> f32 {
    0.1
}

fn default_min_token_len() -> usize {
    2
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            value_mode: ValueMode::default(),
            pivot: default_pivot(),
            penalty_scale: default_penalty_scale(),
            min_token_len: default_min_token_len(),
        }
    }
}

impl IndexOptions {
    /// Parse the options text the host stored with the index.
    /// No options means defaults.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let options = match raw.map(str::trim) {
            None | Some("") => Self::default(),
            Some(text) => serde_json::from_str(text)
                .map_err(|e| Error::InvalidOptions(e.to_string()))?,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_token_len == 0 {
            return Err(Error::InvalidOptions(
                "min_token_len must be at least 1".to_string(),
            ));
        }
        if !self.penalty_scale.is_finite() || self.penalty_scale < 0.0 {
            return Err(Error::InvalidOptions(format!(
                "penalty_scale must be finite and non-negative, got {}",
                self.penalty_scale
            )));
        }
        Ok(())
    }

    /// Collation to use for a call, given what the host passed
    pub fn collation(&self, supplied: Option<&str>) -> Collation {
        Collation::resolve(supplied.or(Some(self.default_locale.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = IndexOptions::parse(None).unwrap();
        assert_eq!(options, IndexOptions::default());
        assert_eq!(options.pivot, b'm');
        assert_eq!(options.min_token_len, 2);
        assert_eq!(options.collation(None), Collation::Linguistic);
    }

    #[test]
    fn test_partial_json() {
        let options =
            IndexOptions::parse(Some(r#"{"value_mode": "tokenize", "default_locale": "C"}"#))
                .unwrap();
        assert_eq!(options.value_mode, ValueMode::Tokenize);
        assert_eq!(options.collation(None), Collation::Binary);
        assert_eq!(options.collation(Some("nocase")), Collation::CaseInsensitive);
        assert_eq!(options.penalty_scale, 0.1);
    }

    #[test]
    fn test_rejects_bad_options() {
        assert!(matches!(
            IndexOptions::parse(Some(r#"{"min_token_len": 0}"#)),
            Err(Error::InvalidOptions(_))
        ));
        assert!(matches!(
            IndexOptions::parse(Some(r#"{"penalty_scale": -1.0}"#)),
            Err(Error::InvalidOptions(_))
        ));
        assert!(IndexOptions::parse(Some("not json")).is_err());
    }
}

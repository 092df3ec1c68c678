use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Lesion key parsed out of an image file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token layout of an image file name, e.g. `PAT_<patient>_<lesion>_<image>.png`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilenameLayout {
    pub delimiter: char,
    /// Zero-based token position holding the lesion key.
    pub identifier_index: usize,
}

impl Default for FilenameLayout {
    fn default() -> Self {
        Self {
            delimiter: '_',
            identifier_index: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("file name is not valid UTF-8")]
    NonUtf8,
    #[error("expected at least {expected} '{delimiter}'-separated tokens, found {found}")]
    TooFewTokens {
        expected: usize,
        found: usize,
        delimiter: char,
    },
    #[error("token '{0}' is not an integer key")]
    NotAnInteger(String),
}

/// Parse the lesion key from a file name.
///
/// The whole name is tokenized, extension included, so a key in the last
/// position would carry the extension and fail to parse. Placement and audit
/// both go through this function.
pub fn parse_identifier(file_name: &str, layout: &FilenameLayout) -> Result<ItemId, ParseError> {
    let tokens: Vec<&str> = file_name.split(layout.delimiter).collect();
    let expected = layout.identifier_index + 1;
    if tokens.len() < expected {
        return Err(ParseError::TooFewTokens {
            expected,
            found: tokens.len(),
            delimiter: layout.delimiter,
        });
    }

    let token = tokens[layout.identifier_index].trim();
    token
        .parse::<u64>()
        .map(ItemId)
        .map_err(|_| ParseError::NotAnInteger(token.to_string()))
}

/// Same as [`parse_identifier`] for a path; only the final component is used.
pub fn parse_path_identifier(path: &Path, layout: &FilenameLayout) -> Result<ItemId, ParseError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(ParseError::NonUtf8)?;
    parse_identifier(name, layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parses_lesion_token() {
        let layout = FilenameLayout::default();
        assert_eq!(
            parse_identifier("PAT_46_881_939.png", &layout),
            Ok(ItemId(881))
        );
    }

    #[test]
    fn test_too_few_tokens() {
        let layout = FilenameLayout::default();
        assert_eq!(
            parse_identifier("badname.png", &layout),
            Err(ParseError::TooFewTokens {
                expected: 3,
                found: 1,
                delimiter: '_',
            })
        );
    }

    #[test]
    fn test_non_integer_token() {
        let layout = FilenameLayout::default();
        assert_eq!(
            parse_identifier("PAT_46_abc_1.png", &layout),
            Err(ParseError::NotAnInteger("abc".to_string()))
        );
    }

    #[test]
    fn test_key_in_last_position_keeps_extension() {
        let layout = FilenameLayout::default();
        assert!(matches!(
            parse_identifier("PAT_46_881.png", &layout),
            Err(ParseError::NotAnInteger(_))
        ));
    }

    #[test]
    fn test_custom_layout() {
        let layout = FilenameLayout {
            delimiter: '-',
            identifier_index: 1,
        };
        assert_eq!(parse_identifier("img-17-a.jpg", &layout), Ok(ItemId(17)));
    }

    #[test]
    fn test_path_uses_file_name_only() {
        let layout = FilenameLayout::default();
        let path = PathBuf::from("some_dir_99").join("PAT_1_5_0.png");
        assert_eq!(parse_path_identifier(&path, &layout), Ok(ItemId(5)));
    }
}

mod discovery;
mod identifier;
mod metadata;

pub use discovery::{has_accepted_extension, list_item_files, list_subdirectories};
pub use identifier::{parse_identifier, parse_path_identifier, FilenameLayout, ItemId, ParseError};
pub use metadata::{Label, LabelMapping, MetadataColumns};

use std::path::{Path, PathBuf};

use crate::core::operations::ItemErrorKind;

/// An image whose label has been resolved through the metadata mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub path: PathBuf,
    pub label: Label,
}

/// Parse the key out of `path` and look its label up in `mapping`.
pub fn resolve_item(
    path: &Path,
    layout: &FilenameLayout,
    mapping: &LabelMapping,
) -> Result<Item, ItemErrorKind> {
    let id = parse_path_identifier(path, layout).map_err(ItemErrorKind::UnparsableIdentifier)?;
    let label = mapping
        .get(id)
        .cloned()
        .ok_or(ItemErrorKind::MissingMapping(id))?;
    Ok(Item {
        id,
        path: path.to_path_buf(),
        label,
    })
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// List regular files directly under `dir` whose extension is accepted,
/// sorted by file name so downstream shuffles see a stable input order.
pub fn list_item_files(dir: &Path, extensions: &[String]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if has_accepted_extension(&path, extensions) {
            files.push(path);
        } else {
            debug!("Skipping non-item file {:?}", path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// List sub-directory names under `dir`, sorted.
pub fn list_subdirectories(dir: &Path) -> io::Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}

pub fn has_accepted_extension(path: &Path, extensions: &[String]) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            extensions.iter().any(|accepted| accepted.eq_ignore_ascii_case(&ext))
        }
        None => false,
    }
}

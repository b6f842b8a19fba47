//! Directory walking that selects the files to merge.

use std::path::{Path, PathBuf};

use same_file::is_same_file;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::concat::ConcatOptions;
use crate::paths::normalize_lexically;

/// Recursively collect the files under `options.root` that belong in the merged document.
///
/// Excluded directories are pruned without being descended into. The output document itself is
/// never collected, whether matched by name or by identity. Results are sorted.
pub fn find_files(options: &ConcatOptions) -> Vec<PathBuf> {
    let output_path = options.output_path();
    let mut files = Vec::new();

    let walker = WalkDir::new(&options.root)
        .into_iter()
        .filter_entry(|entry| !is_excluded_dir(entry, &options.excluded_dirs));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if file_name == options.output_file.as_str()
            || options
                .excluded_files
                .iter()
                .any(|excluded| excluded.as_str() == file_name)
        {
            continue;
        }

        if !has_allowed_extension(entry.path(), &options.extensions) {
            continue;
        }

        if is_same_file(entry.path(), &output_path).unwrap_or(false) {
            continue;
        }

        files.push(normalize_lexically(entry.path()));
    }

    files.sort();
    files
}

fn is_excluded_dir(entry: &DirEntry, excluded_dirs: &[String]) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    excluded_dirs.iter().any(|excluded| excluded.as_str() == name)
}

/// Whether the lower-cased extension of `path` is one of `extensions` (leading dot optional).
pub fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(extension) = path.extension() else {
        return false;
    };
    let extension = extension.to_string_lossy().to_lowercase();
    extensions
        .iter()
        .any(|allowed| allowed.trim_start_matches('.').to_lowercase() == extension)
}

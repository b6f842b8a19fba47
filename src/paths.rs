//! Lexical path helpers shared by the concatenator and the asset mirror.
//!
//! Nothing in here touches the filesystem: paths are normalised component by component so the
//! same input always produces the same output, whether or not the files exist yet.

use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without consulting the filesystem.
///
/// Leading `..` components of relative paths are kept, and an empty result becomes `.`.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// Compute the path of `target` relative to the directory `from_dir`, using `/` separators.
///
/// Both paths are anchored against the current directory first, so relative and absolute inputs
/// can be mixed.
pub fn relative_path(from_dir: &Path, target: &Path) -> String {
    let from = anchored(from_dir);
    let to = anchored(target);

    let from_parts: Vec<Component> = from.components().collect();
    let to_parts: Vec<Component> = to.components().collect();
    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(left, right)| left == right)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from_parts.len() {
        parts.push("..".to_string());
    }
    for component in &to_parts[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Render a path with forward slashes regardless of the host separator.
pub fn to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Whether `path` lies inside `root` once both are anchored and normalised.
pub fn is_within(root: &Path, path: &Path) -> bool {
    anchored(path).starts_with(anchored(root))
}

fn anchored(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize_lexically(&absolute)
}

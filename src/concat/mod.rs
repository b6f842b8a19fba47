//! Merge the source files of a directory tree into one Markdown document.

pub mod markdown;
pub mod scanning;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

pub use markdown::{RenderedSection, fence_language, render_section};
pub use scanning::{find_files, has_allowed_extension};

use crate::models::ConcatSummary;

/// Settings for a concatenation run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConcatOptions {
    /// Directory to walk; the output document is written here as well.
    pub root: PathBuf,
    /// File name of the generated document.
    pub output_file: String,
    /// Extensions to include, compared case-insensitively.
    pub extensions: Vec<String>,
    /// Maximum number of lines kept per file.
    pub line_limit: usize,
    /// Directory names that are never descended into.
    pub excluded_dirs: Vec<String>,
    /// File names that are never included.
    pub excluded_files: Vec<String>,
}

impl Default for ConcatOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            output_file: "res.md".into(),
            extensions: vec![".js".into(), ".html".into(), ".css".into()],
            line_limit: 1000,
            excluded_dirs: vec!["lib".into()],
            excluded_files: vec!["01base.md".into(), "about.md".into()],
        }
    }
}

impl ConcatOptions {
    /// Location of the generated document.
    pub fn output_path(&self) -> PathBuf {
        self.root.join(&self.output_file)
    }
}

/// Collect the matching files under `options.root` and write them into one Markdown document.
///
/// Files that cannot be read are logged and left out. When nothing matches, no document is
/// written and the summary has no output path.
pub fn concatenate(options: &ConcatOptions) -> Result<ConcatSummary> {
    info!(root = %options.root.display(), "scanning for files to merge");
    let files = find_files(options);
    if files.is_empty() {
        info!("no matching files found");
        return Ok(ConcatSummary::default());
    }
    info!(count = files.len(), "found files to merge");

    let mut summary = ConcatSummary::default();
    let mut document = String::new();

    for path in files {
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read file");
                summary.skipped.push(path);
                continue;
            }
        };

        let content = String::from_utf8_lossy(&bytes);
        let section = render_section(&path, &content, options.line_limit);
        if section.truncated {
            warn!(
                path = %path.display(),
                total_lines = section.total_lines,
                limit = options.line_limit,
                "file exceeds line limit, keeping the first lines only"
            );
            summary.truncated.push(path.clone());
        }

        document.push_str(&section.markdown);
        summary.files.push(path);
    }

    let output_path = options.output_path();
    fs::write(&output_path, document)
        .with_context(|| format!("failed to write {}", output_path.display()))?;
    info!(path = %output_path.display(), files = summary.files.len(), "merged document written");

    summary.output_path = Some(output_path);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::to_forward_slashes;
    use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag};
    use tempfile::tempdir;

    fn fenced_languages(markdown: &str) -> Vec<String> {
        Parser::new(markdown)
            .filter_map(|event| match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(language))) => {
                    Some(language.to_string())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn merges_files_with_headers_and_line_cap() {
        let dir = tempdir().unwrap();
        let short: String = (1..=5).map(|line| format!("console.log({line});\n")).collect();
        let long: String = (1..=1200).map(|line| format!(".rule-{line} {{}}\n")).collect();
        fs::write(dir.path().join("a.js"), &short).unwrap();
        fs::write(dir.path().join("b.css"), &long).unwrap();

        let options = ConcatOptions {
            root: dir.path().to_path_buf(),
            ..ConcatOptions::default()
        };
        let summary = concatenate(&options).unwrap();

        let a = dir.path().join("a.js");
        let b = dir.path().join("b.css");
        assert_eq!(summary.files, vec![a.clone(), b.clone()]);
        assert_eq!(summary.truncated, vec![b.clone()]);
        assert_eq!(summary.output_path, Some(dir.path().join("res.md")));

        let written = fs::read_to_string(dir.path().join("res.md")).unwrap();
        assert!(written.starts_with(&format!(
            "\n\n---\n\n## 📄 File: {}\n\n---\n\n```js\n",
            to_forward_slashes(&a)
        )));
        assert!(written.contains(&format!("## 📄 File: {}", to_forward_slashes(&b))));
        assert!(written.contains("console.log(5);\n```"));
        assert!(written.contains(".rule-1000 {}\n```"));
        assert!(!written.contains(".rule-1001 "));
        assert_eq!(fenced_languages(&written), vec!["js", "css"]);
    }

    #[test]
    fn second_run_does_not_include_previous_output() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<p>hi</p>").unwrap();
        let options = ConcatOptions {
            root: dir.path().to_path_buf(),
            output_file: "bundle.html".into(),
            ..ConcatOptions::default()
        };

        concatenate(&options).unwrap();
        let first = fs::read_to_string(options.output_path()).unwrap();
        let summary = concatenate(&options).unwrap();

        assert_eq!(summary.files, vec![dir.path().join("index.html")]);
        assert_eq!(fs::read_to_string(options.output_path()).unwrap(), first);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("legacy.js"), b"var s = '\xff';\n").unwrap();
        let options = ConcatOptions {
            root: dir.path().to_path_buf(),
            ..ConcatOptions::default()
        };

        let summary = concatenate(&options).unwrap();

        assert_eq!(summary.files.len(), 1);
        let written = fs::read_to_string(options.output_path()).unwrap();
        assert!(written.contains("var s = '\u{FFFD}';"));
    }

    #[test]
    fn nothing_is_written_without_matches() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "plain").unwrap();
        let options = ConcatOptions {
            root: dir.path().to_path_buf(),
            ..ConcatOptions::default()
        };

        let summary = concatenate(&options).unwrap();

        assert_eq!(summary, ConcatSummary::default());
        assert!(!options.output_path().exists());
    }
}

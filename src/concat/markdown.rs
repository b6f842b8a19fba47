//! Rendering of one source file as a Markdown section.

use std::path::Path;

use crate::paths::to_forward_slashes;

/// One file rendered as a headed, fenced Markdown section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSection {
    /// Section text, starting with its separator and header.
    pub markdown: String,
    /// Number of lines in the source content.
    pub total_lines: usize,
    /// Whether the content was cut at the line limit.
    pub truncated: bool,
}

/// Fence language for `path`: its lower-cased extension, or `text` without one.
pub fn fence_language(path: &Path) -> String {
    path.extension()
        .map(|extension| extension.to_string_lossy().to_lowercase())
        .filter(|extension| !extension.is_empty())
        .unwrap_or_else(|| "text".to_string())
}

/// Render `content` under a header naming `path`, keeping at most `line_limit` lines.
pub fn render_section(path: &Path, content: &str, line_limit: usize) -> RenderedSection {
    let content = content.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let total_lines = lines.len();
    let truncated = total_lines > line_limit;
    let kept = if truncated {
        lines[..line_limit].concat()
    } else {
        content.clone()
    };

    let markdown = format!(
        "\n\n---\n\n## 📄 File: {}\n\n---\n\n```{}\n{}\n```",
        to_forward_slashes(path),
        fence_language(path),
        kept.trim()
    );

    RenderedSection {
        markdown,
        total_lines,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_trimmed_content_in_tagged_fence() {
        let section = render_section(Path::new("src/app.JS"), "\n  let a = 1;\r\nrun(a);\n\n", 10);

        assert_eq!(
            section.markdown,
            "\n\n---\n\n## 📄 File: src/app.JS\n\n---\n\n```js\nlet a = 1;\nrun(a);\n```"
        );
        assert_eq!(section.total_lines, 4);
        assert!(!section.truncated);
    }

    #[test]
    fn truncates_to_line_limit() {
        let content: String = (1..=12).map(|line| format!("line {line}\n")).collect();

        let section = render_section(Path::new("big.css"), &content, 10);

        assert!(section.truncated);
        assert_eq!(section.total_lines, 12);
        assert!(section.markdown.ends_with("line 10\n```"));
        assert!(!section.markdown.contains("line 11"));
    }

    #[test]
    fn files_without_extension_use_text_fence() {
        assert_eq!(fence_language(Path::new("Dockerfile")), "text");
        assert_eq!(fence_language(Path::new("index.HTML")), "html");
    }
}

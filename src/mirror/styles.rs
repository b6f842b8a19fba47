//! Stylesheet rewriting so `url()` references point at the mirrored copies.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info};
use url::Url;

use crate::mirror::fetcher::{Fetcher, Transport, write_resource};
use crate::mirror::urls::{is_data_uri, local_path_for_url, relative_url_path, resolve_reference};
use crate::paths::{is_within, normalize_lexically};

fn css_url_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"url\((['"]?)([^'")]+)(['"]?)\)"#).expect("invalid css url() regex")
  })
}

/// Quoting used around a `url()` target in the source stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
  /// `url('...')`
  Single,
  /// `url("...")`
  Double,
  /// `url(...)`
  Bare,
}

impl QuoteStyle {
  fn from_delimiters(open: &str, close: &str) -> Self {
    match (open, close) {
      ("'", "'") => Self::Single,
      ("\"", "\"") => Self::Double,
      _ => Self::Bare,
    }
  }

  /// Wrap `value` in this quote style.
  pub fn wrap(self, value: &str) -> String {
    match self {
      Self::Single => format!("'{value}'"),
      Self::Double => format!("\"{value}\""),
      Self::Bare => value.to_string(),
    }
  }
}

/// Stylesheet text after its `url()` references were redirected to the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylesheetRewrite {
  /// Rewritten stylesheet text.
  pub text: String,
  /// Number of `url()` references that now point at local files.
  pub rewritten: usize,
}

/// Fetch every resource referenced through `url()` and point the references at the local copies.
///
/// Matches are handled back to front so the byte offsets of earlier matches stay valid while the
/// text is edited. References whose resource could not be fetched keep their original value, and
/// relative references that already name a file inside `root` are left as they are.
/// The stylesheet on disk is only rewritten when at least one reference changed.
pub fn rewrite_stylesheet<T: Transport>(
  fetcher: &mut Fetcher<T>,
  css: &str,
  stylesheet_url: &Url,
  root: &Path,
) -> Result<StylesheetRewrite> {
  let stylesheet_path = local_path_for_url(stylesheet_url, root);
  let stylesheet_dir = stylesheet_path
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_else(|| root.to_path_buf());

  let matches: Vec<_> = css_url_pattern().captures_iter(css).collect();
  let mut text = css.to_string();
  let mut rewritten = 0;

  for captures in matches.iter().rev() {
    let (Some(open), Some(target), Some(close)) =
      (captures.get(1), captures.get(2), captures.get(3))
    else {
      continue;
    };

    let reference = target.as_str().trim();
    if reference.is_empty() || reference.starts_with('#') || is_data_uri(target.as_str()) {
      continue;
    }

    if let Some(existing) = existing_local_copy(reference, &stylesheet_dir, root) {
      debug!(%reference, path = %existing.display(), "reference already points at a local file");
      continue;
    }

    let Some(resource_url) = resolve_reference(stylesheet_url, reference) else {
      debug!(%reference, "unresolvable stylesheet reference");
      continue;
    };

    let resource_path = local_path_for_url(&resource_url, root);
    if !fetcher.fetch(&resource_url, &resource_path).is_available() {
      continue;
    }

    let relative = relative_url_path(&stylesheet_dir, &resource_path);
    let replacement = QuoteStyle::from_delimiters(open.as_str(), close.as_str()).wrap(&relative);
    text.replace_range(open.start()..close.end(), &replacement);
    rewritten += 1;
  }

  if text != css {
    info!(path = %stylesheet_path.display(), "updating stylesheet references");
    write_resource(&stylesheet_path, text.as_bytes())
      .with_context(|| format!("failed to write {}", stylesheet_path.display()))?;
  }

  Ok(StylesheetRewrite { text, rewritten })
}

fn existing_local_copy(reference: &str, stylesheet_dir: &Path, root: &Path) -> Option<PathBuf> {
  if reference.contains(':') || reference.starts_with('/') {
    return None;
  }
  let file = reference.split(['?', '#']).next().filter(|file| !file.is_empty())?;
  let candidate = normalize_lexically(&stylesheet_dir.join(file));
  (candidate.is_file() && is_within(root, &candidate)).then_some(candidate)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mirror::testing::StaticTransport;
  use std::fs;
  use tempfile::tempdir;

  fn stylesheet_url() -> Url {
    Url::parse("https://example.com/a/b.css").unwrap()
  }

  #[test]
  fn downloads_and_rewrites_relative_references() {
    let dir = tempdir().unwrap();
    let transport = StaticTransport::new().with("https://example.com/a/img/x.png", "png");
    let mut fetcher = Fetcher::new(transport);
    let css = "body { background: url('./img/x.png'); }";

    let result = rewrite_stylesheet(&mut fetcher, css, &stylesheet_url(), dir.path()).unwrap();

    assert_eq!(result.text, "body { background: url('img/x.png'); }");
    assert_eq!(result.rewritten, 1);
    assert_eq!(
      fs::read_to_string(dir.path().join("example.com/a/img/x.png")).unwrap(),
      "png"
    );
    assert_eq!(
      fs::read_to_string(dir.path().join("example.com/a/b.css")).unwrap(),
      result.text
    );
  }

  #[test]
  fn preserves_quote_style_of_each_reference() {
    let dir = tempdir().unwrap();
    let transport = StaticTransport::new()
      .with("https://example.com/fonts/a.woff2", "a")
      .with("https://example.com/fonts/b.woff", "b")
      .with("https://cdn.example.net/c.ttf", "c");
    let mut fetcher = Fetcher::new(transport);
    let css = concat!(
      "@font-face { src: url(\"../fonts/a.woff2\") format('woff2'), ",
      "url('../fonts/b.woff'), url(https://cdn.example.net/c.ttf); }"
    );

    let result = rewrite_stylesheet(&mut fetcher, css, &stylesheet_url(), dir.path()).unwrap();

    assert_eq!(
      result.text,
      concat!(
        "@font-face { src: url(\"../fonts/a.woff2\") format('woff2'), ",
        "url('../fonts/b.woff'), url(../../cdn.example.net/c.ttf); }"
      )
    );
    assert_eq!(result.rewritten, 3);
    assert!(dir.path().join("example.com/fonts/a.woff2").exists());
    assert!(dir.path().join("cdn.example.net/c.ttf").exists());
  }

  #[test]
  fn already_mirrored_references_resolve_locally() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("cdn.example.net")).unwrap();
    fs::write(dir.path().join("cdn.example.net/c.ttf"), "c").unwrap();
    let mut fetcher = Fetcher::new(StaticTransport::new());
    let css = "@font-face { src: url(../../cdn.example.net/c.ttf?v=2), url('../../../outside.ttf'); }";

    let result = rewrite_stylesheet(&mut fetcher, css, &stylesheet_url(), dir.path()).unwrap();

    assert_eq!(result.text, css);
    assert_eq!(result.rewritten, 0);
    assert_eq!(
      fetcher.transport().requests(),
      vec!["https://example.com/outside.ttf".to_string()]
    );
  }

  #[test]
  fn stylesheet_without_references_is_untouched() {
    let dir = tempdir().unwrap();
    let stylesheet_path = dir.path().join("example.com/a/b.css");
    fs::create_dir_all(stylesheet_path.parent().unwrap()).unwrap();
    let css = "body {\r\n  color: red;\r\n}\n";
    fs::write(&stylesheet_path, css).unwrap();

    let mut fetcher = Fetcher::new(StaticTransport::new());
    let result = rewrite_stylesheet(&mut fetcher, css, &stylesheet_url(), dir.path()).unwrap();

    assert_eq!(result.rewritten, 0);
    assert_eq!(fs::read(&stylesheet_path).unwrap(), css.as_bytes());
    assert!(fetcher.transport().requests().is_empty());
  }

  #[test]
  fn skips_data_uris_fragments_and_blank_targets() {
    let dir = tempdir().unwrap();
    let mut fetcher = Fetcher::new(StaticTransport::new());
    let css = "a{background:url(data:image/png;base64,AAAA)} b{mask:url(#clip)} c{x:url( )}";

    let result = rewrite_stylesheet(&mut fetcher, css, &stylesheet_url(), dir.path()).unwrap();

    assert_eq!(result.text, css);
    assert!(fetcher.transport().requests().is_empty());
    assert!(!dir.path().join("example.com/a/b.css").exists());
  }

  #[test]
  fn failed_downloads_keep_original_reference() {
    let dir = tempdir().unwrap();
    let transport = StaticTransport::new().with("https://example.com/a/ok.png", "ok");
    let mut fetcher = Fetcher::new(transport);
    let css = "a{background:url(missing.png)} b{background:url(\"ok.png\")}";

    let result = rewrite_stylesheet(&mut fetcher, css, &stylesheet_url(), dir.path()).unwrap();

    assert_eq!(
      result.text,
      "a{background:url(missing.png)} b{background:url(\"ok.png\")}"
    );
    assert_eq!(result.rewritten, 1);
  }
}

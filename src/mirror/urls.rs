//! Resource reference classification and the deterministic URL to local path mapping.

use std::path::{Path, PathBuf};

use url::Url;

use crate::paths::{normalize_lexically, relative_path};

/// Returns `true` for `data:` URIs, which are always left inline.
pub fn is_data_uri(value: &str) -> bool {
  value
    .trim_start()
    .get(..5)
    .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Classify a raw `href`/`src` value found on a tag.
///
/// Absolute `http(s)` URLs are returned unchanged and protocol-relative references inherit
/// `https`. Data URIs, empty values and bare local paths yield `None` and must be left alone.
pub fn classify_reference(raw: &str) -> Option<Url> {
  let trimmed = raw.trim();
  if trimmed.is_empty() || is_data_uri(trimmed) {
    return None;
  }

  let candidate = if trimmed.starts_with("//") {
    format!("https:{trimmed}")
  } else if has_http_scheme(trimmed) {
    trimmed.to_string()
  } else {
    return None;
  };

  Url::parse(&candidate).ok()
}

/// Resolve a reference found inside a fetched resource against that resource's URL.
pub fn resolve_reference(base: &Url, reference: &str) -> Option<Url> {
  base
    .join(reference.trim())
    .ok()
    .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Map a URL onto `<root>/<host[:port]>/<path segments...>`.
///
/// Query strings and fragments never influence the result, so the same resource always lands
/// on the same file within a run and across runs.
pub fn local_path_for_url(url: &Url, root: &Path) -> PathBuf {
  let mut path = root.to_path_buf();

  if let Some(host) = url.host_str() {
    match url.port() {
      Some(port) => path.push(format!("{host}:{port}")),
      None => path.push(host),
    }
  }

  if let Some(segments) = url.path_segments() {
    for segment in segments.filter(|segment| !segment.is_empty()) {
      path.push(segment);
    }
  }

  normalize_lexically(&path)
}

/// Path of a mirrored file relative to the directory of the document that references it.
pub fn relative_url_path(from_dir: &Path, target: &Path) -> String {
  relative_path(from_dir, target)
}

fn has_http_scheme(value: &str) -> bool {
  let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
  lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn skips_data_uris_and_local_paths() {
    assert!(classify_reference("data:text/css;base64,Ym9keXt9").is_none());
    assert!(classify_reference("DATA:image/png;base64,AAAA").is_none());
    assert!(classify_reference("css/site.css").is_none());
    assert!(classify_reference("/static/app.js").is_none());
    assert!(classify_reference("   ").is_none());
  }

  #[test]
  fn protocol_relative_references_use_https() {
    let url = classify_reference("//cdn.example.com/lib.js").unwrap();
    assert_eq!(url.as_str(), "https://cdn.example.com/lib.js");
  }

  #[test]
  fn absolute_urls_are_returned_unchanged() {
    let raw = "https://example.com/a/b.css?v=3";
    let first = classify_reference(raw).unwrap();
    assert_eq!(first.as_str(), raw);

    let second = classify_reference(first.as_str()).unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn resolution_is_deterministic() {
    let base = Url::parse("https://example.com/a/b.css").unwrap();
    let first = resolve_reference(&base, "./img/x.png").unwrap();
    let second = resolve_reference(&base, "./img/x.png").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.as_str(), "https://example.com/a/img/x.png");
  }

  #[test]
  fn resolution_rejects_non_http_schemes() {
    let base = Url::parse("https://example.com/a/b.css").unwrap();
    assert!(resolve_reference(&base, "javascript:void(0)").is_none());
    assert!(resolve_reference(&base, "../fonts/f.woff2").is_some());
  }

  #[test]
  fn maps_host_and_segments_onto_root() {
    let url = Url::parse("https://example.com/a/b.css?v=1#top").unwrap();
    assert_eq!(
      local_path_for_url(&url, Path::new(".")),
      PathBuf::from("example.com/a/b.css")
    );
    assert_eq!(
      local_path_for_url(&url, Path::new("/srv/mirror")),
      PathBuf::from("/srv/mirror/example.com/a/b.css")
    );
  }

  #[test]
  fn keeps_explicit_ports_in_host_segment() {
    let url = Url::parse("http://localhost:8080/js/app.js").unwrap();
    assert_eq!(
      local_path_for_url(&url, Path::new("out")),
      PathBuf::from("out/localhost:8080/js/app.js")
    );
  }

  #[test]
  fn drops_empty_segments() {
    let url = Url::parse("https://cdnjs.cloudflare.com/ajax/libs/pkg/1.0.0/").unwrap();
    assert_eq!(
      local_path_for_url(&url, Path::new(".")),
      PathBuf::from("cdnjs.cloudflare.com/ajax/libs/pkg/1.0.0")
    );
  }
}

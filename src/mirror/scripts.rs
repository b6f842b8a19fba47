//! Best-effort discovery of scripts loaded by other scripts through relative paths.
//!
//! Workers and lazily loaded chunks are usually referenced as quoted relative paths. The scan is
//! a heuristic: anything it misses stays remote, and nothing it encounters can fail the run.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::mirror::fetcher::{Fetcher, Transport};
use crate::mirror::urls::{local_path_for_url, resolve_reference};

/// Nesting depth at which the recursive walk stops following sub-resources.
pub const DEFAULT_MAX_DEPTH: usize = 8;

fn script_reference_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"['"]((?:\.\.?/|\w+/)[^"'\s]+?\.js)['"]"#).expect("invalid script path regex")
  })
}

/// Collect the quoted relative `.js` paths mentioned in `script`, in source order.
pub fn find_script_references(script: &str) -> Vec<String> {
  script_reference_pattern()
    .captures_iter(script)
    .filter_map(|captures| captures.get(1))
    .map(|found| found.as_str().to_string())
    .collect()
}

/// Fetch the sub-resources referenced by `script`, recursing into each newly obtained file.
///
/// The walk stops at `max_depth` levels of nesting and never revisits a URL, so cyclic imports
/// terminate. Returns the number of sub-resources whose content was obtained.
pub fn walk_script_references<T: Transport>(
  fetcher: &mut Fetcher<T>,
  script: &str,
  script_url: &Url,
  root: &Path,
  max_depth: usize,
) -> usize {
  walk(fetcher, script, script_url, root, 0, max_depth)
}

fn walk<T: Transport>(
  fetcher: &mut Fetcher<T>,
  script: &str,
  script_url: &Url,
  root: &Path,
  depth: usize,
  max_depth: usize,
) -> usize {
  if depth >= max_depth {
    debug!(%script_url, depth, "script walk depth limit reached");
    return 0;
  }

  let mut fetched = 0;
  for reference in find_script_references(script) {
    debug!(%script_url, %reference, "script sub-resource");
    let Some(url) = resolve_reference(script_url, &reference) else {
      continue;
    };

    let destination = local_path_for_url(&url, root);
    let outcome = fetcher.fetch(&url, &destination);
    let Some(content) = outcome.content() else {
      continue;
    };

    fetched += 1;
    let text = String::from_utf8_lossy(content).into_owned();
    fetched += walk(fetcher, &text, &url, root, depth + 1, max_depth);
  }

  fetched
}

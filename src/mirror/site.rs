//! Page-level orchestration: mirror every external asset of an HTML document and rewrite it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::mirror::document::{HtmlDocument, TagId};
use crate::mirror::fetcher::{
  DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, FetchOutcome, Fetcher, HttpTransport, Transport,
};
use crate::mirror::registry::{CdnProvider, DEFAULT_PACKAGE, download_package, find_package_reference};
use crate::mirror::scripts::{DEFAULT_MAX_DEPTH, walk_script_references};
use crate::mirror::styles::rewrite_stylesheet;
use crate::mirror::urls::{classify_reference, is_data_uri, local_path_for_url, relative_url_path};
use crate::models::MirrorReport;

/// Settings for a mirror run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MirrorOptions {
  /// HTML document to process.
  pub input_html: PathBuf,
  /// Root of the mirror; the rewritten document is written here too.
  pub output_dir: PathBuf,
  /// Registry and CDN used for whole-package downloads.
  pub provider: CdnProvider,
  /// Package whose loader configuration triggers a whole-package download.
  pub package_name: String,
  /// Text an inline script must contain before it is searched for a package reference.
  pub inline_marker: String,
  /// Nesting bound for script sub-resource discovery.
  pub max_script_depth: usize,
  /// `User-Agent` header sent with every request.
  pub user_agent: String,
  /// Per-request timeout in seconds.
  pub request_timeout_secs: u64,
}

impl Default for MirrorOptions {
  fn default() -> Self {
    Self {
      input_html: PathBuf::from("index.html"),
      output_dir: PathBuf::from("."),
      provider: CdnProvider::default(),
      package_name: DEFAULT_PACKAGE.into(),
      inline_marker: "require.config".into(),
      max_script_depth: DEFAULT_MAX_DEPTH,
      user_agent: DEFAULT_USER_AGENT.into(),
      request_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
    }
  }
}

impl MirrorOptions {
  /// Build the HTTP transport described by these options.
  pub fn http_transport(&self) -> Result<HttpTransport> {
    HttpTransport::with_settings(
      Duration::from_secs(self.request_timeout_secs),
      &self.user_agent,
    )
    .context("failed to build HTTP client")
  }
}

/// Mirrors the assets of one HTML document through a [`Fetcher`].
#[derive(Debug)]
pub struct SiteMirror<T> {
  options: MirrorOptions,
  fetcher: Fetcher<T>,
}

impl SiteMirror<HttpTransport> {
  /// Create a mirror that downloads over HTTP.
  pub fn from_options(options: MirrorOptions) -> Result<Self> {
    let transport = options.http_transport()?;
    Ok(Self::new(options, transport))
  }
}

impl<T: Transport> SiteMirror<T> {
  /// Create a mirror with a fresh visited-set over `transport`.
  pub fn new(options: MirrorOptions, transport: T) -> Self {
    Self {
      options,
      fetcher: Fetcher::new(transport),
    }
  }

  /// Fetcher state accumulated by [`SiteMirror::run`].
  pub fn fetcher(&self) -> &Fetcher<T> {
    &self.fetcher
  }

  /// Mirror every external `link`/`script` resource, mirror whole packages named by inline loader
  /// scripts, then write the rewritten document to the output directory.
  ///
  /// Only a missing input or an unwritable output fails the run; individual resources that
  /// cannot be fetched are counted in the report and keep their original reference.
  pub fn run(&mut self) -> Result<MirrorReport> {
    let input = self.options.input_html.clone();
    info!(path = %input.display(), "processing document");
    let html = fs::read_to_string(&input)
      .with_context(|| format!("failed to read {}", input.display()))?;

    let output_dir = self.options.output_dir.clone();
    fs::create_dir_all(&output_dir)
      .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let file_name = input
      .file_name()
      .ok_or_else(|| anyhow!("input path {} has no file name", input.display()))?;
    let output_path = output_dir.join(file_name);

    let mut document = HtmlDocument::parse(&html);
    let mut report = MirrorReport {
      output_path: output_path.clone(),
      ..MirrorReport::default()
    };

    for id in document.link_and_script_tags() {
      self.mirror_tag(&mut document, id, &output_dir, &mut report);
    }

    info!("scanning inline scripts for package loaders");
    for id in document.tags_named(&["script"]) {
      self.mirror_inline_package(&mut document, id, &output_dir, &mut report)?;
    }

    fs::write(&output_path, document.to_html())
      .with_context(|| format!("failed to write {}", output_path.display()))?;
    info!(path = %output_path.display(), "document written");

    Ok(report)
  }

  fn mirror_tag(
    &mut self,
    document: &mut HtmlDocument,
    id: TagId,
    output_dir: &Path,
    report: &mut MirrorReport,
  ) {
    let Some(tag) = document.tag(id) else {
      return;
    };
    let is_link = tag.name() == "link";
    let attribute = if is_link { "href" } else { "src" };
    let is_stylesheet = is_link && tag.has_rel("stylesheet");

    let Some(original) = tag.attr(attribute).filter(|value| !value.trim().is_empty()) else {
      return;
    };
    if is_data_uri(&original) {
      report.skipped += 1;
      return;
    }
    let Some(url) = classify_reference(original.trim()) else {
      debug!(reference = %original, "leaving local resource untouched");
      report.skipped += 1;
      return;
    };

    info!(tag = %tag.name(), %url, "external resource");
    let local_path = local_path_for_url(&url, output_dir);
    let outcome = self.fetcher.fetch(&url, &local_path);
    if !outcome.is_available() {
      report.failed += 1;
      return;
    }

    if let FetchOutcome::Downloaded(content) | FetchOutcome::Existing(content) = &outcome {
      if is_stylesheet {
        self.process_stylesheet(content, &url, &local_path, output_dir);
      } else if !is_link {
        let text = String::from_utf8_lossy(content);
        walk_script_references(
          &mut self.fetcher,
          &text,
          &url,
          output_dir,
          self.options.max_script_depth,
        );
      }
    }

    let relative = relative_url_path(output_dir, &local_path);
    if let Some(tag) = document.tag_mut(id) {
      info!(from = %original, to = %relative, "rewriting reference");
      tag.set_attr(attribute, &relative);
      report.rewritten += 1;
    }
  }

  fn process_stylesheet(&mut self, content: &[u8], url: &Url, local_path: &Path, root: &Path) {
    let Ok(css) = std::str::from_utf8(content) else {
      warn!(path = %local_path.display(), "stylesheet is not valid UTF-8, skipping its references");
      return;
    };

    match rewrite_stylesheet(&mut self.fetcher, css, url, root) {
      Ok(rewrite) => {
        debug!(path = %local_path.display(), rewritten = rewrite.rewritten, "stylesheet processed")
      }
      Err(err) => {
        warn!(path = %local_path.display(), error = %format!("{err:#}"), "failed to rewrite stylesheet")
      }
    }
  }

  fn mirror_inline_package(
    &mut self,
    document: &mut HtmlDocument,
    id: TagId,
    output_dir: &Path,
    report: &mut MirrorReport,
  ) -> Result<()> {
    if document.tag(id).is_none_or(|tag| tag.has_attr("src")) {
      return Ok(());
    }
    let Some(script) = document.script_text(id).map(str::to_string) else {
      return Ok(());
    };
    if script.is_empty() || !script.contains(&self.options.inline_marker) {
      return Ok(());
    }

    info!(marker = %self.options.inline_marker, "found loader configuration");
    let Some(package) =
      find_package_reference(&script, &self.options.provider, &self.options.package_name)?
    else {
      info!(package = %self.options.package_name, "no package path found in loader configuration");
      return Ok(());
    };
    info!(package = %package.name, version = %package.version, "package reference");

    if download_package(&mut self.fetcher, &self.options.provider, &package, output_dir).is_err() {
      warn!(package = %package.name, "package download failed, loader path left unchanged");
      return Ok(());
    }

    let package_url = Url::parse(&package.cdn_path)
      .with_context(|| format!("invalid package path {}", package.cdn_path))?;
    let local_base = local_path_for_url(&package_url, output_dir);
    let relative = relative_url_path(output_dir, &local_base);
    info!(from = %package.cdn_path, to = %relative, "rewriting loader path");

    document.set_script_text(id, &script.replace(&package.cdn_path, &relative));
    report
      .packages
      .push(format!("{}@{}", package.name, package.version));
    Ok(())
  }
}

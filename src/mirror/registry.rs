//! Mirroring a complete package version through the cdnjs registry API.
//!
//! Module loaders such as `require.config` fetch files the page never names directly, so the
//! only reliable way to mirror such a package is to ask the registry for its full file listing.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::mirror::fetcher::{FetchError, Fetcher, Transport};
use crate::mirror::urls::local_path_for_url;

/// Registry endpoint listing the files of a package version.
pub const DEFAULT_API_BASE: &str = "https://api.cdnjs.com/libraries";
/// CDN root serving package files.
pub const DEFAULT_CDN_BASE: &str = "https://cdnjs.cloudflare.com/ajax/libs";
/// Package whose loader configuration is mirrored by default.
pub const DEFAULT_PACKAGE: &str = "monaco-editor";

/// Errors raised while mirroring a package.
#[derive(Debug, Error)]
pub enum RegistryError {
  /// The registry could not be reached or answered with an error status.
  #[error("registry request failed: {0}")]
  Request(#[from] FetchError),
  /// The registry response was not the expected JSON document.
  #[error("registry response could not be parsed: {0}")]
  Decode(#[from] serde_json::Error),
  /// The registry answered without any files for the package.
  #[error("registry returned no files for {name}@{version}")]
  EmptyListing {
    /// Package name.
    name: String,
    /// Package version.
    version: String,
  },
  /// A registry or CDN URL could not be built.
  #[error("invalid registry URL: {0}")]
  Url(#[from] url::ParseError),
  /// The package reference pattern could not be compiled.
  #[error("invalid package pattern: {0}")]
  Pattern(#[from] regex::Error),
}

/// Endpoints of the package registry and the CDN serving its files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CdnProvider {
  /// Base URL of the listing API, without trailing slash.
  pub api_base: String,
  /// Base URL of the CDN file tree, without trailing slash.
  pub cdn_base: String,
}

impl Default for CdnProvider {
  fn default() -> Self {
    Self {
      api_base: DEFAULT_API_BASE.into(),
      cdn_base: DEFAULT_CDN_BASE.into(),
    }
  }
}

impl CdnProvider {
  /// URL of the JSON file listing for `name@version`.
  pub fn listing_url(&self, name: &str, version: &str) -> Result<Url, RegistryError> {
    let raw = format!(
      "{}/{}/{}?fields=files",
      self.api_base.trim_end_matches('/'),
      name,
      version
    );
    Ok(Url::parse(&raw)?)
  }

  /// Directory URL under which the CDN serves the files of `name@version`.
  pub fn package_base(&self, name: &str, version: &str) -> Result<Url, RegistryError> {
    let raw = format!(
      "{}/{}/{}/",
      self.cdn_base.trim_end_matches('/'),
      name,
      version
    );
    Ok(Url::parse(&raw)?)
  }

  fn reference_pattern(&self, package_name: &str) -> Result<Regex, RegistryError> {
    let pattern = format!(
      r#"['"]({}/({})/([0-9.]+)/min/vs)['"]"#,
      regex::escape(self.cdn_base.trim_end_matches('/')),
      regex::escape(package_name)
    );
    Ok(Regex::new(&pattern)?)
  }
}

/// CDN path of a package found inside an inline loader configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
  /// The complete quoted CDN path, as it appears in the script.
  pub cdn_path: String,
  /// Package name.
  pub name: String,
  /// Semantic version pulled out of the path.
  pub version: String,
}

#[derive(Debug, Deserialize)]
struct PackageListing {
  #[serde(default)]
  files: Vec<String>,
}

/// Find the first quoted `<cdn>/<package>/<version>/min/vs` path in `script`.
pub fn find_package_reference(
  script: &str,
  provider: &CdnProvider,
  package_name: &str,
) -> Result<Option<PackageReference>, RegistryError> {
  let pattern = provider.reference_pattern(package_name)?;
  let reference = pattern.captures(script).and_then(|captures| {
    Some(PackageReference {
      cdn_path: captures.get(1)?.as_str().to_string(),
      name: captures.get(2)?.as_str().to_string(),
      version: captures.get(3)?.as_str().to_string(),
    })
  });
  Ok(reference)
}

/// Mirror every file of `package` under `root`, preserving the CDN directory structure.
///
/// Fails when the listing cannot be obtained or is empty. Once the listing is known, individual
/// file failures are logged and skipped; the number of listed files is returned. Listed paths
/// that resolve outside the package directory are skipped.
pub fn download_package<T: Transport>(
  fetcher: &mut Fetcher<T>,
  provider: &CdnProvider,
  package: &PackageReference,
  root: &Path,
) -> Result<usize, RegistryError> {
  let files = list_package_files(fetcher.transport(), provider, package)
    .inspect_err(|err| warn!(error = %err, "skipping bulk download of {}", package.name))?;

  let base_url = provider.package_base(&package.name, &package.version)?;
  let total = files.len();
  info!(package = %package.name, version = %package.version, files = total, "mirroring package");

  for (index, file) in files.iter().enumerate() {
    let file_url = match base_url.join(file) {
      Ok(url) => url,
      Err(err) => {
        warn!(%file, error = %err, "invalid file path in package listing");
        continue;
      }
    };

    if !file_url.as_str().starts_with(base_url.as_str()) {
      warn!(%file, %file_url, "package listing entry escapes the package directory");
      continue;
    }

    let destination = local_path_for_url(&file_url, root);
    debug!("({}/{}) {}", index + 1, total, file);
    fetcher.fetch_quietly(&file_url, &destination);
  }

  info!(package = %package.name, "package files mirrored");
  Ok(total)
}

fn list_package_files<T: Transport>(
  transport: &T,
  provider: &CdnProvider,
  package: &PackageReference,
) -> Result<Vec<String>, RegistryError> {
  let listing_url = provider.listing_url(&package.name, &package.version)?;
  info!(%listing_url, "querying package registry");

  let body = transport.get(&listing_url)?;
  let listing: PackageListing = serde_json::from_slice(&body)?;
  if listing.files.is_empty() {
    return Err(RegistryError::EmptyListing {
      name: package.name.clone(),
      version: package.version.clone(),
    });
  }

  Ok(listing.files)
}

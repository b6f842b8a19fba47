//! Resource fetching backed by a caller-owned visited-set.
//!
//! A [`Fetcher`] never lets an error escape: every failure is logged and reported as
//! [`FetchOutcome::Failed`] so the surrounding pipeline can carry on with the next resource.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Browser-like identification sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Connect and read timeout applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors produced by a [`Transport`].
#[derive(Debug, Error)]
pub enum FetchError {
  /// The request could not be sent or the body could not be read.
  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),
  /// The server answered with a non-success status code.
  #[error("unexpected status {status} for {url}")]
  Status {
    /// Status code returned by the server.
    status: u16,
    /// URL that was requested.
    url: String,
  },
}

/// Source of resource bytes.
pub trait Transport {
  /// Perform a GET request and return the response body.
  fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP transport with a fixed timeout and identifying header.
#[derive(Debug, Clone)]
pub struct HttpTransport {
  client: Client,
}

impl HttpTransport {
  /// Create a transport using [`DEFAULT_TIMEOUT`] and [`DEFAULT_USER_AGENT`].
  pub fn new() -> Result<Self, FetchError> {
    Self::with_settings(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
  }

  /// Create a transport with an explicit timeout and user agent.
  pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
    let client = Client::builder()
      .timeout(timeout)
      .user_agent(user_agent.to_string())
      .build()?;
    Ok(Self { client })
  }
}

impl Transport for HttpTransport {
  fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
    let response = self.client.get(url.clone()).send()?;
    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        status: status.as_u16(),
        url: url.to_string(),
      });
    }

    Ok(response.bytes()?.to_vec())
  }
}

/// Result of a single [`Fetcher::fetch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
  /// The resource was downloaded and written to its destination.
  Downloaded(Vec<u8>),
  /// The destination already existed on disk; its bytes were read instead of downloading.
  Existing(Vec<u8>),
  /// The URL was already fetched earlier in this run; nothing was done.
  AlreadyVisited,
  /// The resource could not be obtained.
  Failed,
}

impl FetchOutcome {
  /// Bytes obtained by this call, if any.
  pub fn content(&self) -> Option<&[u8]> {
    match self {
      Self::Downloaded(bytes) | Self::Existing(bytes) => Some(bytes),
      Self::AlreadyVisited | Self::Failed => None,
    }
  }

  /// Whether the resource is present locally after this call.
  pub fn is_available(&self) -> bool {
    !matches!(self, Self::Failed)
  }
}

/// Fetches resources into the mirror, remembering which URLs were already handled.
#[derive(Debug)]
pub struct Fetcher<T> {
  transport: T,
  visited: HashSet<String>,
}

impl<T: Transport> Fetcher<T> {
  /// Create a fetcher with an empty visited-set.
  pub fn new(transport: T) -> Self {
    Self {
      transport,
      visited: HashSet::new(),
    }
  }

  /// Underlying transport, used for requests that bypass the mirror (registry listings).
  pub fn transport(&self) -> &T {
    &self.transport
  }

  /// Whether `url` was already fetched during this run.
  pub fn is_visited(&self, url: &Url) -> bool {
    self.visited.contains(url.as_str())
  }

  /// Number of distinct URLs fetched so far.
  pub fn visited_count(&self) -> usize {
    self.visited.len()
  }

  /// Fetch `url` into `destination`, logging progress at `info`.
  pub fn fetch(&mut self, url: &Url, destination: &Path) -> FetchOutcome {
    self.fetch_with(url, destination, false)
  }

  /// Same as [`Fetcher::fetch`] but logs progress at `debug`, for bulk downloads.
  pub fn fetch_quietly(&mut self, url: &Url, destination: &Path) -> FetchOutcome {
    self.fetch_with(url, destination, true)
  }

  fn fetch_with(&mut self, url: &Url, destination: &Path, quiet: bool) -> FetchOutcome {
    if self.is_visited(url) {
      if !quiet {
        info!(%url, "already fetched in this run");
      }
      return FetchOutcome::AlreadyVisited;
    }

    if destination.exists() {
      return match fs::read(destination) {
        Ok(bytes) => {
          if quiet {
            debug!(path = %destination.display(), "file already exists, skipping download");
          } else {
            info!(path = %destination.display(), "file already exists, skipping download");
          }
          self.visited.insert(url.to_string());
          FetchOutcome::Existing(bytes)
        }
        Err(err) => {
          warn!(path = %destination.display(), error = %err, "failed to read existing file");
          FetchOutcome::Failed
        }
      };
    }

    if quiet {
      debug!(%url, path = %destination.display(), "downloading");
    } else {
      info!(%url, path = %destination.display(), "downloading");
    }

    let bytes = match self.transport.get(url) {
      Ok(bytes) => bytes,
      Err(err) => {
        if quiet {
          debug!(%url, error = %err, "download failed");
        } else {
          warn!(%url, error = %err, "download failed");
        }
        return FetchOutcome::Failed;
      }
    };

    if let Err(err) = write_resource(destination, &bytes) {
      warn!(path = %destination.display(), error = %err, "failed to write downloaded file");
      return FetchOutcome::Failed;
    }

    self.visited.insert(url.to_string());
    FetchOutcome::Downloaded(bytes)
  }
}

/// Write `bytes` to `destination`, creating parent directories as needed.
pub(crate) fn write_resource(destination: &Path, bytes: &[u8]) -> io::Result<()> {
  if let Some(parent) = destination.parent() {
    if !parent.as_os_str().is_empty() {
      fs::create_dir_all(parent)?;
    }
  }
  fs::write(destination, bytes)
}

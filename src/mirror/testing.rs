//! In-memory transport used by the mirror tests.

use std::cell::RefCell;
use std::collections::HashMap;

use url::Url;

use crate::mirror::fetcher::{FetchError, Transport};

/// Serves canned bodies by URL and records every request it receives.
#[derive(Debug, Default)]
pub(crate) struct StaticTransport {
  responses: HashMap<String, Vec<u8>>,
  requests: RefCell<Vec<String>>,
}

impl StaticTransport {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
    let key = Url::parse(url).expect("test URL must parse").to_string();
    self.responses.insert(key, body.into());
    self
  }

  pub(crate) fn requests(&self) -> Vec<String> {
    self.requests.borrow().clone()
  }

  pub(crate) fn request_count(&self, url: &str) -> usize {
    self
      .requests
      .borrow()
      .iter()
      .filter(|requested| requested.as_str() == url)
      .count()
  }
}

impl Transport for StaticTransport {
  fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
    self.requests.borrow_mut().push(url.to_string());
    self
      .responses
      .get(url.as_str())
      .cloned()
      .ok_or_else(|| FetchError::Status {
        status: 404,
        url: url.to_string(),
      })
  }
}

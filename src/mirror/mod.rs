//! Offline mirroring of the external scripts, stylesheets and packages an HTML page depends on.
//!
//! [`SiteMirror`] drives the pipeline. Every download goes through one [`Fetcher`] so a URL is
//! requested at most once per run, and files already on disk are reused across runs.

pub mod document;
pub mod fetcher;
pub mod registry;
pub mod scripts;
pub mod site;
pub mod styles;
pub mod urls;

#[cfg(test)]
pub(crate) mod testing;

pub use document::{HtmlDocument, StartTag, TagId};
pub use fetcher::{FetchError, FetchOutcome, Fetcher, HttpTransport, Transport};
pub use registry::{CdnProvider, PackageReference, RegistryError};
pub use site::{MirrorOptions, SiteMirror};
pub use styles::{StylesheetRewrite, rewrite_stylesheet};

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod cli;
pub mod compress;
pub mod concat;
pub mod config;
pub mod logging;
pub mod mirror;
pub mod models;
pub mod paths;

pub use compress::{CompressOptions, compress_to_size};
pub use concat::{ConcatOptions, concatenate};
pub use config::ToolkitConfig;
pub use mirror::{MirrorOptions, SiteMirror};
pub use models::{CompressionOutcome, ConcatSummary, MirrorReport};

//! Command line interface for the `site-tools` binary.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::compress::{CompressOptions, compress_to_size};
use crate::concat::{ConcatOptions, concatenate};
use crate::config::ToolkitConfig;
use crate::mirror::{MirrorOptions, SiteMirror};

/// Top-level CLI. Flags override values from the configuration file.
#[derive(Debug, Parser)]
#[command(name = "site-tools", version)]
#[command(about = "Merge sources into Markdown, mirror a page's assets offline, compress images", long_about = None)]
pub struct Cli {
    /// Configuration file; defaults to `site-tools.config.json` in the working directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the run summary as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Tool to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available tools.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Merge matching source files into one Markdown document.
    Concat(ConcatArgs),
    /// Download a page's external assets and point the page at the local copies.
    Mirror(MirrorArgs),
    /// Resize an image and lower JPEG quality until it fits a size budget.
    Compress(CompressArgs),
}

/// Flags of the `concat` subcommand.
#[derive(Debug, Args)]
pub struct ConcatArgs {
    /// Directory to walk.
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Name of the generated document.
    #[arg(short, long)]
    pub output: Option<String>,
    /// Extension to include; repeat for several.
    #[arg(short, long = "ext")]
    pub extensions: Vec<String>,
    /// Maximum lines kept per file.
    #[arg(long)]
    pub line_limit: Option<usize>,
    /// Directory name to skip; repeat for several.
    #[arg(long = "exclude-dir")]
    pub excluded_dirs: Vec<String>,
    /// File name to skip; repeat for several.
    #[arg(long = "exclude-file")]
    pub excluded_files: Vec<String>,
}

impl ConcatArgs {
    fn apply(self, options: &mut ConcatOptions) {
        if let Some(root) = self.root {
            options.root = root;
        }
        if let Some(output) = self.output {
            options.output_file = output;
        }
        if let Some(line_limit) = self.line_limit {
            options.line_limit = line_limit;
        }
        if !self.extensions.is_empty() {
            options.extensions = self.extensions;
        }
        if !self.excluded_dirs.is_empty() {
            options.excluded_dirs = self.excluded_dirs;
        }
        if !self.excluded_files.is_empty() {
            options.excluded_files = self.excluded_files;
        }
    }
}

/// Flags of the `mirror` subcommand.
#[derive(Debug, Args)]
pub struct MirrorArgs {
    /// HTML document to process.
    pub input: Option<PathBuf>,
    /// Mirror root; the rewritten document is written here.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Package whose loader configuration triggers a whole-package download.
    #[arg(long)]
    pub package: Option<String>,
    /// Nesting bound for script sub-resource discovery.
    #[arg(long)]
    pub max_depth: Option<usize>,
    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl MirrorArgs {
    fn apply(self, options: &mut MirrorOptions) {
        if let Some(input) = self.input {
            options.input_html = input;
        }
        if let Some(output_dir) = self.output_dir {
            options.output_dir = output_dir;
        }
        if let Some(package) = self.package {
            options.package_name = package;
        }
        if let Some(max_depth) = self.max_depth {
            options.max_script_depth = max_depth;
        }
        if let Some(timeout) = self.timeout {
            options.request_timeout_secs = timeout;
        }
    }
}

/// Flags of the `compress` subcommand.
#[derive(Debug, Args)]
pub struct CompressArgs {
    /// Image to compress.
    pub input: Option<PathBuf>,
    /// JPEG file to write.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Size budget in KiB.
    #[arg(short, long)]
    pub target_kb: Option<u64>,
    /// Output width in pixels.
    #[arg(long)]
    pub width: Option<u32>,
    /// Output height in pixels.
    #[arg(long)]
    pub height: Option<u32>,
    /// Write a noisy sample image to the input path when it does not exist.
    #[arg(long)]
    pub sample_if_missing: bool,
}

impl CompressArgs {
    fn apply(self, options: &mut CompressOptions) {
        if let Some(input) = self.input {
            options.input = input;
        }
        if let Some(output) = self.output {
            options.output = output;
        }
        if let Some(target_kb) = self.target_kb {
            options.target_kb = target_kb;
        }
        if let Some(width) = self.width {
            options.width = width;
        }
        if let Some(height) = self.height {
            options.height = height;
        }
        if self.sample_if_missing {
            options.sample_if_missing = true;
        }
    }
}

impl Cli {
    /// Resolve configuration and run the selected tool, printing its summary to stdout.
    pub fn run(self) -> Result<()> {
        let working_dir = env::current_dir().context("failed to resolve working directory")?;
        let mut config = ToolkitConfig::load(self.config.as_deref(), &working_dir)?;
        tracing::debug!(?config, "loaded configuration");

        match self.command {
            Command::Concat(args) => {
                args.apply(&mut config.concat);
                let summary = concatenate(&config.concat)?;
                print_summary(&summary, self.json)
            }
            Command::Mirror(args) => {
                args.apply(&mut config.mirror);
                let report = SiteMirror::from_options(config.mirror)?.run()?;
                print_summary(&report, self.json)
            }
            Command::Compress(args) => {
                args.apply(&mut config.compress);
                let outcome = compress_to_size(&config.compress)?;
                print_summary(&outcome, self.json)
            }
        }
    }
}

fn print_summary<T: Serialize + std::fmt::Display>(summary: &T, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(summary).context("failed to serialise summary")?;
        println!("{rendered}");
    } else {
        println!("{summary}");
    }
    Ok(())
}

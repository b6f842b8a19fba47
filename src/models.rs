//! Summaries returned by each tool once a run completes.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Outcome of concatenating source files into a Markdown document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConcatSummary {
  /// Document that was written, or `None` when no matching files were found.
  pub output_path: Option<PathBuf>,
  /// Files included in the document, in output order.
  pub files: Vec<PathBuf>,
  /// Files whose content was cut at the line limit.
  pub truncated: Vec<PathBuf>,
  /// Files that matched but could not be read.
  pub skipped: Vec<PathBuf>,
}

impl fmt::Display for ConcatSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.output_path {
      Some(path) => write!(
        f,
        "merged {} file(s) into {} ({} truncated, {} unreadable)",
        self.files.len(),
        path.display(),
        self.truncated.len(),
        self.skipped.len()
      ),
      None => write!(f, "no matching files found"),
    }
  }
}

/// Outcome of mirroring the external assets of an HTML document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorReport {
  /// Rewritten HTML document.
  pub output_path: PathBuf,
  /// `link`/`script` references now pointing at local copies.
  pub rewritten: usize,
  /// References left alone because they are local or inline data.
  pub skipped: usize,
  /// References whose resource could not be downloaded.
  pub failed: usize,
  /// Packages mirrored in full, as `name@version`.
  pub packages: Vec<String>,
}

impl fmt::Display for MirrorReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "wrote {}: {} rewritten, {} skipped, {} failed",
      self.output_path.display(),
      self.rewritten,
      self.skipped,
      self.failed
    )?;
    if !self.packages.is_empty() {
      write!(f, "; packages: {}", self.packages.join(", "))?;
    }
    Ok(())
  }
}

/// Outcome of compressing an image towards a target size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressionOutcome {
  /// Written JPEG file.
  pub output: PathBuf,
  /// JPEG quality of the written encoding.
  pub quality: u8,
  /// Size of the written file in bytes.
  pub size_bytes: u64,
  /// Whether the size target was reached.
  pub met_target: bool,
  /// Output width in pixels.
  pub width: u32,
  /// Output height in pixels.
  pub height: u32,
}

impl fmt::Display for CompressionOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "saved {} at {}x{}, quality {}, {:.2} KB",
      self.output.display(),
      self.width,
      self.height,
      self.quality,
      self.size_bytes as f64 / 1024.0
    )?;
    if !self.met_target {
      write!(f, " (target not reached)")?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn summaries_render_for_humans_and_json() {
    let report = MirrorReport {
      output_path: PathBuf::from("out/index.html"),
      rewritten: 2,
      skipped: 1,
      failed: 0,
      packages: vec!["monaco-editor@0.45.0".into()],
    };
    assert_eq!(
      report.to_string(),
      "wrote out/index.html: 2 rewritten, 1 skipped, 0 failed; packages: monaco-editor@0.45.0"
    );

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["packages"][0], "monaco-editor@0.45.0");

    assert_eq!(ConcatSummary::default().to_string(), "no matching files found");

    let outcome = CompressionOutcome {
      output: PathBuf::from("img4.jpg"),
      quality: 10,
      size_bytes: 2048,
      met_target: false,
      width: 1280,
      height: 720,
    };
    assert_eq!(
      outcome.to_string(),
      "saved img4.jpg at 1280x720, quality 10, 2.00 KB (target not reached)"
    );
  }
}

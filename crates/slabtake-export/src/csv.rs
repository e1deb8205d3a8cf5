//! Tabular metrics export.
//!
//! One header line followed by one row per accepted candidate:
//!
//! ```text
//! contour_index,area_sqft,perimeter_lf,vertex_count,sanity_score,flagged
//! 0,50.00,30.00,4,0.06,False
//! ```
//!
//! Floats are rounded to two decimals; an infinite sanity score is
//! written as `inf`. The flag is written as `True`/`False`.
//!
//! [`to_csv`] is a pure function returning a `String`;
//! [`write_metrics_csv`] is the only part of this crate that touches the
//! filesystem.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use slabtake_pipeline::CandidateMetrics;

/// Column names, in output order.
pub const HEADER: [&str; 6] = [
    "contour_index",
    "area_sqft",
    "perimeter_lf",
    "vertex_count",
    "sanity_score",
    "flagged",
];

/// Errors from writing export artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Creating a directory or writing the file failed.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Path being created or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Serialize metrics as CSV text, header first.
///
/// # Examples
///
/// ```
/// use slabtake_export::to_csv;
/// use slabtake_pipeline::CandidateMetrics;
///
/// let rows = [CandidateMetrics {
///     contour_index: 0,
///     area_sqft: 50.0,
///     perimeter_lf: 30.0,
///     vertex_count: 4,
///     sanity_score: 0.06,
///     flagged: false,
/// }];
/// let csv = to_csv(&rows);
/// assert_eq!(csv.lines().nth(1), Some("0,50.00,30.00,4,0.06,False"));
/// ```
#[must_use]
pub fn to_csv(metrics: &[CandidateMetrics]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", HEADER.join(","));
    for m in metrics {
        let _ = writeln!(
            out,
            "{},{:.2},{:.2},{},{:.2},{}",
            m.contour_index,
            m.area_sqft,
            m.perimeter_lf,
            m.vertex_count,
            m.sanity_score,
            if m.flagged { "True" } else { "False" },
        );
    }
    out
}

/// Write metrics CSV to `path`, creating parent directories and
/// overwriting any existing file.
///
/// # Errors
///
/// Returns [`ExportError::Io`] if a directory cannot be created or the
/// file cannot be written.
pub fn write_metrics_csv(metrics: &[CandidateMetrics], path: &Path) -> Result<(), ExportError> {
    write_creating_parents(path, &to_csv(metrics))?;
    tracing::debug!(path = %path.display(), rows = metrics.len(), "wrote metrics csv");
    Ok(())
}

/// Write `contents` to `path`, creating missing parent directories and
/// replacing any existing file.
pub(crate) fn write_creating_parents(path: &Path, contents: &str) -> Result<(), ExportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

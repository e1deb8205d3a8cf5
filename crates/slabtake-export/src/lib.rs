//! slabtake-export: Takeoff result serializers
//!
//! Converts accepted candidates into output artifacts: a CSV metrics
//! table and an SVG review overlay. Serializers are pure and return
//! `String`s; [`write_metrics_csv`] and [`write_svg`] write them to disk,
//! creating missing parent directories.

pub mod csv;
pub mod svg;

pub use csv::{ExportError, HEADER, to_csv, write_metrics_csv};
pub use svg::{SvgMetadata, build_path_data, to_svg, write_svg};

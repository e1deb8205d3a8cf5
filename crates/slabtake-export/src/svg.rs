//! SVG overlay export.
//!
//! Renders accepted candidate polygons as closed `<path>` elements in
//! page pixel coordinates using the [`svg`] crate for document
//! construction, XML escaping, and path data formatting. The overlay can
//! be laid over the source page in any viewer for review.
//!
//! Flagged candidates are stroked in [`FLAGGED_STROKE`], the rest in
//! [`ACCEPTED_STROKE`]. Every path carries its `contour_index` and
//! measurements as `data-*` attributes.
//!
//! Optional [`SvgMetadata`] embeds `<title>`, `<desc>` and the pipeline
//! configuration JSON.
//!
//! [`to_svg`] is a pure function returning a `String`; [`write_svg`]
//! renders and writes it.

use std::path::Path;

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Path as SvgPath, Title};
use svg::node::{Node, Text, Value};

use slabtake_pipeline::{CandidateMetrics, Dimensions, Polygon};

use crate::csv::{ExportError, write_creating_parents};

/// Stroke color for accepted, unflagged candidates.
pub const ACCEPTED_STROKE: &str = "#1f77b4";

/// Stroke color for candidates whose sanity score exceeded the threshold.
pub const FLAGGED_STROKE: &str = "#d62728";

/// Metadata to embed in the SVG document.
///
/// All fields are optional. When present, a `<title>` and/or `<desc>`
/// element is emitted immediately after the opening `<svg>` tag.
///
/// Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source page filename.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized `PipelineConfig`, emitted inside `<metadata>` wrapped
    /// in a namespaced `<slabtake:pipeline>` element.
    pub config_json: Option<&'a str>,
}

/// Build a closed SVG path `d` attribute from a polygon.
///
/// # Examples
///
/// ```
/// use slabtake_pipeline::{Point, Polygon};
/// use slabtake_export::build_path_data;
///
/// let polygon = Polygon::try_new(vec![
///     Point::new(0.0, 0.0),
///     Point::new(10.0, 0.0),
///     Point::new(10.0, 5.5),
/// ])
/// .unwrap();
/// assert_eq!(build_path_data(&polygon), "M0,0 L10,0 L10,5.5 z");
/// ```
#[must_use]
pub fn build_path_data(polygon: &Polygon) -> String {
    let vertices = polygon.vertices();
    let Some((first, rest)) = vertices.split_first() else {
        return String::new();
    };
    let mut data = Data::new().move_to((first.x, first.y));
    for p in rest {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data.close()))
}

/// Serialize accepted candidates into an SVG overlay string.
///
/// `polygons` and `metrics` are index-aligned, as in
/// [`PipelineResult`](slabtake_pipeline::PipelineResult). Extra entries
/// on either side are ignored.
///
/// # Examples
///
/// ```
/// use slabtake_export::{SvgMetadata, to_svg};
/// use slabtake_pipeline::Dimensions;
///
/// let dims = Dimensions { width: 800, height: 600 };
/// let metadata = SvgMetadata {
///     title: Some("A-101"),
///     ..SvgMetadata::default()
/// };
/// let svg = to_svg(&[], &[], dims, &metadata);
/// assert!(svg.contains("<title>A-101</title>"));
/// assert!(svg.contains(r#"viewBox="0 0 800 600""#));
/// ```
#[must_use]
pub fn to_svg(
    polygons: &[Polygon],
    metrics: &[CandidateMetrics],
    dimensions: Dimensions,
    metadata: &SvgMetadata<'_>,
) -> String {
    let w = dimensions.width;
    let h = dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut pipeline_el = Element::new("slabtake:pipeline");
        pipeline_el.assign("xmlns:slabtake", "urn:slabtake:pipeline:1");
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    for (polygon, m) in polygons.iter().zip(metrics) {
        let stroke = if m.flagged {
            FLAGGED_STROKE
        } else {
            ACCEPTED_STROKE
        };
        let path = SvgPath::new()
            .set("d", build_path_data(polygon))
            .set("fill", "none")
            .set("stroke", stroke)
            .set("stroke-width", 2)
            .set("data-contour-index", m.contour_index.to_string())
            .set("data-area-sqft", format!("{:.2}", m.area_sqft))
            .set("data-perimeter-lf", format!("{:.2}", m.perimeter_lf))
            .set("data-flagged", m.flagged.to_string());
        doc = doc.add(path);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

/// Render the overlay and write it to `path`, creating parent
/// directories and overwriting any existing file.
///
/// # Errors
///
/// Returns [`ExportError::Io`] if a directory cannot be created or the
/// file cannot be written.
pub fn write_svg(
    polygons: &[Polygon],
    metrics: &[CandidateMetrics],
    dimensions: Dimensions,
    metadata: &SvgMetadata<'_>,
    path: &Path,
) -> Result<(), ExportError> {
    let svg = to_svg(polygons, metrics, dimensions, metadata);
    write_creating_parents(path, &svg)?;
    tracing::debug!(path = %path.display(), bytes = svg.len(), "wrote svg overlay");
    Ok(())
}

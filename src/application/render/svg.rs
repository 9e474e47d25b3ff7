//! SVG composition of map and description pages.
//!
//! Output is plain text built in a fixed order so identical inputs produce
//! identical documents. Coordinates are written with two decimals.

use std::fmt::Write as _;

use serde_json::Value;

use crate::domain::{
    content::{Feature, FeatureCollection, Geometry, MapContent, Position},
    geo::{PageSize, Viewport},
    grid::LabelPosition,
    scalebar::Scalebar,
};

use super::{
    background::BackgroundImage,
    layers::{FeatureStyle, draw_order, sanitize_color},
};

pub const ATTRIBUTION: &str = "Tiles © OpenStreetMap contributors, CC-BY-SA";
pub const BASE_FILL: &str = "#f2efe9";

const FONT_FAMILY: &str = "DejaVu Sans, Arial, sans-serif";
const GRID_BAR_PX: f64 = 24.0;
const GRID_FONT_PX: f64 = 16.0;
const CORNER_PX: f64 = 24.0;
const SCALEBAR_PX: f64 = 8.0;
const LEGEND_MARGIN_PX: f64 = 40.0;
const LEGEND_LINE_PX: f64 = 22.0;
const DESCRIPTION_MARGIN_PX: f64 = 80.0;
const DESCRIPTION_LINE_PX: f64 = 24.0;
const DESCRIPTION_WRAP: usize = 110;

/// Everything drawn on the map page.
pub struct MapPage<'a> {
    pub content: &'a MapContent,
    pub grid: &'a FeatureCollection,
    pub scalebar: &'a Scalebar,
    pub viewport: Viewport,
    pub background: Option<&'a BackgroundImage>,
}

impl MapPage<'_> {
    /// Layers bottom to top: background, grid, scale bar, features, legend.
    pub fn to_svg(&self) -> String {
        let page = self.viewport.page;
        let mut svg = open_document(page);

        self.write_background(&mut svg);
        self.write_grid(&mut svg);
        self.write_scalebar(&mut svg);
        self.write_features(&mut svg);
        self.write_legend(&mut svg);

        svg.push_str("</svg>\n");
        svg
    }

    fn write_background(&self, svg: &mut String) {
        let page = self.viewport.page;
        let _ = writeln!(
            svg,
            r#"<g id="background"><rect x="0" y="0" width="{}" height="{}" fill="{BASE_FILL}"/>"#,
            page.width, page.height
        );
        if let Some(image) = self.background {
            let _ = writeln!(
                svg,
                r#"<image x="0" y="0" width="{}" height="{}" preserveAspectRatio="none" xlink:href="{}"/>"#,
                page.width,
                page.height,
                image.data_uri()
            );
        }
        svg.push_str("</g>\n");
    }

    fn write_grid(&self, svg: &mut String) {
        svg.push_str("<g id=\"grid\">\n");
        for feature in &self.grid.features {
            if feature.property_str("type") == Some("grid") {
                let style = FeatureStyle::from_properties(&feature.properties);
                let _ = writeln!(
                    svg,
                    r#"<path d="{}" fill="none" stroke="{}" stroke-opacity="{}" stroke-width="{}"/>"#,
                    self.path_data(&feature.geometry),
                    style.color,
                    fmt_num(style.opacity),
                    fmt_num(style.weight)
                );
            }
        }
        for feature in &self.grid.features {
            if let Some(position) = feature.property_str("pos").and_then(LabelPosition::parse) {
                self.write_grid_label(svg, feature, position);
            } else if feature.property_str("type") == Some("corner") {
                self.write_corner(svg, feature);
            }
        }
        svg.push_str("</g>\n");
    }

    fn write_grid_label(&self, svg: &mut String, feature: &Feature, position: LabelPosition) {
        let Geometry::LineString { coordinates } = &feature.geometry else {
            return;
        };
        let [from, to] = match coordinates.as_slice() {
            [from, to] => [*from, *to],
            _ => return,
        };
        let (x0, y0) = self.viewport.project(from.as_tuple());
        let (x1, y1) = self.viewport.project(to.as_tuple());
        let color =
            sanitize_color(feature.property_str("color")).unwrap_or_else(|| "#000000".into());
        let label_color =
            sanitize_color(feature.property_str("labelColor")).unwrap_or_else(|| "#ffffff".into());
        let text = match feature.properties.get("label") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Number(number)) => number.to_string(),
            _ => String::new(),
        };

        // Bars sit inside the bbox edge they label.
        let half = GRID_BAR_PX / 2.0;
        let (dx, dy) = match position {
            LabelPosition::Top => (0.0, half),
            LabelPosition::Bottom => (0.0, -half),
            LabelPosition::Left => (half, 0.0),
            LabelPosition::Right => (-half, 0.0),
        };
        let _ = writeln!(
            svg,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{color}" stroke-width="{}"/>"#,
            fmt_num(x0 + dx),
            fmt_num(y0 + dy),
            fmt_num(x1 + dx),
            fmt_num(y1 + dy),
            fmt_num(GRID_BAR_PX)
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" fill="{label_color}" font-family="{FONT_FAMILY}" font-size="{}" font-weight="bold" text-anchor="middle" dominant-baseline="central">{}</text>"#,
            fmt_num((x0 + x1) / 2.0 + dx),
            fmt_num((y0 + y1) / 2.0 + dy),
            fmt_num(GRID_FONT_PX),
            escape_xml(&text)
        );
    }

    fn write_corner(&self, svg: &mut String, feature: &Feature) {
        let Geometry::Point { coordinates } = &feature.geometry else {
            return;
        };
        let (x, y) = self.viewport.project(coordinates.as_tuple());
        let color =
            sanitize_color(feature.property_str("color")).unwrap_or_else(|| "#000000".into());
        let _ = writeln!(
            svg,
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{color}"/>"#,
            fmt_num(x - CORNER_PX / 2.0),
            fmt_num(y - CORNER_PX / 2.0),
            fmt_num(CORNER_PX),
            fmt_num(CORNER_PX)
        );
    }

    fn write_scalebar(&self, svg: &mut String) {
        let bar = self.scalebar;
        svg.push_str("<g id=\"scalebar\">\n");
        let (sx, sy) = self.viewport.project(bar.start.as_tuple());
        let (ex, ey) = self.viewport.project(bar.end.as_tuple());
        let _ = writeln!(
            svg,
            r##"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="#000000" stroke-width="{}"/>"##,
            fmt_num(sx),
            fmt_num(sy),
            fmt_num(ex),
            fmt_num(ey),
            fmt_num(SCALEBAR_PX + 2.0)
        );
        for segment in &bar.segments {
            let (x0, y0) = self.viewport.project(segment.from.as_tuple());
            let (x1, y1) = self.viewport.project(segment.to.as_tuple());
            let _ = writeln!(
                svg,
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{}"/>"#,
                fmt_num(x0),
                fmt_num(y0),
                fmt_num(x1),
                fmt_num(y1),
                segment.color,
                fmt_num(SCALEBAR_PX)
            );
        }
        for (x, y, text) in [(sx, sy, &bar.start_label), (ex, ey, &bar.end_label)] {
            let _ = writeln!(
                svg,
                r##"<text x="{}" y="{}" fill="#000000" font-family="{FONT_FAMILY}" font-size="{}" text-anchor="middle">{}</text>"##,
                fmt_num(x),
                fmt_num(y - SCALEBAR_PX),
                fmt_num(GRID_FONT_PX),
                escape_xml(text)
            );
        }
        svg.push_str("</g>\n");
    }

    fn write_features(&self, svg: &mut String) {
        svg.push_str("<g id=\"features\">\n");
        for feature in draw_order(&self.content.features) {
            let style = FeatureStyle::from_properties(&feature.properties);
            self.write_geometry(svg, &feature.geometry, &style);
            if let (Some(label), Some(anchor)) = (&style.label, first_position(&feature.geometry))
            {
                let (x, y) = self.viewport.project(anchor.as_tuple());
                let _ = writeln!(
                    svg,
                    r##"<text x="{}" y="{}" fill="#000000" stroke="#ffffff" stroke-width="3" paint-order="stroke" font-family="{FONT_FAMILY}" font-size="{}">{}</text>"##,
                    fmt_num(x + 12.0),
                    fmt_num(y - 12.0),
                    fmt_num(GRID_FONT_PX),
                    escape_xml(label)
                );
            }
        }
        svg.push_str("</g>\n");
    }

    fn write_geometry(&self, svg: &mut String, geometry: &Geometry, style: &FeatureStyle) {
        let dash = style
            .dash_array
            .as_deref()
            .map(|dash| format!(r#" stroke-dasharray="{dash}""#))
            .unwrap_or_default();

        match geometry {
            Geometry::Polygon { .. } | Geometry::MultiPolygon { .. } => {
                let _ = writeln!(
                    svg,
                    r#"<path d="{}" fill="{}" fill-opacity="{}" fill-rule="evenodd" stroke="{}" stroke-opacity="{}" stroke-width="{}" stroke-linejoin="round"{dash}/>"#,
                    self.path_data(geometry),
                    style.fill_color,
                    fmt_num(style.fill_opacity),
                    style.color,
                    fmt_num(style.opacity),
                    fmt_num(style.weight)
                );
            }
            Geometry::LineString { .. } | Geometry::MultiLineString { .. } => {
                let _ = writeln!(
                    svg,
                    r#"<path d="{}" fill="none" stroke="{}" stroke-opacity="{}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round"{dash}/>"#,
                    self.path_data(geometry),
                    style.color,
                    fmt_num(style.opacity),
                    fmt_num(style.weight)
                );
            }
            Geometry::Point { coordinates } => self.write_marker(svg, *coordinates, style),
            Geometry::MultiPoint { coordinates } => {
                for position in coordinates {
                    self.write_marker(svg, *position, style);
                }
            }
            Geometry::GeometryCollection { geometries } => {
                for geometry in geometries {
                    self.write_geometry(svg, geometry, style);
                }
            }
        }
    }

    /// Pin symbol drawn on a 150 px canvas, tip at the position.
    fn write_marker(&self, svg: &mut String, position: Position, style: &FeatureStyle) {
        let (x, y) = self.viewport.project(position.as_tuple());
        let _ = writeln!(
            svg,
            r##"<g transform="translate({} {}) scale({})"><path d="M0 0 L-45 -80 A60 60 0 1 1 45 -80 Z" fill="{}" stroke="#ffffff" stroke-width="8"/><circle cx="0" cy="-105" r="22" fill="#ffffff"/></g>"##,
            fmt_num(x),
            fmt_num(y),
            fmt_scale(style.icon_scale),
            style.icon_color
        );
    }

    fn write_legend(&self, svg: &mut String) {
        let page = self.viewport.page;
        let content = self.content;

        let mut lines: Vec<(String, bool)> = vec![(content.name.clone(), true)];
        let when_where = [content.place.clone(), content.legend_date()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if !when_where.is_empty() {
            lines.push((when_where, false));
        }
        for (key, value) in &content.attributes {
            lines.push((format!("{key}: {value}"), false));
        }

        let longest = lines
            .iter()
            .map(|(text, _)| text.chars().count())
            .max()
            .unwrap_or(0);
        let box_width = (longest as f64 * 9.5 + 32.0).min(f64::from(page.width) / 2.0);
        let box_height = lines.len() as f64 * LEGEND_LINE_PX + 24.0;
        let box_x = LEGEND_MARGIN_PX;
        let box_y = f64::from(page.height) - LEGEND_MARGIN_PX - box_height;

        svg.push_str("<g id=\"legend\">\n");
        let _ = writeln!(
            svg,
            r##"<rect x="{}" y="{}" width="{}" height="{}" fill="#ffffff" fill-opacity="0.85" stroke="#000000" stroke-width="1"/>"##,
            fmt_num(box_x),
            fmt_num(box_y),
            fmt_num(box_width),
            fmt_num(box_height)
        );
        for (index, (text, bold)) in lines.iter().enumerate() {
            let weight = if *bold { "bold" } else { "normal" };
            let _ = writeln!(
                svg,
                r##"<text x="{}" y="{}" fill="#000000" font-family="{FONT_FAMILY}" font-size="16" font-weight="{weight}">{}</text>"##,
                fmt_num(box_x + 16.0),
                fmt_num(box_y + 28.0 + index as f64 * LEGEND_LINE_PX),
                escape_xml(text)
            );
        }
        let _ = writeln!(
            svg,
            r##"<text x="{}" y="{}" fill="#000000" font-family="{FONT_FAMILY}" font-size="12" text-anchor="end">{}</text>"##,
            fmt_num(f64::from(page.width) - 12.0),
            fmt_num(f64::from(page.height) - 12.0),
            escape_xml(ATTRIBUTION)
        );
        svg.push_str("</g>\n");
    }

    fn path_data(&self, geometry: &Geometry) -> String {
        let mut data = String::new();
        match geometry {
            Geometry::LineString { coordinates } => self.push_ring(&mut data, coordinates, false),
            Geometry::MultiLineString { coordinates } => {
                for line in coordinates {
                    self.push_ring(&mut data, line, false);
                }
            }
            Geometry::Polygon { coordinates } => {
                for ring in coordinates {
                    self.push_ring(&mut data, ring, true);
                }
            }
            Geometry::MultiPolygon { coordinates } => {
                for polygon in coordinates {
                    for ring in polygon {
                        self.push_ring(&mut data, ring, true);
                    }
                }
            }
            Geometry::Point { .. }
            | Geometry::MultiPoint { .. }
            | Geometry::GeometryCollection { .. } => {}
        }
        data.trim_end().to_string()
    }

    fn push_ring(&self, data: &mut String, positions: &[Position], close: bool) {
        for (index, position) in positions.iter().enumerate() {
            let (x, y) = self.viewport.project(position.as_tuple());
            let command = if index == 0 { 'M' } else { 'L' };
            let _ = write!(data, "{command}{} {} ", fmt_num(x), fmt_num(y));
        }
        if close && !positions.is_empty() {
            data.push_str("Z ");
        }
    }
}

/// Second PDF page: the free-text description rotated by 270°.
pub fn description_page(description: &str, page: PageSize) -> String {
    let mut svg = open_document(page);
    let width = f64::from(page.width);
    let height = f64::from(page.height);

    // Local frame of the rotated block has the page's sides swapped.
    let _ = writeln!(
        svg,
        r##"<rect x="0" y="0" width="{}" height="{}" fill="#ffffff"/>"##,
        page.width, page.height
    );
    let _ = writeln!(
        svg,
        r#"<g transform="translate({} {}) rotate(270) translate({} {})">"#,
        fmt_num(width / 2.0),
        fmt_num(height / 2.0),
        fmt_num(-height / 2.0),
        fmt_num(-width / 2.0)
    );
    let _ = writeln!(
        svg,
        r##"<text x="{}" y="{}" fill="#000000" font-family="{FONT_FAMILY}" font-size="16">"##,
        fmt_num(DESCRIPTION_MARGIN_PX),
        fmt_num(DESCRIPTION_MARGIN_PX)
    );
    for (index, line) in wrap_text(description, DESCRIPTION_WRAP).iter().enumerate() {
        let dy = if index == 0 { 0.0 } else { DESCRIPTION_LINE_PX };
        let _ = writeln!(
            svg,
            r#"<tspan x="{}" dy="{}">{}</tspan>"#,
            fmt_num(DESCRIPTION_MARGIN_PX),
            fmt_num(dy),
            escape_xml(line)
        );
    }
    svg.push_str("</text>\n</g>\n</svg>\n");
    svg
}

fn open_document(page: PageSize) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
        w = page.width,
        h = page.height
    )
}

fn first_position(geometry: &Geometry) -> Option<Position> {
    match geometry {
        Geometry::Point { coordinates } => Some(*coordinates),
        Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
            coordinates.first().copied()
        }
        Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
            coordinates.first().and_then(|line| line.first()).copied()
        }
        Geometry::MultiPolygon { coordinates } => coordinates
            .first()
            .and_then(|polygon| polygon.first())
            .and_then(|ring| ring.first())
            .copied(),
        Geometry::GeometryCollection { geometries } => {
            geometries.iter().find_map(first_position)
        }
    }
}

/// Greedy word wrap; explicit newlines are kept, blank lines included.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}

pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            ch if ch.is_control() && ch != '\n' && ch != '\t' => {}
            ch => escaped.push(ch),
        }
    }
    escaped
}

fn fmt_num(value: f64) -> String {
    let rounded = format!("{value:.2}");
    match rounded.as_str() {
        "-0.00" => "0.00".to_string(),
        _ => rounded,
    }
}

fn fmt_scale(value: f64) -> String {
    format!("{value:.4}")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::{
        geo::BBox,
        grid::{Grid, GridCells, GridStyle},
    };

    fn content() -> MapContent {
        MapContent::from_value(&json!({
            "name": "Demo <Aktion>",
            "bbox": [13.3, 52.5, 13.4, 52.55],
            "place": "Berlin",
            "datetime": "2018-04-01T12:30",
            "attributes": [["Treffpunkt", "Bahnhof"]],
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [13.35, 52.52]}, "properties": {"iconColor": "#00ff00", "label": "Start"}},
                {"type": "Feature", "geometry": {"type": "Polygon", "coordinates": [[[13.31, 52.51], [13.32, 52.51], [13.32, 52.52], [13.31, 52.51]]]}, "properties": {"fillColor": "#0000ff"}}
            ],
            "description": "Line one\nLine two"
        }))
        .expect("content")
    }

    fn render(content: &MapContent, background: Option<&BackgroundImage>) -> String {
        let page = PageSize::for_bbox(&content.bbox);
        let viewport = Viewport::fit(&content.bbox, page);
        let grid =
            Grid::generate(content.bbox, GridCells::for_bbox(&content.bbox), GridStyle::Red)
                .to_feature_collection();
        let scalebar = Scalebar::for_viewport(&content.bbox, &viewport);
        MapPage {
            content,
            grid: &grid,
            scalebar: &scalebar,
            viewport,
            background,
        }
        .to_svg()
    }

    #[test]
    fn layers_are_stacked_in_order() {
        let svg = render(&content(), None);

        let positions: Vec<usize> = [
            "id=\"background\"",
            "id=\"grid\"",
            "id=\"scalebar\"",
            "id=\"features\"",
            "id=\"legend\"",
        ]
        .iter()
        .map(|marker| svg.find(marker).expect(marker))
        .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(svg.starts_with("<?xml"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains(r#"width="1754" height="1240""#));
    }

    #[test]
    fn areas_are_drawn_before_points() {
        let svg = render(&content(), None);
        let area = svg.find("fill=\"#0000ff\"").expect("area");
        let marker = svg.find("fill=\"#00ff00\"").expect("marker");
        assert!(area < marker);
    }

    #[test]
    fn legend_contains_metadata_and_attribution() {
        let svg = render(&content(), None);
        assert!(svg.contains("Demo &lt;Aktion&gt;"));
        assert!(svg.contains("Berlin, 01.04.2018 12:30"));
        assert!(svg.contains("Treffpunkt: Bahnhof"));
        assert!(svg.contains(ATTRIBUTION));
    }

    #[test]
    fn background_image_is_embedded_as_data_uri() {
        let image = BackgroundImage::png(vec![1, 2, 3]);
        let svg = render(&content(), Some(&image));
        assert!(svg.contains("xlink:href=\"data:image/png;base64,AQID\""));

        let offline = render(&content(), None);
        assert!(!offline.contains("<image"));
        assert!(offline.contains(BASE_FILL));
    }

    #[test]
    fn composition_is_deterministic() {
        assert_eq!(render(&content(), None), render(&content(), None));
    }

    #[test]
    fn grid_labels_and_scalebar_are_drawn() {
        let svg = render(&content(), None);
        assert!(svg.contains(">A</text>"));
        assert!(svg.contains(">0</text>"));
        assert!(svg.contains(">1.0km</text>"));
    }

    #[test]
    fn description_page_rotates_text() {
        let page = PageSize::for_bbox(&BBox::new(13.3, 52.5, 13.4, 52.55).expect("bbox"));
        let svg = description_page("Line one\nLine <two>", page);
        assert!(svg.contains("rotate(270)"));
        assert!(svg.contains(">Line one</tspan>"));
        assert!(svg.contains(">Line &lt;two&gt;</tspan>"));
    }

    #[test]
    fn wraps_long_paragraphs() {
        let lines = wrap_text("aaa bbb ccc\n\nddd", 7);
        assert_eq!(lines, vec!["aaa bbb", "ccc", "", "ddd"]);
    }
}

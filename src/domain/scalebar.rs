//! Scale bar overlay with a rounded real-world length.

use serde_json::{Map, Value, json};

use super::{
    content::{Feature, FeatureCollection, Geometry, Position},
    geo::{BBox, Viewport, haversine_m, linspace, project_position},
};

/// Share of the rendered ground width the bar aims to cover.
pub const TARGET_SHARE: f64 = 0.1;
/// Inward padding of the bar end from the top-right corner, per axis.
pub const EDGE_PADDING: f64 = 0.03;
pub const SEGMENTS: usize = 5;

const WEST: f64 = 270.0;
const COLORS: [&str; 2] = ["#000000", "#ffffff"];

/// Round a length in metres to a readable value.
///
/// Below 50 m everything becomes 50; otherwise the value is rounded to a
/// multiple of `5 * 10^k` with `k = floor(log10(x / 5))`.
pub fn nearest_n(x: f64) -> f64 {
    if x < 50.0 {
        return 50.0;
    }
    let exponent = (x / 5.0).log10().floor() as i32;
    let n = 5.0 * 10f64.powi(exponent);
    (x / n).round() * n
}

/// `"250m"` below one kilometre, `"1.5km"` above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{meters:.0}m")
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalebarSegment {
    pub from: Position,
    pub to: Position,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scalebar {
    /// Rounded bar length in metres.
    pub distance_m: f64,
    pub pixels_per_meter: f64,
    pub start: Position,
    pub end: Position,
    pub segments: Vec<ScalebarSegment>,
    pub start_label: String,
    pub end_label: String,
}

impl Scalebar {
    /// Scale bar for a map drawn through `viewport`.
    ///
    /// The viewport widens the bbox to fill the page, so the whole page
    /// width is the rendered extent the bar is measured against.
    pub fn for_viewport(bbox: &BBox, viewport: &Viewport) -> Self {
        let anchor_lat = anchor_lat(bbox);
        let ground_width = viewport.ground_width_m(anchor_lat);
        Self::build(bbox, anchor_lat, ground_width, f64::from(viewport.page.width))
    }

    /// Scale bar for a bbox rendered exactly `pixel_width` pixels wide.
    pub fn for_bbox(bbox: &BBox, pixel_width: f64) -> Self {
        let anchor_lat = anchor_lat(bbox);
        let ground_width = haversine_m((bbox.min_x, anchor_lat), (bbox.max_x, anchor_lat));
        Self::build(bbox, anchor_lat, ground_width, pixel_width)
    }

    fn build(bbox: &BBox, anchor_lat: f64, ground_width: f64, pixel_width: f64) -> Self {
        let pixels_per_meter = if ground_width > 0.0 {
            pixel_width / ground_width
        } else {
            0.0
        };
        let distance_m = nearest_n(TARGET_SHARE * ground_width);

        let end = (bbox.max_x - EDGE_PADDING * bbox.width(), anchor_lat);
        let mut start = project_position(end, WEST, distance_m);
        // Heading west past -180 lands on the positive side.
        if start.0 > end.0 {
            start.0 -= 360.0;
        }

        let lons = linspace(start.0, end.0, SEGMENTS + 1);
        let lats = linspace(start.1, end.1, SEGMENTS + 1);
        let segments = lons
            .windows(2)
            .zip(lats.windows(2))
            .enumerate()
            .map(|(i, (lon, lat))| ScalebarSegment {
                from: Position::new(lon[0], lat[0]),
                to: Position::new(lon[1], lat[1]),
                color: COLORS[i % 2],
            })
            .collect();

        Self {
            distance_m,
            pixels_per_meter,
            start: start.into(),
            end: end.into(),
            segments,
            start_label: "0".to_string(),
            end_label: format_distance(distance_m),
        }
    }

    /// Rendered bar length in pixels.
    pub fn length_px(&self) -> f64 {
        self.distance_m * self.pixels_per_meter
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        let mut features: Vec<Feature> = self
            .segments
            .iter()
            .map(|segment| {
                Feature::new(
                    Geometry::LineString {
                        coordinates: vec![segment.from, segment.to],
                    },
                    properties(json!({"type": "scalebar", "color": segment.color})),
                )
            })
            .collect();

        for (position, label, anchor) in [
            (self.start, &self.start_label, "start"),
            (self.end, &self.end_label, "end"),
        ] {
            features.push(Feature::new(
                Geometry::Point {
                    coordinates: position,
                },
                properties(json!({"type": "scalebar", "label": label, "anchor": anchor})),
            ));
        }

        FeatureCollection::new(features)
    }
}

fn anchor_lat(bbox: &BBox) -> f64 {
    bbox.max_y - EDGE_PADDING * bbox.height()
}

fn properties(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

//! Grid-reference overlay: mesh, border labels and corner ticks.
//!
//! Columns are lettered `A, B, …` from the west edge. Rows are numbered
//! from the segment count at the southern edge down to `1` at the top.

use std::{fmt, str::FromStr};

use serde_json::{Map, Value, json};

use super::{
    content::{Feature, FeatureCollection, Geometry, Position},
    error::DomainError,
    geo::{BBox, PageSize, linspace},
};

/// Maximum deviation of the bbox aspect ratio from the page ratio that still
/// selects a rectangular cell split.
pub const ORIENTATION_TOLERANCE: f64 = 0.1;

const MESH_COLOR: &str = "#999";
const MESH_OPACITY: f64 = 0.3;
const MESH_WEIGHT: f64 = 2.0;

/// Number of mesh lines along each axis (segments = lines - 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCells {
    pub x: usize,
    pub y: usize,
}

impl GridCells {
    pub const SQUARE: GridCells = GridCells { x: 5, y: 5 };
    pub const LANDSCAPE: GridCells = GridCells { x: 5, y: 3 };
    pub const PORTRAIT: GridCells = GridCells { x: 3, y: 5 };

    pub fn new(x: usize, y: usize) -> Result<Self, DomainError> {
        if !(2..=27).contains(&x) || !(2..=27).contains(&y) {
            return Err(DomainError::invalid_content(
                "grid cells must be between 2 and 27 per axis",
            ));
        }
        Ok(Self { x, y })
    }

    /// Pick the cell split for a bbox from its real-world aspect ratio.
    pub fn for_bbox(bbox: &BBox) -> Self {
        let (width, height) = bbox.extent_m();
        let page = PageSize::for_bbox(bbox);
        let ratio = height / width;

        if (ratio - page.aspect_ratio()).abs() <= ORIENTATION_TOLERANCE {
            if width >= height {
                Self::LANDSCAPE
            } else {
                Self::PORTRAIT
            }
        } else {
            Self::SQUARE
        }
    }
}

impl FromStr for GridCells {
    type Err = DomainError;

    /// Parse `CXxCY`, e.g. `5x3`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (x, y) = value
            .split_once(['x', 'X'])
            .ok_or_else(|| DomainError::invalid_content("cells must look like `5x3`"))?;
        let x = x
            .trim()
            .parse()
            .map_err(|_| DomainError::invalid_content("cells must be integers"))?;
        let y = y
            .trim()
            .parse()
            .map_err(|_| DomainError::invalid_content("cells must be integers"))?;
        Self::new(x, y)
    }
}

/// Colour scheme of the border labels: `(bar, label)` colours for even and
/// odd segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridStyle {
    #[default]
    Red,
    Green,
    Violet,
    Blue,
}

impl GridStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            GridStyle::Red => "red",
            GridStyle::Green => "green",
            GridStyle::Violet => "violet",
            GridStyle::Blue => "blue",
        }
    }

    fn colors(self, index: usize) -> (&'static str, &'static str) {
        let (even, odd) = match self {
            GridStyle::Red => (("#000000", "#ffffff"), ("#FF0000", "#000000")),
            GridStyle::Green => (("#000000", "#ffffff"), ("#00FF00", "#000000")),
            GridStyle::Violet => (("#000000", "#ffffff"), ("#8A2BE2", "#ffffff")),
            GridStyle::Blue => (("#ffffff", "#000000"), ("#00b1f0", "#ffffff")),
        };
        if index % 2 == 0 { even } else { odd }
    }
}

impl FromStr for GridStyle {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(GridStyle::Red),
            "green" => Ok(GridStyle::Green),
            "violet" => Ok(GridStyle::Violet),
            "blue" => Ok(GridStyle::Blue),
            other => Err(DomainError::invalid_content(format!(
                "unknown grid style `{other}`"
            ))),
        }
    }
}

/// Edge a border label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPosition {
    Top,
    Bottom,
    Left,
    Right,
}

impl LabelPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            LabelPosition::Top => "TOP",
            LabelPosition::Bottom => "BOTTOM",
            LabelPosition::Left => "LEFT",
            LabelPosition::Right => "RIGHT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TOP" => Some(LabelPosition::Top),
            "BOTTOM" => Some(LabelPosition::Bottom),
            "LEFT" => Some(LabelPosition::Left),
            "RIGHT" => Some(LabelPosition::Right),
            _ => None,
        }
    }
}

impl fmt::Display for LabelPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridLabel {
    pub text: String,
    pub position: LabelPosition,
    pub from: Position,
    pub to: Position,
    pub color: &'static str,
    pub label_color: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub bbox: BBox,
    pub cells: GridCells,
    pub style: GridStyle,
    /// Vertical lines first (west to east), then horizontal (south to north).
    pub mesh: Vec<[Position; 2]>,
    pub labels: Vec<GridLabel>,
    pub corners: [Position; 4],
}

impl Grid {
    pub fn generate(bbox: BBox, cells: GridCells, style: GridStyle) -> Self {
        let xs = linspace(bbox.min_x, bbox.max_x, cells.x);
        let ys = linspace(bbox.min_y, bbox.max_y, cells.y);
        let mut labels = Vec::with_capacity(2 * (xs.len() + ys.len()));

        for (i, pair) in xs.windows(2).enumerate() {
            let (start, end) = (pair[0], pair[1]);
            let (color, label_color) = style.colors(i);
            let text = column_label(i);
            labels.push(GridLabel {
                text: text.clone(),
                position: LabelPosition::Bottom,
                from: Position::new(start, bbox.min_y),
                to: Position::new(end, bbox.min_y),
                color,
                label_color,
            });
            labels.push(GridLabel {
                text,
                position: LabelPosition::Top,
                from: Position::new(start, bbox.max_y),
                to: Position::new(end, bbox.max_y),
                color,
                label_color,
            });
        }

        let segments = ys.len().saturating_sub(1);
        for (i, pair) in ys.windows(2).enumerate() {
            let (start, end) = (pair[0], pair[1]);
            let (color, label_color) = style.colors(i);
            let text = (segments - i).to_string();
            labels.push(GridLabel {
                text: text.clone(),
                position: LabelPosition::Left,
                from: Position::new(bbox.min_x, start),
                to: Position::new(bbox.min_x, end),
                color,
                label_color,
            });
            labels.push(GridLabel {
                text,
                position: LabelPosition::Right,
                from: Position::new(bbox.max_x, start),
                to: Position::new(bbox.max_x, end),
                color,
                label_color,
            });
        }

        let mesh = xs
            .iter()
            .map(|&x| [Position::new(x, bbox.min_y), Position::new(x, bbox.max_y)])
            .chain(
                ys.iter()
                    .map(|&y| [Position::new(bbox.min_x, y), Position::new(bbox.max_x, y)]),
            )
            .collect();

        let corners = [
            Position::new(bbox.min_x, bbox.min_y),
            Position::new(bbox.min_x, bbox.max_y),
            Position::new(bbox.max_x, bbox.min_y),
            Position::new(bbox.max_x, bbox.max_y),
        ];

        Self {
            bbox,
            cells,
            style,
            mesh,
            labels,
            corners,
        }
    }

    /// GeoJSON form embedded into render content documents.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let mut features = Vec::with_capacity(self.labels.len() + 5);

        for label in &self.labels {
            // Row numbers stay numeric in the document.
            let text = label
                .text
                .parse::<u64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::from(label.text.clone()));
            features.push(Feature::new(
                Geometry::LineString {
                    coordinates: vec![label.from, label.to],
                },
                properties(json!({
                    "label": text,
                    "pos": label.position.as_str(),
                    "color": label.color,
                    "labelColor": label.label_color,
                })),
            ));
        }

        features.push(Feature::new(
            Geometry::MultiLineString {
                coordinates: self.mesh.iter().map(|line| line.to_vec()).collect(),
            },
            properties(json!({
                "type": "grid",
                "color": MESH_COLOR,
                "opacity": MESH_OPACITY,
                "weight": MESH_WEIGHT,
            })),
        ));

        let (corner_color, _) = self.style.colors(0);
        for corner in self.corners {
            features.push(Feature::new(
                Geometry::Point { coordinates: corner },
                properties(json!({"type": "corner", "color": corner_color})),
            ));
        }

        FeatureCollection::new(features)
    }
}

/// Spreadsheet-style column names: `A..Z`, then `AA`.
fn column_label(index: usize) -> String {
    let mut label = String::new();
    let mut n = index + 1;
    while n > 0 {
        let remainder = (n - 1) % 26;
        label.insert(0, char::from(b'A' + remainder as u8));
        n = (n - 1) / 26;
    }
    label
}

fn properties(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bbox() -> BBox {
        BBox::new(0.0, 0.0, 10.0, 10.0).expect("bbox")
    }

    #[test]
    fn mesh_spans_bbox_with_requested_lines() {
        let grid = Grid::generate(unit_bbox(), GridCells::SQUARE, GridStyle::Red);

        assert_eq!(grid.mesh.len(), 10);
        let (vertical, horizontal) = grid.mesh.split_at(5);
        for line in vertical {
            assert_eq!(line[0].lon, line[1].lon);
            assert_eq!((line[0].lat, line[1].lat), (0.0, 10.0));
        }
        for line in horizontal {
            assert_eq!(line[0].lat, line[1].lat);
            assert_eq!((line[0].lon, line[1].lon), (0.0, 10.0));
        }
        assert_eq!(vertical[0][0].lon, 0.0);
        assert_eq!(vertical[4][0].lon, 10.0);
    }

    #[test]
    fn columns_are_lettered_west_to_east() {
        let grid = Grid::generate(unit_bbox(), GridCells::SQUARE, GridStyle::Red);

        for position in [LabelPosition::Top, LabelPosition::Bottom] {
            let texts: Vec<_> = grid
                .labels
                .iter()
                .filter(|label| label.position == position)
                .map(|label| label.text.as_str())
                .collect();
            assert_eq!(texts, ["A", "B", "C", "D"]);
        }
    }

    #[test]
    fn rows_are_numbered_descending_from_the_top() {
        let grid = Grid::generate(unit_bbox(), GridCells::SQUARE, GridStyle::Red);

        for position in [LabelPosition::Left, LabelPosition::Right] {
            let rows: Vec<_> = grid
                .labels
                .iter()
                .filter(|label| label.position == position)
                .map(|label| (label.from.lat, label.text.as_str()))
                .collect();
            // Bottom to top.
            assert_eq!(
                rows,
                [(0.0, "4"), (2.5, "3"), (5.0, "2"), (7.5, "1")]
            );
        }
    }

    #[test]
    fn label_colours_alternate_by_parity() {
        let grid = Grid::generate(unit_bbox(), GridCells::SQUARE, GridStyle::Red);
        let bottom: Vec<_> = grid
            .labels
            .iter()
            .filter(|label| label.position == LabelPosition::Bottom)
            .map(|label| (label.color, label.label_color))
            .collect();
        assert_eq!(bottom[0], ("#000000", "#ffffff"));
        assert_eq!(bottom[1], ("#FF0000", "#000000"));
        assert_eq!(bottom[2], bottom[0]);
    }

    #[test]
    fn four_corner_ticks() {
        let grid = Grid::generate(unit_bbox(), GridCells::SQUARE, GridStyle::Blue);
        let corners: Vec<_> = grid.corners.iter().map(|c| c.as_tuple()).collect();
        assert_eq!(
            corners,
            [(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (10.0, 10.0)]
        );

        let collection = grid.to_feature_collection();
        let corner_features = collection
            .features
            .iter()
            .filter(|feature| feature.property_str("type") == Some("corner"))
            .count();
        assert_eq!(corner_features, 4);
    }

    #[test]
    fn feature_collection_carries_labels_mesh_and_corners() {
        let cells = GridCells::new(5, 3).expect("cells");
        let grid = Grid::generate(unit_bbox(), cells, GridStyle::Red);
        let collection = grid.to_feature_collection();

        // 4 columns x 2 edges + 2 rows x 2 edges + mesh + 4 corners
        assert_eq!(collection.features.len(), 8 + 4 + 1 + 4);
        let mesh = collection
            .features
            .iter()
            .find(|feature| feature.property_str("type") == Some("grid"))
            .expect("mesh feature");
        match &mesh.geometry {
            Geometry::MultiLineString { coordinates } => assert_eq!(coordinates.len(), 8),
            other => panic!("unexpected mesh geometry: {other:?}"),
        }

        let left_rows: Vec<_> = collection
            .features
            .iter()
            .filter(|feature| feature.property_str("pos") == Some("LEFT"))
            .map(|feature| feature.properties["label"].clone())
            .collect();
        assert_eq!(left_rows, [json!(2), json!(1)]);
    }

    #[test]
    fn orientation_follows_page_ratio() {
        // ~68 km wide, ~48 km tall at 52N: ratio ~0.71, landscape page.
        let landscape = BBox::new(13.0, 52.0, 14.0, 52.433).expect("bbox");
        assert_eq!(GridCells::for_bbox(&landscape), GridCells::LANDSCAPE);

        let portrait = BBox::new(13.0, 52.0, 13.5, 52.433).expect("bbox");
        assert_eq!(GridCells::for_bbox(&portrait), GridCells::PORTRAIT);

        let square = BBox::new(13.0, 52.0, 13.7, 52.433).expect("bbox");
        assert_eq!(GridCells::for_bbox(&square), GridCells::SQUARE);
    }

    #[test]
    fn parses_cells_and_styles() {
        assert_eq!("5x3".parse::<GridCells>().expect("cells"), GridCells::LANDSCAPE);
        assert!("1x3".parse::<GridCells>().is_err());
        assert!("five".parse::<GridCells>().is_err());
        assert_eq!("Violet".parse::<GridStyle>().expect("style"), GridStyle::Violet);
        assert!("pink".parse::<GridStyle>().is_err());
    }

    #[test]
    fn column_labels_continue_past_z() {
        assert_eq!(column_label(0), "A");
        assert_eq!(column_label(25), "Z");
        assert_eq!(column_label(26), "AA");
    }
}

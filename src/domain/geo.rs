//! Geographic helpers for bounding boxes.
//!
//! Positions are `(lon, lat)` in degrees, matching GeoJSON coordinate order.
//! Distances are metres on a spherical earth.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Mean earth radius in metres (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Sphere radius used by the Web-Mercator projection.
pub const MERCATOR_RADIUS_M: f64 = 6_378_137.0;

/// Latitude limit of the Web-Mercator projection.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

const DEG_TO_RAD: f64 = PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / PI;

/// Axis-aligned bounding box `(min_x, min_y, max_x, max_y)` in lon/lat degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, DomainError> {
        let values = [min_x, min_y, max_x, max_y];
        if values.iter().any(|value| !value.is_finite()) {
            return Err(DomainError::invalid_content("bbox must be finite"));
        }
        if min_x >= max_x || min_y >= max_y {
            return Err(DomainError::invalid_content(
                "bbox minimum must be smaller than maximum",
            ));
        }
        if min_x < -180.0 || max_x > 180.0 {
            return Err(DomainError::invalid_content(
                "bbox longitude must lie within [-180, 180]",
            ));
        }
        if min_y < -MAX_MERCATOR_LAT || max_y > MAX_MERCATOR_LAT {
            return Err(DomainError::invalid_content(
                "bbox latitude exceeds the Web-Mercator range",
            ));
        }

        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Parse `minX,minY,maxX,maxY`.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| DomainError::invalid_content(format!("bbox: {err}")))?;

        match parts.as_slice() {
            [min_x, min_y, max_x, max_y] => Self::new(*min_x, *min_y, *max_x, *max_y),
            _ => Err(DomainError::invalid_content(
                "bbox requires exactly four values",
            )),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Real-world `(width, height)` in metres, measured along the bottom and
    /// left edges.
    pub fn extent_m(&self) -> (f64, f64) {
        let width = haversine_m((self.min_x, self.min_y), (self.max_x, self.min_y));
        let height = haversine_m((self.min_x, self.min_y), (self.min_x, self.max_y));
        (width, height)
    }

    /// `minX,minY,maxX,maxY` as used by tile renderer URLs.
    pub fn to_query(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl TryFrom<[f64; 4]> for BBox {
    type Error = DomainError;

    fn try_from(value: [f64; 4]) -> Result<Self, Self::Error> {
        let [min_x, min_y, max_x, max_y] = value;
        Self::new(min_x, min_y, max_x, max_y)
    }
}

impl From<BBox> for [f64; 4] {
    fn from(bbox: BBox) -> Self {
        [bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y]
    }
}

/// Great-circle distance between two `(lon, lat)` positions (haversine).
pub fn haversine_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lon1, lat1) = from;
    let (lon2, lat2) = to;

    let lat1_rad = lat1 * DEG_TO_RAD;
    let lat2_rad = lat2 * DEG_TO_RAD;
    let delta_lat = (lat2 - lat1) * DEG_TO_RAD;
    let delta_lon = (lon2 - lon1) * DEG_TO_RAD;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Destination reached from `start` travelling `distance_m` along a great
/// circle with initial `heading_deg` (0 = north, 90 = east).
pub fn project_position(start: (f64, f64), heading_deg: f64, distance_m: f64) -> (f64, f64) {
    let (lon1, lat1) = start;
    let lat1_rad = lat1 * DEG_TO_RAD;
    let lon1_rad = lon1 * DEG_TO_RAD;
    let heading_rad = heading_deg * DEG_TO_RAD;
    let angular_distance = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1_rad.sin();
    let cos_lat1 = lat1_rad.cos();
    let sin_d = angular_distance.sin();
    let cos_d = angular_distance.cos();

    let lat2_rad = (sin_lat1 * cos_d + cos_lat1 * sin_d * heading_rad.cos()).asin();
    let lon2_rad =
        lon1_rad + (heading_rad.sin() * sin_d * cos_lat1).atan2(cos_d - sin_lat1 * lat2_rad.sin());

    let mut lon2 = lon2_rad * RAD_TO_DEG;
    if lon2 > 180.0 {
        lon2 -= 360.0;
    } else if lon2 < -180.0 {
        lon2 += 360.0;
    }
    let lat2 = (lat2_rad * RAD_TO_DEG).clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);

    (lon2, lat2)
}

/// Forward Web-Mercator projection into metres.
pub fn to_mercator((lon, lat): (f64, f64)) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let x = MERCATOR_RADIUS_M * lon * DEG_TO_RAD;
    let y = MERCATOR_RADIUS_M * (PI / 4.0 + lat * DEG_TO_RAD / 2.0).tan().ln();
    (x, y)
}

/// `num` evenly spaced values from `start` to `end`, both included.
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            (0..num)
                .map(|i| {
                    if i == num - 1 {
                        end
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}

/// Printable page in pixels (A4 at 150 dpi).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

impl PageSize {
    pub const A4_LANDSCAPE: PageSize = PageSize {
        width: 1754,
        height: 1240,
    };
    pub const A4_PORTRAIT: PageSize = PageSize {
        width: 1240,
        height: 1754,
    };

    /// Landscape unless the bbox is taller than wide on the ground.
    pub fn for_bbox(bbox: &BBox) -> Self {
        let (width, height) = bbox.extent_m();
        if width >= height {
            Self::A4_LANDSCAPE
        } else {
            Self::A4_PORTRAIT
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.height) / f64::from(self.width)
    }
}

/// Maps lon/lat onto page pixels: the projected bbox is centred and expanded
/// to the page aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub page: PageSize,
    center: (f64, f64),
    meters_per_pixel: f64,
}

impl Viewport {
    pub fn fit(bbox: &BBox, page: PageSize) -> Self {
        let (x0, y0) = to_mercator((bbox.min_x, bbox.min_y));
        let (x1, y1) = to_mercator((bbox.max_x, bbox.max_y));
        let meters_per_pixel =
            ((x1 - x0) / f64::from(page.width)).max((y1 - y0) / f64::from(page.height));

        Self {
            page,
            center: ((x0 + x1) / 2.0, (y0 + y1) / 2.0),
            meters_per_pixel,
        }
    }

    /// Pixel position of a `(lon, lat)` position; y grows downwards.
    pub fn project(&self, position: (f64, f64)) -> (f64, f64) {
        let (x, y) = to_mercator(position);
        let px = (x - self.center.0) / self.meters_per_pixel + f64::from(self.page.width) / 2.0;
        let py = f64::from(self.page.height) / 2.0 - (y - self.center.1) / self.meters_per_pixel;
        (px, py)
    }

    /// Ground distance spanned by the whole page width along `lat`.
    pub fn ground_width_m(&self, lat: f64) -> f64 {
        let half_width = f64::from(self.page.width) / 2.0 * self.meters_per_pixel;
        let left = (self.center.0 - half_width) / MERCATOR_RADIUS_M * RAD_TO_DEG;
        let right = (self.center.0 + half_width) / MERCATOR_RADIUS_M * RAD_TO_DEG;
        haversine_m((left, lat), (right, lat))
    }
}

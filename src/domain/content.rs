//! Typed view of the render content document.
//!
//! The document itself stays an opaque JSON value for hashing; workers and
//! validation read it through [`MapContent`].

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::{
    OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
    macros::format_description,
};

use super::{error::DomainError, geo::BBox};

/// GeoJSON position; extra ordinates (altitude) are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 2]")]
pub struct Position {
    pub lon: f64,
    pub lat: f64,
}

impl Position {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn as_tuple(self) -> (f64, f64) {
        (self.lon, self.lat)
    }
}

impl TryFrom<Vec<f64>> for Position {
    type Error = String;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        match value.as_slice() {
            [lon, lat, ..] if lon.is_finite() && lat.is_finite() => Ok(Self::new(*lon, *lat)),
            [_, _, ..] => Err("position must be finite".to_string()),
            _ => Err("position requires at least two ordinates".to_string()),
        }
    }
}

impl From<Position> for [f64; 2] {
    fn from(position: Position) -> Self {
        [position.lon, position.lat]
    }
}

impl From<(f64, f64)> for Position {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self::new(lon, lat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    /// Drawing rank: areas below lines below point markers.
    pub fn layer_rank(&self) -> u8 {
        match self {
            Geometry::GeometryCollection { .. }
            | Geometry::Polygon { .. }
            | Geometry::MultiPolygon { .. } => 0,
            Geometry::LineString { .. } | Geometry::MultiLineString { .. } => 1,
            Geometry::Point { .. } | Geometry::MultiPoint { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureTag {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureCollectionTag {
    #[default]
    FeatureCollection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default)]
    pub tag: FeatureTag,
    pub geometry: Geometry,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Map<String, Value>) -> Self {
        Self {
            tag: FeatureTag::Feature,
            geometry,
            properties,
        }
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn property_f64(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default)]
    pub tag: FeatureCollectionTag,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            tag: FeatureCollectionTag::FeatureCollection,
            features,
        }
    }
}

/// Render content document as consumed by the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct MapContent {
    pub name: String,
    pub bbox: BBox,
    pub features: Vec<Feature>,
    #[serde(default)]
    pub grid: Option<FeatureCollection>,
    #[serde(default)]
    pub place: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub datetime: Option<PrimitiveDateTime>,
    #[serde(default, deserialize_with = "deserialize_attributes")]
    pub attributes: Vec<(String, String)>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl MapContent {
    /// Validate a raw document, mapping every schema violation to
    /// [`DomainError::InvalidContent`].
    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        if !value.is_object() {
            return Err(DomainError::invalid_content("document must be a JSON object"));
        }
        let content = MapContent::deserialize(value)
            .map_err(|err| DomainError::invalid_content(err.to_string()))?;
        if content.name.trim().is_empty() {
            return Err(DomainError::invalid_content("name must not be empty"));
        }
        Ok(content)
    }

    /// Legend timestamp, `DD.MM.YYYY HH:MM`.
    pub fn legend_date(&self) -> Option<String> {
        let format = format_description!("[day].[month].[year] [hour]:[minute]");
        self.datetime
            .and_then(|timestamp| timestamp.format(format).ok())
    }

    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Parse RFC 3339 or `YYYY-MM-DDTHH:MM[:SS[.fff]]`; offsets keep the wall
/// clock time as written.
pub fn parse_timestamp(value: &str) -> Result<PrimitiveDateTime, DomainError> {
    let value = value.trim();
    if let Ok(timestamp) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(PrimitiveDateTime::new(timestamp.date(), timestamp.time()));
    }

    let formats = [
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ];
    formats
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(value, *format).ok())
        .ok_or_else(|| DomainError::invalid_content(format!("unrecognised datetime `{value}`")))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<PrimitiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAttributes {
    Pairs(Vec<(String, Value)>),
    Object(BTreeMap<String, Value>),
}

fn deserialize_attributes<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = match Option::<RawAttributes>::deserialize(deserializer)? {
        Some(RawAttributes::Pairs(pairs)) => pairs,
        Some(RawAttributes::Object(map)) => map.into_iter().collect(),
        None => Vec::new(),
    };

    Ok(rows
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => text,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

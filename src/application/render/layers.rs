//! Feature styling and draw order.

use serde_json::{Map, Value};

use crate::domain::content::Feature;

pub const DEFAULT_COLOR: &str = "#3388ff";
pub const DEFAULT_WEIGHT: f64 = 3.0;
pub const DEFAULT_FILL_OPACITY: f64 = 0.2;
const DEFAULT_ICON_SIZE: f64 = 20.0;

/// Presentation attributes read from a feature's properties.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStyle {
    pub color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_color: String,
    pub fill_opacity: f64,
    pub dash_array: Option<String>,
    pub icon_color: String,
    /// Marker scale relative to the 150 px marker symbol.
    pub icon_scale: f64,
    pub label: Option<String>,
}

impl Default for FeatureStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR.to_string(),
            weight: DEFAULT_WEIGHT,
            opacity: 1.0,
            fill_color: DEFAULT_COLOR.to_string(),
            fill_opacity: DEFAULT_FILL_OPACITY,
            dash_array: None,
            icon_color: DEFAULT_COLOR.to_string(),
            icon_scale: icon_scale(DEFAULT_ICON_SIZE),
            label: None,
        }
    }
}

impl FeatureStyle {
    pub fn from_properties(properties: &Map<String, Value>) -> Self {
        let color = sanitize_color(properties.get("color").and_then(Value::as_str))
            .unwrap_or_else(|| DEFAULT_COLOR.to_string());
        let fill_color = sanitize_color(properties.get("fillColor").and_then(Value::as_str))
            .unwrap_or_else(|| color.clone());
        let icon_color = sanitize_color(properties.get("iconColor").and_then(Value::as_str))
            .unwrap_or_else(|| color.clone());

        let icon_width = match properties.get("iconSize") {
            Some(Value::Array(size)) => size.first().and_then(Value::as_f64),
            Some(value) => value.as_f64(),
            None => None,
        }
        .filter(|width| width.is_finite() && *width > 0.0)
        .unwrap_or(DEFAULT_ICON_SIZE);

        Self {
            color,
            weight: positive(properties.get("weight")).unwrap_or(DEFAULT_WEIGHT),
            opacity: unit_interval(properties.get("opacity")).unwrap_or(1.0),
            fill_color,
            fill_opacity: unit_interval(properties.get("fillOpacity"))
                .unwrap_or(DEFAULT_FILL_OPACITY),
            dash_array: dash_array(properties.get("dashArray")),
            icon_color,
            icon_scale: icon_scale(icon_width),
            label: properties
                .get("label")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(str::to_string),
        }
    }
}

/// `(20 / 150) * (width / 20) * 2`
pub fn icon_scale(icon_width: f64) -> f64 {
    (20.0 / 150.0) * (icon_width / 20.0) * 2.0
}

/// Accept hex colours, plain colour names and `rgb()/rgba()` notation;
/// anything else could break out of the attribute it is written into.
pub fn sanitize_color(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    let valid = if let Some(hex) = value.strip_prefix('#') {
        matches!(hex.len(), 3 | 4 | 6 | 8) && hex.bytes().all(|byte| byte.is_ascii_hexdigit())
    } else if let Some(args) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
    {
        args.strip_suffix(')').is_some_and(|inner| {
            inner
                .bytes()
                .all(|byte| byte.is_ascii_digit() || b" ,.%".contains(&byte))
        })
    } else {
        !value.is_empty()
            && value.len() <= 32
            && value.bytes().all(|byte| byte.is_ascii_alphabetic())
    };

    valid.then(|| value.to_string())
}

fn dash_array(value: Option<&Value>) -> Option<String> {
    let raw = match value? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    // Leaflet uses "1" for a solid line.
    if raw.is_empty() || raw == "1" {
        return None;
    }
    raw.bytes()
        .all(|byte| byte.is_ascii_digit() || b" ,.".contains(&byte))
        .then_some(raw)
}

fn positive(value: Option<&Value>) -> Option<f64> {
    number(value).filter(|value| *value > 0.0)
}

fn unit_interval(value: Option<&Value>) -> Option<f64> {
    number(value).map(|value| value.clamp(0.0, 1.0))
}

fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

/// Areas first, then lines, then points; input order within each group.
pub fn draw_order(features: &[Feature]) -> Vec<&Feature> {
    let mut ordered: Vec<&Feature> = features.iter().collect();
    ordered.sort_by_key(|feature| feature.geometry.layer_rank());
    ordered
}

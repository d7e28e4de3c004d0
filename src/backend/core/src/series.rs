//! Series extraction and chart downsampling.
//!
//! Upstream model services answer with arbitrarily shaped JSON. The extractor
//! locates the first plottable numeric sequence with a fixed search order:
//!
//! 1. an array of more than one numeric element is the series;
//! 2. an array whose first element is such an array yields that first row;
//! 3. an object is probed under conventional keys ([`SERIES_KEYS`]) with
//!    rules 1 and 2;
//! 4. otherwise children are searched depth-first in document order;
//! 5. nothing found yields an empty series.
//!
//! A numeric element is a JSON number or a non-empty string that parses to a
//! finite number. Booleans and nulls never count.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of chart points handed to the UI.
pub const DEFAULT_CHART_CAP: usize = 400;

/// Keys probed, in order, on every object before recursing.
pub const SERIES_KEYS: &[&str] = &[
    "forecast",
    "yhat",
    "pred",
    "values",
    "series",
    "y",
    "path",
    "trajectory",
    "output",
    "prices",
    "samples",
    "paths",
];

/// One plotted point, serialized as `{x, y}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    #[serde(rename = "x")]
    pub index: usize,
    #[serde(rename = "y")]
    pub value: f64,
}

/// Interpret a JSON value as a finite number.
pub fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Rule 1: more than one element, all numeric.
fn numeric_array(value: &Value) -> Option<Vec<f64>> {
    let items = value.as_array()?;
    if items.len() < 2 {
        return None;
    }
    items.iter().map(as_number).collect()
}

/// Rules 1 and 2.
fn direct_series(value: &Value) -> Option<Vec<f64>> {
    numeric_array(value).or_else(|| {
        let first = value.as_array()?.first()?;
        numeric_array(first)
    })
}

/// Locate the first plottable numeric sequence inside `value`.
pub fn extract(value: &Value) -> Vec<f64> {
    find(value).unwrap_or_default()
}

fn find(value: &Value) -> Option<Vec<f64>> {
    if let Some(series) = direct_series(value) {
        return Some(series);
    }

    match value {
        Value::Object(map) => {
            let keyed = SERIES_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(direct_series);
            keyed.or_else(|| map.values().find_map(find))
        }
        Value::Array(items) => items.iter().find_map(find),
        _ => None,
    }
}

/// Keep every `step`-th element, `step = max(1, ceil(len / cap))`.
pub fn downsample(series: &[f64], cap: usize) -> Vec<ChartPoint> {
    let step = series.len().div_ceil(cap.max(1)).max(1);
    series
        .iter()
        .step_by(step)
        .enumerate()
        .map(|(index, &value)| ChartPoint { index, value })
        .collect()
}

/// Extract and downsample in one go.
pub fn to_chart(value: &Value, cap: usize) -> Vec<ChartPoint> {
    downsample(&extract(value), cap)
}

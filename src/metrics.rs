//! Derived waste metrics. Every formula has a defined value for empty or
//! degenerate input; none of them return NaN for finite input.

use serde::Serialize;
use std::fmt;

use crate::util::{average, std_dev};

pub const DEFAULT_ANOMALY_Z: f64 = 2.0;
pub const DEFAULT_TREND_DEAD_ZONE: f64 = 0.05;
pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub anomaly_z: f64,
    pub trend_dead_zone: f64,
    pub moving_average_window: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            anomaly_z: DEFAULT_ANOMALY_Z,
            trend_dead_zone: DEFAULT_TREND_DEAD_ZONE,
            moving_average_window: DEFAULT_MOVING_AVERAGE_WINDOW,
        }
    }
}

/// Round half away from zero to one decimal.
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Percentage of produced quantity that was discarded. 0 when nothing was produced.
pub fn discard_rate(discarded: f64, produced: f64) -> f64 {
    if produced.is_nan() || produced <= 0.0 {
        return 0.0;
    }
    let rate = discarded / produced * 100.0;
    if rate.is_nan() {
        0.0
    } else {
        round1(rate)
    }
}

/// `100 - discard_rate`, clamped to `[0, 100]`.
pub fn efficiency(produced: f64, discarded: f64) -> f64 {
    let e = round1(100.0 - discard_rate(discarded, produced));
    if e.is_nan() {
        0.0
    } else {
        e.clamp(0.0, 100.0)
    }
}

/// Trailing moving average. The window shrinks at the start of the series
/// instead of padding: index `i` averages `series[max(0, i-window+1)..=i]`.
pub fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..series.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            average(&series[start..=i])
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// Least-squares slope. 0 for fewer than two points or when all x are equal.
pub fn linear_regression_slope(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len() as f64;
    let x_mean = points.iter().map(|p| p.x).sum::<f64>() / n;
    let y_mean = points.iter().map(|p| p.y).sum::<f64>() / n;
    let (num, den) = points.iter().fold((0.0, 0.0), |(num, den), p| {
        let dx = p.x - x_mean;
        (num + dx * (p.y - y_mean), den + dx * dx)
    });
    if den == 0.0 || !den.is_finite() {
        return 0.0;
    }
    let slope = num / den;
    if slope.is_finite() {
        slope
    } else {
        0.0
    }
}

/// Slope of a series against its index.
pub fn series_slope(series: &[f64]) -> f64 {
    let points: Vec<Point> = series
        .iter()
        .enumerate()
        .map(|(i, y)| Point::new(i as f64, *y))
        .collect();
    linear_regression_slope(&points)
}

/// Standard score of `value` against `series` (population deviation).
/// 0 when the series has no spread.
pub fn z_score(value: f64, series: &[f64]) -> f64 {
    let std = std_dev(series);
    if std > 0.0 {
        (value - average(series)) / std
    } else {
        0.0
    }
}

pub fn is_anomaly(z: f64, threshold: f64) -> bool {
    z.abs() > threshold
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyFlag<K> {
    pub key: K,
    pub value: f64,
    pub z_score: f64,
}

/// Points of `series` whose z-score against the whole series exceeds the threshold.
pub fn detect_anomalies<K: Clone>(series: &[(K, f64)], threshold: f64) -> Vec<AnomalyFlag<K>> {
    let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
    let mean = average(&values);
    let std = std_dev(&values);
    if std <= 0.0 {
        return Vec::new();
    }
    series
        .iter()
        .filter_map(|(key, value)| {
            let z = (*value - mean) / std;
            is_anomaly(z, threshold).then(|| AnomalyFlag {
                key: key.clone(),
                value: *value,
                z_score: round1(z),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Increasing => "Increasing",
            Trend::Decreasing => "Decreasing",
            Trend::Stable => "Stable",
        };
        f.write_str(s)
    }
}

pub fn trend_label(slope: f64) -> Trend {
    trend_with_dead_zone(slope, DEFAULT_TREND_DEAD_ZONE)
}

/// Slopes within `±dead_zone` are treated as noise.
pub fn trend_with_dead_zone(slope: f64, dead_zone: f64) -> Trend {
    if slope > dead_zone {
        Trend::Increasing
    } else if slope < -dead_zone {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodChange {
    pub current: f64,
    pub previous: f64,
    pub delta: f64,
    /// Percentage change versus the previous window; 0 when it was empty.
    pub percent: f64,
}

pub fn period_change(current: f64, previous: f64) -> PeriodChange {
    let percent = if previous > 0.0 {
        round1((current - previous) / previous * 100.0)
    } else {
        0.0
    };
    PeriodChange {
        current,
        previous,
        delta: current - previous,
        percent,
    }
}

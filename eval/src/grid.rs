// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Hyperparameter grids
//!
//! A grid is an ordered list of axes; its points are the Cartesian product
//! of the axis values, enumerated with the last axis varying fastest. The
//! enumeration order is what the search uses to break score ties.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            ParamValue::Int(v) => v as f64,
            ParamValue::Float(v) => v,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// One named parameter and its candidate values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// One grid point: ordered (name, value) pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    values: Vec<(String, ParamValue)>,
}

impl ParamSet {
    pub fn new(values: Vec<(String, ParamValue)>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Float parameter, `default` when absent
    pub fn f64_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).map_or(default, |v| v.as_f64())
    }

    /// Non-negative integer parameter, `default` when absent
    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) if v >= 0 => Ok(v as usize),
            Some(ParamValue::Float(v)) if v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
            Some(other) => Err(EvalError::invalid_parameter(
                name,
                other,
                "must be a non-negative integer",
            )),
        }
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|(n, v)| format!("{}={}", n, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Cartesian-product parameter grid
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HyperparameterGrid {
    pub axes: Vec<GridAxis>,
}

impl HyperparameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis (builder style)
    pub fn axis(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.axes.push(GridAxis {
            name: name.to_string(),
            values,
        });
        self
    }

    pub fn float_axis(self, name: &str, values: &[f64]) -> Self {
        self.axis(name, values.iter().map(|&v| ParamValue::Float(v)).collect())
    }

    pub fn int_axis(self, name: &str, values: &[i64]) -> Self {
        self.axis(name, values.iter().map(|&v| ParamValue::Int(v)).collect())
    }

    /// Number of grid points
    pub fn len(&self) -> usize {
        if self.axes.is_empty() {
            0
        } else {
            self.axes.iter().map(|a| a.values.len()).product()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All grid points in enumeration order
    pub fn points(&self) -> Vec<ParamSet> {
        let total = self.len();
        (0..total)
            .map(|mut index| {
                let mut values = vec![(String::new(), ParamValue::Int(0)); self.axes.len()];
                for (slot, axis) in self.axes.iter().enumerate().rev() {
                    let n = axis.values.len();
                    values[slot] = (axis.name.clone(), axis.values[index % n]);
                    index /= n;
                }
                ParamSet::new(values)
            })
            .collect()
    }
}

/// `count` values spaced evenly on a log10 scale from `start` to `end`
pub fn log_space(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let (lo, hi) = (start.log10(), end.log10());
            let step = (hi - lo) / (count - 1) as f64;
            (0..count).map(|i| 10f64.powf(lo + step * i as f64)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cartesian_enumeration_order() {
        let grid = HyperparameterGrid::new()
            .float_axis("mixing", &[0.0, 1.0])
            .int_axis("depth", &[2, 3, 4]);
        let points = grid.points();

        assert_eq!(grid.len(), 6);
        assert_eq!(points.len(), 6);
        assert_eq!(points[0].to_string(), "mixing=0, depth=2");
        assert_eq!(points[1].to_string(), "mixing=0, depth=3");
        assert_eq!(points[3].to_string(), "mixing=1, depth=2");
        assert_eq!(points[5].get("depth"), Some(ParamValue::Int(4)));
    }

    #[test]
    fn test_empty_axis_yields_no_points() {
        let grid = HyperparameterGrid::new().float_axis("a", &[1.0]).float_axis("b", &[]);
        assert!(grid.is_empty());
        assert!(grid.points().is_empty());
        assert!(HyperparameterGrid::new().points().is_empty());
    }

    #[test]
    fn test_log_space_endpoints() {
        let values = log_space(1e-4, 1.0, 20);
        assert_eq!(values.len(), 20);
        assert!((values[0] - 1e-4).abs() < 1e-16);
        assert!((values[19] - 1.0).abs() < 1e-12);
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_integer_lookup() {
        let set = ParamSet::new(vec![
            ("n_trees".to_string(), ParamValue::Int(50)),
            ("max_depth".to_string(), ParamValue::Float(3.0)),
            ("bad".to_string(), ParamValue::Float(2.5)),
        ]);
        assert_eq!(set.usize_or("n_trees", 1).unwrap(), 50);
        assert_eq!(set.usize_or("max_depth", 1).unwrap(), 3);
        assert_eq!(set.usize_or("missing", 7).unwrap(), 7);
        assert!(set.usize_or("bad", 1).is_err());
    }

    #[test]
    fn test_grid_json_round_trip_keeps_axis_order() {
        let json = r#"{"axes":[{"name":"zeta","values":[1,2]},{"name":"alpha","values":[0.5]}]}"#;
        let grid: HyperparameterGrid = serde_json::from_str(json).unwrap();
        assert_eq!(grid.axes[0].name, "zeta");
        assert_eq!(grid.axes[0].values[0], ParamValue::Int(1));
        assert_eq!(grid.axes[1].values[0], ParamValue::Float(0.5));
    }
}

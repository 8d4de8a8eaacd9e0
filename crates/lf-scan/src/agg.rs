//! Column aggregates over scan runs.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Statistic applied across runs or across time points.
///
/// `NaN` entries (failed runs) are skipped; an aggregate over no finite
/// values is `NaN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agg {
    Mean,
    /// Sample standard deviation (one delta degree of freedom)
    Std,
    Min,
    Max,
}

impl Agg {
    pub fn apply(self, values: &[f64]) -> f64 {
        let xs: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if xs.is_empty() {
            return f64::NAN;
        }
        let n = xs.len() as f64;
        match self {
            Agg::Mean => xs.iter().sum::<f64>() / n,
            Agg::Std => {
                if xs.len() < 2 {
                    return f64::NAN;
                }
                let mean = xs.iter().sum::<f64>() / n;
                let ss: f64 = xs.iter().map(|x| (x - mean).powi(2)).sum();
                (ss / (n - 1.0)).sqrt()
            }
            Agg::Min => xs.iter().copied().fold(f64::INFINITY, f64::min),
            Agg::Max => xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

impl FromStr for Agg {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Agg::Mean),
            "std" => Ok(Agg::Std),
            "min" => Ok(Agg::Min),
            "max" => Ok(Agg::Max),
            _ => Err(ScanError::UnknownAggregate {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Agg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Agg::Mean => "mean",
            Agg::Std => "std",
            Agg::Min => "min",
            Agg::Max => "max",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_values_are_skipped() {
        let xs = [1.0, f64::NAN, 3.0];
        assert_eq!(Agg::Mean.apply(&xs), 2.0);
        assert_eq!(Agg::Min.apply(&xs), 1.0);
        assert_eq!(Agg::Max.apply(&xs), 3.0);
        assert!((Agg::Std.apply(&xs) - 2f64.sqrt()).abs() < 1e-12);
        assert!(Agg::Mean.apply(&[f64::NAN]).is_nan());
        assert!(Agg::Std.apply(&[1.0]).is_nan());
    }

    #[test]
    fn parses_names() {
        assert_eq!("std".parse::<Agg>().unwrap(), Agg::Std);
        assert_eq!(Agg::Max.to_string(), "max");
        assert!(matches!(
            "median".parse::<Agg>(),
            Err(ScanError::UnknownAggregate { .. })
        ));
    }
}

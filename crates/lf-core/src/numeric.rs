use crate::CoreError;

/// Absolute and relative tolerance for comparing concentrations and rates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    pub abs: f64,
    pub rel: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

impl Tolerances {
    pub fn close(&self, a: f64, b: f64) -> bool {
        nearly_equal(a, b, *self)
    }
}

/// `a` and `b` agree within `tol.abs`, or within `tol.rel` of the larger
/// magnitude.
pub fn nearly_equal(a: f64, b: f64, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    diff <= tol.abs || diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(value: f64, what: &'static str) -> Result<f64, CoreError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CoreError::NonFinite { what, value })
    }
}

/// `n` evenly spaced points from `start` to `end`, both included exactly.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + i as f64 * step })
                .collect()
        }
    }
}

pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerances_are_absolute_or_relative() {
        let tol = Tolerances::default();
        assert!(tol.close(0.0, 1e-13));
        assert!(tol.close(1e6, 1e6 + 1e-4));
        assert!(!tol.close(1.0, 1.0 + 1e-6));
        assert!(!tol.close(f64::NAN, f64::NAN));
    }

    #[test]
    fn non_finite_values_are_named() {
        let err = ensure_finite(f64::INFINITY, "k1").unwrap_err();
        assert_eq!(
            err,
            CoreError::NonFinite {
                what: "k1",
                value: f64::INFINITY
            }
        );
        assert_eq!(ensure_finite(2.0, "k1"), Ok(2.0));
    }

    #[test]
    fn linspace_hits_both_ends() {
        let pts = linspace(0.0, 1.0, 11);
        assert_eq!(pts.len(), 11);
        assert_eq!(pts[0], 0.0);
        assert_eq!(pts[10], 1.0);
        assert!((pts[3] - 0.3).abs() < 1e-12);
        assert_eq!(linspace(2.0, 5.0, 1), vec![2.0]);
        assert!(linspace(2.0, 5.0, 0).is_empty());
    }

    #[test]
    fn l2_norm_of_state_change() {
        assert_eq!(l2_norm(&[3.0, -4.0]), 5.0);
        assert_eq!(l2_norm(&[]), 0.0);
    }
}

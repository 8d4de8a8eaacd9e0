//! Newton refinement of steady states.

use nalgebra::{DMatrix, DVector};

/// Damped Newton settings for polishing an integrated steady state.
pub(crate) struct Polish {
    pub max_iterations: usize,
    /// Converged once the right-hand side norm drops below this
    pub tolerance: f64,
    /// Step shrink factor while backtracking
    pub shrink: f64,
    pub max_backtracks: usize,
    /// Relative perturbation of the Jacobian columns
    pub fd_step: f64,
}

impl Default for Polish {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-12,
            shrink: 0.5,
            max_backtracks: 20,
            fd_step: 1e-7,
        }
    }
}

/// Forward difference Jacobian of the right-hand side `f` at state `y`.
pub(crate) fn finite_difference_jacobian<F>(
    y: &DVector<f64>,
    f_y: &DVector<f64>,
    f: &F,
    fd_step: f64,
) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut jac = DMatrix::zeros(f_y.len(), y.len());
    for (j, yj) in y.iter().enumerate() {
        let h = fd_step * yj.abs().max(1.0);
        let mut shifted = y.clone();
        shifted[j] += h;
        jac.set_column(j, &((f(&shifted) - f_y) / h));
    }
    jac
}

/// Drive the right-hand side `f` to zero from `y0`, keeping concentrations
/// non-negative.
///
/// `None` when the Jacobian is singular (conserved moieties) or no
/// backtracking step reduces the residual.
pub(crate) fn newton_polish<F>(y0: &[f64], f: F, settings: &Polish) -> Option<Vec<f64>>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut y = DVector::from_column_slice(y0);
    let mut rhs = f(&y);
    let mut norm = rhs.norm();

    for _ in 0..settings.max_iterations {
        if norm < settings.tolerance {
            break;
        }
        let step = finite_difference_jacobian(&y, &rhs, &f, settings.fd_step)
            .lu()
            .solve(&(-&rhs))?;

        let mut scale = 1.0;
        let mut next = None;
        for _ in 0..settings.max_backtracks {
            let candidate = &y + scale * &step;
            if candidate.iter().all(|c| *c >= 0.0) {
                let candidate_rhs = f(&candidate);
                let candidate_norm = candidate_rhs.norm();
                if candidate_norm.is_finite() && candidate_norm < norm {
                    next = Some((candidate, candidate_rhs, candidate_norm));
                    break;
                }
            }
            scale *= settings.shrink;
        }
        (y, rhs, norm) = next?;
    }
    (norm < settings.tolerance).then(|| y.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_linear_production_degradation() {
        // dx/dt = 2 - 0.5 x => x* = 4
        let f = |x: &DVector<f64>| DVector::from_element(1, 2.0 - 0.5 * x[0]);
        let x = newton_polish(&[3.0], f, &Polish::default()).unwrap();
        assert!((x[0] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn refuses_negative_states() {
        // Root at x = -1 is unreachable under the non-negativity constraint
        let f = |x: &DVector<f64>| DVector::from_element(1, -1.0 - x[0]);
        assert!(newton_polish(&[1.0], f, &Polish::default()).is_none());
    }

    #[test]
    fn jacobian_of_quadratic() {
        let f = |x: &DVector<f64>| DVector::from_element(1, x[0] * x[0]);
        let x = DVector::from_element(1, 3.0);
        let jac = finite_difference_jacobian(&x, &f(&x), &f, 1e-7);
        assert!((jac[(0, 0)] - 6.0).abs() < 1e-5);
    }
}

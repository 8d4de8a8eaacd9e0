//! Minimizer strategies.

use argmin::core::{
    CostFunction, Error as ArgminError, Executor, State, TerminationReason, TerminationStatus,
};
use argmin::solver::neldermead::NelderMead as ArgminNelderMead;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Scalar objective over a parameter vector.
pub type Residual<'a> = dyn Fn(&[f64]) -> f64 + 'a;

/// Minimizes a residual from an initial guess.
///
/// Returns `None` when it cannot report a converged minimum. Closures with
/// the same signature are minimizers too.
pub trait Minimizer {
    fn minimize(&self, residual: &Residual<'_>, p0: &[f64]) -> Option<Vec<f64>>;
}

impl<F> Minimizer for F
where
    F: Fn(&Residual<'_>, &[f64]) -> Option<Vec<f64>>,
{
    fn minimize(&self, residual: &Residual<'_>, p0: &[f64]) -> Option<Vec<f64>> {
        self(residual, p0)
    }
}

/// Nelder-Mead simplex search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMead {
    pub max_iters: u64,
    /// Converged once the residuals over the simplex have a smaller
    /// standard deviation
    pub sd_tolerance: f64,
    /// Relative offset of the initial simplex vertices from the guess
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            sd_tolerance: 1e-7,
            initial_step: 0.05,
        }
    }
}

struct Objective<'a, 'r> {
    residual: &'a Residual<'r>,
}

impl CostFunction for Objective<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, p: &Self::Param) -> Result<Self::Output, ArgminError> {
        let r = (self.residual)(p);
        Ok(if r.is_nan() { f64::INFINITY } else { r })
    }
}

impl NelderMead {
    /// Guess plus one vertex per parameter, offset along that axis.
    fn simplex(&self, p0: &[f64]) -> Vec<Vec<f64>> {
        let mut vertices = vec![p0.to_vec()];
        for i in 0..p0.len() {
            let mut v = p0.to_vec();
            v[i] = if v[i] == 0.0 {
                self.initial_step
            } else {
                v[i] * (1.0 + self.initial_step)
            };
            vertices.push(v);
        }
        vertices
    }

    fn run(&self, residual: &Residual<'_>, p0: &[f64]) -> Result<Option<Vec<f64>>, ArgminError> {
        let solver = ArgminNelderMead::new(self.simplex(p0)).with_sd_tolerance(self.sd_tolerance)?;
        let res = Executor::new(Objective { residual }, solver)
            .configure(|state| state.max_iters(self.max_iters))
            .run()?;
        let state = res.state();
        let converged = matches!(
            state.get_termination_status(),
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
        );
        debug!(
            iterations = state.get_iter(),
            cost = state.get_best_cost(),
            converged,
            "nelder-mead finished"
        );
        if !converged || !state.get_best_cost().is_finite() {
            return Ok(None);
        }
        Ok(state.get_best_param().cloned())
    }
}

impl Minimizer for NelderMead {
    fn minimize(&self, residual: &Residual<'_>, p0: &[f64]) -> Option<Vec<f64>> {
        match self.run(residual, p0) {
            Ok(best) => best,
            Err(e) => {
                warn!(error = %e, "nelder-mead aborted");
                None
            }
        }
    }
}

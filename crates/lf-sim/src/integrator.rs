//! Time integrators.
//!
//! An [`Integrator`] advances `dy/dt = rhs(t, y)` over a list of output time
//! points and returns one state per point. Both shipped strategies are
//! explicit Runge-Kutta schemes; the adaptive one delegates to `ode_solvers`.

use core::fmt;

use nalgebra::DVector;
use ode_solvers::dop_shared::{IntegrationError, OutputType};
use ode_solvers::{System, dopri5 as solver};

use crate::error::IntegrationFailure;

/// Right-hand side as seen by an integrator.
pub type Rhs<'a> = dyn Fn(f64, &[f64]) -> Vec<f64> + 'a;

/// Strategy interface for ODE integration.
pub trait Integrator: fmt::Debug + Send + Sync {
    /// Integrate from `y0` at `time_points[0]` and return the state at every
    /// time point (the first one is `y0`).
    ///
    /// `time_points` must be non-empty and strictly increasing.
    fn integrate(
        &self,
        rhs: &Rhs<'_>,
        y0: &[f64],
        time_points: &[f64],
    ) -> Result<Vec<Vec<f64>>, IntegrationFailure>;
}

fn axpy(y: &[f64], h: f64, terms: &[(f64, &[f64])]) -> Vec<f64> {
    let mut out = y.to_vec();
    for &(c, k) in terms {
        if c == 0.0 {
            continue;
        }
        for (o, ki) in out.iter_mut().zip(k) {
            *o += h * c * ki;
        }
    }
    out
}

fn all_finite(y: &[f64]) -> bool {
    y.iter().all(|v| v.is_finite())
}

fn fail(out: Vec<Vec<f64>>, time: f64, reason: impl Into<String>) -> IntegrationFailure {
    IntegrationFailure {
        time,
        reason: reason.into(),
        partial: out,
    }
}

/// Classical fixed-step RK4.
///
/// Each output interval is split into the smallest number of equal steps no
/// longer than `max_step`.
#[derive(Clone, Debug)]
pub struct Rk4 {
    pub max_step: f64,
}

impl Default for Rk4 {
    fn default() -> Self {
        Self { max_step: 0.01 }
    }
}

impl Rk4 {
    fn step(rhs: &Rhs<'_>, t: f64, y: &[f64], dt: f64) -> Vec<f64> {
        let k1 = rhs(t, y);
        let k2 = rhs(t + 0.5 * dt, &axpy(y, 0.5 * dt, &[(1.0, &k1[..])]));
        let k3 = rhs(t + 0.5 * dt, &axpy(y, 0.5 * dt, &[(1.0, &k2[..])]));
        let k4 = rhs(t + dt, &axpy(y, dt, &[(1.0, &k3[..])]));

        // y_new = y + (dt/6) * (k1 + 2*k2 + 2*k3 + k4)
        axpy(
            y,
            dt / 6.0,
            &[(1.0, &k1[..]), (2.0, &k2[..]), (2.0, &k3[..]), (1.0, &k4[..])],
        )
    }
}

impl Integrator for Rk4 {
    fn integrate(
        &self,
        rhs: &Rhs<'_>,
        y0: &[f64],
        time_points: &[f64],
    ) -> Result<Vec<Vec<f64>>, IntegrationFailure> {
        let mut out = Vec::with_capacity(time_points.len());
        let Some((&t0, rest)) = time_points.split_first() else {
            return Ok(out);
        };
        let mut t = t0;
        let mut y = y0.to_vec();
        out.push(y.clone());
        if self.max_step.is_nan() || self.max_step <= 0.0 {
            return Err(fail(out, t0, "max_step must be positive"));
        }

        for &target in rest {
            let span = target - t;
            let n = (span / self.max_step).ceil().max(1.0) as usize;
            let dt = span / n as f64;
            for i in 0..n {
                y = Self::step(rhs, t + i as f64 * dt, &y, dt);
                if !all_finite(&y) {
                    return Err(fail(out, t + i as f64 * dt, "non-finite state"));
                }
            }
            t = target;
            out.push(y.clone());
        }
        Ok(out)
    }
}

/// Adaptive Dormand-Prince 5(4) from `ode_solvers`.
///
/// Each output interval is solved separately so the last accepted step lands
/// on the output time point. `max_steps` bounds the accepted and rejected
/// steps of the whole call.
#[derive(Clone, Debug)]
pub struct Dopri5 {
    pub atol: f64,
    pub rtol: f64,
    pub max_steps: usize,
    pub initial_step: Option<f64>,
}

impl Default for Dopri5 {
    fn default() -> Self {
        Self {
            atol: 1e-8,
            rtol: 1e-6,
            max_steps: 100_000,
            initial_step: None,
        }
    }
}

/// Adapts an [`Rhs`] to the solver's system interface.
struct RhsSystem<'r, 'a> {
    rhs: &'r Rhs<'a>,
}

impl System<f64, DVector<f64>> for RhsSystem<'_, '_> {
    fn system(&self, t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        dy.copy_from_slice(&(self.rhs)(t, y.as_slice()));
    }
}

impl Dopri5 {
    /// State at `t1`, and the number of steps taken to reach it.
    fn interval(
        &self,
        rhs: &Rhs<'_>,
        t0: f64,
        t1: f64,
        y: &[f64],
        budget: usize,
    ) -> Result<(Vec<f64>, usize), String> {
        let n_max = u32::try_from(budget.max(1)).unwrap_or(u32::MAX);
        let mut stepper = solver::Dopri5::from_param(
            RhsSystem { rhs },
            t0,
            t1,
            0.0,
            DVector::from_column_slice(y),
            self.rtol,
            self.atol,
            0.9,
            0.04,
            0.2,
            10.0,
            t1 - t0,
            self.initial_step.unwrap_or(0.0),
            n_max,
            1000,
            OutputType::Sparse,
        );
        let stats = stepper.integrate().map_err(|e| match e {
            IntegrationError::MaxNumStepReached { .. } => "step budget exhausted".to_string(),
            other => other.to_string(),
        })?;
        let steps = (stats.accepted_steps + stats.rejected_steps) as usize;

        let reached = stepper
            .x_out()
            .last()
            .is_some_and(|&t| (t - t1).abs() <= 1e-9 * t1.abs().max(1.0));
        match stepper.y_out().last() {
            Some(y_end) if reached => Ok((y_end.as_slice().to_vec(), steps)),
            _ => Err(format!("solver stopped short of t = {t1}")),
        }
    }
}

impl Integrator for Dopri5 {
    fn integrate(
        &self,
        rhs: &Rhs<'_>,
        y0: &[f64],
        time_points: &[f64],
    ) -> Result<Vec<Vec<f64>>, IntegrationFailure> {
        let mut out = Vec::with_capacity(time_points.len());
        let Some((&t0, rest)) = time_points.split_first() else {
            return Ok(out);
        };
        let mut t = t0;
        let mut y = y0.to_vec();
        out.push(y.clone());
        if !all_finite(&y) {
            return Err(fail(out, t, "non-finite initial state"));
        }
        if y.is_empty() {
            out.resize(time_points.len(), Vec::new());
            return Ok(out);
        }

        let mut steps = 0usize;
        for &target in rest {
            if steps >= self.max_steps {
                return Err(fail(out, t, "step budget exhausted"));
            }
            let budget = self.max_steps - steps;
            let (y_end, taken) = match self.interval(rhs, t, target, &y, budget) {
                Ok(done) => done,
                Err(reason) => return Err(fail(out, t, reason)),
            };
            steps += taken;
            if steps > self.max_steps {
                return Err(fail(out, t, "step budget exhausted"));
            }
            if !all_finite(&y_end) {
                return Err(fail(out, t, "non-finite state"));
            }
            t = target;
            y = y_end;
            out.push(y.clone());
        }
        Ok(out)
    }
}

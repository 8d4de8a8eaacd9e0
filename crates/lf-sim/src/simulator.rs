//! Simulation driver.

use std::collections::BTreeMap;
use std::sync::Arc;

use lf_core::{Table, l2_norm, linspace};
use lf_model::{DefinitionError, EntityKind, EvalPlan, Model};
use nalgebra::DVector;
use tracing::{debug, warn};

use crate::error::{SimError, SimResult};
use crate::integrator::Integrator;
use crate::newton::{Polish, newton_polish};
use crate::protocol::Protocol;
use crate::result::SimulationResult;
use crate::settings::{IntegratorSettings, SteadyStateSettings};

/// Drives time courses and steady states of one model.
///
/// The simulator owns its model and only ever rewrites parameter values.
/// Successive runs continue from the last recorded state; a boundary row
/// shared by two runs is kept once, evaluated with the parameters of the
/// later run.
#[derive(Debug)]
pub struct Simulator {
    model: Model,
    plan: Arc<EvalPlan>,
    integrator: Box<dyn Integrator>,
    y0: Vec<f64>,
    result: Option<SimulationResult>,
}

impl Simulator {
    /// Simulator with the default adaptive integrator.
    pub fn new(model: Model) -> SimResult<Self> {
        Self::with_integrator(model, IntegratorSettings::default().build())
    }

    pub fn with_integrator(mut model: Model, integrator: Box<dyn Integrator>) -> SimResult<Self> {
        let plan = model.plan()?;
        let y0 = model.initial_conditions();
        let parameters = model.parameter_values();

        // Surface evaluation errors before any integration
        plan.right_hand_side(&parameters, 0.0, &y0)?;
        plan.fluxes(&parameters, 0.0, &y0)?;

        Ok(Self {
            model,
            plan,
            integrator,
            y0,
            result: None,
        })
    }

    /// Override the initial values of some variables.
    pub fn with_initial_conditions<I, S>(mut self, values: I) -> SimResult<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        for (name, value) in values {
            let name = name.as_ref();
            let idx = self
                .plan
                .variable_names()
                .iter()
                .position(|v| v == name)
                .ok_or_else(|| DefinitionError::UnknownEntity {
                    kind: EntityKind::Variable,
                    name: name.to_string(),
                })?;
            if !value.is_finite() {
                return Err(SimError::InvalidArg {
                    what: format!("non-finite initial value for {name}"),
                });
            }
            self.y0[idx] = value;
        }
        Ok(self)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn initial_conditions(&self) -> &[f64] {
        &self.y0
    }

    pub fn update_parameter(&mut self, name: &str, value: f64) -> SimResult<&mut Self> {
        self.model.update_parameter(name, value)?;
        Ok(self)
    }

    pub fn update_parameters<I, S>(&mut self, values: I) -> SimResult<&mut Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        self.model.update_parameters(values)?;
        Ok(self)
    }

    pub fn scale_parameter(&mut self, name: &str, factor: f64) -> SimResult<&mut Self> {
        self.model.scale_parameter(name, factor)?;
        Ok(self)
    }

    pub fn scale_parameters<I, S>(&mut self, factors: I) -> SimResult<&mut Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        self.model.scale_parameters(factors)?;
        Ok(self)
    }

    /// Time and state where the next run starts.
    fn current_state(&self) -> (f64, Vec<f64>) {
        self.result
            .as_ref()
            .and_then(SimulationResult::last_state)
            .unwrap_or_else(|| (0.0, self.y0.clone()))
    }

    fn has_failed(&self) -> bool {
        self.result.as_ref().is_some_and(SimulationResult::is_failure)
    }

    fn result_mut(&mut self) -> &mut SimulationResult {
        let plan = &self.plan;
        self.result
            .get_or_insert_with(|| SimulationResult::empty(plan))
    }

    fn fail(&mut self, time: f64, reason: String) {
        warn!(time, %reason, "integration failed");
        self.result_mut().set_failure(reason);
    }

    /// Append integrated rows, replacing the previous boundary row.
    fn record(
        &mut self,
        times: &[f64],
        states: &[Vec<f64>],
        parameters: &[f64],
        segment: Option<usize>,
    ) -> SimResult<()> {
        if states.is_empty() {
            return Ok(());
        }
        let plan = Arc::clone(&self.plan);
        let result = self.result_mut();
        if let (Some((t_last, _)), Some(&t_first)) = (result.last_state(), times.first()) {
            if t_last == t_first {
                result.pop();
            }
        }
        for (&t, y) in times.iter().zip(states) {
            result.push(&plan, parameters, t, y, segment)?;
        }
        Ok(())
    }

    /// Integrate over `time_points` with the current parameters.
    fn run(&mut self, time_points: &[f64], segment: Option<usize>) -> SimResult<()> {
        let parameters = self.model.parameter_values();
        let (_, y0) = self.current_state();
        let plan = Arc::clone(&self.plan);
        let rhs = |t: f64, y: &[f64]| plan.rhs_unchecked(&parameters, t, y);

        match self.integrator.integrate(&rhs, &y0, time_points) {
            Ok(states) => self.record(time_points, &states, &parameters, segment),
            Err(failure) => {
                self.record(time_points, &failure.partial, &parameters, segment)?;
                self.fail(failure.time, failure.reason);
                Ok(())
            }
        }
    }

    /// Simulate over explicit time points.
    ///
    /// Continues from the last recorded state if there is one. If the first
    /// time point lies after the current time, the current time is prepended.
    /// A simulator whose last run failed does not integrate any further.
    pub fn simulate(&mut self, time_points: &[f64]) -> SimResult<&mut Self> {
        if self.has_failed() {
            debug!("skipping simulation after a failed run");
            return Ok(self);
        }
        if time_points.is_empty() {
            return Err(SimError::InvalidArg {
                what: "no time points given".to_string(),
            });
        }
        if time_points.iter().any(|t| !t.is_finite())
            || time_points.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(SimError::InvalidArg {
                what: "time points must be finite and strictly increasing".to_string(),
            });
        }
        let (t0, _) = self.current_state();
        let mut points = Vec::with_capacity(time_points.len() + 1);
        if time_points[0] < t0 {
            return Err(SimError::InvalidArg {
                what: format!("time points start at {} before current time {t0}", time_points[0]),
            });
        } else if time_points[0] > t0 {
            points.push(t0);
        }
        points.extend_from_slice(time_points);
        self.run(&points, None)?;
        Ok(self)
    }

    /// Simulate from the current time to `t_end` in `steps` equal intervals.
    pub fn simulate_until(&mut self, t_end: f64, steps: usize) -> SimResult<&mut Self> {
        let (t0, _) = self.current_state();
        if t_end.is_nan() || t_end <= t0 || steps == 0 {
            return Err(SimError::InvalidArg {
                what: format!("cannot simulate from {t0} to {t_end} in {steps} steps"),
            });
        }
        self.simulate(&linspace(t0, t_end, steps + 1))
    }

    /// Apply protocol segments in order, each held for its duration.
    ///
    /// Overrides persist after their segment ends. Every segment is sampled
    /// at `points_per_segment + 1` equally spaced points; the row at a
    /// boundary belongs to the segment that starts there.
    pub fn simulate_protocol(
        &mut self,
        protocol: &Protocol,
        points_per_segment: usize,
    ) -> SimResult<&mut Self> {
        protocol.validate()?;
        if points_per_segment == 0 {
            return Err(SimError::InvalidArg {
                what: "points_per_segment must be at least 1".to_string(),
            });
        }
        for segment in protocol.segments() {
            for name in segment.overrides.keys() {
                if self.model.kind_of(name) != Some(EntityKind::Parameter) {
                    return Err(DefinitionError::UnknownEntity {
                        kind: EntityKind::Parameter,
                        name: name.clone(),
                    }
                    .into());
                }
            }
        }

        for (i, segment) in protocol.segments().iter().enumerate() {
            if self.has_failed() {
                break;
            }
            self.model.update_parameters(
                segment.overrides.iter().map(|(k, v)| (k.as_str(), *v)),
            )?;
            let (t0, _) = self.current_state();
            let t1 = t0 + segment.duration;
            debug!(segment = i, start = t0, end = t1, "protocol segment");
            self.run(&linspace(t0, t1, points_per_segment + 1), Some(i))?;
        }
        Ok(self)
    }

    /// Integrate in chunks of `step_size` until the state stops changing.
    ///
    /// Records a single row at the time convergence was reached. Failure to
    /// converge within `max_rounds` chunks is recorded as a failed run.
    pub fn simulate_to_steady_state(
        &mut self,
        settings: &SteadyStateSettings,
    ) -> SimResult<&mut Self> {
        if settings.step_size.is_nan()
            || settings.step_size <= 0.0
            || settings.tolerance.is_nan()
            || settings.tolerance <= 0.0
        {
            return Err(SimError::InvalidArg {
                what: "steady state step_size and tolerance must be positive".to_string(),
            });
        }
        if self.has_failed() {
            return Ok(self);
        }

        let parameters = self.model.parameter_values();
        let plan = Arc::clone(&self.plan);
        let rhs = |t: f64, y: &[f64]| plan.rhs_unchecked(&parameters, t, y);
        let (mut t, mut y) = self.current_state();

        let mut converged = false;
        for round in 0..settings.max_rounds {
            let y_new = match self.integrator.integrate(&rhs, &y, &[t, t + settings.step_size]) {
                Ok(mut states) => states.pop().unwrap_or_else(|| y.clone()),
                Err(failure) => {
                    self.fail(failure.time, failure.reason);
                    return Ok(self);
                }
            };
            let diff: Vec<f64> = y_new
                .iter()
                .zip(&y)
                .map(|(new, old)| {
                    let d = new - old;
                    if settings.rel_norm && *old != 0.0 { d / old } else { d }
                })
                .collect();
            t += settings.step_size;
            y = y_new;
            if l2_norm(&diff) < settings.tolerance {
                debug!(rounds = round + 1, time = t, "steady state reached");
                converged = true;
                break;
            }
        }
        if !converged {
            self.fail(
                t,
                format!("no steady state after {} rounds", settings.max_rounds),
            );
            return Ok(self);
        }

        if settings.newton_polish {
            let residual = |x: &DVector<f64>| DVector::from_vec(rhs(t, x.as_slice()));
            match newton_polish(&y, residual, &Polish::default()) {
                Some(polished) => y = polished,
                None => debug!("newton polish rejected, keeping integrated state"),
            }
        }

        self.record(&[t], &[y], &parameters, None)?;
        Ok(self)
    }

    pub fn get_result(&self) -> Option<&SimulationResult> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<SimulationResult> {
        self.result
    }

    pub fn get_concs(&self) -> Option<&Table> {
        self.result.as_ref().map(SimulationResult::concs)
    }

    pub fn get_fluxes(&self) -> Option<&Table> {
        self.result.as_ref().map(SimulationResult::fluxes)
    }

    pub fn get_full_concs(&self) -> Option<&Table> {
        self.result.as_ref().map(SimulationResult::full_concs)
    }

    pub fn get_concs_and_fluxes(&self) -> Option<(&Table, &Table)> {
        self.result.as_ref().map(|r| (r.concs(), r.fluxes()))
    }

    pub fn get_results(&self) -> Option<&Table> {
        self.result.as_ref().map(SimulationResult::results)
    }

    /// Last simulated state by variable name.
    pub fn get_new_y0(&self) -> Option<BTreeMap<String, f64>> {
        let (_, y) = self.result.as_ref()?.last_state()?;
        Some(self.plan.variable_names().iter().cloned().zip(y).collect())
    }

    /// Forget all results; the next run starts from the initial conditions.
    pub fn clear_results(&mut self) -> &mut Self {
        self.result = None;
        self
    }
}

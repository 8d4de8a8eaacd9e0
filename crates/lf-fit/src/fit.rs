//! Fitting model parameters to steady-state and time-course data.

use std::collections::BTreeMap;

use lf_core::{Key, Table};
use lf_model::{DefinitionError, EntityKind, Model};
use lf_sim::{IntegratorSettings, SimResult, SimulationResult, Simulator, SteadyStateSettings};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FitError, FitResult};
use crate::minimizer::{Minimizer, NelderMead};

/// Simulation and minimizer settings of a fit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    pub integrator: IntegratorSettings,
    pub steady_state: SteadyStateSettings,
    pub nelder_mead: NelderMead,
}

/// Root mean square difference over the data names found in the model
/// output.
pub fn steady_state_rmse(model: &BTreeMap<String, f64>, data: &BTreeMap<String, f64>) -> f64 {
    let diffs: Vec<f64> = data
        .iter()
        .filter_map(|(name, d)| model.get(name).map(|m| m - d))
        .collect();
    rms(&diffs)
}

/// Root mean square difference of time courses, matching data columns by
/// name and rows by position.
pub fn time_course_rmse(model: &Table, data: &Table) -> f64 {
    let mut diffs = Vec::new();
    for name in data.columns() {
        let (Some(m), Some(d)) = (model.column(name), data.column(name)) else {
            continue;
        };
        diffs.extend(m.iter().zip(&d).map(|(m, d)| m - d));
    }
    rms(&diffs)
}

fn rms(diffs: &[f64]) -> f64 {
    if diffs.is_empty() {
        return f64::INFINITY;
    }
    (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt()
}

/// Fits named parameters of the factory model to data.
///
/// Each residual evaluation builds a fresh model, so evaluations share no
/// state. A simulation that fails makes the residual infinite. If the
/// minimizer does not converge, every fitted parameter is `NaN`.
pub struct Fit<F> {
    factory: F,
    settings: FitSettings,
}

impl<F> Fit<F>
where
    F: Fn() -> Model,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            settings: FitSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: FitSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &FitSettings {
        &self.settings
    }

    /// Check fitted names and data names against the factory model.
    fn check<'a>(
        &self,
        p0: &BTreeMap<String, f64>,
        data_names: impl IntoIterator<Item = &'a String>,
    ) -> FitResult<()> {
        if p0.is_empty() {
            return Err(FitError::InvalidArg {
                what: "no parameters to fit".to_string(),
            });
        }
        let mut model = (self.factory)();
        for name in p0.keys() {
            if model.kind_of(name) != Some(EntityKind::Parameter) {
                return Err(DefinitionError::UnknownEntity {
                    kind: EntityKind::Parameter,
                    name: name.clone(),
                }
                .into());
            }
        }
        let plan = model.plan()?;
        let mut n_data = 0;
        for name in data_names {
            n_data += 1;
            let known = plan.full_conc_names().contains(name) || plan.reaction_names().contains(name);
            if !known {
                return Err(DefinitionError::UnknownReference {
                    name: name.clone(),
                    referenced_by: "fit data".to_string(),
                }
                .into());
            }
        }
        if n_data == 0 {
            return Err(FitError::InvalidArg {
                what: "no data to fit".to_string(),
            });
        }
        Ok(())
    }

    /// Fresh simulator with `values` applied; `None` if they are unusable.
    fn simulate(
        &self,
        names: &[String],
        values: &[f64],
        run: impl FnOnce(&mut Simulator) -> SimResult<()>,
    ) -> Option<SimulationResult> {
        let mut model = (self.factory)();
        model
            .update_parameters(names.iter().map(String::as_str).zip(values.iter().copied()))
            .ok()?;
        let mut sim = Simulator::with_integrator(model, self.settings.integrator.build()).ok()?;
        run(&mut sim).ok()?;
        sim.into_result().filter(|r| !r.is_failure())
    }

    fn minimize(
        &self,
        p0: &BTreeMap<String, f64>,
        residual: &dyn Fn(&[f64]) -> f64,
        minimizer: &dyn Minimizer,
    ) -> BTreeMap<String, f64> {
        let guess: Vec<f64> = p0.values().copied().collect();
        info!(parameters = p0.len(), "fit started");
        match minimizer.minimize(residual, &guess) {
            Some(best) if best.len() == guess.len() => {
                info!(residual = residual(&best), "fit converged");
                p0.keys().cloned().zip(best).collect()
            }
            _ => {
                warn!("fit did not converge");
                p0.keys().map(|k| (k.clone(), f64::NAN)).collect()
            }
        }
    }

    /// Steady-state output (full concentrations and fluxes) for parameter
    /// values, `None` if no steady state is found.
    fn steady_output(&self, names: &[String], values: &[f64]) -> Option<BTreeMap<String, f64>> {
        let settings = &self.settings.steady_state;
        let result = self.simulate(names, values, |sim| {
            sim.simulate_to_steady_state(settings).map(|_| ())
        })?;
        let mut out = result.final_full_concs();
        out.extend(result.final_fluxes());
        Some(out)
    }

    /// Time course (full concentrations and fluxes) at the data's times,
    /// `None` if the run fails.
    fn time_course_output(&self, names: &[String], values: &[f64], times: &[f64]) -> Option<Table> {
        let result = self.simulate(names, values, |sim| sim.simulate(times).map(|_| ()))?;
        let results = result.results();
        // drop the prepended start row
        let offset = results.n_rows().checked_sub(times.len())?;
        let mut table = Table::new(results.index_names().to_vec(), results.columns().to_vec());
        for (key, row) in results.rows().skip(offset) {
            table.push_row(key.to_vec(), row.to_vec()).ok()?;
        }
        Some(table)
    }

    /// Residual of parameter values against steady-state data.
    pub fn steady_state_residual(
        &self,
        parameters: &BTreeMap<String, f64>,
        data: &BTreeMap<String, f64>,
    ) -> f64 {
        let (names, values): (Vec<String>, Vec<f64>) =
            parameters.iter().map(|(k, v)| (k.clone(), *v)).unzip();
        self.steady_output(&names, &values)
            .map_or(f64::INFINITY, |out| steady_state_rmse(&out, data))
    }

    /// Fit to steady-state data with the default residual and minimizer.
    pub fn steady_state(
        &self,
        p0: &BTreeMap<String, f64>,
        data: &BTreeMap<String, f64>,
    ) -> FitResult<BTreeMap<String, f64>> {
        self.steady_state_with(p0, data, steady_state_rmse, &self.settings.nelder_mead)
    }

    /// Fit to steady-state data with a custom residual and minimizer.
    ///
    /// `residual` compares the model's steady state with `data`, both keyed
    /// by name.
    pub fn steady_state_with<R>(
        &self,
        p0: &BTreeMap<String, f64>,
        data: &BTreeMap<String, f64>,
        residual: R,
        minimizer: &dyn Minimizer,
    ) -> FitResult<BTreeMap<String, f64>>
    where
        R: Fn(&BTreeMap<String, f64>, &BTreeMap<String, f64>) -> f64,
    {
        self.check(p0, data.keys())?;
        let names: Vec<String> = p0.keys().cloned().collect();
        let objective = |values: &[f64]| {
            self.steady_output(&names, values)
                .map_or(f64::INFINITY, |out| residual(&out, data))
        };
        Ok(self.minimize(p0, &objective, minimizer))
    }

    /// Residual of parameter values against time-course data.
    pub fn time_course_residual(&self, parameters: &BTreeMap<String, f64>, data: &Table) -> f64 {
        let Ok(times) = data_times(data) else {
            return f64::INFINITY;
        };
        let (names, values): (Vec<String>, Vec<f64>) =
            parameters.iter().map(|(k, v)| (k.clone(), *v)).unzip();
        self.time_course_output(&names, &values, &times)
            .map_or(f64::INFINITY, |out| time_course_rmse(&out, data))
    }

    /// Fit to time-course data, indexed by time, with the default residual.
    pub fn time_course(
        &self,
        p0: &BTreeMap<String, f64>,
        data: &Table,
        minimizer: &dyn Minimizer,
    ) -> FitResult<BTreeMap<String, f64>> {
        self.time_course_with(p0, data, time_course_rmse, minimizer)
    }

    /// Fit to time-course data with a custom residual and minimizer.
    pub fn time_course_with<R>(
        &self,
        p0: &BTreeMap<String, f64>,
        data: &Table,
        residual: R,
        minimizer: &dyn Minimizer,
    ) -> FitResult<BTreeMap<String, f64>>
    where
        R: Fn(&Table, &Table) -> f64,
    {
        self.check(p0, data.columns())?;
        let times = data_times(data)?;
        let names: Vec<String> = p0.keys().cloned().collect();
        let objective = |values: &[f64]| {
            self.time_course_output(&names, values, &times)
                .map_or(f64::INFINITY, |out| residual(&out, data))
        };
        Ok(self.minimize(p0, &objective, minimizer))
    }
}

/// Time points of a data table; the first index level must be numeric and
/// strictly increasing.
fn data_times(data: &Table) -> FitResult<Vec<f64>> {
    let times: Option<Vec<f64>> = data
        .index()
        .iter()
        .map(|k| k.first().and_then(Key::as_f64))
        .collect();
    match times {
        Some(t) if !t.is_empty() && t.windows(2).all(|w| w[1] > w[0]) => Ok(t),
        _ => Err(FitError::InvalidArg {
            what: "data must be indexed by strictly increasing time".to_string(),
        }),
    }
}

/// Fit to steady-state data with default settings.
pub fn steady_state<F>(
    factory: F,
    p0: &BTreeMap<String, f64>,
    data: &BTreeMap<String, f64>,
) -> FitResult<BTreeMap<String, f64>>
where
    F: Fn() -> Model,
{
    Fit::new(factory).steady_state(p0, data)
}

/// Fit to time-course data with default simulation settings.
pub fn time_course<F>(
    factory: F,
    p0: &BTreeMap<String, f64>,
    data: &Table,
    minimizer: &dyn Minimizer,
) -> FitResult<BTreeMap<String, f64>>
where
    F: Fn() -> Model,
{
    Fit::new(factory).time_course(p0, data, minimizer)
}

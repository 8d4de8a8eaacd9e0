//! Parameter scans over isolated simulations.

use std::collections::BTreeMap;
use std::sync::Arc;

use lf_core::{Key, Table, linspace};
use lf_model::{DefinitionError, EntityKind, EvalPlan, Model};
use lf_sim::{
    IntegratorSettings, Protocol, SimResult, SimulationResult, Simulator, SteadyStateSettings,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::ScanCache;
use crate::error::{ScanError, ScanResult};
use crate::mca::McaOptions;
use crate::parameters::ParameterTable;
use crate::results::{ProtocolByPars, SteadyStates, TimeCourseByPars};

/// Simulation settings shared by every run of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    pub integrator: IntegratorSettings,
    pub steady_state: SteadyStateSettings,
    /// Sampling of every protocol segment
    pub points_per_segment: usize,
    /// Overrides of the factory model's initial values
    pub initial_conditions: BTreeMap<String, f64>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            integrator: IntegratorSettings::default(),
            steady_state: SteadyStateSettings::default(),
            points_per_segment: 10,
            initial_conditions: BTreeMap::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Request<'a> {
    SteadyState,
    TimeCourse { time_points: &'a [f64] },
    Protocol { protocol: &'a Protocol },
}

/// Runs one simulation per parameter combination.
///
/// Every row gets a fresh model from the factory and its own simulator, so
/// no state is shared between rows. Output rows follow input rows; a run
/// that fails numerically becomes a `NaN` row while structural errors abort
/// the scan.
pub struct Scan<F> {
    factory: F,
    options: ScanOptions,
    cache: Option<ScanCache>,
}

impl<F> Scan<F>
where
    F: Fn() -> Model,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            options: ScanOptions::default(),
            cache: None,
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Memoize runs in `cache`.
    pub fn with_cache(mut self, cache: ScanCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn cache(&self) -> Option<&ScanCache> {
        self.cache.as_ref()
    }

    pub fn take_cache(&mut self) -> Option<ScanCache> {
        self.cache.take()
    }

    /// Compile the factory model once and check the scanned names.
    fn template(&self, names: &[String]) -> ScanResult<Arc<EvalPlan>> {
        let mut model = (self.factory)();
        for name in names {
            if model.kind_of(name) != Some(EntityKind::Parameter) {
                return Err(DefinitionError::UnknownEntity {
                    kind: EntityKind::Parameter,
                    name: name.clone(),
                }
                .into());
            }
        }
        Ok(model.plan()?)
    }

    /// Run one combination; `None` if the run failed.
    fn run_row(
        &mut self,
        names: &[String],
        values: &[f64],
        request: &Request<'_>,
        run: impl FnOnce(&mut Simulator) -> SimResult<()>,
    ) -> ScanResult<Option<SimulationResult>> {
        let key = self
            .cache
            .as_ref()
            .and_then(|_| ScanCache::key(&(request, names, values, &self.options)));
        if let (Some(cache), Some(key)) = (self.cache.as_mut(), key.as_deref()) {
            if let Some(hit) = cache.get(key) {
                return Ok(Some(hit.clone()).filter(|r| !r.is_failure()));
            }
        }

        let mut model = (self.factory)();
        model.update_parameters(names.iter().map(String::as_str).zip(values.iter().copied()))?;
        let mut sim = Simulator::with_integrator(model, self.options.integrator.build())?
            .with_initial_conditions(
                self.options
                    .initial_conditions
                    .iter()
                    .map(|(k, v)| (k.as_str(), *v)),
            )?;
        run(&mut sim)?;
        let result = sim.into_result();

        if let (Some(cache), Some(key), Some(r)) = (self.cache.as_mut(), key, result.as_ref()) {
            cache.insert(key, r.clone());
        }
        Ok(result.filter(|r| !r.is_failure()))
    }

    /// Steady state of every combination.
    pub fn steady_state(&mut self, parameters: &ParameterTable) -> ScanResult<SteadyStates> {
        let plan = self.template(parameters.names())?;
        info!(rows = parameters.n_rows(), "steady state scan");

        let index = parameters.names().to_vec();
        let mut concs = Table::new(index.clone(), plan.full_conc_names().to_vec());
        let mut fluxes = Table::new(index, plan.reaction_names().to_vec());
        let settings = self.options.steady_state.clone();

        for (i, row) in parameters.rows().enumerate() {
            let key: Vec<Key> = row.iter().map(|&v| Key::Num(v)).collect();
            let result = self.run_row(parameters.names(), row, &Request::SteadyState, |sim| {
                sim.simulate_to_steady_state(&settings).map(|_| ())
            })?;
            let last = result.as_ref().and_then(|r| {
                Some((
                    r.full_concs().last_row()?.to_vec(),
                    r.fluxes().last_row()?.to_vec(),
                ))
            });
            match last {
                Some((c, v)) => {
                    concs.push_row(key.clone(), c)?;
                    fluxes.push_row(key, v)?;
                }
                None => {
                    warn!(row = i, "no steady state, recording NaN");
                    concs.push_row(key.clone(), vec![f64::NAN; concs.n_cols()])?;
                    fluxes.push_row(key, vec![f64::NAN; fluxes.n_cols()])?;
                }
            }
        }
        info!(rows = parameters.n_rows(), "steady state scan done");
        SteadyStates::new(concs, fluxes, parameters.clone())
    }

    /// Time course over `time_points` for every combination.
    ///
    /// If the first time point lies after zero, zero is prepended, as the
    /// simulator does.
    pub fn time_course(
        &mut self,
        parameters: &ParameterTable,
        time_points: &[f64],
    ) -> ScanResult<TimeCourseByPars> {
        let plan = self.template(parameters.names())?;
        let Some(&first) = time_points.first() else {
            return Err(ScanError::InvalidArg {
                what: "no time points given".to_string(),
            });
        };
        let mut grid = Vec::with_capacity(time_points.len() + 1);
        if first > 0.0 {
            grid.push(0.0);
        }
        grid.extend_from_slice(time_points);
        info!(rows = parameters.n_rows(), points = grid.len(), "time course scan");

        let request = Request::TimeCourse { time_points };
        let courses = self.collect_courses(&plan, parameters, &grid, &request, |sim| {
            sim.simulate(time_points).map(|_| ())
        })?;
        info!(rows = parameters.n_rows(), "time course scan done");
        Ok(courses)
    }

    /// Protocol time course for every combination.
    pub fn time_course_over_protocol(
        &mut self,
        parameters: &ParameterTable,
        protocol: &Protocol,
    ) -> ScanResult<ProtocolByPars> {
        let plan = self.template(parameters.names())?;
        protocol.validate()?;
        if protocol.is_empty() {
            return Err(ScanError::InvalidArg {
                what: "protocol has no segments".to_string(),
            });
        }
        let points = self.options.points_per_segment;
        if points == 0 {
            return Err(ScanError::InvalidArg {
                what: "points_per_segment must be at least 1".to_string(),
            });
        }

        let mut grid = Vec::new();
        for (start, segment) in protocol.boundaries().into_iter().zip(protocol.segments()) {
            let times = linspace(start, start + segment.duration, points + 1);
            let skip = usize::from(!grid.is_empty());
            grid.extend(times.into_iter().skip(skip));
        }
        info!(
            rows = parameters.n_rows(),
            segments = protocol.segments().len(),
            "protocol scan"
        );

        let request = Request::Protocol { protocol };
        let courses = self.collect_courses(&plan, parameters, &grid, &request, |sim| {
            sim.simulate_protocol(protocol, points).map(|_| ())
        })?;
        info!(rows = parameters.n_rows(), "protocol scan done");
        Ok(ProtocolByPars::new(courses, protocol.clone()))
    }

    fn collect_courses(
        &mut self,
        plan: &EvalPlan,
        parameters: &ParameterTable,
        grid: &[f64],
        request: &Request<'_>,
        run: impl Fn(&mut Simulator) -> SimResult<()>,
    ) -> ScanResult<TimeCourseByPars> {
        let index = vec!["n".to_string(), "time".to_string()];
        let mut concs = Table::new(index.clone(), plan.full_conc_names().to_vec());
        let mut fluxes = Table::new(index, plan.reaction_names().to_vec());
        let time_keys: Vec<Vec<Key>> = grid.iter().map(|&t| vec![Key::Num(t)]).collect();

        for (i, row) in parameters.rows().enumerate() {
            let result = self.run_row(parameters.names(), row, request, &run)?;
            let (c, v) = match result {
                Some(r) if r.n_rows() == grid.len() => (r.full_concs().clone(), r.fluxes().clone()),
                _ => {
                    warn!(row = i, "run failed, recording NaN");
                    let time = vec!["time".to_string()];
                    (
                        Table::nan_filled(time.clone(), time_keys.clone(), concs.columns().to_vec())?,
                        Table::nan_filled(time, time_keys.clone(), fluxes.columns().to_vec())?,
                    )
                }
            };
            concs.extend(&c.with_outer_level("n", Key::from(i)))?;
            fluxes.extend(&v.with_outer_level("n", Key::from(i)))?;
        }
        TimeCourseByPars::new(concs, fluxes, parameters.clone(), grid.to_vec())
    }

    /// Steady-state response of concentrations and fluxes to each parameter.
    ///
    /// Central differences of steady states around the factory's parameter
    /// values. Returns `(concentration, flux)` coefficient tables with one
    /// row per parameter; rows whose steady states fail are `NaN`.
    pub fn response_coefficients(
        &mut self,
        parameters: &[&str],
        mca: &McaOptions,
    ) -> ScanResult<(Table, Table)> {
        let names: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();
        let plan = self.template(&names)?;
        let reference = (self.factory)();
        let settings = self.options.steady_state.clone();
        let d = mca.displacement;

        let steady = |scan: &mut Self, names: &[String], values: &[f64]| {
            let result = scan.run_row(names, values, &Request::SteadyState, |sim| {
                sim.simulate_to_steady_state(&settings).map(|_| ())
            })?;
            Ok::<_, ScanError>(result.and_then(|r| {
                let c = r.full_concs().last_row()?.to_vec();
                let v = r.fluxes().last_row()?.to_vec();
                Some((c, v))
            }))
        };
        let base = if mca.normalized {
            steady(self, &[], &[])?
        } else {
            None
        };

        let index = vec!["parameter".to_string()];
        let mut concs = Table::new(index.clone(), plan.full_conc_names().to_vec());
        let mut fluxes = Table::new(index, plan.reaction_names().to_vec());
        for name in &names {
            let old = reference.parameter(name).unwrap_or(f64::NAN);
            let one = std::slice::from_ref(name);
            let upper = steady(self, one, &[old * (1.0 + d)])?;
            let lower = steady(self, one, &[old * (1.0 - d)])?;

            let key = vec![Key::Label(name.clone())];
            let coefficients = |up: &[f64], low: &[f64], norm: Option<&[f64]>| -> Vec<f64> {
                up.iter()
                    .zip(low)
                    .enumerate()
                    .map(|(j, (u, l))| {
                        let coef = (u - l) / (2.0 * d * old);
                        match norm {
                            Some(n) => coef * old / n[j],
                            None => coef,
                        }
                    })
                    .collect()
            };
            match (upper, lower) {
                (Some((cu, vu)), Some((cl, vl))) if !mca.normalized || base.is_some() => {
                    let (nc, nv) = match &base {
                        Some((c, v)) => (Some(c.as_slice()), Some(v.as_slice())),
                        None => (None, None),
                    };
                    concs.push_row(key.clone(), coefficients(&cu, &cl, nc))?;
                    fluxes.push_row(key, coefficients(&vu, &vl, nv))?;
                }
                _ => {
                    warn!(parameter = %name, "steady state failed, recording NaN");
                    concs.push_row(key.clone(), vec![f64::NAN; concs.n_cols()])?;
                    fluxes.push_row(key, vec![f64::NAN; fluxes.n_cols()])?;
                }
            }
        }
        Ok((concs, fluxes))
    }
}

/// Steady state per combination with default options.
pub fn steady_state<F>(factory: F, parameters: &ParameterTable) -> ScanResult<SteadyStates>
where
    F: Fn() -> Model,
{
    Scan::new(factory).steady_state(parameters)
}

/// Time course per combination with default options.
pub fn time_course<F>(
    factory: F,
    parameters: &ParameterTable,
    time_points: &[f64],
) -> ScanResult<TimeCourseByPars>
where
    F: Fn() -> Model,
{
    Scan::new(factory).time_course(parameters, time_points)
}

/// Protocol time course per combination with default options.
pub fn time_course_over_protocol<F>(
    factory: F,
    parameters: &ParameterTable,
    protocol: &Protocol,
) -> ScanResult<ProtocolByPars>
where
    F: Fn() -> Model,
{
    Scan::new(factory).time_course_over_protocol(parameters, protocol)
}

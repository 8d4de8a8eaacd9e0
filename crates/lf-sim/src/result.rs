//! Simulation results.

use std::collections::BTreeMap;

use lf_core::{Key, Table};
use lf_model::EvalPlan;
use serde::Serialize;

use crate::error::SimResult;

/// Time-indexed output of one simulator.
///
/// `concs` holds the variables, `full_concs` adds derived quantities and
/// readouts, and `fluxes` holds every reaction rate. A failed run keeps
/// the rows produced before the failure and records the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    concs: Table,
    full_concs: Table,
    fluxes: Table,
    results: Table,
    segments: Vec<Option<usize>>,
    failure: Option<String>,
}

impl SimulationResult {
    pub(crate) fn empty(plan: &EvalPlan) -> Self {
        let index = vec!["time".to_string()];
        let fluxes = Table::new(index.clone(), plan.reaction_names().to_vec());
        let full_concs = Table::new(index.clone(), plan.full_conc_names().to_vec());
        let mut combined = plan.full_conc_names().to_vec();
        combined.extend(plan.reaction_names().iter().cloned());
        Self {
            concs: Table::new(index.clone(), plan.variable_names().to_vec()),
            full_concs,
            fluxes,
            results: Table::new(index, combined),
            segments: Vec::new(),
            failure: None,
        }
    }

    /// Evaluate and append one row.
    pub(crate) fn push(
        &mut self,
        plan: &EvalPlan,
        parameters: &[f64],
        time: f64,
        state: &[f64],
        segment: Option<usize>,
    ) -> SimResult<()> {
        let full = plan.full_concs(parameters, time, state)?;
        let fluxes = plan.fluxes(parameters, time, state)?;
        let mut combined = full.clone();
        combined.extend(fluxes.iter().copied());

        let key = vec![Key::Num(time)];
        self.concs.push_row(key.clone(), state.to_vec())?;
        self.full_concs.push_row(key.clone(), full)?;
        self.fluxes.push_row(key.clone(), fluxes)?;
        self.results.push_row(key, combined)?;
        self.segments.push(segment);
        Ok(())
    }

    pub(crate) fn pop(&mut self) {
        self.concs.pop_row();
        self.full_concs.pop_row();
        self.fluxes.pop_row();
        self.results.pop_row();
        self.segments.pop();
    }

    pub(crate) fn set_failure(&mut self, reason: String) {
        self.failure = Some(reason);
    }

    /// Time and state of the last row.
    pub(crate) fn last_state(&self) -> Option<(f64, Vec<f64>)> {
        let time = self.concs.index().last()?.first()?.as_f64()?;
        Some((time, self.concs.last_row()?.to_vec()))
    }

    /// Variable concentrations.
    pub fn concs(&self) -> &Table {
        &self.concs
    }

    /// Variables, derived quantities and readouts.
    pub fn full_concs(&self) -> &Table {
        &self.full_concs
    }

    pub fn fluxes(&self) -> &Table {
        &self.fluxes
    }

    /// Full concentrations and fluxes side by side.
    pub fn results(&self) -> &Table {
        &self.results
    }

    /// Split into `(concs, fluxes)`.
    pub fn into_parts(self) -> (Table, Table) {
        (self.concs, self.fluxes)
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Protocol segment active at each row (`None` outside protocols).
    pub fn segments(&self) -> &[Option<usize>] {
        &self.segments
    }

    pub fn time(&self) -> Vec<f64> {
        self.concs
            .index()
            .iter()
            .map(|k| k.first().and_then(Key::as_f64).unwrap_or(f64::NAN))
            .collect()
    }

    pub fn n_rows(&self) -> usize {
        self.concs.n_rows()
    }

    /// Last row of `concs` by name.
    pub fn final_concs(&self) -> BTreeMap<String, f64> {
        last_row_map(&self.concs)
    }

    /// Last row of `full_concs` by name.
    pub fn final_full_concs(&self) -> BTreeMap<String, f64> {
        last_row_map(&self.full_concs)
    }

    /// Last row of `fluxes` by name.
    pub fn final_fluxes(&self) -> BTreeMap<String, f64> {
        last_row_map(&self.fluxes)
    }
}

fn last_row_map(table: &Table) -> BTreeMap<String, f64> {
    match table.last_row() {
        Some(row) => table.columns().iter().cloned().zip(row.iter().copied()).collect(),
        None => BTreeMap::new(),
    }
}

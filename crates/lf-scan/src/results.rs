//! Scan result containers.

use lf_core::{Key, Table};
use lf_sim::Protocol;
use serde::Serialize;

use crate::agg::Agg;
use crate::error::{ScanError, ScanResult};
use crate::parameters::ParameterTable;

/// One steady state per parameter combination.
///
/// Rows are indexed by the parameter values of their combination, in input
/// order. Failed runs are rows of `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SteadyStates {
    concs: Table,
    fluxes: Table,
    results: Table,
    parameters: ParameterTable,
}

impl SteadyStates {
    pub(crate) fn new(concs: Table, fluxes: Table, parameters: ParameterTable) -> ScanResult<Self> {
        let results = concs.hcat(&fluxes)?;
        Ok(Self {
            concs,
            fluxes,
            results,
            parameters,
        })
    }

    /// Full concentrations (variables, derived quantities, readouts).
    pub fn concs(&self) -> &Table {
        &self.concs
    }

    pub fn fluxes(&self) -> &Table {
        &self.fluxes
    }

    pub fn results(&self) -> &Table {
        &self.results
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    pub fn into_parts(self) -> (Table, Table) {
        (self.concs, self.fluxes)
    }

    /// Row numbers of failed combinations.
    pub fn failed_rows(&self) -> Vec<usize> {
        (0..self.results.n_rows())
            .filter(|&i| self.results.row_is_nan(i))
            .collect()
    }
}

/// One time course per parameter combination, indexed by `(n, time)`.
///
/// Every run shares the same time grid; a failed run contributes `NaN`
/// rows over the whole grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeCourseByPars {
    concs: Table,
    fluxes: Table,
    results: Table,
    parameters: ParameterTable,
    times: Vec<f64>,
}

impl TimeCourseByPars {
    pub(crate) fn new(
        concs: Table,
        fluxes: Table,
        parameters: ParameterTable,
        times: Vec<f64>,
    ) -> ScanResult<Self> {
        let results = concs.hcat(&fluxes)?;
        Ok(Self {
            concs,
            fluxes,
            results,
            parameters,
            times,
        })
    }

    pub fn concs(&self) -> &Table {
        &self.concs
    }

    pub fn fluxes(&self) -> &Table {
        &self.fluxes
    }

    pub fn results(&self) -> &Table {
        &self.results
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    pub fn into_parts(self) -> (Table, Table) {
        (self.concs, self.fluxes)
    }

    /// Shared time grid of all runs.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn n_runs(&self) -> usize {
        self.parameters.n_rows()
    }

    /// Runs whose every row is `NaN`.
    pub fn failed_runs(&self) -> Vec<usize> {
        let n_times = self.times.len();
        (0..self.n_runs())
            .filter(|r| (0..n_times).all(|j| self.results.row_is_nan(r * n_times + j)))
            .collect()
    }

    /// One column per run for the named quantity, indexed by time.
    pub fn get_by_name(&self, name: &str) -> ScanResult<Table> {
        let values = self
            .results
            .column(name)
            .ok_or_else(|| ScanError::InvalidArg {
                what: format!("no result named {name}"),
            })?;
        let n_times = self.times.len();
        let runs: Vec<String> = (0..self.n_runs()).map(|r| r.to_string()).collect();
        let mut table = Table::new(vec!["time".to_string()], runs);
        for (j, &t) in self.times.iter().enumerate() {
            let row = (0..self.n_runs()).map(|r| values[r * n_times + j]).collect();
            table.push_row(vec![Key::Num(t)], row)?;
        }
        Ok(table)
    }

    /// Aggregate across runs at every time point.
    pub fn get_agg_per_time(&self, agg: Agg) -> Table {
        let n_times = self.times.len();
        let mut table = Table::new(vec!["time".to_string()], self.results.columns().to_vec());
        for (j, &t) in self.times.iter().enumerate() {
            let rows: Vec<&[f64]> = (0..self.n_runs())
                .filter_map(|r| self.results.row(r * n_times + j))
                .collect();
            let _ = table.push_row(vec![Key::Num(t)], aggregate_columns(&rows, agg));
        }
        table
    }

    /// Aggregate across time points of every run.
    pub fn get_agg_per_run(&self, agg: Agg) -> Table {
        let n_times = self.times.len();
        let mut table = Table::new(vec!["n".to_string()], self.results.columns().to_vec());
        for r in 0..self.n_runs() {
            let rows: Vec<&[f64]> = (0..n_times)
                .filter_map(|j| self.results.row(r * n_times + j))
                .collect();
            let _ = table.push_row(vec![Key::from(r)], aggregate_columns(&rows, agg));
        }
        table
    }
}

fn aggregate_columns(rows: &[&[f64]], agg: Agg) -> Vec<f64> {
    let width = rows.first().map_or(0, |r| r.len());
    (0..width)
        .map(|c| {
            let column: Vec<f64> = rows.iter().map(|r| r[c]).collect();
            agg.apply(&column)
        })
        .collect()
}

/// Time courses over one protocol per parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolByPars {
    courses: TimeCourseByPars,
    protocol: Protocol,
}

impl ProtocolByPars {
    pub(crate) fn new(courses: TimeCourseByPars, protocol: Protocol) -> Self {
        Self { courses, protocol }
    }

    pub fn courses(&self) -> &TimeCourseByPars {
        &self.courses
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn concs(&self) -> &Table {
        self.courses.concs()
    }

    pub fn fluxes(&self) -> &Table {
        self.courses.fluxes()
    }

    pub fn results(&self) -> &Table {
        self.courses.results()
    }

    pub fn parameters(&self) -> &ParameterTable {
        self.courses.parameters()
    }

    pub fn into_parts(self) -> (Table, Table) {
        self.courses.into_parts()
    }

    pub fn get_by_name(&self, name: &str) -> ScanResult<Table> {
        self.courses.get_by_name(name)
    }

    pub fn get_agg_per_time(&self, agg: Agg) -> Table {
        self.courses.get_agg_per_time(agg)
    }

    pub fn get_agg_per_run(&self, agg: Agg) -> Table {
        self.courses.get_agg_per_run(agg)
    }
}

//! Metabolic control analysis by central differences.
//!
//! Elasticities are local: they perturb one concentration or parameter at a
//! fixed state, which need not be a steady state. Response coefficients
//! compare steady states and live on [`Scan`](crate::Scan).

use std::collections::BTreeMap;

use lf_core::{Key, Table};
use lf_model::Model;
use serde::{Deserialize, Serialize};

use crate::error::{ScanError, ScanResult};

/// Finite difference settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McaOptions {
    /// Scale coefficients by `value / flux` (or `value / concentration`)
    pub normalized: bool,
    /// Relative perturbation in each direction
    pub displacement: f64,
}

impl Default for McaOptions {
    fn default() -> Self {
        Self {
            normalized: true,
            displacement: 1e-4,
        }
    }
}

fn state_of(model: &Model, concs: &BTreeMap<String, f64>) -> ScanResult<Vec<f64>> {
    model
        .variable_names()
        .into_iter()
        .map(|name| {
            concs
                .get(&name)
                .copied()
                .ok_or(ScanError::MissingConcentration { name })
        })
        .collect()
}

fn quotient(upper: &[f64], lower: &[f64], scale: f64, old: f64, base: Option<&[f64]>) -> Vec<f64> {
    upper
        .iter()
        .zip(lower)
        .enumerate()
        .map(|(j, (u, l))| {
            let coef = (u - l) / scale;
            base.map_or(coef, |b| coef * old / b[j])
        })
        .collect()
}

/// Sensitivity of every flux to each variable, one row per variable.
///
/// `concs` must hold every variable of the model.
pub fn compound_elasticities(
    model: &mut Model,
    variables: &[&str],
    concs: &BTreeMap<String, f64>,
    time: f64,
    options: &McaOptions,
) -> ScanResult<Table> {
    let names = model.variable_names();
    let state = state_of(model, concs)?;
    let base = model.get_fluxes(time, &state)?;
    let d = options.displacement;

    let mut table = Table::new(vec!["variable".to_string()], model.reaction_names());
    for &var in variables {
        let idx = names
            .iter()
            .position(|n| n == var)
            .ok_or_else(|| ScanError::MissingConcentration {
                name: var.to_string(),
            })?;
        let old = state[idx];
        let mut perturbed = state.clone();
        perturbed[idx] = old * (1.0 + d);
        let upper = model.get_fluxes(time, &perturbed)?;
        perturbed[idx] = old * (1.0 - d);
        let lower = model.get_fluxes(time, &perturbed)?;
        let norm = options.normalized.then_some(base.as_slice());
        table.push_row(
            vec![Key::from(var)],
            quotient(&upper, &lower, 2.0 * d * old, old, norm),
        )?;
    }
    Ok(table)
}

/// Sensitivity of every flux to each parameter, one row per parameter.
///
/// Parameters are restored after each perturbation.
pub fn parameter_elasticities(
    model: &mut Model,
    parameters: &[&str],
    concs: &BTreeMap<String, f64>,
    time: f64,
    options: &McaOptions,
) -> ScanResult<Table> {
    let state = state_of(model, concs)?;
    let base = model.get_fluxes(time, &state)?;
    let d = options.displacement;

    let mut table = Table::new(vec!["parameter".to_string()], model.reaction_names());
    for &par in parameters {
        let old = model
            .parameter(par)
            .ok_or_else(|| lf_model::DefinitionError::UnknownEntity {
                kind: lf_model::EntityKind::Parameter,
                name: par.to_string(),
            })?;
        model.update_parameter(par, old * (1.0 + d))?;
        let upper = model.get_fluxes(time, &state);
        model.update_parameter(par, old * (1.0 - d))?;
        let lower = model.get_fluxes(time, &state);
        model.update_parameter(par, old)?;

        let norm = options.normalized.then_some(base.as_slice());
        table.push_row(
            vec![Key::from(par)],
            quotient(&upper?, &lower?, 2.0 * d * old, old, norm),
        )?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lf_model::fns;

    fn model() -> Model {
        // v1 = k1 * x, v2 = vmax * x / (km + x)
        let mut m = Model::new();
        m.add_parameters([("k1", 2.0), ("vmax", 1.0), ("km", 1.0)])
            .unwrap()
            .add_variable("x", 1.0)
            .unwrap()
            .add_reaction("v1", fns::mass_action_1s(), ["x", "k1"], [("x", -1.0)])
            .unwrap()
            .add_reaction(
                "v2",
                fns::michaelis_menten_1s(),
                ["x", "vmax", "km"],
                [("x", -1.0)],
            )
            .unwrap();
        m
    }

    fn concs() -> BTreeMap<String, f64> {
        BTreeMap::from([("x".to_string(), 1.0)])
    }

    #[test]
    fn normalized_elasticities_match_kinetic_orders() {
        let mut m = model();
        let e = compound_elasticities(&mut m, &["x"], &concs(), 0.0, &McaOptions::default()).unwrap();
        // first order: 1; Michaelis-Menten at x = km: km / (km + x) = 0.5
        assert!((e.get(0, "v1").unwrap() - 1.0).abs() < 1e-6);
        assert!((e.get(0, "v2").unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn parameter_elasticities_restore_values() {
        let mut m = model();
        let e = parameter_elasticities(&mut m, &["k1", "km"], &concs(), 0.0, &McaOptions::default())
            .unwrap();
        assert!((e.get(0, "v1").unwrap() - 1.0).abs() < 1e-6);
        assert!(e.get(0, "v2").unwrap().abs() < 1e-9);
        assert!((e.get(1, "v2").unwrap() + 0.5).abs() < 1e-6);
        assert_eq!(m.parameter("k1"), Some(2.0));
        assert_eq!(m.parameter("km"), Some(1.0));
    }

    #[test]
    fn unnormalized_elasticity_is_the_derivative() {
        let mut m = model();
        let options = McaOptions {
            normalized: false,
            ..McaOptions::default()
        };
        let e = compound_elasticities(&mut m, &["x"], &concs(), 0.0, &options).unwrap();
        assert!((e.get(0, "v1").unwrap() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn missing_names_are_reported() {
        let mut m = model();
        let empty = BTreeMap::new();
        assert!(matches!(
            compound_elasticities(&mut m, &["x"], &empty, 0.0, &McaOptions::default()),
            Err(ScanError::MissingConcentration { .. })
        ));
        let err = parameter_elasticities(&mut m, &["nope"], &concs(), 0.0, &McaOptions::default())
            .unwrap_err();
        assert!(err.is_definition());
    }
}

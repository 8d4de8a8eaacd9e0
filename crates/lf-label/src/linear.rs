//! Linear label model around a steady state.

use std::collections::BTreeMap;

use lf_model::{Model, fns};
use tracing::debug;

use crate::error::{LabelError, LabelResult};
use crate::labeling::{Labeling, Transition};

/// Reduces label tracing to one ODE per label position.
///
/// With concentrations and fluxes held at a steady state, the label
/// fraction at every position evolves linearly in the fractions at its
/// source positions. `n` positions need `n` variables instead of `2^n`.
#[derive(Debug, Clone)]
pub struct LinearLabelMapper {
    model: Model,
    labeling: Labeling,
}

impl LinearLabelMapper {
    /// Same label specification as [`LabelMapper::new`](crate::LabelMapper::new).
    pub fn new<V, S, M, R>(model: Model, label_variables: V, label_maps: M) -> LabelResult<Self>
    where
        V: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
        M: IntoIterator<Item = (R, Vec<usize>)>,
        R: Into<String>,
    {
        let labeling = Labeling::new(
            &model,
            label_variables.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            label_maps.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )?;
        Ok(Self { model, labeling })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Name of the variable holding the label fraction of `name` at
    /// `position`.
    pub fn position_name(name: &str, position: usize) -> String {
        format!("{name}__{position}")
    }

    /// Label fraction variables of `name`, by position.
    pub fn get_positions_of(&self, name: &str) -> LabelResult<Vec<String>> {
        let iso = self.labeling.isotopomers_of(name)?;
        Ok((0..iso.positions())
            .map(|i| Self::position_name(name, i))
            .collect())
    }

    /// Build the linear label model.
    ///
    /// `concs` must hold a positive concentration for every labeled variable
    /// and `fluxes` a non-negative flux for every mapped reaction touching
    /// labeled variables. Positions listed in `initial_labels` start fully
    /// labeled.
    pub fn build_model<I, S>(
        &self,
        concs: &BTreeMap<String, f64>,
        fluxes: &BTreeMap<String, f64>,
        initial_labels: I,
    ) -> LabelResult<Model>
    where
        I: IntoIterator<Item = (S, Vec<usize>)>,
        S: AsRef<str>,
    {
        let initial = self.labeling.initial_positions(initial_labels)?;
        let mut m = Model::new();

        let mut pools = BTreeMap::new();
        for (name, iso) in &self.labeling.isotopomers {
            let c = concs
                .get(name)
                .copied()
                .ok_or_else(|| LabelError::MissingValue {
                    kind: "concentration",
                    name: name.clone(),
                })?;
            if c.is_nan() || c <= 0.0 {
                return Err(LabelError::NonPositiveConcentration {
                    name: name.clone(),
                    value: c,
                });
            }
            pools.insert(name.as_str(), c);
            let labeled = initial.get(name);
            m.add_variables((0..iso.positions()).map(|i| {
                let start = labeled.is_some_and(|ps| ps.contains(&i));
                (Self::position_name(name, i), if start { 1.0 } else { 0.0 })
            }))?;
        }

        let mut n_reactions = 0;
        for rxn in self.model.reactions() {
            let Some(map) = self.labeling.maps.get(&rxn.name) else {
                self.labeling.check_unmapped(rxn)?;
                continue;
            };
            let t = Transition::new(rxn, &self.labeling, map)?;
            if !t.is_labeled() {
                continue;
            }
            let v = fluxes
                .get(&rxn.name)
                .copied()
                .ok_or_else(|| LabelError::MissingValue {
                    kind: "flux",
                    name: rxn.name.clone(),
                })?;
            if v.is_nan() || v < 0.0 {
                return Err(LabelError::NegativeFlux {
                    reaction: rxn.name.clone(),
                    value: v,
                });
            }
            m.add_parameter(rxn.name.clone(), v)?;

            let mut drained = vec![false; t.n_substrate];
            for (j, &source) in t.map.iter().enumerate() {
                let (slot, local) = t.product_at(j);
                let product = Self::position_name(&slot.variable, local);
                let mut stoichiometry = vec![(product, 1.0 / pools[slot.variable.as_str()])];
                let name = format!("{}__{j}", rxn.name);

                if source < t.n_substrate {
                    let (sub, sub_local) = t.substrate_at(source);
                    let substrate = Self::position_name(&sub.variable, sub_local);
                    if !drained[source] {
                        drained[source] = true;
                        add_coefficient(
                            &mut stoichiometry,
                            &substrate,
                            -1.0 / pools[sub.variable.as_str()],
                        );
                    }
                    stoichiometry.retain(|(_, c)| *c != 0.0);
                    m.add_reaction(
                        name,
                        fns::proportional(),
                        [rxn.name.clone(), substrate],
                        stoichiometry,
                    )?;
                } else {
                    m.add_reaction(name, fns::constant(), [rxn.name.as_str()], stoichiometry)?;
                }
                n_reactions += 1;
            }

            // Label on substrate positions that reach no product leaves too
            for (s, _) in drained.iter().enumerate().filter(|(_, d)| !**d) {
                let (sub, sub_local) = t.substrate_at(s);
                let substrate = Self::position_name(&sub.variable, sub_local);
                let coeff = -1.0 / pools[sub.variable.as_str()];
                m.add_reaction(
                    format!("{}__drain__{s}", rxn.name),
                    fns::proportional(),
                    [rxn.name.clone(), substrate.clone()],
                    [(substrate, coeff)],
                )?;
                n_reactions += 1;
            }
        }
        debug!(
            variables = m.variables().len(),
            reactions = n_reactions,
            "built linear label model"
        );
        Ok(m)
    }
}

fn add_coefficient(stoichiometry: &mut Vec<(String, f64)>, name: &str, coeff: f64) {
    match stoichiometry.iter_mut().find(|(n, _)| n == name) {
        Some((_, c)) => *c += coeff,
        None => stoichiometry.push((name.to_string(), coeff)),
    }
}

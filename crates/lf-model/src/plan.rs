//! Compiled evaluation plan.
//!
//! A plan resolves every argument name to a slot in a flat value buffer and
//! fixes the evaluation order of derived quantities. Slot layout:
//!
//! ```text
//! [time | parameters | variables | derived | readouts | reactions]
//! ```
//!
//! Derived quantities are stored in declaration order but evaluated in
//! topological order.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::error::{DefinitionError, ModelError, ModelResult};
use crate::function::Function;
use crate::model::{Model, TIME};

#[derive(Debug, Clone)]
struct Step {
    out: usize,
    function: Function,
    args: Vec<usize>,
}

impl Step {
    #[inline]
    fn eval(&self, values: &mut [f64], buf: &mut Vec<f64>) {
        buf.clear();
        buf.extend(self.args.iter().map(|&i| values[i]));
        values[self.out] = self.function.call(buf);
    }
}

/// Immutable, name-resolved evaluation order for one model snapshot.
#[derive(Debug, Clone)]
pub struct EvalPlan {
    n_parameters: usize,
    n_variables: usize,
    n_slots: usize,
    derived_base: usize,
    reaction_base: usize,
    derived: Vec<Step>,
    readouts: Vec<Step>,
    reactions: Vec<Step>,
    stoichiometry: Vec<Vec<(usize, f64)>>,
    parameter_names: Vec<String>,
    variable_names: Vec<String>,
    reaction_names: Vec<String>,
    full_conc_names: Vec<String>,
}

impl EvalPlan {
    pub(crate) fn compile(model: &Model) -> ModelResult<Self> {
        let n_parameters = model.parameters().len();
        let n_variables = model.variables().len();
        let n_derived = model.derived().len();
        let n_readouts = model.readouts().len();

        let derived_base = 1 + n_parameters + n_variables;
        let readout_base = derived_base + n_derived;
        let reaction_base = readout_base + n_readouts;
        let n_slots = reaction_base + model.reactions().len();

        let mut slots: HashMap<&str, usize> = HashMap::new();
        slots.insert(TIME, 0);
        for (i, p) in model.parameters().iter().enumerate() {
            slots.insert(&p.name, 1 + i);
        }
        for (i, v) in model.variables().iter().enumerate() {
            slots.insert(&v.name, 1 + n_parameters + i);
        }
        for (i, d) in model.derived().iter().enumerate() {
            slots.insert(&d.name, derived_base + i);
        }

        let resolve = |owner: &str, args: &[String]| -> ModelResult<Vec<usize>> {
            args.iter()
                .map(|a| {
                    slots.get(a.as_str()).copied().ok_or_else(|| {
                        ModelError::from(DefinitionError::UnknownReference {
                            name: a.clone(),
                            referenced_by: owner.to_string(),
                        })
                    })
                })
                .collect()
        };

        // Dependency graph between derived quantities
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(n_derived, n_derived);
        let nodes: Vec<NodeIndex> = (0..n_derived).map(|i| graph.add_node(i)).collect();
        let mut derived_steps = Vec::with_capacity(n_derived);
        for (i, d) in model.derived().iter().enumerate() {
            let args = resolve(&d.name, &d.args)?;
            for &slot in &args {
                if (derived_base..readout_base).contains(&slot) {
                    graph.add_edge(nodes[slot - derived_base], nodes[i], ());
                }
            }
            derived_steps.push(Step {
                out: derived_base + i,
                function: d.function.clone(),
                args,
            });
        }
        let order = toposort(&graph, None).map_err(|cycle| ModelError::Cycle {
            name: model.derived()[graph[cycle.node_id()]].name.clone(),
        })?;
        let derived: Vec<Step> = order
            .into_iter()
            .map(|n| derived_steps[graph[n]].clone())
            .collect();

        let readouts = model
            .readouts()
            .iter()
            .enumerate()
            .map(|(i, r)| {
                Ok(Step {
                    out: readout_base + i,
                    function: r.function.clone(),
                    args: resolve(&r.name, &r.args)?,
                })
            })
            .collect::<ModelResult<Vec<_>>>()?;

        let variable_index: HashMap<&str, usize> = model
            .variables()
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name.as_str(), i))
            .collect();
        let mut reactions = Vec::with_capacity(model.reactions().len());
        let mut stoichiometry = Vec::with_capacity(model.reactions().len());
        for (i, r) in model.reactions().iter().enumerate() {
            reactions.push(Step {
                out: reaction_base + i,
                function: r.function.clone(),
                args: resolve(&r.name, &r.args)?,
            });
            let column = r
                .stoichiometry
                .iter()
                .map(|(name, coeff)| {
                    variable_index
                        .get(name.as_str())
                        .map(|&j| (j, *coeff))
                        .ok_or_else(|| {
                            ModelError::from(DefinitionError::NotAVariable {
                                reaction: r.name.clone(),
                                name: name.clone(),
                            })
                        })
                })
                .collect::<ModelResult<Vec<_>>>()?;
            stoichiometry.push(column);
        }

        let mut full_conc_names: Vec<String> =
            model.variables().iter().map(|v| v.name.clone()).collect();
        full_conc_names.extend(model.derived().iter().map(|d| d.name.clone()));
        full_conc_names.extend(model.readouts().iter().map(|r| r.name.clone()));

        debug!(
            parameters = n_parameters,
            variables = n_variables,
            derived = n_derived,
            readouts = n_readouts,
            reactions = reactions.len(),
            "compiled evaluation plan"
        );

        Ok(Self {
            n_parameters,
            n_variables,
            n_slots,
            derived_base,
            reaction_base,
            derived,
            readouts,
            reactions,
            stoichiometry,
            parameter_names: model.parameters().iter().map(|p| p.name.clone()).collect(),
            variable_names: model.variables().iter().map(|v| v.name.clone()).collect(),
            reaction_names: model.reactions().iter().map(|r| r.name.clone()).collect(),
            full_conc_names,
        })
    }

    pub fn n_parameters(&self) -> usize {
        self.n_parameters
    }

    pub fn n_variables(&self) -> usize {
        self.n_variables
    }

    pub fn n_reactions(&self) -> usize {
        self.reactions.len()
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    pub fn reaction_names(&self) -> &[String] {
        &self.reaction_names
    }

    /// Variables, then derived quantities, then readouts.
    pub fn full_conc_names(&self) -> &[String] {
        &self.full_conc_names
    }

    fn check_lengths(&self, parameters: &[f64], state: &[f64]) -> ModelResult<()> {
        if parameters.len() != self.n_parameters {
            return Err(ModelError::StateLength {
                expected: self.n_parameters,
                got: parameters.len(),
            });
        }
        if state.len() != self.n_variables {
            return Err(ModelError::StateLength {
                expected: self.n_variables,
                got: state.len(),
            });
        }
        Ok(())
    }

    /// Evaluate every slot at `(time, state)`.
    ///
    /// Readouts are skipped unless `with_readouts` is set; they never feed
    /// back into the dynamics.
    fn fill(&self, parameters: &[f64], time: f64, state: &[f64], with_readouts: bool) -> Vec<f64> {
        let mut values = vec![0.0; self.n_slots];
        values[0] = time;
        values[1..=self.n_parameters].copy_from_slice(parameters);
        values[1 + self.n_parameters..self.derived_base].copy_from_slice(state);

        let mut buf = Vec::with_capacity(8);
        for step in &self.derived {
            step.eval(&mut values, &mut buf);
        }
        if with_readouts {
            for step in &self.readouts {
                step.eval(&mut values, &mut buf);
            }
        }
        for step in &self.reactions {
            step.eval(&mut values, &mut buf);
        }
        values
    }

    /// Time derivative of every variable.
    pub fn right_hand_side(
        &self,
        parameters: &[f64],
        time: f64,
        state: &[f64],
    ) -> ModelResult<Vec<f64>> {
        self.check_lengths(parameters, state)?;
        let values = self.fill(parameters, time, state, false);
        Ok(self.accumulate(&values))
    }

    /// Right-hand side without length checks, for use inside integrators.
    ///
    /// Panics if `parameters` or `state` have the wrong length.
    pub fn rhs_unchecked(&self, parameters: &[f64], time: f64, state: &[f64]) -> Vec<f64> {
        let values = self.fill(parameters, time, state, false);
        self.accumulate(&values)
    }

    fn accumulate(&self, values: &[f64]) -> Vec<f64> {
        let mut dxdt = vec![0.0; self.n_variables];
        for (i, column) in self.stoichiometry.iter().enumerate() {
            let rate = values[self.reaction_base + i];
            for &(j, coeff) in column {
                dxdt[j] += coeff * rate;
            }
        }
        dxdt
    }

    /// Rate of every reaction, in declaration order.
    pub fn fluxes(&self, parameters: &[f64], time: f64, state: &[f64]) -> ModelResult<Vec<f64>> {
        self.check_lengths(parameters, state)?;
        let values = self.fill(parameters, time, state, false);
        Ok(values[self.reaction_base..].to_vec())
    }

    /// Variables, derived quantities and readouts, in [`full_conc_names`] order.
    ///
    /// [`full_conc_names`]: Self::full_conc_names
    pub fn full_concs(
        &self,
        parameters: &[f64],
        time: f64,
        state: &[f64],
    ) -> ModelResult<Vec<f64>> {
        self.check_lengths(parameters, state)?;
        let values = self.fill(parameters, time, state, true);
        Ok(values[1 + self.n_parameters..self.reaction_base].to_vec())
    }
}

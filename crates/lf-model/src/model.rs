//! The model registry: a namespace of parameters, variables, derived
//! quantities, readouts and reactions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lf_core::ensure_finite;

use crate::error::{DefinitionError, EntityKind, ModelResult};
use crate::function::Function;
use crate::plan::EvalPlan;

/// Argument name that evaluates to the current integration time.
pub const TIME: &str = "time";

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub initial_value: f64,
}

/// A derived quantity or readout: `function(args...)`.
#[derive(Debug, Clone)]
pub struct Derived {
    pub name: String,
    pub function: Function,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Reaction {
    pub name: String,
    pub function: Function,
    pub args: Vec<String>,
    /// Signed coefficient per affected variable.
    pub stoichiometry: Vec<(String, f64)>,
}

impl Reaction {
    /// Coefficient of `variable`, if the reaction touches it.
    pub fn coefficient(&self, variable: &str) -> Option<f64> {
        self.stoichiometry
            .iter()
            .find(|(n, _)| n == variable)
            .map(|(_, c)| *c)
    }
}

/// Kinetic model.
///
/// Entities are added through the `add_*` methods, which validate names
/// against the current namespace. The evaluation plan is compiled on first
/// use and cached until the next structural change.
#[derive(Debug, Clone, Default)]
pub struct Model {
    parameters: Vec<Parameter>,
    variables: Vec<Variable>,
    derived: Vec<Derived>,
    readouts: Vec<Derived>,
    reactions: Vec<Reaction>,
    kinds: HashMap<String, EntityKind>,
    plan: Option<Arc<EvalPlan>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_name(&self, name: &str) -> Result<(), DefinitionError> {
        if name == TIME {
            return Err(DefinitionError::ReservedName {
                name: name.to_string(),
            });
        }
        if self.kinds.contains_key(name) {
            return Err(DefinitionError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn check_batch<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), DefinitionError> {
        let mut seen = HashSet::new();
        for name in names {
            self.check_name(name)?;
            if !seen.insert(name) {
                return Err(DefinitionError::DuplicateName {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_args(&self, owner: &str, function: &Function, args: &[String]) -> ModelResult<()> {
        if let Some(expected) = function.arity() {
            if expected != args.len() {
                return Err(DefinitionError::Arity {
                    name: owner.to_string(),
                    expected,
                    got: args.len(),
                }
                .into());
            }
        }
        for arg in args {
            let known = arg == TIME
                || matches!(
                    self.kinds.get(arg),
                    Some(EntityKind::Parameter | EntityKind::Variable | EntityKind::Derived)
                );
            if !known {
                return Err(DefinitionError::UnknownReference {
                    name: arg.clone(),
                    referenced_by: owner.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn check_value(name: &str, value: f64) -> Result<(), DefinitionError> {
        ensure_finite(value, "value")
            .map(|_| ())
            .map_err(|_| DefinitionError::NonFinite {
                name: name.to_string(),
                value,
            })
    }

    fn register(&mut self, name: &str, kind: EntityKind) {
        self.kinds.insert(name.to_string(), kind);
        self.plan = None;
    }

    // --- parameters ---

    /// Add several parameters at once. Nothing is added if any name is invalid.
    pub fn add_parameters<I, S>(&mut self, parameters: I) -> ModelResult<&mut Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let batch: Vec<(String, f64)> = parameters
            .into_iter()
            .map(|(n, v)| (n.into(), v))
            .collect();
        self.check_batch(batch.iter().map(|(n, _)| n.as_str()))?;
        for (name, value) in &batch {
            Self::check_value(name, *value)?;
        }
        for (name, value) in batch {
            self.register(&name, EntityKind::Parameter);
            self.parameters.push(Parameter { name, value });
        }
        Ok(self)
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, value: f64) -> ModelResult<&mut Self> {
        self.add_parameters([(name.into(), value)])
    }

    pub fn remove_parameter(&mut self, name: &str) -> ModelResult<&mut Self> {
        self.unregister(name, EntityKind::Parameter)?;
        self.parameters.retain(|p| p.name != name);
        Ok(self)
    }

    /// Set the value of an existing parameter.
    pub fn update_parameter(&mut self, name: &str, value: f64) -> ModelResult<&mut Self> {
        self.update_parameters([(name, value)])
    }

    /// Set several parameter values. All names are validated before any
    /// value is written.
    ///
    /// Parameter updates do not change the structure, so the cached plan is
    /// kept.
    pub fn update_parameters<I, S>(&mut self, values: I) -> ModelResult<&mut Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut resolved = Vec::new();
        for (name, value) in values {
            let name = name.as_ref();
            let idx = self.parameter_index(name)?;
            Self::check_value(name, value)?;
            resolved.push((idx, value));
        }
        for (idx, value) in resolved {
            self.parameters[idx].value = value;
        }
        Ok(self)
    }

    /// Multiply an existing parameter by `factor`.
    pub fn scale_parameter(&mut self, name: &str, factor: f64) -> ModelResult<&mut Self> {
        self.scale_parameters([(name, factor)])
    }

    pub fn scale_parameters<I, S>(&mut self, factors: I) -> ModelResult<&mut Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut scaled = Vec::new();
        for (name, factor) in factors {
            let name = name.as_ref();
            let idx = self.parameter_index(name)?;
            scaled.push((name.to_string(), self.parameters[idx].value * factor));
        }
        self.update_parameters(scaled)
    }

    fn parameter_index(&self, name: &str) -> Result<usize, DefinitionError> {
        self.parameters
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| DefinitionError::UnknownEntity {
                kind: EntityKind::Parameter,
                name: name.to_string(),
            })
    }

    // --- variables ---

    /// Add several variables with their initial values.
    pub fn add_variables<I, S>(&mut self, variables: I) -> ModelResult<&mut Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let batch: Vec<(String, f64)> = variables
            .into_iter()
            .map(|(n, v)| (n.into(), v))
            .collect();
        self.check_batch(batch.iter().map(|(n, _)| n.as_str()))?;
        for (name, value) in &batch {
            Self::check_value(name, *value)?;
        }
        for (name, initial_value) in batch {
            self.register(&name, EntityKind::Variable);
            self.variables.push(Variable {
                name,
                initial_value,
            });
        }
        Ok(self)
    }

    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        initial_value: f64,
    ) -> ModelResult<&mut Self> {
        self.add_variables([(name.into(), initial_value)])
    }

    pub fn remove_variable(&mut self, name: &str) -> ModelResult<&mut Self> {
        self.unregister(name, EntityKind::Variable)?;
        self.variables.retain(|v| v.name != name);
        Ok(self)
    }

    // --- derived quantities and readouts ---

    /// Add a derived quantity `name = function(args...)`.
    ///
    /// Arguments may name parameters, variables, earlier derived quantities
    /// or [`TIME`].
    pub fn add_derived<A, S>(
        &mut self,
        name: impl Into<String>,
        function: Function,
        args: A,
    ) -> ModelResult<&mut Self>
    where
        A: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        let args = collect_names(args);
        self.check_name(&name)?;
        self.check_args(&name, &function, &args)?;
        self.register(&name, EntityKind::Derived);
        self.derived.push(Derived {
            name,
            function,
            args,
        });
        Ok(self)
    }

    pub fn remove_derived(&mut self, name: &str) -> ModelResult<&mut Self> {
        self.unregister(name, EntityKind::Derived)?;
        self.derived.retain(|d| d.name != name);
        Ok(self)
    }

    /// Add a readout: reported with the full concentrations, never used
    /// by reactions or other quantities.
    pub fn add_readout<A, S>(
        &mut self,
        name: impl Into<String>,
        function: Function,
        args: A,
    ) -> ModelResult<&mut Self>
    where
        A: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        let args = collect_names(args);
        self.check_name(&name)?;
        self.check_args(&name, &function, &args)?;
        self.register(&name, EntityKind::Readout);
        self.readouts.push(Derived {
            name,
            function,
            args,
        });
        Ok(self)
    }

    pub fn remove_readout(&mut self, name: &str) -> ModelResult<&mut Self> {
        self.unregister(name, EntityKind::Readout)?;
        self.readouts.retain(|r| r.name != name);
        Ok(self)
    }

    // --- reactions ---

    /// Add a reaction with rate `function(args...)`.
    ///
    /// Every stoichiometry key must be a variable.
    pub fn add_reaction<A, S, T, K>(
        &mut self,
        name: impl Into<String>,
        function: Function,
        args: A,
        stoichiometry: T,
    ) -> ModelResult<&mut Self>
    where
        A: IntoIterator<Item = S>,
        S: AsRef<str>,
        T: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let name = name.into();
        let args = collect_names(args);
        self.check_name(&name)?;
        self.check_args(&name, &function, &args)?;

        let mut stoich = Vec::new();
        for (var, coeff) in stoichiometry {
            let var = var.as_ref();
            if self.kinds.get(var) != Some(&EntityKind::Variable) {
                return Err(DefinitionError::NotAVariable {
                    reaction: name,
                    name: var.to_string(),
                }
                .into());
            }
            Self::check_value(var, coeff)?;
            stoich.push((var.to_string(), coeff));
        }

        self.register(&name, EntityKind::Reaction);
        self.reactions.push(Reaction {
            name,
            function,
            args,
            stoichiometry: stoich,
        });
        Ok(self)
    }

    pub fn remove_reaction(&mut self, name: &str) -> ModelResult<&mut Self> {
        self.unregister(name, EntityKind::Reaction)?;
        self.reactions.retain(|r| r.name != name);
        Ok(self)
    }

    fn unregister(&mut self, name: &str, kind: EntityKind) -> Result<(), DefinitionError> {
        if self.kinds.get(name) != Some(&kind) {
            return Err(DefinitionError::UnknownEntity {
                kind,
                name: name.to_string(),
            });
        }
        self.kinds.remove(name);
        self.plan = None;
        Ok(())
    }

    // --- accessors ---

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn derived(&self) -> &[Derived] {
        &self.derived
    }

    pub fn readouts(&self) -> &[Derived] {
        &self.readouts
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub fn kind_of(&self, name: &str) -> Option<EntityKind> {
        self.kinds.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value)
    }

    /// Parameter values in declaration order.
    pub fn parameter_values(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.value).collect()
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    pub fn derived_names(&self) -> Vec<String> {
        self.derived.iter().map(|d| d.name.clone()).collect()
    }

    pub fn readout_names(&self) -> Vec<String> {
        self.readouts.iter().map(|r| r.name.clone()).collect()
    }

    pub fn reaction_names(&self) -> Vec<String> {
        self.reactions.iter().map(|r| r.name.clone()).collect()
    }

    /// Initial values of the variables, in declaration order.
    pub fn initial_conditions(&self) -> Vec<f64> {
        self.variables.iter().map(|v| v.initial_value).collect()
    }

    // --- evaluation ---

    /// Compile the evaluation plan without caching it.
    pub fn compile(&self) -> ModelResult<EvalPlan> {
        EvalPlan::compile(self)
    }

    /// The cached evaluation plan, compiled on first use.
    pub fn plan(&mut self) -> ModelResult<Arc<EvalPlan>> {
        if let Some(plan) = &self.plan {
            return Ok(Arc::clone(plan));
        }
        let plan = Arc::new(EvalPlan::compile(self)?);
        self.plan = Some(Arc::clone(&plan));
        Ok(plan)
    }

    /// ODE right-hand side: `dx/dt = Σ stoichiometry × rate` per variable.
    pub fn get_right_hand_side(&mut self, time: f64, state: &[f64]) -> ModelResult<Vec<f64>> {
        let plan = self.plan()?;
        plan.right_hand_side(&self.parameter_values(), time, state)
    }

    /// Rates of all reactions, in declaration order.
    pub fn get_fluxes(&mut self, time: f64, state: &[f64]) -> ModelResult<Vec<f64>> {
        let plan = self.plan()?;
        plan.fluxes(&self.parameter_values(), time, state)
    }

    /// Variables followed by derived quantities and readouts.
    pub fn get_full_concs(&mut self, time: f64, state: &[f64]) -> ModelResult<Vec<f64>> {
        let plan = self.plan()?;
        plan.full_concs(&self.parameter_values(), time, state)
    }

    /// Names matching [`get_full_concs`](Self::get_full_concs).
    pub fn full_conc_names(&self) -> Vec<String> {
        let mut names = self.variable_names();
        names.extend(self.derived_names());
        names.extend(self.readout_names());
        names
    }
}

fn collect_names<A, S>(args: A) -> Vec<String>
where
    A: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().map(|s| s.as_ref().to_string()).collect()
}

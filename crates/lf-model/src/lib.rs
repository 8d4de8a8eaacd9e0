//! lf-model: kinetic model registry and evaluation.
//!
//! A [`Model`] is a namespace of parameters, variables, derived quantities,
//! readouts and reactions. Every derived quantity and reaction is a
//! [`Function`] of named arguments; the dependency graph between them is
//! compiled into an [`EvalPlan`] that yields the ODE right-hand side, the
//! reaction fluxes and the full concentrations.

pub mod error;
pub mod fns;
pub mod function;
pub mod model;
pub mod plan;

pub use error::{DefinitionError, EntityKind, ModelError, ModelResult};
pub use function::{Function, RateFn};
pub use model::{Derived, Model, Parameter, Reaction, TIME, Variable};
pub use plan::EvalPlan;

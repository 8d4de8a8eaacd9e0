//! Built-in demo models.

use clap::ValueEnum;
use lf_model::{Model, ModelResult, fns};

/// Label positions per variable and transition maps per reaction.
pub struct LabelSpec {
    pub variables: Vec<(&'static str, usize)>,
    pub maps: Vec<(&'static str, Vec<usize>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Builtin {
    /// x -> (first order decay)
    Decay,
    /// -> x1 -> x2 -> with constant influx
    Chain,
    /// A <-> B, three label positions reversed by the forward reaction
    Isomerization,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Decay => "decay",
            Builtin::Chain => "chain",
            Builtin::Isomerization => "isomerization",
        }
    }

    pub fn build(self) -> ModelResult<Model> {
        let mut m = Model::new();
        match self {
            Builtin::Decay => {
                m.add_parameter("k", 1.0)?
                    .add_variable("x", 1.0)?
                    .add_reaction("v", fns::mass_action_1s(), ["x", "k"], [("x", -1.0)])?;
            }
            Builtin::Chain => {
                m.add_parameters([("k_in", 1.0), ("k1", 2.0), ("k2", 1.0)])?
                    .add_variables([("x1", 0.0), ("x2", 0.0)])?
                    .add_reaction("v0", fns::constant(), ["k_in"], [("x1", 1.0)])?
                    .add_reaction(
                        "v1",
                        fns::mass_action_1s(),
                        ["x1", "k1"],
                        [("x1", -1.0), ("x2", 1.0)],
                    )?
                    .add_reaction("v2", fns::mass_action_1s(), ["x2", "k2"], [("x2", -1.0)])?
                    .add_derived("x_total", fns::sum(), ["x1", "x2"])?;
            }
            Builtin::Isomerization => {
                m.add_parameters([("kf", 1.0), ("kr", 0.5)])?
                    .add_variables([("A", 1.0), ("B", 0.0)])?
                    .add_reaction(
                        "f",
                        fns::mass_action_1s(),
                        ["A", "kf"],
                        [("A", -1.0), ("B", 1.0)],
                    )?
                    .add_reaction(
                        "r",
                        fns::mass_action_1s(),
                        ["B", "kr"],
                        [("B", -1.0), ("A", 1.0)],
                    )?;
            }
        }
        Ok(m)
    }

    pub fn label_spec(self) -> Option<LabelSpec> {
        match self {
            Builtin::Decay => None,
            // the influx carries one external, always labeled position
            Builtin::Chain => Some(LabelSpec {
                variables: vec![("x1", 1), ("x2", 1)],
                maps: vec![("v0", vec![0]), ("v1", vec![0]), ("v2", vec![])],
            }),
            Builtin::Isomerization => Some(LabelSpec {
                variables: vec![("A", 3), ("B", 3)],
                maps: vec![("f", vec![2, 1, 0]), ("r", vec![0, 1, 2])],
            }),
        }
    }
}

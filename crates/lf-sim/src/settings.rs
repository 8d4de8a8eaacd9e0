//! Serializable integrator and steady-state settings.

use serde::{Deserialize, Serialize};

use crate::integrator::{Dopri5, Integrator, Rk4};

/// Integrator selection, as read from a run configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum IntegratorSettings {
    Dopri5 {
        #[serde(default = "default_atol")]
        atol: f64,
        #[serde(default = "default_rtol")]
        rtol: f64,
        #[serde(default = "default_max_steps")]
        max_steps: usize,
        #[serde(default)]
        initial_step: Option<f64>,
    },
    Rk4 {
        #[serde(default = "default_max_step")]
        max_step: f64,
    },
}

fn default_atol() -> f64 {
    1e-8
}

fn default_rtol() -> f64 {
    1e-6
}

fn default_max_steps() -> usize {
    100_000
}

fn default_max_step() -> f64 {
    0.01
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        IntegratorSettings::Dopri5 {
            atol: default_atol(),
            rtol: default_rtol(),
            max_steps: default_max_steps(),
            initial_step: None,
        }
    }
}

impl IntegratorSettings {
    pub fn build(&self) -> Box<dyn Integrator> {
        match *self {
            IntegratorSettings::Dopri5 {
                atol,
                rtol,
                max_steps,
                initial_step,
            } => Box::new(Dopri5 {
                atol,
                rtol,
                max_steps,
                initial_step,
            }),
            IntegratorSettings::Rk4 { max_step } => Box::new(Rk4 { max_step }),
        }
    }
}

/// Settings for [`Simulator::simulate_to_steady_state`].
///
/// [`Simulator::simulate_to_steady_state`]: crate::Simulator::simulate_to_steady_state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteadyStateSettings {
    /// Convergence threshold on the L2 norm of the state change per chunk
    pub tolerance: f64,
    /// Integration time per chunk
    pub step_size: f64,
    /// Maximum number of chunks
    pub max_rounds: usize,
    /// Measure the change relative to the previous state
    pub rel_norm: bool,
    /// Refine the integrated state with a damped Newton iteration
    pub newton_polish: bool,
}

impl Default for SteadyStateSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            step_size: 100.0,
            max_rounds: 1000,
            rel_norm: false,
            newton_polish: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrator_settings_from_yaml() {
        let s: IntegratorSettings = serde_yaml::from_str("method: rk4\nmax_step: 0.5\n").unwrap();
        assert_eq!(s, IntegratorSettings::Rk4 { max_step: 0.5 });

        let s: IntegratorSettings = serde_yaml::from_str("method: dopri5\nrtol: 1.0e-4\n").unwrap();
        match s {
            IntegratorSettings::Dopri5 { atol, rtol, .. } => {
                assert_eq!(atol, 1e-8);
                assert_eq!(rtol, 1e-4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn steady_state_settings_fill_defaults() {
        let s: SteadyStateSettings = serde_yaml::from_str("tolerance: 1.0e-8\n").unwrap();
        assert_eq!(s.tolerance, 1e-8);
        assert_eq!(s.max_rounds, 1000);
        assert!(!s.newton_polish);
    }
}

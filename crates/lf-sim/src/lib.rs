//! lf-sim: time courses and steady states of kinetic models.
//!
//! A [`Simulator`] owns a [`Model`](lf_model::Model), integrates it with a
//! pluggable [`Integrator`] and records concentrations and fluxes in a
//! [`SimulationResult`]. Integration failures never raise; they tag the
//! result.

pub mod error;
pub mod integrator;
mod newton;
pub mod protocol;
pub mod result;
pub mod settings;
pub mod simulator;

pub use error::{IntegrationFailure, SimError, SimResult};
pub use integrator::{Dopri5, Integrator, Rhs, Rk4};
pub use protocol::{Protocol, Segment};
pub use result::SimulationResult;
pub use settings::{IntegratorSettings, SteadyStateSettings};
pub use simulator::Simulator;

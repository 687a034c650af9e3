//! Engine error type.
//!
//! Configuration problems surface while cities and agents are built; the remaining
//! variants signal a driver bug (asking for an impossible status change, an unknown
//! agent, a bad time step) rather than anything a retry could fix.

use epidemic_common::{ConfigError, Status};
use thiserror::Error;

use crate::population::AgentRef;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("agent {id}: status cannot change from {from} to {to}")]
    InvalidTransition { id: u32, from: Status, to: Status },

    #[error("time step must be finite and > 0, got {0}")]
    InvalidTimeStep(f32),

    #[error("agent {id} belongs to city {agent_city}, not city {city}")]
    CityMismatch { id: u32, agent_city: usize, city: usize },

    #[error("city {0} does not exist")]
    UnknownCity(usize),

    #[error("no agent at {0:?}")]
    UnknownAgent(AgentRef),

    #[error("cannot seed an infection: the simulation has no agents")]
    EmptyPopulation,
}

/// Shorthand result type for the engine.
pub type SimResult<T> = Result<T, SimError>;

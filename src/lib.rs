//! Agent-based SIR epidemic simulation.
//!
//! Agents random-walk inside rectangular cities, push away from walls (and, if they
//! obey social distancing, from each other) and pass an infection on by proximity.
//! [`Simulation`] owns the cities and advances everything in fixed-`dt` ticks.

pub mod agent;
pub mod error;
pub mod grid;
pub mod peers;
pub mod population;
pub mod rng;
pub mod simulation;

pub use agent::Agent;
pub use error::{SimError, SimResult};
pub use peers::InfectedSnapshot;
pub use population::{AgentRef, City, Population, StatusChanges, StatusCounts};
pub use simulation::{RunSummary, Simulation};

pub use epidemic_common as common;

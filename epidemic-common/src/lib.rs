pub mod bounds;
pub mod config;
pub mod error;
pub mod params;
pub mod snapshot;
pub mod status;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use bounds::Bounds;
pub use config::{
    InitialConditions, OutputConfig, PersonConfig, PopulationConfig, SimulationConfig, TimingConfig,
    TravelConfig, WorldConfig,
};
pub use error::ConfigError;
pub use params::AgentParams;
pub use snapshot::{AgentSample, Snapshot};
pub use status::Status;
pub use vecmath::{angle_to_vec, Vec2};

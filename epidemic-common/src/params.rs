use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Per-agent force and infection parameters, derived from the `[person]` section of
/// the configuration. Agents in one population usually share the same values apart
/// from `obeys_social_distancing`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentParams {
    // Body & motion
    pub radius: f32,
    pub max_speed: f32,
    pub wall_buffer: f32,
    pub random_walk_interval: f32,
    pub step_size: f32,
    pub gravity_strength: f32,

    // Social distancing
    pub social_distance_factor: f32,
    pub obeys_social_distancing: bool,

    // Infection
    pub infection_radius: f32,
    pub infection_probability: f32,
    pub infectious_period: f32, // seconds an agent stays Infected
}

impl Default for AgentParams {
    fn default() -> Self {
        AgentParams {
            radius: 0.2,
            max_speed: 1.0,
            wall_buffer: 1.0,
            random_walk_interval: 1.0,
            step_size: 1.5,
            gravity_strength: 1.0,
            social_distance_factor: 0.0,
            obeys_social_distancing: true,
            infection_radius: 0.3,
            infection_probability: 0.8,
            infectious_period: 5.0,
        }
    }
}

impl AgentParams {
    /// Whether this agent feels repulsion from its peers at all.
    #[inline(always)]
    pub fn distances_socially(&self) -> bool {
        self.social_distance_factor > 0.0 && self.obeys_social_distancing
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("radius", self.radius)?;
        positive("max_speed", self.max_speed)?;
        positive("wall_buffer", self.wall_buffer)?;
        positive("random_walk_interval", self.random_walk_interval)?;
        non_negative("step_size", self.step_size)?;
        non_negative("gravity_strength", self.gravity_strength)?;
        non_negative("social_distance_factor", self.social_distance_factor)?;
        non_negative("infection_radius", self.infection_radius)?;
        non_negative("infectious_period", self.infectious_period)?;
        probability("infection_probability", self.infection_probability)?;
        Ok(())
    }
}

pub(crate) fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::param(name, value, "must be finite and > 0"))
    }
}

pub(crate) fn non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::param(name, value, "must be finite and >= 0"))
    }
}

pub(crate) fn probability(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::param(name, value, "must lie in [0, 1]"))
    }
}

use crate::bounds::Bounds;
use crate::error::ConfigError;
use crate::params::{non_negative, positive, probability, AgentParams};
use crate::vecmath::Vec2;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Layout of the cities
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct WorldConfig {
    #[serde(default = "default_n_cities")]
    pub n_cities: u32,
    #[serde(default = "default_city_size")]
    pub city_size: f32,
    /// Gap left between neighbouring cities when they are arranged in a grid.
    #[serde(default = "default_city_spacing")]
    pub city_spacing: f32,
}

// Who lives in each city
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PopulationConfig {
    #[serde(default = "default_n_citizen_per_city")]
    pub n_citizen_per_city: u32,
    /// Probability that a given agent obeys social distancing (0 to 1).
    #[serde(default)]
    pub social_distance_obedience: f32,
}

// Body, motion and infection parameters shared by every agent
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PersonConfig {
    #[serde(default = "default_radius")]
    pub radius: f32,
    #[serde(default = "default_one")]
    pub max_speed: f32,
    #[serde(default = "default_one")]
    pub wall_buffer: f32,
    #[serde(default = "default_one")]
    pub random_walk_interval: f32,
    #[serde(default = "default_step_size")]
    pub step_size: f32,
    #[serde(default = "default_one")]
    pub gravity_strength: f32,
    #[serde(default = "default_infection_radius")]
    pub infection_radius: f32,
    #[serde(default = "default_infection_prob")]
    pub infection_prob: f32,
    #[serde(default = "default_infectious_period")]
    pub infectious_period: f32,
    #[serde(default = "default_social_distance_factor")]
    pub social_distance_factor: f32,
}

// Interstate travel. Parsed and reported, but no agent is moved automatically.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TravelConfig {
    #[serde(default = "default_one")]
    pub interstate_travel_prob: f32,
    #[serde(default = "default_travel_time")]
    pub interstate_travel_time: f32,
    #[serde(default = "default_one")]
    pub interstate_travel_freq: f32,
}

// Configuration for timing (all values in seconds of simulated time)
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_dt")]
    pub dt: f32,
    /// Hard limit on simulated time.
    #[serde(default = "default_max_time")]
    pub max_time: f32,
    /// How long to keep running once no agent is Infected any more.
    #[serde(default = "default_linger_time")]
    pub linger_time: f32,
    #[serde(default = "default_record_interval")]
    pub record_interval: f32,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct InitialConditions {
    /// Seed for every random draw in the run (placement, walks, infections).
    #[serde(default)]
    pub seed: u64,
}

// Configuration for output settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_stats: bool,
    #[serde(default)]
    pub save_positions_in_snapshot: bool,
    #[serde(default = "default_true")]
    pub save_final_state: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

/// Main simulation configuration structure, loaded from config.toml.
/// Every section may be omitted; the defaults describe one city of 50 people.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SimulationConfig {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub population: PopulationConfig,
    #[serde(default)]
    pub person: PersonConfig,
    #[serde(default)]
    pub travel: TravelConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub initial_conditions: InitialConditions,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.n_cities == 0 {
            return Err(ConfigError::param("n_cities", self.world.n_cities, "must be greater than 0"));
        }
        if self.population.n_citizen_per_city == 0 {
            return Err(ConfigError::param(
                "n_citizen_per_city",
                self.population.n_citizen_per_city,
                "must be greater than 0",
            ));
        }
        positive("city_size", self.world.city_size)?;
        non_negative("city_spacing", self.world.city_spacing)?;
        probability("social_distance_obedience", self.population.social_distance_obedience)?;

        // Obedience only toggles a flag, so checking one variant covers both.
        let params = self.agent_params(true);
        params.validate()?;
        Bounds::centered(Vec2::zero(), self.world.city_size)?.check_fits(params.radius)?;

        positive("dt", self.timing.dt)?;
        positive("max_time", self.timing.max_time)?;
        non_negative("linger_time", self.timing.linger_time)?;
        non_negative("record_interval", self.timing.record_interval)?;

        probability("interstate_travel_prob", self.travel.interstate_travel_prob)?;
        non_negative("interstate_travel_time", self.travel.interstate_travel_time)?;
        non_negative("interstate_travel_freq", self.travel.interstate_travel_freq)?;
        Ok(())
    }

    /// Converts the `[person]` section into the parameters carried by one agent.
    pub fn agent_params(&self, obeys_social_distancing: bool) -> AgentParams {
        let p = &self.person;
        AgentParams {
            radius: p.radius,
            max_speed: p.max_speed,
            wall_buffer: p.wall_buffer,
            random_walk_interval: p.random_walk_interval,
            step_size: p.step_size,
            gravity_strength: p.gravity_strength,
            social_distance_factor: p.social_distance_factor,
            obeys_social_distancing,
            infection_radius: p.infection_radius,
            infection_probability: p.infection_prob,
            infectious_period: p.infectious_period,
        }
    }

    /// Bounds of every city, arranged row-major in a near-square grid centered on
    /// the origin with `city_spacing` between neighbours.
    pub fn city_bounds(&self) -> Result<Vec<Bounds>, ConfigError> {
        let n = self.world.n_cities as usize;
        let size = self.world.city_size;
        let pitch = size + self.world.city_spacing;
        let cols = (n as f32).sqrt().ceil().max(1.0) as usize;
        let rows = n.div_ceil(cols);

        let x0 = -(cols as f32 - 1.0) * pitch / 2.0;
        let y0 = (rows as f32 - 1.0) * pitch / 2.0;
        (0..n)
            .map(|i| {
                let (row, col) = (i / cols, i % cols);
                let center = Vec2::new(x0 + col as f32 * pitch, y0 - row as f32 * pitch);
                Bounds::centered(center, size)
            })
            .collect()
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            n_cities: default_n_cities(),
            city_size: default_city_size(),
            city_spacing: default_city_spacing(),
        }
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        PopulationConfig {
            n_citizen_per_city: default_n_citizen_per_city(),
            social_distance_obedience: 0.0,
        }
    }
}

impl Default for PersonConfig {
    fn default() -> Self {
        PersonConfig {
            radius: default_radius(),
            max_speed: default_one(),
            wall_buffer: default_one(),
            random_walk_interval: default_one(),
            step_size: default_step_size(),
            gravity_strength: default_one(),
            infection_radius: default_infection_radius(),
            infection_prob: default_infection_prob(),
            infectious_period: default_infectious_period(),
            social_distance_factor: default_social_distance_factor(),
        }
    }
}

impl Default for TravelConfig {
    fn default() -> Self {
        TravelConfig {
            interstate_travel_prob: default_one(),
            interstate_travel_time: default_travel_time(),
            interstate_travel_freq: default_one(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            dt: default_dt(),
            max_time: default_max_time(),
            linger_time: default_linger_time(),
            record_interval: default_record_interval(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            save_stats: true,
            save_positions_in_snapshot: false,
            save_final_state: true,
            format: None,
        }
    }
}

fn default_n_cities() -> u32 {
    1
}

fn default_city_size() -> f32 {
    7.0
}

fn default_city_spacing() -> f32 {
    1.0
}

fn default_n_citizen_per_city() -> u32 {
    50
}

fn default_radius() -> f32 {
    0.2
}

fn default_one() -> f32 {
    1.0
}

fn default_step_size() -> f32 {
    1.5
}

fn default_infection_radius() -> f32 {
    0.3
}

fn default_infection_prob() -> f32 {
    0.5
}

fn default_infectious_period() -> f32 {
    5.0
}

fn default_social_distance_factor() -> f32 {
    0.2
}

fn default_travel_time() -> f32 {
    0.5
}

fn default_dt() -> f32 {
    1.0 / 30.0
}

fn default_max_time() -> f32 {
    300.0
}

fn default_linger_time() -> f32 {
    5.0
}

fn default_record_interval() -> f32 {
    0.5
}

fn default_base_filename() -> String {
    "sir".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = SimulationConfig::from_toml_str("").unwrap();
        assert_eq!(config.world.n_cities, 1);
        assert_eq!(config.world.city_size, 7.0);
        assert_eq!(config.population.n_citizen_per_city, 50);
        assert_eq!(config.person.infection_prob, 0.5);
        assert_eq!(config.person.social_distance_factor, 0.2);
        assert_eq!(config.output.format, None);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let text = r#"
            [world]
            n_cities = 4

            [person]
            infection_radius = 0.5

            [initial_conditions]
            seed = 99
        "#;
        let config = SimulationConfig::from_toml_str(text).unwrap();
        assert_eq!(config.world.n_cities, 4);
        assert_eq!(config.world.city_size, 7.0);
        assert_eq!(config.person.infection_radius, 0.5);
        assert_eq!(config.person.max_speed, 1.0);
        assert_eq!(config.initial_conditions.seed, 99);
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            "[world]\nn_cities = 0",
            "[world]\ncity_size = -1.0",
            "[population]\nn_citizen_per_city = 0",
            "[population]\nsocial_distance_obedience = 2.0",
            "[person]\nmax_speed = 0.0",
            "[person]\nradius = -0.2",
            "[person]\nradius = 10.0",
            "[timing]\ndt = 0.0",
        ];
        for text in cases {
            assert!(SimulationConfig::from_toml_str(text).is_err(), "accepted: {text}");
        }
    }

    #[test]
    fn agent_params_follow_person_section() {
        let mut config = SimulationConfig::default();
        config.person.infection_prob = 0.9;
        let params = config.agent_params(false);
        assert_eq!(params.infection_probability, 0.9);
        assert!(!params.obeys_social_distancing);
        assert_eq!(params.radius, config.person.radius);
    }

    #[test]
    fn cities_are_arranged_without_overlap() {
        let mut config = SimulationConfig::default();
        config.world.n_cities = 5;
        config.world.city_size = 2.0;
        config.world.city_spacing = 0.5;
        let bounds = config.city_bounds().unwrap();
        assert_eq!(bounds.len(), 5);
        for (i, a) in bounds.iter().enumerate() {
            assert_eq!(a.width(), 2.0);
            for b in &bounds[i + 1..] {
                let dx = (a.center().x - b.center().x).abs();
                let dy = (a.center().y - b.center().y).abs();
                assert!(dx >= 2.5 - 1e-4 || dy >= 2.5 - 1e-4);
            }
        }
    }

    #[test]
    fn single_city_is_centered_on_origin() {
        let bounds = SimulationConfig::default().city_bounds().unwrap();
        assert_eq!(bounds.len(), 1);
        assert_eq!(bounds[0].center(), Vec2::zero());
    }
}

use crate::agent::Agent;
use crate::error::{SimError, SimResult};
use crate::population::{AgentRef, City, StatusChanges, StatusCounts};
use crate::rng::simulation_rng;
use epidemic_common::{AgentSample, SimulationConfig, Snapshot, Status, TimingConfig};
use log::{debug, info, trace, warn};
use rand::prelude::*;
use std::time::Instant;

/// How a call to [`Simulation::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub steps: u64,
    pub time: f32,
    /// Simulated time at which the last Infected agent recovered, if that happened.
    pub extinct_at: Option<f32>,
    pub peak_infected: u32,
    pub final_counts: StatusCounts,
}

/// Owns the cities, the global clock and the run-level RNG, and drives the fixed
/// phase order of every tick.
pub struct Simulation {
    cities: Vec<City>,
    /// Simulated seconds since construction, accumulated in f64 so tiny steps still count.
    time: f64,
    /// Number of completed ticks.
    step: u64,
    seed: u64,
    /// Run-level RNG for placement and seeding. Per-agent draws use the agents' own streams.
    rng: StdRng,
    record_agents: bool,
    recorded_snapshots: Vec<Snapshot>,
}

impl Simulation {
    /// Builds every city from the configuration, fills it with uniformly placed
    /// Susceptible agents and infects one of them.
    pub fn new(config: &SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        let seed = config.initial_conditions.seed;
        let mut rng = simulation_rng(seed);
        let obedience = config.population.social_distance_obedience;

        let mut cities = Vec::with_capacity(config.world.n_cities as usize);
        let mut next_id = 0u32;
        for (city_id, bounds) in config.city_bounds()?.into_iter().enumerate() {
            let mut city = City::new(city_id, bounds);
            for _ in 0..config.population.n_citizen_per_city {
                let obeys = rng.random::<f32>() < obedience;
                city.spawn_random(next_id, config.agent_params(obeys), &mut rng, seed)?;
                next_id += 1;
            }
            debug!(
                "City {} spans ({:.2}, {:.2})..({:.2}, {:.2}) with {} agents.",
                city_id,
                bounds.lower(0),
                bounds.lower(1),
                bounds.upper(0),
                bounds.upper(1),
                city.population().len()
            );
            cities.push(city);
        }
        info!("Built {} cities with {} agents in total.", cities.len(), next_id);

        if config.world.n_cities > 1 && config.travel.interstate_travel_prob > 0.0 {
            warn!(
                "Interstate travel (prob {:.2}, freq {:.2}, time {:.2}) is configured but not modeled; agents stay in their home city.",
                config.travel.interstate_travel_prob,
                config.travel.interstate_travel_freq,
                config.travel.interstate_travel_time
            );
        }

        let mut sim = Simulation {
            cities,
            time: 0.0,
            step: 0,
            seed,
            rng,
            record_agents: config.output.save_positions_in_snapshot,
            recorded_snapshots: Vec::new(),
        };
        sim.seed_infection()?;
        Ok(sim)
    }

    /// Wraps hand-built cities. No agent is infected; call
    /// [`Simulation::seed_infection`] or [`Simulation::set_status`] to start an outbreak.
    /// City ids are reassigned to match their position in `cities`.
    pub fn from_cities(mut cities: Vec<City>, seed: u64) -> Self {
        for (id, city) in cities.iter_mut().enumerate() {
            city.renumber(id);
        }
        Simulation {
            cities,
            time: 0.0,
            step: 0,
            seed,
            rng: simulation_rng(seed),
            record_agents: false,
            recorded_snapshots: Vec::new(),
        }
    }

    /// Include per-agent samples in recorded snapshots.
    pub fn set_record_agents(&mut self, record_agents: bool) {
        self.record_agents = record_agents;
    }

    /// Picks one agent uniformly at random across all cities and makes it Infected,
    /// bypassing the exposure check.
    pub fn seed_infection(&mut self) -> SimResult<AgentRef> {
        let refs: Vec<AgentRef> = self.agent_refs().collect();
        let chosen = *refs.choose(&mut self.rng).ok_or(SimError::EmptyPopulation)?;
        self.set_status(chosen, Status::Infected)?;
        info!(
            "Seeded infection in agent {} (city {}) at t = {:.2}.",
            self.agent(chosen).map(|a| a.id()).unwrap_or_default(),
            chosen.city,
            self.time
        );
        Ok(chosen)
    }

    /// Advances the clock by `dt` seconds and runs the phases in order:
    /// age, motion (all agents), status (all agents).
    pub fn tick(&mut self, dt: f32) -> SimResult<StatusChanges> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SimError::InvalidTimeStep(dt));
        }
        self.time += f64::from(dt);

        for city in &mut self.cities {
            city.advance_age(dt);
        }
        for city in &mut self.cities {
            city.integrate_motion(dt);
        }
        let mut changes = StatusChanges::default();
        for city in &mut self.cities {
            changes += city.evaluate_status()?;
        }

        self.step += 1;
        if changes != StatusChanges::default() {
            trace!(
                "t = {:.2}: {} new infections, {} recoveries.",
                self.time,
                changes.infected,
                changes.recovered
            );
        }
        Ok(changes)
    }

    /// Ticks with `timing.dt` until no agent is Infected, then keeps going for
    /// `timing.linger_time` more seconds; never runs past `timing.max_time`.
    /// A snapshot is recorded every `timing.record_interval` seconds and at the end.
    pub fn run(&mut self, timing: &TimingConfig) -> SimResult<RunSummary> {
        let start_time = Instant::now();
        let mut previous_print_time = start_time;
        let print_interval_secs = 5.0;

        let mut extinct_at = (self.infected_count() == 0).then_some(self.time);
        let mut peak_infected = self.infected_count();
        let mut next_record = self.time;

        loop {
            if timing.record_interval > 0.0 && self.time >= next_record {
                self.record_snapshot();
                next_record += f64::from(timing.record_interval);
            }

            let lingered = extinct_at.is_some_and(|t| self.time - t >= f64::from(timing.linger_time));
            if lingered || self.time >= f64::from(timing.max_time) {
                break;
            }

            self.tick(timing.dt)?;

            let infected = self.infected_count();
            peak_infected = peak_infected.max(infected);
            match (infected, extinct_at) {
                (0, None) => {
                    info!("No infected agents left at t = {:.2} after {} steps.", self.time, self.step);
                    extinct_at = Some(self.time);
                }
                (n, Some(_)) if n > 0 => extinct_at = None,
                _ => {}
            }

            let now = Instant::now();
            if now.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs {
                let counts = self.status_counts();
                info!(
                    "Step {} (t = {:.2}) | S {} I {} R {} | Elapsed: {:.2} s",
                    self.step,
                    self.time,
                    counts.susceptible,
                    counts.infected,
                    counts.recovered,
                    start_time.elapsed().as_secs_f64()
                );
                previous_print_time = now;
            }
        }

        let last_recorded = self.recorded_snapshots.last().map(|s| s.step);
        if last_recorded != Some(self.step) {
            self.record_snapshot();
        }

        Ok(RunSummary {
            steps: self.step,
            time: self.time as f32,
            extinct_at: extinct_at.map(|t| t as f32),
            peak_infected,
            final_counts: self.status_counts(),
        })
    }

    /// Moves an agent into another city's population; it is clamped inside the new
    /// city's walls and keeps its status and timers. Returns its new reference.
    pub fn transfer_agent(&mut self, agent: AgentRef, to_city: usize) -> SimResult<AgentRef> {
        if to_city >= self.cities.len() {
            return Err(SimError::UnknownCity(to_city));
        }
        if agent.city == to_city {
            return self.agent(agent).map(|_| agent).ok_or(SimError::UnknownAgent(agent));
        }
        let radius = self.agent(agent).ok_or(SimError::UnknownAgent(agent))?.radius();
        self.cities[to_city].bounds().check_fits(radius)?;
        let moving = self.cities[agent.city].take_agent(agent.index).ok_or(SimError::UnknownAgent(agent))?;
        let index = self.cities[to_city].receive_agent(moving)?;
        debug!("Moved agent from city {} to city {} at t = {:.2}.", agent.city, to_city, self.time);
        Ok(AgentRef { city: to_city, index })
    }

    /// Changes one agent's status; see [`Agent::set_status`].
    pub fn set_status(&mut self, agent: AgentRef, status: Status) -> SimResult<()> {
        self.cities
            .get_mut(agent.city)
            .and_then(|city| city.agent_mut(agent.index))
            .ok_or(SimError::UnknownAgent(agent))?
            .set_status(status)
    }

    pub fn agent(&self, agent: AgentRef) -> Option<&Agent> {
        self.cities.get(agent.city)?.population().get(agent.index)
    }

    /// Every agent across all cities, city by city in insertion order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.cities.iter().flat_map(|city| city.population().iter())
    }

    pub fn agent_refs(&self) -> impl Iterator<Item = AgentRef> + '_ {
        self.cities.iter().enumerate().flat_map(|(city, c)| {
            (0..c.population().len()).map(move |index| AgentRef { city, index })
        })
    }

    pub fn agent_count(&self) -> usize {
        self.cities.iter().map(|city| city.population().len()).sum()
    }

    pub fn infected_count(&self) -> u32 {
        self.status_counts().infected
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for city in &self.cities {
            counts += city.population().status_counts();
        }
        counts
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn time(&self) -> f32 {
        self.time as f32
    }

    pub fn step_count(&self) -> u64 {
        self.step
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Records the current counts (and agent samples, if enabled) as a [`Snapshot`].
    pub fn record_snapshot(&mut self) {
        let counts = self.status_counts();
        let infected_per_city = self
            .cities
            .iter()
            .map(|city| city.population().count(Status::Infected) as u32)
            .collect();
        let agents = self.record_agents.then(|| {
            self.agents()
                .map(|agent| AgentSample {
                    id: agent.id(),
                    city: agent.city() as u32,
                    x: agent.position().x,
                    y: agent.position().y,
                    status: agent.status(),
                })
                .collect()
        });

        debug!(
            "Snapshot at t = {:.2}: S {} I {} R {}.",
            self.time, counts.susceptible, counts.infected, counts.recovered
        );
        self.recorded_snapshots.push(Snapshot {
            time: self.time as f32,
            step: self.step,
            susceptible: counts.susceptible,
            infected: counts.infected,
            recovered: counts.recovered,
            infected_per_city,
            agents,
        });
    }

    pub fn recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epidemic_common::{AgentParams, Bounds, Vec2};

    fn small_config(n_cities: u32, per_city: u32) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.world.n_cities = n_cities;
        config.world.city_size = 4.0;
        config.population.n_citizen_per_city = per_city;
        config.initial_conditions.seed = 17;
        config
    }

    #[test]
    fn construction_seeds_exactly_one_infection() {
        for seed in 0..10 {
            let mut config = small_config(3, 20);
            config.initial_conditions.seed = seed;
            let sim = Simulation::new(&config).unwrap();
            let counts = sim.status_counts();
            assert_eq!(counts, StatusCounts { susceptible: 59, infected: 1, recovered: 0 });
            let seeded = sim.agents().find(|a| a.status() == Status::Infected).unwrap();
            assert_eq!(seeded.infected_at(), 0.0);
        }
    }

    #[test]
    fn agents_start_inside_their_city() {
        let sim = Simulation::new(&small_config(4, 25)).unwrap();
        assert_eq!(sim.cities().len(), 4);
        assert_eq!(sim.agent_count(), 100);
        for city in sim.cities() {
            for agent in city.population() {
                assert_eq!(agent.city(), city.id());
                assert!(city.bounds().contains(agent.position()));
            }
        }
        let ids: Vec<u32> = sim.agents().map(|a| a.id()).collect();
        assert_eq!(ids, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn obedience_fraction_controls_distancing_flag() {
        let mut config = small_config(1, 40);
        config.population.social_distance_obedience = 1.0;
        let sim = Simulation::new(&config).unwrap();
        assert!(sim.agents().all(|a| a.params().obeys_social_distancing));

        config.population.social_distance_obedience = 0.0;
        let sim = Simulation::new(&config).unwrap();
        assert!(sim.agents().all(|a| !a.params().obeys_social_distancing));
    }

    #[test]
    fn same_seed_same_run() {
        let config = small_config(2, 30);
        let mut a = Simulation::new(&config).unwrap();
        let mut b = Simulation::new(&config).unwrap();
        for _ in 0..60 {
            a.tick(0.05).unwrap();
            b.tick(0.05).unwrap();
        }
        let pa: Vec<(Vec2, Status)> = a.agents().map(|x| (x.position(), x.status())).collect();
        let pb: Vec<(Vec2, Status)> = b.agents().map(|x| (x.position(), x.status())).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn tick_advances_clock_and_ages() {
        let mut sim = Simulation::new(&small_config(1, 5)).unwrap();
        sim.tick(0.25).unwrap();
        sim.tick(0.25).unwrap();
        assert_eq!(sim.step_count(), 2);
        assert!((sim.time() - 0.5).abs() < 1e-6);
        assert!(sim.agents().all(|a| (a.age() - 0.5).abs() < 1e-6));
    }

    #[test]
    fn rejects_bad_time_steps() {
        let mut sim = Simulation::new(&small_config(1, 5)).unwrap();
        for dt in [0.0, -0.1, f32::NAN, f32::INFINITY] {
            assert!(matches!(sim.tick(dt), Err(SimError::InvalidTimeStep(_))));
        }
        assert_eq!(sim.step_count(), 0);
    }

    #[test]
    fn seeding_an_empty_world_fails() {
        let city = City::new(0, Bounds::centered(Vec2::zero(), 2.0).unwrap());
        let mut sim = Simulation::from_cities(vec![city], 1);
        assert_eq!(sim.seed_infection(), Err(SimError::EmptyPopulation));
    }

    #[test]
    fn run_stops_after_lingering_past_extinction() {
        let mut config = small_config(1, 10);
        config.person.infection_prob = 0.0;
        config.person.infectious_period = 1.0;
        let timing = TimingConfig { dt: 0.1, max_time: 100.0, linger_time: 0.5, record_interval: 0.5 };
        let mut sim = Simulation::new(&config).unwrap();

        let summary = sim.run(&timing).unwrap();
        let extinct_at = summary.extinct_at.unwrap();
        assert!(extinct_at > 1.0 && extinct_at < 1.5, "extinct at {extinct_at}");
        assert!(summary.time >= extinct_at + 0.5 - 1e-4);
        assert!(summary.time < extinct_at + 0.7);
        assert_eq!(summary.peak_infected, 1);
        assert_eq!(summary.final_counts, StatusCounts { susceptible: 9, infected: 0, recovered: 1 });

        let snapshots = sim.recorded_snapshots();
        assert_eq!(snapshots.first().unwrap().infected, 1);
        assert_eq!(snapshots.last().unwrap().step, summary.steps);
        assert!(snapshots.iter().all(|s| s.total() == 10 && s.agents.is_none()));
    }

    #[test]
    fn run_respects_max_time() {
        let mut config = small_config(1, 10);
        config.person.infectious_period = 1000.0;
        let timing = TimingConfig { dt: 0.1, max_time: 1.0, linger_time: 5.0, record_interval: 0.0 };
        let mut sim = Simulation::new(&config).unwrap();
        let summary = sim.run(&timing).unwrap();
        assert!(summary.extinct_at.is_none());
        assert!(summary.time >= 1.0 - 1e-4 && summary.time < 1.2);
        // Only the final snapshot when periodic recording is off.
        assert_eq!(sim.recorded_snapshots().len(), 1);
    }

    #[test]
    fn snapshots_can_carry_agent_samples() {
        let mut config = small_config(2, 3);
        config.output.save_positions_in_snapshot = true;
        let mut sim = Simulation::new(&config).unwrap();
        sim.record_snapshot();
        let snapshot = &sim.recorded_snapshots()[0];
        let samples = snapshot.agents.as_ref().unwrap();
        assert_eq!(samples.len(), 6);
        assert_eq!(snapshot.infected_per_city.iter().sum::<u32>(), 1);
        assert_eq!(samples.iter().filter(|s| s.status == Status::Infected).count(), 1);

        sim.set_record_agents(false);
        sim.record_snapshot();
        assert!(sim.recorded_snapshots()[1].agents.is_none());
        assert_eq!(sim.recorded_snapshots()[1].infected, 1);
    }

    #[test]
    fn clock_keeps_advancing_with_tiny_steps() {
        let params = AgentParams { infectious_period: 1000.005, ..AgentParams::default() };
        let mut city = City::new(0, Bounds::centered(Vec2::zero(), 4.0).unwrap());
        city.add_agent(Agent::new(0, 0, params, Vec2::zero(), 1).unwrap()).unwrap();
        let mut sim = Simulation::from_cities(vec![city], 1);
        let agent = AgentRef { city: 0, index: 0 };
        sim.set_status(agent, Status::Infected).unwrap();

        // Past t = 1000 a single-precision sum would swallow every 1e-5 step.
        sim.tick(1000.0).unwrap();
        assert_eq!(sim.agent(agent).unwrap().status(), Status::Infected);
        for _ in 0..1000 {
            sim.tick(1e-5).unwrap();
        }

        assert!(sim.time() > 1000.009, "clock stuck at {}", sim.time());
        let agent = sim.agent(agent).unwrap();
        assert!(agent.age() > 1000.009, "age stuck at {}", agent.age());
        assert_eq!(agent.status(), Status::Recovered);
        assert_eq!(sim.step_count(), 1001);
    }

    #[test]
    fn transfer_moves_agent_and_keeps_status() {
        let mut sim = Simulation::new(&small_config(2, 3)).unwrap();
        let infected = sim.agent_refs().find(|r| sim.agent(*r).unwrap().status() == Status::Infected).unwrap();
        let to_city = 1 - infected.city;
        let id = sim.agent(infected).unwrap().id();

        let moved = sim.transfer_agent(infected, to_city).unwrap();
        let agent = sim.agent(moved).unwrap();
        assert_eq!(agent.id(), id);
        assert_eq!(agent.city(), to_city);
        assert_eq!(agent.status(), Status::Infected);
        assert!(sim.cities()[to_city].bounds().contains(agent.position()));
        assert_eq!(sim.cities()[to_city].population().len(), 4);
        assert_eq!(sim.cities()[infected.city].population().len(), 2);

        assert_eq!(sim.transfer_agent(moved, 9), Err(SimError::UnknownCity(9)));
        let missing = AgentRef { city: 0, index: 99 };
        assert_eq!(sim.transfer_agent(missing, 1), Err(SimError::UnknownAgent(missing)));
    }

    #[test]
    fn transfer_rejects_agents_too_large_for_destination() {
        let big = City::new(0, Bounds::centered(Vec2::zero(), 4.0).unwrap());
        let tiny = City::new(1, Bounds::centered(Vec2::new(10.0, 0.0), 0.3).unwrap());
        let mut cities = vec![big, tiny];
        let params = AgentParams { radius: 0.5, ..AgentParams::default() };
        cities[0].add_agent(Agent::new(0, 0, params, Vec2::zero(), 1).unwrap()).unwrap();
        let mut sim = Simulation::from_cities(cities, 1);

        let agent = AgentRef { city: 0, index: 0 };
        assert!(matches!(sim.transfer_agent(agent, 1), Err(SimError::Config(_))));
        assert_eq!(sim.agent(agent).unwrap().id(), 0);
    }

    #[test]
    fn set_status_reports_unknown_agents() {
        let mut sim = Simulation::new(&small_config(1, 2)).unwrap();
        let missing = AgentRef { city: 3, index: 0 };
        assert_eq!(sim.set_status(missing, Status::Infected), Err(SimError::UnknownAgent(missing)));
    }
}

use crate::agent::Agent;
use crate::error::{SimError, SimResult};
use crate::peers::InfectedSnapshot;
use epidemic_common::{AgentParams, Bounds, ConfigError, Status, Vec2};
use rand::Rng;
use rayon::prelude::*;
use std::ops::AddAssign;

/// Position of an agent inside a [`Simulation`](crate::Simulation): city index plus
/// index within that city's population. Moving an agent to another city shifts the
/// indices of the agents after it in the city it left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentRef {
    pub city: usize,
    pub index: usize,
}

/// Status transitions made during one status phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusChanges {
    pub infected: u32,
    pub recovered: u32,
}

impl AddAssign for StatusChanges {
    fn add_assign(&mut self, other: Self) {
        self.infected += other.infected;
        self.recovered += other.recovered;
    }
}

/// Number of agents in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub susceptible: u32,
    pub infected: u32,
    pub recovered: u32,
}

impl StatusCounts {
    pub fn total(&self) -> u32 {
        self.susceptible + self.infected + self.recovered
    }

    fn record(&mut self, status: Status) {
        match status {
            Status::Susceptible => self.susceptible += 1,
            Status::Infected => self.infected += 1,
            Status::Recovered => self.recovered += 1,
        }
    }
}

impl AddAssign for StatusCounts {
    fn add_assign(&mut self, other: Self) {
        self.susceptible += other.susceptible;
        self.infected += other.infected;
        self.recovered += other.recovered;
    }
}

/// The agents of one city, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct Population {
    agents: Vec<Agent>,
}

impl Population {
    pub fn new() -> Self {
        Population { agents: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Agent> {
        self.agents.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Agent> {
        self.agents.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Agent> {
        self.agents.get_mut(index)
    }

    /// Currently Infected agents. Recomputed on every call, never cached.
    pub fn infected(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.agents.iter().filter(|agent| agent.status() == Status::Infected)
    }

    pub fn count(&self, status: Status) -> usize {
        self.agents.iter().filter(|agent| agent.status() == status).count()
    }

    /// Positions of every agent, indexed like the population. Motion reads this
    /// copy so that no agent sees a peer's same-tick move.
    pub fn positions(&self) -> Vec<Vec2> {
        self.agents.iter().map(|agent| agent.position()).collect()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for agent in &self.agents {
            counts.record(agent.status());
        }
        counts
    }

    fn push(&mut self, agent: Agent) -> usize {
        self.agents.push(agent);
        self.agents.len() - 1
    }

    fn remove(&mut self, index: usize) -> Option<Agent> {
        (index < self.agents.len()).then(|| self.agents.remove(index))
    }
}

impl<'a> IntoIterator for &'a Population {
    type Item = &'a Agent;
    type IntoIter = std::slice::Iter<'a, Agent>;

    fn into_iter(self) -> Self::IntoIter {
        self.agents.iter()
    }
}

/// A bounded region and the population confined to it.
#[derive(Debug, Clone)]
pub struct City {
    id: usize,
    bounds: Bounds,
    population: Population,
}

impl City {
    pub fn new(id: usize, bounds: Bounds) -> Self {
        City { id, bounds, population: Population::new() }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Adds an agent built for this city and returns its population index. The
    /// agent must fit between the walls and start within the bounds.
    pub fn add_agent(&mut self, agent: Agent) -> SimResult<usize> {
        if agent.city() != self.id {
            return Err(SimError::CityMismatch { id: agent.id(), agent_city: agent.city(), city: self.id });
        }
        self.bounds.check_fits(agent.radius())?;
        let position = agent.position();
        if !self.bounds.contains(position) {
            return Err(ConfigError::AgentOutsideBounds { x: position.x, y: position.y }.into());
        }
        Ok(self.population.push(agent))
    }

    /// Builds an agent at a uniformly random point of this city and adds it.
    pub fn spawn_random<R: Rng + ?Sized>(
        &mut self,
        id: u32,
        params: AgentParams,
        rng: &mut R,
        run_seed: u64,
    ) -> SimResult<usize> {
        let position = self.bounds.sample_point(rng);
        self.add_agent(Agent::new(id, self.id, params, position, run_seed)?)
    }

    /// Moves an arriving agent into this city, clamping it inside the walls.
    pub(crate) fn receive_agent(&mut self, mut agent: Agent) -> SimResult<usize> {
        self.bounds.check_fits(agent.radius())?;
        agent.clamp_into(&self.bounds);
        agent.set_city(self.id);
        Ok(self.population.push(agent))
    }

    pub(crate) fn renumber(&mut self, id: usize) {
        self.id = id;
        self.population.agents.iter_mut().for_each(|agent| agent.set_city(id));
    }

    pub(crate) fn take_agent(&mut self, index: usize) -> Option<Agent> {
        self.population.remove(index)
    }

    pub(crate) fn agent_mut(&mut self, index: usize) -> Option<&mut Agent> {
        self.population.get_mut(index)
    }

    pub(crate) fn advance_age(&mut self, dt: f32) {
        self.population.agents.iter_mut().for_each(|agent| agent.advance_age(dt));
    }

    /// Motion phase: every agent reads the positions captured before the phase and
    /// writes only its own state, so agents are integrated in parallel.
    pub(crate) fn integrate_motion(&mut self, dt: f32) {
        let needs_peers = self.population.iter().any(|agent| agent.params().distances_socially());
        let peers = if needs_peers { self.population.positions() } else { Vec::new() };
        let bounds = self.bounds;

        self.population
            .agents
            .par_iter_mut()
            .enumerate()
            .for_each(|(idx, agent)| agent.integrate_motion(dt, &bounds, &peers, idx));
    }

    /// Status phase: exposure is checked against the Infected set captured when the
    /// phase begins.
    pub(crate) fn evaluate_status(&mut self) -> SimResult<StatusChanges> {
        let exposure = InfectedSnapshot::capture(&self.population, &self.bounds);

        let transitions: Vec<Option<Status>> = self
            .population
            .agents
            .par_iter_mut()
            .enumerate()
            .map(|(idx, agent)| agent.evaluate_status(idx, &exposure))
            .collect::<SimResult<_>>()?;

        let mut changes = StatusChanges::default();
        for transition in transitions.into_iter().flatten() {
            match transition {
                Status::Infected => changes.infected += 1,
                Status::Recovered => changes.recovered += 1,
                Status::Susceptible => {}
            }
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city() -> City {
        City::new(2, Bounds::centered(Vec2::zero(), 4.0).unwrap())
    }

    fn agent_at(id: u32, x: f32, y: f32) -> Agent {
        Agent::new(id, 2, AgentParams::default(), Vec2::new(x, y), 5).unwrap()
    }

    #[test]
    fn add_agent_assigns_city_and_keeps_insertion_order() {
        let mut city = city();
        assert_eq!(city.add_agent(agent_at(10, 0.0, 0.0)).unwrap(), 0);
        assert_eq!(city.add_agent(agent_at(11, 1.0, 1.0)).unwrap(), 1);
        let ids: Vec<u32> = city.population().iter().map(|a| a.id()).collect();
        assert_eq!(ids, [10, 11]);
        assert!(city.population().iter().all(|a| a.city() == 2));
    }

    #[test]
    fn rejects_agents_outside_or_too_large() {
        let mut city = city();
        assert!(city.add_agent(agent_at(0, 5.0, 0.0)).is_err());
        let huge = AgentParams { radius: 4.0, ..AgentParams::default() };
        assert!(city.add_agent(Agent::new(1, 2, huge, Vec2::zero(), 5).unwrap()).is_err());
        assert!(city.population().is_empty());
    }

    #[test]
    fn rejects_agents_built_for_another_city() {
        let mut city = city();
        let stranger = Agent::new(4, 3, AgentParams::default(), Vec2::zero(), 5).unwrap();
        assert_eq!(
            city.add_agent(stranger),
            Err(SimError::CityMismatch { id: 4, agent_city: 3, city: 2 })
        );
    }

    #[test]
    fn spawn_random_places_agents_inside() {
        let mut city = city();
        let mut rng = crate::rng::simulation_rng(11);
        for id in 0..50 {
            city.spawn_random(id, AgentParams::default(), &mut rng, 11).unwrap();
        }
        assert_eq!(city.population().len(), 50);
        let positions = city.population().positions();
        assert_eq!(positions.len(), 50);
        assert!(positions.iter().all(|p| city.bounds().contains(*p)));
        assert!(city.population().iter().all(|a| a.city() == 2));
    }

    #[test]
    fn infected_query_is_never_stale() {
        let mut city = city();
        for i in 0..3 {
            city.add_agent(agent_at(i, i as f32 * 0.5, 0.0)).unwrap();
        }
        assert_eq!(city.population().infected().count(), 0);

        city.agent_mut(1).unwrap().set_status(Status::Infected).unwrap();
        let infected: Vec<u32> = city.population().infected().map(|a| a.id()).collect();
        assert_eq!(infected, [1]);

        city.agent_mut(1).unwrap().set_status(Status::Recovered).unwrap();
        assert_eq!(city.population().infected().count(), 0);
        assert_eq!(city.population().count(Status::Recovered), 1);
        assert_eq!(
            city.population().status_counts(),
            StatusCounts { susceptible: 2, infected: 0, recovered: 1 }
        );
    }

    #[test]
    fn newly_infected_agents_do_not_spread_in_the_same_phase() {
        // A chain a - b - c where only neighbours are within infection range.
        let params = AgentParams { infection_radius: 0.6, infection_probability: 1.0, ..AgentParams::default() };
        let mut city = city();
        for (i, x) in [-1.0f32, -0.5, 0.0].into_iter().enumerate() {
            city.add_agent(Agent::new(i as u32, 2, params, Vec2::new(x, 0.0), 1).unwrap()).unwrap();
        }
        city.agent_mut(0).unwrap().set_status(Status::Infected).unwrap();

        let changes = city.evaluate_status().unwrap();
        assert_eq!(changes, StatusChanges { infected: 1, recovered: 0 });
        assert_eq!(city.population().get(1).unwrap().status(), Status::Infected);
        assert_eq!(city.population().get(2).unwrap().status(), Status::Susceptible);

        let changes = city.evaluate_status().unwrap();
        assert_eq!(changes.infected, 1);
        assert_eq!(city.population().get(2).unwrap().status(), Status::Infected);
    }

    #[test]
    fn take_and_receive_move_agents_between_cities() {
        let mut home = city();
        let mut away = City::new(7, Bounds::centered(Vec2::new(10.0, 0.0), 2.0).unwrap());
        home.add_agent(agent_at(0, 0.0, 0.0)).unwrap();
        home.add_agent(agent_at(1, 1.0, 0.0)).unwrap();

        let traveller = home.take_agent(0).unwrap();
        assert!(home.take_agent(5).is_none());
        let idx = away.receive_agent(traveller).unwrap();

        let arrived = away.population().get(idx).unwrap();
        assert_eq!(arrived.id(), 0);
        assert_eq!(arrived.city(), 7);
        assert!(away.bounds().contains(arrived.position()));
        assert_eq!(home.population().get(0).unwrap().id(), 1);
    }
}

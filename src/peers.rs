//! Read-only view of a city's Infected agents, captured before the status phase
//! starts writing.

use crate::grid::SpatialGrid;
use crate::population::Population;
use epidemic_common::{Bounds, Status, Vec2};

/// The Infected agents of one city, frozen when the status phase begins. Agents
/// infected during the phase are not in it, so they cannot pass the infection on
/// until the next tick.
#[derive(Debug, Clone)]
pub struct InfectedSnapshot {
    /// Population index of each Infected agent, in grid slot order.
    agent_indices: Vec<usize>,
    grid: Option<SpatialGrid>,
}

impl InfectedSnapshot {
    pub fn empty() -> Self {
        InfectedSnapshot { agent_indices: Vec::new(), grid: None }
    }

    pub fn capture(population: &Population, bounds: &Bounds) -> Self {
        let (agent_indices, positions): (Vec<usize>, Vec<Vec2>) = population
            .iter()
            .enumerate()
            .filter(|(_, agent)| agent.status() == Status::Infected)
            .map(|(idx, agent)| (idx, agent.position()))
            .unzip();
        if agent_indices.is_empty() {
            return Self::empty();
        }

        // Cells as wide as the largest radius anyone will query with.
        let cell_size = population
            .iter()
            .filter(|agent| agent.status() == Status::Susceptible)
            .map(|agent| agent.params().infection_radius)
            .fold(0.0f32, f32::max);

        InfectedSnapshot {
            agent_indices,
            grid: Some(SpatialGrid::build(bounds, cell_size, positions)),
        }
    }

    pub fn len(&self) -> usize {
        self.agent_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agent_indices.is_empty()
    }

    /// Runs `trial` once per Infected peer strictly within `radius` of `pos`
    /// (excluding the agent at `self_index`) and returns the population index of
    /// the first peer whose trial succeeds.
    pub fn find_infector<F>(&self, pos: Vec2, radius: f32, self_index: usize, mut trial: F) -> Option<usize>
    where
        F: FnMut() -> bool,
    {
        let grid = self.grid.as_ref()?;
        grid.find_first_within(pos, radius, |slot| self.agent_indices[slot] != self_index && trial())
            .map(|slot| self.agent_indices[slot])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::population::City;
    use epidemic_common::AgentParams;

    fn city_with_infected(infected: &[usize]) -> City {
        let mut city = City::new(0, Bounds::centered(Vec2::zero(), 4.0).unwrap());
        for (i, x) in [-1.0f32, -0.2, 0.0, 1.5].into_iter().enumerate() {
            city.add_agent(Agent::new(i as u32, 0, AgentParams::default(), Vec2::new(x, 0.0), 3).unwrap())
                .unwrap();
        }
        for &idx in infected {
            city.agent_mut(idx).unwrap().set_status(Status::Infected).unwrap();
        }
        city
    }

    #[test]
    fn empty_when_nobody_is_infected() {
        let city = city_with_infected(&[]);
        let snapshot = InfectedSnapshot::capture(city.population(), city.bounds());
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
        assert_eq!(snapshot.find_infector(Vec2::zero(), 10.0, 0, || true), None);
    }

    #[test]
    fn finds_nearby_infected_but_never_self() {
        let city = city_with_infected(&[1, 3]);
        let snapshot = InfectedSnapshot::capture(city.population(), city.bounds());
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.is_empty());

        // Agent 2 at the origin: agent 1 is 0.2 away, agent 3 is 1.5 away.
        assert_eq!(snapshot.find_infector(Vec2::zero(), 0.3, 2, || true), Some(1));
        assert_eq!(snapshot.find_infector(Vec2::zero(), 0.3, 2, || false), None);
        // Agent 1 querying from its own spot does not find itself.
        assert_eq!(snapshot.find_infector(Vec2::new(-0.2, 0.0), 0.3, 1, || true), None);
    }
}

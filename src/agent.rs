use crate::error::{SimError, SimResult};
use crate::peers::InfectedSnapshot;
use crate::rng::agent_rng;
use epidemic_common::{angle_to_vec, AgentParams, Bounds, Status, Vec2};
use log::error;
use rand::rngs::StdRng;
use rand::Rng;

/// Squared distances at or below this are treated as coincident points and
/// contribute no force.
const MIN_DISTANCE_SQ: f32 = 1e-12;
/// Wall gaps at or below this contribute no soft wall force.
const MIN_WALL_GAP: f32 = 1e-6;
/// `last_target_pick_time` before the first pick.
const NEVER_PICKED: f64 = -1.0;

/// One simulated individual.
#[derive(Debug, Clone)]
pub struct Agent {
    id: u32,
    city: usize,
    params: AgentParams,

    position: Vec2,
    velocity: Vec2,

    status: Status,
    // Clock values accumulate in f64 so that tiny steps still advance them.
    age: f64,
    infected_at: f64,
    recovered_at: f64,

    random_walk_target: Option<Vec2>,
    last_target_pick_time: f64,
    moving: bool,

    rng: StdRng,
}

impl Agent {
    /// Creates a Susceptible, motionless agent belonging to `city`. Its random
    /// stream is derived from `run_seed` and `id`.
    pub fn new(id: u32, city: usize, params: AgentParams, position: Vec2, run_seed: u64) -> SimResult<Self> {
        params.validate()?;
        Ok(Agent {
            id,
            city,
            params,
            position,
            velocity: Vec2::zero(),
            status: Status::Susceptible,
            age: 0.0,
            infected_at: f64::NEG_INFINITY,
            recovered_at: f64::NEG_INFINITY,
            random_walk_target: None,
            last_target_pick_time: NEVER_PICKED,
            moving: true,
            rng: agent_rng(run_seed, id),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Index of the city this agent currently lives in.
    pub fn city(&self) -> usize {
        self.city
    }

    pub(crate) fn set_city(&mut self, city: usize) {
        self.city = city;
    }

    pub fn params(&self) -> &AgentParams {
        &self.params
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Overrides the current velocity, e.g. to give an agent an initial push.
    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    pub fn radius(&self) -> f32 {
        self.params.radius
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Simulated seconds since the agent was created.
    pub fn age(&self) -> f32 {
        self.age as f32
    }

    /// Age at which the agent became Infected, or negative infinity if it never did.
    pub fn infected_at(&self) -> f32 {
        self.infected_at as f32
    }

    /// Age at which the agent Recovered, or negative infinity if it never did.
    pub fn recovered_at(&self) -> f32 {
        self.recovered_at as f32
    }

    pub fn random_walk_target(&self) -> Option<Vec2> {
        self.random_walk_target
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Freezes the agent in place. It keeps aging and can still change status.
    pub fn pause_motion(&mut self) {
        self.moving = false;
    }

    pub fn resume_motion(&mut self) {
        self.moving = true;
    }

    pub(crate) fn advance_age(&mut self, dt: f32) {
        self.age += f64::from(dt);
    }

    /// Moves the agent one step forward in the Susceptible -> Infected -> Recovered
    /// chain and stamps the transition time with the current age.
    ///
    /// Asking for the current status again is a no-op that leaves the timers alone.
    /// Any other request (going backwards, skipping a state) is a driver bug: it is
    /// logged and rejected.
    pub fn set_status(&mut self, next: Status) -> SimResult<()> {
        if next == self.status {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            error!(
                "Rejected status change for agent {}: {} -> {} at age {:.3}.",
                self.id, self.status, next, self.age
            );
            return Err(SimError::InvalidTransition { id: self.id, from: self.status, to: next });
        }
        match next {
            Status::Infected => self.infected_at = self.age,
            Status::Recovered => self.recovered_at = self.age,
            Status::Susceptible => {}
        }
        self.status = next;
        Ok(())
    }

    /// Advances position and velocity by `dt` under random-walk attraction, wall
    /// repulsion and, if the agent distances socially, repulsion from `peers`.
    ///
    /// `peers` holds the positions of everyone in this agent's city as they were
    /// before the motion phase started; the entry at `self_index` is the agent itself
    /// and is skipped. It may be empty when the agent does not distance socially.
    pub fn integrate_motion(&mut self, dt: f32, bounds: &Bounds, peers: &[Vec2], self_index: usize) {
        if !self.moving {
            return;
        }

        // --- 1. Random-walk target refresh ---
        if self.age - self.last_target_pick_time >= f64::from(self.params.random_walk_interval) {
            self.last_target_pick_time = self.age;
            let theta = self.rng.random::<f32>() * std::f32::consts::TAU;
            self.random_walk_target = Some(self.position + angle_to_vec(theta).scale(self.params.step_size));
        }

        // --- 2. Attraction towards the target ---
        let mut total_force = self.attraction_force();

        // --- 3. Walls (bounce, clamp, soft repulsion) ---
        total_force += self.wall_force(bounds);

        // --- 4. Social distancing ---
        if self.params.distances_socially() {
            total_force += self.repulsion_force(peers, self_index);
        }

        // --- 5. Integrate ---
        self.velocity += total_force * dt;
        self.velocity = self.velocity.clamp_length(self.params.max_speed);
        self.position += self.velocity * dt;

        self.confine_to(bounds);
    }

    fn attraction_force(&self) -> Vec2 {
        let Some(target) = self.random_walk_target else {
            return Vec2::zero();
        };
        let to_target = target - self.position;
        let dist_sq = to_target.length_squared();
        if dist_sq > MIN_DISTANCE_SQ {
            to_target.normalize_or_zero().scale(self.params.gravity_strength / dist_sq)
        } else {
            Vec2::zero()
        }
    }

    /// Reflects and clamps the agent against any wall it has crossed, then returns the
    /// soft force pushing it away from walls closer than `wall_buffer`.
    fn wall_force(&mut self, bounds: &Bounds) -> Vec2 {
        let half = self.params.radius / 2.0;
        let buffer = self.params.wall_buffer;
        let mut force = Vec2::zero();

        for axis in 0..2 {
            let floor = bounds.lower(axis) + half;
            let ceiling = bounds.upper(axis) - half;
            let to_lower = self.position.axis(axis) - floor;
            let to_upper = ceiling - self.position.axis(axis);

            if to_lower < 0.0 {
                *self.velocity.axis_mut(axis) *= -1.0;
                *self.position.axis_mut(axis) = floor;
            }
            if to_upper < 0.0 {
                *self.velocity.axis_mut(axis) *= -1.0;
                *self.position.axis_mut(axis) = ceiling;
            }

            // Lower wall pushes in +axis, upper wall in -axis.
            *force.axis_mut(axis) += wall_push(to_lower, buffer) - wall_push(to_upper, buffer);
        }
        force
    }

    fn repulsion_force(&self, peers: &[Vec2], self_index: usize) -> Vec2 {
        let mut repulsion = Vec2::zero();
        for (idx, &other) in peers.iter().enumerate() {
            if idx == self_index {
                continue;
            }
            let away = self.position - other;
            let dist_sq = away.length_squared();
            if dist_sq > MIN_DISTANCE_SQ {
                let dist = dist_sq.sqrt();
                repulsion += away.scale(self.params.social_distance_factor / (dist_sq * dist));
            }
        }
        repulsion
    }

    /// Hard floor/ceiling after integration: a step that would carry the agent past a
    /// wall stops at the wall with the velocity component pointing back inside.
    fn confine_to(&mut self, bounds: &Bounds) {
        let half = self.params.radius / 2.0;
        for axis in 0..2 {
            let floor = bounds.lower(axis) + half;
            let ceiling = bounds.upper(axis) - half;
            let coord = self.position.axis(axis);
            if coord < floor {
                *self.position.axis_mut(axis) = floor;
                *self.velocity.axis_mut(axis) = self.velocity.axis(axis).abs();
            } else if coord > ceiling {
                *self.position.axis_mut(axis) = ceiling;
                *self.velocity.axis_mut(axis) = -self.velocity.axis(axis).abs();
            }
        }
    }

    /// Places the agent inside `bounds` without touching its motion state. Used when
    /// an agent arrives in a different city.
    pub(crate) fn clamp_into(&mut self, bounds: &Bounds) {
        let half = self.params.radius / 2.0;
        for axis in 0..2 {
            let floor = bounds.lower(axis) + half;
            let ceiling = bounds.upper(axis) - half;
            let coord = self.position.axis(axis);
            *self.position.axis_mut(axis) = coord.clamp(floor, ceiling);
        }
        self.random_walk_target = None;
    }

    /// Runs this tick's status rules and returns the transition made, if any.
    ///
    /// A Susceptible agent runs one Bernoulli trial per Infected peer within its
    /// infection radius and becomes Infected on the first success. An Infected agent
    /// recovers once it has been Infected for longer than `infectious_period`.
    pub fn evaluate_status(&mut self, self_index: usize, exposure: &InfectedSnapshot) -> SimResult<Option<Status>> {
        match self.status {
            Status::Susceptible => {
                let position = self.position;
                let probability = self.params.infection_probability;
                let rng = &mut self.rng;
                let infector = exposure.find_infector(position, self.params.infection_radius, self_index, || {
                    rng.random::<f32>() < probability
                });
                if infector.is_some() {
                    self.set_status(Status::Infected)?;
                    return Ok(Some(Status::Infected));
                }
            }
            Status::Infected => {
                if self.age - self.infected_at > f64::from(self.params.infectious_period) {
                    self.set_status(Status::Recovered)?;
                    return Ok(Some(Status::Recovered));
                }
            }
            Status::Recovered => {}
        }
        Ok(None)
    }
}

/// Soft wall repulsion: grows as `1/gap` inside the buffer, zero outside it and zero
/// once the agent is touching (or past) the wall.
#[inline(always)]
fn wall_push(gap: f32, buffer: f32) -> f32 {
    if gap > MIN_WALL_GAP {
        (1.0 / gap - 1.0 / buffer).max(0.0)
    } else {
        0.0
    }
}

use crate::status::Status;
use serde::{Deserialize, Serialize};

/// State of one agent at snapshot time, as read by renderers and analysis tools.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentSample {
    pub id: u32,
    pub city: u32,
    pub x: f32,
    pub y: f32,
    pub status: Status,
}

/// A snapshot of the simulation state and metrics at a specific time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulated time in seconds.
    pub time: f32,
    /// Number of ticks completed.
    pub step: u64,
    pub susceptible: u32,
    pub infected: u32,
    pub recovered: u32,
    /// Infected count per city, in city order.
    pub infected_per_city: Vec<u32>,
    /// Per-agent samples, included only if `output.save_positions_in_snapshot` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<AgentSample>>,
}

impl Snapshot {
    pub fn total(&self) -> u32 {
        self.susceptible + self.infected + self.recovered
    }
}

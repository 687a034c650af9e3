use serde::{Deserialize, Serialize};
use std::fmt;

/// Epidemiological state of an agent. Transitions only ever move one step forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Susceptible,
    Infected,
    Recovered,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Susceptible, Status::Infected, Status::Recovered];

    /// True when `next` is exactly one step after `self`.
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Susceptible, Status::Infected) | (Status::Infected, Status::Recovered)
        )
    }

    pub fn short_code(self) -> &'static str {
        match self {
            Status::Susceptible => "S",
            Status::Infected => "I",
            Status::Recovered => "R",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Susceptible => "susceptible",
            Status::Infected => "infected",
            Status::Recovered => "recovered",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_single_forward_steps_are_allowed() {
        assert!(Status::Susceptible.can_transition_to(Status::Infected));
        assert!(Status::Infected.can_transition_to(Status::Recovered));

        assert!(!Status::Susceptible.can_transition_to(Status::Recovered));
        assert!(!Status::Recovered.can_transition_to(Status::Infected));
        assert!(!Status::Infected.can_transition_to(Status::Susceptible));
        for s in Status::ALL {
            assert!(!s.can_transition_to(s));
        }
    }

    #[test]
    fn default_is_susceptible() {
        assert_eq!(Status::default(), Status::Susceptible);
    }

    #[test]
    fn codes() {
        let codes: Vec<_> = Status::ALL.iter().map(|s| s.short_code()).collect();
        assert_eq!(codes, ["S", "I", "R"]);
    }
}

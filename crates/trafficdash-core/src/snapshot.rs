//! Wire types for the simulation state endpoint.
//!
//! The canonical snapshot shape uses `queues`, `avg_waiting_time`, and
//! `phase_timer`; older servers emitted `queue_lengths`, `avg_wait`, and
//! `phase_elapsed` for the same fields, so those are accepted as
//! deserialization aliases and never emitted. Every field defaults so a
//! partially-populated body still parses into something renderable.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Controller mode reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Ai,
    Baseline,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Ai => "AI",
            Mode::Baseline => "BASELINE",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approach direction of an intersection lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    N,
    S,
    E,
    W,
}

impl Direction {
    /// Fixed display order for queue rows.
    pub const ALL: [Direction; 4] = [Direction::N, Direction::S, Direction::E, Direction::W];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::N => "N",
            Direction::S => "S",
            Direction::E => "E",
            Direction::W => "W",
        }
    }
}

/// Traffic-light phase token, carried verbatim from the server. The token
/// doubles as a style selector, so it is kept as the server spelled it
/// rather than being forced through a closed enum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phase(pub String);

impl Phase {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token names a green phase (`NS_GREEN`, `EW_GREEN`,
    /// `GREEN`, ...). Drives card styling only.
    pub fn is_green(&self) -> bool {
        self.0.contains("GREEN")
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Phase {
    fn from(token: &str) -> Self {
        Phase(token.to_owned())
    }
}

/// Controller verdict attached to a decision-log entry; the token is also a
/// style selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Hold,
    Switch,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Hold => "HOLD",
            Decision::Switch => "SWITCH",
        }
    }
}

/// Per-intersection view as emitted by the server each poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntersectionView {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default, alias = "phase_elapsed")]
    pub phase_timer: u32,
    #[serde(default, alias = "queue_lengths")]
    pub queues: HashMap<Direction, u32>,
    #[serde(default, alias = "avg_wait")]
    pub avg_waiting_time: f64,
}

impl IntersectionView {
    /// Queue length for one approach. An absent key reads as zero; callers
    /// that care about absence vs. measured-zero should consult `queues`
    /// directly.
    pub fn queue(&self, direction: Direction) -> u32 {
        self.queues.get(&direction).copied().unwrap_or(0)
    }

    pub fn total_queue(&self) -> u64 {
        self.queues.values().map(|&n| u64::from(n)).sum()
    }
}

/// One point of the server-side metric history. The server bounds the
/// series length; the client replaces its copy wholesale every poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    #[serde(default)]
    pub step: u64,
    #[serde(default)]
    pub avg_wait: f64,
    #[serde(default)]
    pub total_queue: u64,
}

/// One controller decision as logged by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub step: u64,
    #[serde(default)]
    pub agent: String,
    pub decision: Decision,
    #[serde(default)]
    pub reasoning: String,
}

/// Full simulation state as returned by `GET /api/state`. Intersections keep
/// the server's emission order, which is also the card creation order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub step: u64,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub intersections: IndexMap<String, IntersectionView>,
    #[serde(default)]
    pub history: Vec<HistoryPoint>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

//! Core view-model for the trafficdash client: the wire snapshot shapes,
//! the card reconciliation set, and the chart sink. No I/O lives here; the
//! HTTP client and terminal renderer in `trafficdash-app` consume these.

pub mod cards;
pub mod chart;
pub mod snapshot;

pub use cards::{ApplyStats, CardContent, CardSet};
pub use chart::ChartSink;
pub use snapshot::{
    Decision, Direction, HistoryPoint, IntersectionView, LogEntry, Mode, Phase,
    SimulationSnapshot,
};

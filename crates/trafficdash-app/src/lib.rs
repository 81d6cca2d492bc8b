//! HTTP client and terminal surfaces for the trafficdash dashboard.

pub mod client;
pub mod watch;

pub use client::{ApiClient, ApiError, ControlAck, ControlAction};
pub use watch::{HeadlessReport, WatchConfig};

//! REST client for the simulation server's two endpoints.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trafficdash_core::{Mode, SimulationSnapshot};

/// Errors produced while talking to the simulation server.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode state body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Commands accepted by `POST /api/control` besides mode switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ControlAction {
    Start,
    Stop,
    Reset,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Start => "start",
            ControlAction::Stop => "stop",
            ControlAction::Reset => "reset",
        }
    }
}

#[derive(Debug, Serialize)]
struct ControlBody<'a> {
    action: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<&'a str>,
}

/// Acknowledgment body from the control endpoint. The server's reply is
/// advisory; an empty or unparsable body degrades to the default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlAck {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub mode: Option<Mode>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the full simulation state.
    pub async fn fetch_state(&self) -> Result<SimulationSnapshot, ApiError> {
        let url = join_url(&self.base_url, "/api/state");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send a start/stop/reset command.
    pub async fn control(&self, action: ControlAction) -> Result<ControlAck, ApiError> {
        self.post_control(&ControlBody {
            action: action.as_str(),
            mode: None,
        })
        .await
    }

    /// Send a mode-change command.
    pub async fn set_mode(&self, mode: Mode) -> Result<ControlAck, ApiError> {
        self.post_control(&ControlBody {
            action: "set_mode",
            mode: Some(mode.as_str()),
        })
        .await
    }

    async fn post_control(&self, body: &ControlBody<'_>) -> Result<ControlAck, ApiError> {
        let url = join_url(&self.base_url, "/api/control");
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use trafficdash_app::client::{ApiClient, ControlAck, ControlAction};
use trafficdash_app::watch::{self, WatchConfig};
use trafficdash_core::{Direction, Mode};

#[derive(Parser, Debug)]
#[command(
    name = "trafficdash",
    version,
    about = "Terminal dashboard for the traffic-signal simulation server"
)]
struct Cli {
    /// Base URL of the running simulation server.
    #[arg(long, env = "TRAFFICDASH_URL", default_value = "http://127.0.0.1:5000")]
    base_url: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Launch the live dashboard (the default).
    Watch {
        /// Poll interval in milliseconds.
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },
    /// Fetch and print the current simulation state once.
    Status,
    /// Send a start/stop/reset command.
    Control { action: ControlAction },
    /// Switch the controller mode.
    SetMode { mode: CliMode },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliMode {
    Ai,
    Baseline,
}

impl From<CliMode> for Mode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Ai => Mode::Ai,
            CliMode::Baseline => Mode::Baseline,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let client = ApiClient::new(cli.base_url).context("failed to build HTTP client")?;

    match cli.command.unwrap_or(Command::Watch { interval_ms: 100 }) {
        Command::Watch { interval_ms } => {
            let config = WatchConfig {
                interval: Duration::from_millis(interval_ms.max(1)),
            };
            watch::run_watch(client, config).await?;
        }
        Command::Status => status_command(&client).await?,
        Command::Control { action } => {
            let ack = client
                .control(action)
                .await
                .with_context(|| format!("failed to send '{}' command", action.as_str()))?;
            print_ack(action.as_str(), &ack);
        }
        Command::SetMode { mode } => {
            let mode = Mode::from(mode);
            let ack = client
                .set_mode(mode)
                .await
                .with_context(|| format!("failed to switch mode to {mode}"))?;
            print_ack(&format!("set_mode {mode}"), &ack);
        }
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn status_command(client: &ApiClient) -> Result<()> {
    let state = client
        .fetch_state()
        .await
        .context("failed to fetch simulation state")?;

    let status = if state.running {
        "Running".green().bold().to_string()
    } else {
        "Stopped".red().bold().to_string()
    };
    println!("{} {}  {} {}", "status".cyan().bold(), status, "step".cyan().bold(), state.step);
    if let Some(mode) = state.mode {
        println!("{} {}", "mode".cyan().bold(), mode);
    }

    for (id, view) in &state.intersections {
        let queues: Vec<String> = Direction::ALL
            .iter()
            .map(|direction| format!("{}: {}", direction.as_str(), view.queue(*direction)))
            .collect();
        println!(
            "{:<8} {:<10} {:>3}s  {}  avg wait {:.1}s",
            id.bold(),
            view.phase.as_str(),
            view.phase_timer,
            queues.join(" "),
            view.avg_waiting_time
        );
    }

    if let Some(point) = state.history.last() {
        println!(
            "{} step {}  queue {}  wait {:.1}s",
            "latest".cyan().bold(),
            point.step,
            point.total_queue,
            point.avg_wait
        );
    }

    Ok(())
}

fn print_ack(label: &str, ack: &ControlAck) {
    let state = if ack.running { "running" } else { "stopped" };
    let mode = ack
        .mode
        .map(|mode| mode.to_string())
        .unwrap_or_else(|| "-".to_owned());
    println!(
        "{} {}  ({state}, mode {mode})",
        label.green().bold(),
        if ack.status.is_empty() { "sent" } else { ack.status.as_str() }
    );
}

use std::{
    fs::{self, File},
    io::{self, Stdout},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Sparkline},
};
use serde::Serialize;
use supports_color::{ColorLevel, Stream, on_cached};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use trafficdash_core::{
    ApplyStats, CardContent, CardSet, ChartSink, Decision, LogEntry, Mode, SimulationSnapshot,
};

use crate::client::{ApiClient, ControlAck, ControlAction};

const DEFAULT_POLL_MILLIS: u64 = 100;
const EVENT_POLL_MILLIS: u64 = 50;
const LOG_DISPLAY_LIMIT: usize = 64;

const HEADLESS_ENV: &str = "TRAFFICDASH_WATCH_HEADLESS";
const FIXTURE_ENV: &str = "TRAFFICDASH_WATCH_FIXTURE";
const REPORT_ENV: &str = "TRAFFICDASH_WATCH_REPORT";

/// Settings for the live dashboard.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_MILLIS),
        }
    }
}

/// Launch the dashboard. With `TRAFFICDASH_WATCH_HEADLESS` set, a snapshot
/// fixture is replayed against a test backend instead of polling the
/// network, and a JSON report is written if `TRAFFICDASH_WATCH_REPORT`
/// names a path.
pub async fn run_watch(client: ApiClient, config: WatchConfig) -> Result<()> {
    if std::env::var_os(HEADLESS_ENV).is_some() {
        let fixture = fixture_path_from_env().context(
            "headless watch requires TRAFFICDASH_WATCH_FIXTURE to name a snapshot fixture",
        )?;
        let raw = fs::read_to_string(&fixture)
            .with_context(|| format!("failed to read fixture {}", fixture.display()))?;
        let snapshots: Vec<SimulationSnapshot> = serde_json::from_str(&raw)
            .with_context(|| format!("fixture {} is not a snapshot array", fixture.display()))?;

        let report = run_headless(&snapshots)?;
        if let Some(path) = report_path_from_env() {
            report
                .write_json(&path)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
        }
        info!(
            frames = report.summary.frame_count,
            final_step = report.summary.final_step,
            cards = report.summary.final_cards,
            "Headless watch completed"
        );
        return Ok(());
    }

    let (update_tx, update_rx) = unbounded_channel();
    let (outcome_tx, outcome_rx) = unbounded_channel();

    let poller = tokio::spawn(poll_loop(client.clone(), config.interval, update_tx));

    let handle = Handle::current();
    let dispatcher = Dispatcher {
        handle,
        client,
        outcome_tx,
    };
    let result =
        tokio::task::spawn_blocking(move || watch_blocking(dispatcher, update_rx, outcome_rx))
            .await?;

    poller.abort();
    result
}

enum PollUpdate {
    Snapshot(SimulationSnapshot),
    Failed(String),
}

/// Recurring state poll. The fetch is awaited in place, so at most one
/// request is ever in flight; ticks that fire while a request is
/// outstanding are skipped and the next cycle retries independently.
async fn poll_loop(client: ApiClient, interval: Duration, updates: UnboundedSender<PollUpdate>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let update = match client.fetch_state().await {
            Ok(snapshot) => PollUpdate::Snapshot(snapshot),
            Err(err) => {
                warn!(%err, "state poll failed; skipping cycle");
                PollUpdate::Failed(err.to_string())
            }
        };
        if updates.send(update).is_err() {
            break;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DispatchCommand {
    Control(ControlAction),
    SetMode(Mode),
}

impl DispatchCommand {
    fn label(&self) -> String {
        match self {
            DispatchCommand::Control(action) => action.as_str().to_owned(),
            DispatchCommand::SetMode(mode) => format!("set_mode {mode}"),
        }
    }
}

struct DispatchOutcome {
    label: String,
    result: Result<ControlAck, String>,
}

/// Sends control commands without blocking the UI loop and funnels the
/// results back for the status strip.
struct Dispatcher {
    handle: Handle,
    client: ApiClient,
    outcome_tx: UnboundedSender<DispatchOutcome>,
}

impl Dispatcher {
    fn submit(&self, command: DispatchCommand) {
        let client = self.client.clone();
        let outcome_tx = self.outcome_tx.clone();
        let label = command.label();
        self.handle.spawn(async move {
            let result = match command {
                DispatchCommand::Control(action) => client.control(action).await,
                DispatchCommand::SetMode(mode) => client.set_mode(mode).await,
            };
            let outcome = DispatchOutcome {
                label,
                result: result.map_err(|err| err.to_string()),
            };
            let _ = outcome_tx.send(outcome);
        });
    }
}

fn watch_blocking(
    dispatcher: Dispatcher,
    mut updates: UnboundedReceiver<PollUpdate>,
    mut outcomes: UnboundedReceiver<DispatchOutcome>,
) -> Result<()> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to build terminal backend")?;
    terminal.hide_cursor().ok();
    let _cleanup = TerminalCleanup;

    let mut app = WatchApp::new();

    loop {
        while let Ok(update) = updates.try_recv() {
            match update {
                PollUpdate::Snapshot(snapshot) => {
                    let stats = app.apply_snapshot(snapshot);
                    debug!(?stats, "applied snapshot");
                }
                PollUpdate::Failed(message) => app.record_poll_failure(message),
            }
        }
        while let Ok(outcome) = outcomes.try_recv() {
            app.record_dispatch_outcome(&outcome);
        }

        terminal
            .draw(|frame| app.draw(frame))
            .context("failed to draw dashboard")?;

        if event::poll(Duration::from_millis(EVENT_POLL_MILLIS))
            .context("failed to poll terminal events")?
        {
            if let Event::Key(key) = event::read().context("failed to read terminal event")? {
                if app.handle_key(key, &dispatcher) {
                    break;
                }
            }
        }
    }

    terminal.show_cursor().ok();
    Ok(())
}

struct TerminalCleanup;

impl Drop for TerminalCleanup {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout: Stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
}

/// Retained view state between polls: cards, chart series, and the status
/// strip fields. Each snapshot is applied in a fixed region order (status,
/// mode, cards, chart, logs) and then discarded.
struct WatchApp {
    cards: CardSet,
    chart: ChartSink,
    running: bool,
    step: u64,
    mode: Option<Mode>,
    logs: Vec<LogEntry>,
    last_dispatch: Option<String>,
    last_error: Option<String>,
    have_snapshot: bool,
    help_visible: bool,
    palette: Palette,
}

impl WatchApp {
    fn new() -> Self {
        Self {
            cards: CardSet::new(),
            chart: ChartSink::new(),
            running: false,
            step: 0,
            mode: None,
            logs: Vec::new(),
            last_dispatch: None,
            last_error: None,
            have_snapshot: false,
            help_visible: false,
            palette: Palette::detect(),
        }
    }

    fn apply_snapshot(&mut self, snapshot: SimulationSnapshot) -> ApplyStats {
        self.running = snapshot.running;
        self.step = snapshot.step;
        // Server-authoritative: any optimistic flip is overwritten here.
        if snapshot.mode.is_some() {
            self.mode = snapshot.mode;
        }
        let stats = self.cards.apply(&snapshot);
        self.chart.update(&snapshot.history);
        self.logs = snapshot.logs;
        self.logs.reverse(); // newest first
        self.logs.truncate(LOG_DISPLAY_LIMIT);
        self.have_snapshot = true;
        self.last_error = None;
        stats
    }

    fn record_poll_failure(&mut self, message: String) {
        self.last_error = Some(message);
    }

    fn record_dispatch_outcome(&mut self, outcome: &DispatchOutcome) {
        self.last_dispatch = Some(match &outcome.result {
            Ok(_) => format!("{}: ok", outcome.label),
            Err(reason) => format!("{} failed: {}", outcome.label, reason),
        });
    }

    /// Flip the mode indicator ahead of the server's confirmation; the next
    /// applied snapshot re-derives it either way.
    fn note_optimistic_mode(&mut self, mode: Mode) {
        self.mode = Some(mode);
    }

    /// Active flags for the (AI, BASELINE) indicators.
    fn mode_states(&self) -> (bool, bool) {
        (self.mode == Some(Mode::Ai), self.mode == Some(Mode::Baseline))
    }

    fn status_line(&self) -> String {
        format!(
            "Status: {}",
            if self.running { "Running" } else { "Stopped" }
        )
    }

    fn step_line(&self) -> String {
        format!("Step: {}", self.step)
    }

    fn handle_key(&mut self, key: KeyEvent, dispatcher: &Dispatcher) -> bool {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _)
            | (KeyCode::Char('q'), _)
            | (KeyCode::Char('Q'), _)
            | (KeyCode::Char('c'), KeyModifiers::CONTROL) => return true,
            (KeyCode::Char(' '), _) => {
                let action = if self.running {
                    ControlAction::Stop
                } else {
                    ControlAction::Start
                };
                self.last_dispatch = Some(format!("{}...", action.as_str()));
                dispatcher.submit(DispatchCommand::Control(action));
            }
            (KeyCode::Char('r'), _) => {
                self.last_dispatch = Some("reset...".to_owned());
                dispatcher.submit(DispatchCommand::Control(ControlAction::Reset));
            }
            (KeyCode::Char('a'), _) => {
                self.note_optimistic_mode(Mode::Ai);
                self.last_dispatch = Some("set_mode AI...".to_owned());
                dispatcher.submit(DispatchCommand::SetMode(Mode::Ai));
            }
            (KeyCode::Char('b'), _) => {
                self.note_optimistic_mode(Mode::Baseline);
                self.last_dispatch = Some("set_mode BASELINE...".to_owned());
                dispatcher.submit(DispatchCommand::SetMode(Mode::Baseline));
            }
            (KeyCode::Char('?') | KeyCode::Char('h'), _) => {
                self.help_visible = !self.help_visible;
            }
            _ => {}
        }
        false
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Length(8),
                Constraint::Length(6),
                Constraint::Min(4),
            ])
            .split(frame.area());

        self.draw_header(frame, outer[0]);
        self.draw_cards(frame, outer[1]);
        self.draw_chart(frame, outer[2]);
        self.draw_logs(frame, outer[3]);

        if self.help_visible {
            self.draw_help(frame);
        }
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect) {
        let (ai_active, baseline_active) = self.mode_states();

        let mut status = vec![
            Span::styled(
                self.status_line(),
                if self.running {
                    self.palette.running_style()
                } else {
                    self.palette.stopped_style()
                },
            ),
            Span::raw("  "),
            Span::styled(self.step_line(), self.palette.header_style()),
            Span::raw("  Mode "),
            Span::styled(" AI ", self.palette.mode_style(ai_active)),
            Span::raw(" "),
            Span::styled(" BASELINE ", self.palette.mode_style(baseline_active)),
        ];
        if let Some(note) = &self.last_dispatch {
            status.push(Span::raw("  "));
            status.push(Span::styled(note.clone(), self.palette.accent_style()));
        }

        let mut second = vec![Span::styled(
            "q quit  space start/stop  r reset  a/b mode  ? help",
            self.palette.hint_style(),
        )];
        if let Some(error) = &self.last_error {
            second.push(Span::raw("  "));
            second.push(Span::styled(
                format!("poll error: {error}"),
                self.palette.error_style(),
            ));
        }

        let paragraph = Paragraph::new(vec![Line::from(status), Line::from(second)]).block(
            Block::default()
                .title(self.palette.title("Traffic Control Dashboard"))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_cards(&self, frame: &mut Frame<'_>, area: Rect) {
        if self.cards.is_empty() {
            let placeholder = if self.have_snapshot {
                "No intersections reported"
            } else {
                "Waiting for snapshot..."
            };
            let empty =
                Paragraph::new(placeholder).block(Block::default().borders(Borders::ALL));
            frame.render_widget(empty, area);
            return;
        }

        let count = self.cards.len() as u32;
        let constraints: Vec<Constraint> =
            (0..count).map(|_| Constraint::Ratio(1, count)).collect();
        let slots = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        for (card, slot) in self.cards.iter().zip(slots.iter()) {
            self.draw_card(frame, *slot, card);
        }
    }

    fn draw_card(&self, frame: &mut Frame<'_>, area: Rect, card: &CardContent) {
        let lines = vec![
            Line::from(Span::styled(
                card.phase.as_str().to_owned(),
                self.palette.phase_style(card.phase.is_green()),
            )),
            Line::from(card.timer_line()),
            Line::from(card.queue_line()),
            Line::from(card.wait_line()),
        ];
        let paragraph = Paragraph::new(Text::from(lines)).block(
            Block::default()
                .title(self.palette.title(card.id.clone()))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_chart(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = Block::default()
            .title(self.palette.title("Queue & Wait History"))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 {
            return;
        }
        if self.chart.is_empty() {
            frame.render_widget(Paragraph::new("Waiting for samples..."), inner);
            return;
        }

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
            ])
            .split(inner);

        let queue_data: Vec<u64> = self.chart.queue_series().to_vec();
        let wait_data: Vec<u64> = self.chart.wait_centiseconds();
        frame.render_widget(
            Sparkline::default()
                .style(self.palette.queue_spark_style())
                .data(queue_data.iter().copied()),
            rows[0],
        );
        frame.render_widget(
            Sparkline::default()
                .style(self.palette.wait_spark_style())
                .data(wait_data.iter().copied()),
            rows[1],
        );

        if let (Some((first, last)), Some(latest)) = (self.chart.window(), self.chart.latest()) {
            let caption = Line::from(vec![
                Span::styled("Window ", self.palette.header_style()),
                Span::raw(format!(
                    "step {first}..{last}  queue {}  wait {:.1}s",
                    latest.total_queue, latest.avg_wait
                )),
            ]);
            frame.render_widget(Paragraph::new(caption), rows[2]);
        }
    }

    fn draw_logs(&self, frame: &mut Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self
            .logs
            .iter()
            .map(|entry| {
                let spans = vec![
                    Span::styled(format!("[Step {}] ", entry.step), self.palette.hint_style()),
                    Span::styled(entry.agent.clone(), self.palette.accent_style()),
                    Span::raw(": "),
                    Span::styled(
                        entry.decision.as_str(),
                        self.palette.decision_style(entry.decision),
                    ),
                    Span::raw(" "),
                    Span::raw(entry.reasoning.clone()),
                ];
                ListItem::new(Line::from(spans))
            })
            .collect();

        let block = Block::default()
            .title(self.palette.title("Decisions"))
            .borders(Borders::ALL);
        frame.render_widget(List::new(items).block(block), area);
    }

    fn draw_help(&self, frame: &mut Frame<'_>) {
        let size = frame.area();
        let width = (size.width / 2).max(32).min(size.width);
        let height = 9.min(size.height);
        let x = size.x + (size.width.saturating_sub(width)) / 2;
        let y = size.y + (size.height.saturating_sub(height)) / 2;
        let area = Rect::new(x, y, width, height);

        let lines = vec![
            Line::from(Span::styled(
                "Controls",
                self.palette.header_style().add_modifier(Modifier::BOLD),
            )),
            Line::raw(" q      Quit"),
            Line::raw(" space  Start/stop the simulation"),
            Line::raw(" r      Reset the simulation"),
            Line::raw(" a      Switch to AI mode"),
            Line::raw(" b      Switch to BASELINE mode"),
            Line::raw(" ?      Toggle this help"),
        ];
        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .title(self.palette.title("Help"))
                .borders(Borders::ALL)
                .style(Style::default().bg(Color::Black).fg(Color::White)),
        );
        frame.render_widget(paragraph, area);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Headless mode
// ═══════════════════════════════════════════════════════════════════════════

/// Replay a snapshot sequence against a test backend, recording per-frame
/// stats. Used by the env-gated headless watch mode and by tests.
pub fn run_headless(snapshots: &[SimulationSnapshot]) -> Result<HeadlessReport> {
    let backend = ratatui::backend::TestBackend::new(100, 40);
    let mut terminal = Terminal::new(backend).context("failed to build test backend")?;
    let mut app = WatchApp::new();
    let mut report = HeadlessReport::default();

    for snapshot in snapshots {
        let stats = app.apply_snapshot(snapshot.clone());
        report.record(&app, stats);
        terminal.draw(|frame| app.draw(frame))?;
    }

    report.finalize();
    Ok(report)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HeadlessReport {
    pub frames: Vec<FrameStats>,
    pub summary: ReportSummary,
}

impl HeadlessReport {
    fn record(&mut self, app: &WatchApp, stats: ApplyStats) {
        self.frames.push(FrameStats {
            step: app.step,
            running: app.running,
            mode: app.mode.map(|mode| mode.as_str().to_owned()),
            cards: app.cards.len(),
            chart_points: app.chart.len(),
            logs: app.logs.len(),
            cards_created: stats.created,
            cards_removed: stats.removed,
        });
    }

    fn finalize(&mut self) {
        self.summary = ReportSummary::from_frames(&self.frames);
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize headless report")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameStats {
    pub step: u64,
    pub running: bool,
    pub mode: Option<String>,
    pub cards: usize,
    pub chart_points: usize,
    pub logs: usize,
    pub cards_created: usize,
    pub cards_removed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSummary {
    pub frame_count: usize,
    pub final_step: u64,
    pub final_cards: usize,
    pub total_cards_created: usize,
    pub total_cards_removed: usize,
    pub max_chart_points: usize,
}

impl ReportSummary {
    fn from_frames(frames: &[FrameStats]) -> Self {
        let last = frames.last();
        Self {
            frame_count: frames.len(),
            final_step: last.map(|frame| frame.step).unwrap_or_default(),
            final_cards: last.map(|frame| frame.cards).unwrap_or_default(),
            total_cards_created: frames.iter().map(|frame| frame.cards_created).sum(),
            total_cards_removed: frames.iter().map(|frame| frame.cards_removed).sum(),
            max_chart_points: frames
                .iter()
                .map(|frame| frame.chart_points)
                .max()
                .unwrap_or_default(),
        }
    }
}

fn fixture_path_from_env() -> Option<PathBuf> {
    std::env::var_os(FIXTURE_ENV).and_then(|raw| {
        if raw.is_empty() {
            None
        } else {
            Some(PathBuf::from(raw))
        }
    })
}

fn report_path_from_env() -> Option<PathBuf> {
    std::env::var_os(REPORT_ENV).and_then(|raw| {
        if raw.is_empty() {
            None
        } else {
            Some(PathBuf::from(raw))
        }
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Palette
// ═══════════════════════════════════════════════════════════════════════════

struct Palette {
    level: Option<ColorLevel>,
}

impl Palette {
    fn detect() -> Self {
        Self {
            level: on_cached(Stream::Stdout),
        }
    }

    fn has_color(&self) -> bool {
        self.level.is_some()
    }

    fn header_style(&self) -> Style {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    }

    fn accent_style(&self) -> Style {
        Style::default().fg(Color::LightMagenta)
    }

    fn hint_style(&self) -> Style {
        Style::default().fg(Color::Gray)
    }

    fn error_style(&self) -> Style {
        Style::default().fg(Color::Red)
    }

    fn running_style(&self) -> Style {
        let style = Style::default().add_modifier(Modifier::BOLD);
        if self.has_color() {
            style.fg(Color::Black).bg(Color::Green)
        } else {
            style
        }
    }

    fn stopped_style(&self) -> Style {
        let style = Style::default().add_modifier(Modifier::BOLD);
        if self.has_color() {
            style.fg(Color::Black).bg(Color::DarkGray)
        } else {
            style
        }
    }

    fn mode_style(&self, active: bool) -> Style {
        if active {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    }

    fn phase_style(&self, green: bool) -> Style {
        let color = if green { Color::Green } else { Color::Red };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    fn decision_style(&self, decision: Decision) -> Style {
        let color = match decision {
            Decision::Hold => Color::Cyan,
            Decision::Switch => Color::Yellow,
        };
        Style::default().fg(color)
    }

    fn queue_spark_style(&self) -> Style {
        Style::default().fg(Color::Red)
    }

    fn wait_spark_style(&self) -> Style {
        Style::default().fg(Color::Blue)
    }

    fn title<T: Into<String>>(&self, title: T) -> Span<'static> {
        Span::styled(title.into(), self.header_style())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use trafficdash_core::{HistoryPoint, IntersectionView, Phase};

    fn scenario_snapshot() -> SimulationSnapshot {
        let mut snapshot = SimulationSnapshot {
            running: true,
            step: 42,
            mode: Some(Mode::Ai),
            ..SimulationSnapshot::default()
        };
        snapshot.intersections.insert(
            "I1".into(),
            IntersectionView {
                id: "I1".into(),
                phase: Phase::from("GREEN"),
                phase_timer: 5,
                queues: [
                    (trafficdash_core::Direction::N, 3),
                    (trafficdash_core::Direction::S, 0),
                    (trafficdash_core::Direction::E, 1),
                    (trafficdash_core::Direction::W, 2),
                ]
                .into_iter()
                .collect(),
                avg_waiting_time: 4.25,
            },
        );
        snapshot.history = vec![
            HistoryPoint { step: 40, avg_wait: 4.1, total_queue: 5 },
            HistoryPoint { step: 41, avg_wait: 4.2, total_queue: 6 },
        ];
        snapshot
    }

    fn rendered_text(app: &WatchApp) -> String {
        let backend = TestBackend::new(120, 40);
        let mut terminal = Terminal::new(backend).expect("terminal");
        terminal.draw(|frame| app.draw(frame)).expect("draw");

        let buffer = terminal.backend().buffer();
        let area = buffer.area;
        let mut text = String::new();
        for y in 0..area.height {
            for x in 0..area.width {
                if let Some(cell) = buffer.cell((x, y)) {
                    text.push_str(cell.symbol());
                }
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn scenario_renders_status_card_and_chart() {
        let mut app = WatchApp::new();
        app.apply_snapshot(scenario_snapshot());

        assert_eq!(app.status_line(), "Status: Running");
        assert_eq!(app.step_line(), "Step: 42");
        assert_eq!(app.cards.len(), 1);
        assert_eq!(app.chart.steps(), &[40, 41]);

        let text = rendered_text(&app);
        assert!(text.contains("Status: Running"), "missing status: {text}");
        assert!(text.contains("Step: 42"));
        assert!(text.contains("I1"));
        assert!(text.contains("GREEN"));
        assert!(text.contains("5s"));
        assert!(text.contains("N: 3 S: 0 E: 1 W: 2"));
        assert!(text.contains("Avg Wait: 4.3s"));
        assert!(text.contains("step 40..41"));
    }

    #[test]
    fn exactly_one_mode_indicator_is_active() {
        let mut app = WatchApp::new();
        app.apply_snapshot(scenario_snapshot());
        assert_eq!(app.mode_states(), (true, false));

        // Optimistic flip before any response is observed.
        app.note_optimistic_mode(Mode::Baseline);
        assert_eq!(app.mode_states(), (false, true));

        // The next snapshot re-derives the indicator from the server.
        app.apply_snapshot(scenario_snapshot());
        assert_eq!(app.mode_states(), (true, false));
    }

    #[test]
    fn poll_failure_leaves_rendered_state_unchanged() {
        let mut app = WatchApp::new();
        app.apply_snapshot(scenario_snapshot());

        app.record_poll_failure("connection refused".into());
        assert_eq!(app.cards.len(), 1);
        assert_eq!(app.chart.len(), 2);
        assert_eq!(app.step, 42);

        let text = rendered_text(&app);
        assert!(text.contains("poll error: connection refused"));
        assert!(text.contains("Avg Wait: 4.3s"));

        // The next successful cycle applies normally and clears the error.
        let mut next = scenario_snapshot();
        next.step = 43;
        app.apply_snapshot(next);
        assert_eq!(app.step, 43);
        assert!(app.last_error.is_none());
    }

    #[test]
    fn empty_snapshot_mode_keeps_last_known_mode() {
        let mut app = WatchApp::new();
        app.apply_snapshot(scenario_snapshot());

        let mut modeless = scenario_snapshot();
        modeless.mode = None;
        app.apply_snapshot(modeless);
        assert_eq!(app.mode_states(), (true, false));
    }

    #[test]
    fn logs_render_newest_first() {
        let mut snapshot = scenario_snapshot();
        snapshot.logs = vec![
            LogEntry {
                step: 40,
                agent: "Controller_I1".into(),
                decision: Decision::Hold,
                reasoning: "Normal flow".into(),
            },
            LogEntry {
                step: 41,
                agent: "Controller_I1".into(),
                decision: Decision::Switch,
                reasoning: "Green empty, Red piling up".into(),
            },
        ];
        let mut app = WatchApp::new();
        app.apply_snapshot(snapshot);

        assert_eq!(app.logs[0].step, 41);
        let text = rendered_text(&app);
        assert!(text.contains("SWITCH"));
        assert!(text.contains("Green empty, Red piling up"));
    }

    #[test]
    fn headless_report_counts_card_churn() {
        let first = scenario_snapshot();
        let mut second = scenario_snapshot();
        second.step = 43;
        // I1 vanishes, I2 appears.
        second.intersections.clear();
        second.intersections.insert(
            "I2".into(),
            IntersectionView {
                id: "I2".into(),
                phase: Phase::from("EW_GREEN"),
                ..IntersectionView::default()
            },
        );

        let report = run_headless(&[first, second]).expect("headless run");
        assert_eq!(report.summary.frame_count, 2);
        assert_eq!(report.summary.final_step, 43);
        assert_eq!(report.summary.final_cards, 1);
        assert_eq!(report.summary.total_cards_created, 2);
        assert_eq!(report.summary.total_cards_removed, 1);
    }
}

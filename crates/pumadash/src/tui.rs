//! The live terminal dashboard.
//!
//! [`Renderer`] draws a [`DashboardView`] onto any ratatui backend.
//! [`run_dashboard`] wires it to a running [`Poller`] and the keyboard.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{cursor, execute};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table,
};
use ratatui::{Frame, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::TelemetrySource;
use crate::error::{Error, Result};
use crate::poller::{Control, Poller};
use crate::state::{DashboardState, HistoryLimit};
use crate::view::{
    AnomalySeries, Card, ColorTier, DashboardView, Header, MetricsSeries, TableView, ViewOptions,
};

/// How long the input thread blocks before re-checking for shutdown.
const INPUT_POLL: Duration = Duration::from_millis(200);

const KEY_HELP: &str = " q quit · r refresh · +/- history · 1-4 select 50/100/150/300 ";

/// What a key press asks the dashboard to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Leave the dashboard.
    Quit,
    /// Fetch now.
    Refresh,
    /// Switch to another history window.
    SetHistoryLimit(HistoryLimit),
}

/// Map a key press to an action, given the active history window.
#[must_use]
pub fn key_action(key: KeyEvent, current: HistoryLimit) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('r') => Some(Action::Refresh),
        KeyCode::Char('+' | '=') | KeyCode::Right => {
            Some(Action::SetHistoryLimit(current.larger()))
        }
        KeyCode::Char('-' | '_') | KeyCode::Left => {
            Some(Action::SetHistoryLimit(current.smaller()))
        }
        KeyCode::Char(c @ '1'..='4') => c
            .to_digit(10)
            .and_then(|d| HistoryLimit::from_position(d as usize))
            .map(Action::SetHistoryLimit),
        _ => None,
    }
}

fn tier_color(tier: ColorTier) -> Color {
    match tier {
        ColorTier::Normal => Color::Green,
        ColorTier::Warning => Color::Yellow,
        ColorTier::Critical => Color::Red,
    }
}

fn panel(title: impl Into<Line<'static>>) -> Block<'static> {
    Block::default().borders(Borders::ALL).title(title)
}

/// Draws dashboard state onto a terminal backend.
#[derive(Debug)]
pub struct Renderer<B: Backend> {
    terminal: Terminal<B>,
    options: ViewOptions,
}

impl<B: Backend> Renderer<B> {
    /// Wrap a terminal.
    pub fn new(terminal: Terminal<B>, options: ViewOptions) -> Self {
        Self { terminal, options }
    }

    /// Redraw everything from `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to draw.
    pub fn update(&mut self, state: &DashboardState) -> Result<()> {
        let view = DashboardView::from_state(state, self.options);
        self.terminal.draw(|frame| draw(frame, &view))?;
        Ok(())
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }
}

/// Lay out and draw one frame.
pub fn draw(frame: &mut Frame<'_>, view: &DashboardView) {
    let [header, cards, body, footer] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(5),
        Constraint::Min(10),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_header(frame, header, &view.header);
    draw_cards(frame, cards, view);

    if view.has_history() {
        let [charts, table] =
            Layout::vertical([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(body);
        let [left, right] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(charts);
        let span = view.time_span.clone().unwrap_or_default();
        draw_anomaly_chart(frame, left, &view.anomaly, &span);
        draw_metrics_chart(frame, right, &view.metrics, &span);
        draw_table(frame, table, &view.table);
    } else {
        let waiting = Paragraph::new("Waiting for telemetry data...")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(panel("Telemetry"));
        frame.render_widget(waiting, body);
    }

    frame.render_widget(
        Paragraph::new(KEY_HELP).style(Style::default().fg(Color::DarkGray)),
        footer,
    );
}

fn draw_header(frame: &mut Frame<'_>, area: Rect, header: &Header) {
    let mut spans = vec![
        Span::styled(
            "PUMA UAV Telemetry Dashboard",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            header.status_label(),
            Style::default().fg(tier_color(header.tier())),
        ),
        Span::raw(format!("  Last update: {}", header.last_update)),
        Span::raw(format!("  History: {}", header.history_limit)),
    ];
    if let Some(error) = &header.error {
        spans.push(Span::styled(
            format!("  {error}"),
            Style::default().fg(Color::Red),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)).block(panel("")), area);
}

fn draw_card(frame: &mut Frame<'_>, area: Rect, card: &Card) {
    let lines = vec![
        Line::from(Span::styled(
            card.value.clone(),
            Style::default()
                .fg(tier_color(card.tier))
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            card.caption.clone(),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(panel(card.title)),
        area,
    );
}

fn draw_cards(frame: &mut Frame<'_>, area: Rect, view: &DashboardView) {
    let areas: [Rect; 5] = Layout::horizontal([Constraint::Ratio(1, 5); 5]).areas(area);
    for (card, area) in view.cards.all().into_iter().zip(areas) {
        draw_card(frame, area, card);
    }
}

#[allow(clippy::cast_precision_loss)]
fn x_bounds(len: usize) -> [f64; 2] {
    [0.0, len.saturating_sub(1).max(1) as f64]
}

fn draw_anomaly_chart(
    frame: &mut Frame<'_>,
    area: Rect,
    series: &AnomalySeries,
    span: &(String, String),
) {
    let line = series.line();
    let emphasized = series.emphasized();
    let datasets = vec![
        Dataset::default()
            .name("Anomaly score")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&line),
        Dataset::default()
            .name("Anomaly")
            .marker(Marker::Block)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Red))
            .data(&emphasized),
    ];

    let y = series.bounds;
    let chart = Chart::new(datasets)
        .block(panel("Anomaly Detection"))
        .x_axis(
            Axis::default()
                .bounds(x_bounds(series.points.len()))
                .labels([span.0.clone(), span.1.clone()]),
        )
        .y_axis(
            Axis::default()
                .title("Score")
                .bounds([y.min, y.max])
                .labels([format!("{:.2}", y.min), format!("{:.2}", y.max)]),
        );
    frame.render_widget(chart, area);
}

fn draw_metrics_chart(
    frame: &mut Frame<'_>,
    area: Rect,
    metrics: &MetricsSeries,
    span: &(String, String),
) {
    // Both series share the plot area on a unit scale; the axis labels carry
    // each series' own range.
    let altitude = metrics.altitude.normalized();
    let battery = metrics.battery.normalized();
    let datasets = vec![
        Dataset::default()
            .name(metrics.altitude.name)
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Blue))
            .data(&altitude),
        Dataset::default()
            .name(metrics.battery.name)
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Green))
            .data(&battery),
    ];

    let (alt, batt) = (metrics.altitude.bounds, metrics.battery.bounds);
    let chart = Chart::new(datasets)
        .block(panel("Flight Metrics"))
        .x_axis(
            Axis::default()
                .bounds(x_bounds(metrics.altitude.points.len()))
                .labels([span.0.clone(), span.1.clone()]),
        )
        .y_axis(Axis::default().bounds([0.0, 1.0]).labels([
            format!("{:.0}m {:.0}%", alt.min, batt.min),
            format!("{:.0}m {:.0}%", alt.max, batt.max),
        ]));
    frame.render_widget(chart, area);
}

fn draw_table(frame: &mut Frame<'_>, area: Rect, table: &TableView) {
    let header = Row::new([
        "Time", "Status", "Score", "Alt (m)", "Batt %", "Mode", "System", "Event",
    ])
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = table.rows.iter().map(|row| {
        Row::new([
            Cell::from(row.time.clone()),
            Cell::from(row.badge.label()).style(Style::default().fg(tier_color(row.badge.tier()))),
            Cell::from(row.score.clone()),
            Cell::from(row.altitude.clone()),
            Cell::from(row.battery.clone()),
            Cell::from(row.mode.clone()),
            Cell::from(row.system_status.clone())
                .style(Style::default().fg(tier_color(row.system_tier))),
            Cell::from(row.event.clone()),
        ])
    });

    let widths = [
        Constraint::Length(19),
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(8),
        Constraint::Length(6),
        Constraint::Length(10),
        Constraint::Length(8),
        Constraint::Min(5),
    ];

    let title = format!(
        "Telemetry ({} anomalies / {} records)",
        table.anomaly_count, table.total_records
    );
    frame.render_widget(
        Table::new(rows, widths).header(header).block(panel(title)),
        area,
    );
}

/// Restores the terminal when dropped, including on early return.
struct TerminalCleanup;

impl Drop for TerminalCleanup {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, cursor::Show);
    }
}

fn enter_terminal() -> Result<(TerminalCleanup, Terminal<CrosstermBackend<Stdout>>)> {
    enable_raw_mode()?;
    let cleanup = TerminalCleanup;
    execute!(io::stdout(), EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    Ok((cleanup, terminal))
}

/// Forward terminal events until the receiver goes away.
fn forward_terminal_events(tx: &mpsc::UnboundedSender<Event>) {
    while !tx.is_closed() {
        match event::poll(INPUT_POLL) {
            Ok(true) => match event::read() {
                Ok(ev) => {
                    if tx.send(ev).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "terminal input failed");
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "terminal input failed");
                break;
            }
        }
    }
}

/// Hand a control message to the poll loop.
///
/// Returns `false` once the loop has stopped receiving.
async fn send_control(control: &mpsc::Sender<Control>, message: Control) -> bool {
    match control.send(message).await {
        Ok(()) => true,
        Err(e) => {
            warn!(message = ?e.0, "poll loop is gone, leaving dashboard");
            false
        }
    }
}

/// Run the live dashboard until the user quits.
///
/// # Errors
///
/// Returns an error if the terminal cannot be set up or drawn to.
pub async fn run_dashboard(
    source: Arc<dyn TelemetrySource>,
    interval: Duration,
    limit: HistoryLimit,
    options: ViewOptions,
) -> Result<()> {
    let (cleanup, terminal) = enter_terminal()?;
    let mut renderer = Renderer::new(terminal, options);

    let (poller, mut updates) = Poller::new(source, interval, limit);
    let (control, control_rx) = mpsc::channel(16);
    let poll_task = tokio::spawn(poller.run(control_rx));

    let (key_tx, mut events) = mpsc::unbounded_channel();
    std::thread::spawn(move || forward_terminal_events(&key_tx));

    info!(%limit, ?interval, "dashboard started");
    let initial = updates.borrow_and_update().clone();
    renderer.update(&initial)?;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                renderer.update(&state)?;
            }
            ev = events.recv() => {
                let Some(ev) = ev else { break };
                match ev {
                    Event::Key(key) => {
                        let current = updates.borrow().history_limit;
                        let message = match key_action(key, current) {
                            Some(Action::Quit) => break,
                            Some(Action::Refresh) => Some(Control::Refresh),
                            Some(Action::SetHistoryLimit(next)) if next != current => {
                                debug!(%next, "history limit selected");
                                Some(Control::SetHistoryLimit(next))
                            }
                            _ => None,
                        };
                        if let Some(message) = message {
                            if !send_control(&control, message).await {
                                break;
                            }
                        }
                    }
                    Event::Resize(..) => {
                        let state = updates.borrow().clone();
                        renderer.update(&state)?;
                    }
                    _ => {}
                }
            }
        }
    }

    drop(control);
    drop(events);
    let state = poll_task
        .await
        .map_err(|e| Error::internal(format!("poll loop panicked: {e}")))?;
    drop(cleanup);
    info!(records = state.history.len(), "dashboard stopped");
    Ok(())
}

use std::{io, thread, time::Duration};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::{spawn, sync::mpsc};
use tracing::{error, info};

use gamerec_core::{
    form::{GameForm, SearchRequest, SubmitRequest},
    ApiClient, ApiError, Game, RatedGame,
};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_SEARCH_LEN: usize = 64;
const RATING_MIN: f64 = 1.0;
const RATING_MAX: f64 = 10.0;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Rows,
    Search,
}

enum AppEvent {
    Input(Event),
    Tick,
    SearchCompleted {
        epoch: u64,
        result: Result<Vec<Game>, ApiError>,
    },
    RecommendCompleted {
        epoch: u64,
        result: Result<Vec<RatedGame>, ApiError>,
    },
}

/// Terminal frontend for the search-and-rate form.
pub struct RecApp {
    client: ApiClient,
    form: GameForm,
    mode: Mode,
    cursor: usize,
    candidate_cursor: usize,
    status: String,
    should_quit: bool,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    theme: Theme,
}

impl RecApp {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            form: GameForm::new(),
            mode: Mode::Rows,
            cursor: 0,
            candidate_cursor: 0,
            status: "Press 'a' to add a game".to_string(),
            should_quit: false,
            event_tx: None,
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }

            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) {
                break;
            }

            if self.should_quit {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if let Event::Key(key) = event {
                    if let Err(err) = self.handle_key(key) {
                        self.status = format!("Error: {err}");
                    }
                }
                true
            }
            Some(AppEvent::Tick) => true,
            Some(AppEvent::SearchCompleted { epoch, result }) => {
                match result {
                    Ok(games) => {
                        if self.form.apply_search_results(epoch, games) {
                            self.candidate_cursor = 0;
                        }
                    }
                    // failures are diagnostic-log only; the view keeps
                    // whatever candidates it had
                    Err(err) => error!(?err, "search request failed"),
                }
                true
            }
            Some(AppEvent::RecommendCompleted { epoch, result }) => {
                match result {
                    Ok(games) => {
                        if self.form.apply_recommendations(epoch, games) {
                            info!(
                                count = self.form.recommendations().len(),
                                "recommendations received"
                            );
                            self.status = format!(
                                "Received {} recommendations",
                                self.form.recommendations().len()
                            );
                        }
                    }
                    Err(err) => error!(?err, "recommendation request failed"),
                }
                true
            }
            None => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.mode {
            Mode::Rows => self.handle_rows_key(key),
            Mode::Search => self.handle_search_key(key),
        }
        Ok(())
    }

    fn handle_rows_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('a') => {
                self.form.add_row();
                self.cursor = self.form.entries().len() - 1;
                self.status = "Row added".to_string();
            }
            KeyCode::Char('d') => {
                let before = self.form.entries().len();
                self.form.delete_row(self.cursor);
                if self.form.entries().len() < before {
                    self.clamp_cursor();
                    self.status = "Row deleted".to_string();
                }
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1),
            KeyCode::Char('+') | KeyCode::Char('=') => self.adjust_rating(1.0),
            KeyCode::Char('-') => self.adjust_rating(-1.0),
            KeyCode::Char(ch) if ch.is_ascii_digit() && key.modifiers.is_empty() => {
                // 0 stands in for the top of the 1..=10 scale
                let value = if ch == '0' {
                    RATING_MAX
                } else {
                    f64::from(ch.to_digit(10).unwrap_or(1))
                };
                self.set_rating(value);
            }
            KeyCode::Enter | KeyCode::Char('/') => self.enter_search(),
            KeyCode::Char('s') => self.submit(),
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.form.blur(self.cursor);
                self.mode = Mode::Rows;
                self.status = "Search cancelled".to_string();
            }
            KeyCode::Enter => {
                if self.form.candidates().is_empty() {
                    return;
                }
                self.form.select(self.candidate_cursor, self.cursor);
                self.mode = Mode::Rows;
                if let Some(entry) = self.form.entry(self.cursor) {
                    self.status = format!("Selected {}", entry.search_text);
                }
            }
            KeyCode::Down => self.move_candidate_cursor(1),
            KeyCode::Up => self.move_candidate_cursor(-1),
            KeyCode::Backspace => {
                let mut text = self.current_text();
                text.pop();
                self.edit_text(text);
            }
            KeyCode::Char(ch) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    let mut text = self.current_text();
                    if text.len() < MAX_SEARCH_LEN && !ch.is_control() {
                        text.push(ch);
                        self.edit_text(text);
                    }
                }
            }
            _ => {}
        }
    }

    fn current_text(&self) -> String {
        self.form
            .entry(self.cursor)
            .map(|entry| entry.search_text.clone())
            .unwrap_or_default()
    }

    fn edit_text(&mut self, text: String) {
        if let Some(request) = self.form.edit_text(self.cursor, text) {
            self.spawn_search(request);
        }
        self.candidate_cursor = 0;
    }

    fn enter_search(&mut self) {
        if self.form.entries().is_empty() {
            self.status = "Add a row first".to_string();
            return;
        }
        self.mode = Mode::Search;
        self.candidate_cursor = 0;
        if let Some(request) = self.form.focus(self.cursor) {
            self.spawn_search(request);
        }
        self.status = "Type a game name".to_string();
    }

    fn submit(&mut self) {
        match self.form.submit() {
            Some(request) => {
                self.status = format!(
                    "Requesting recommendations for {} game(s)",
                    request.ratings.len()
                );
                self.spawn_submit(request);
            }
            None => {
                self.status = "Resolve at least one game before submitting".to_string();
            }
        }
    }

    fn spawn_search(&self, request: SearchRequest) {
        let Some(tx) = self.event_tx.clone() else {
            return;
        };
        let client = self.client.clone();
        spawn(async move {
            let result = client.search_games(&request.query).await;
            let _ = tx
                .send(AppEvent::SearchCompleted {
                    epoch: request.epoch,
                    result,
                })
                .await;
        });
    }

    fn spawn_submit(&self, request: SubmitRequest) {
        let Some(tx) = self.event_tx.clone() else {
            return;
        };
        let client = self.client.clone();
        spawn(async move {
            let result = client.recommend(&request.ratings).await;
            let _ = tx
                .send(AppEvent::RecommendCompleted {
                    epoch: request.epoch,
                    result,
                })
                .await;
        });
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.form.entries().len();
        if len == 0 {
            return;
        }
        let mut idx = self.cursor as isize + delta;
        if idx < 0 {
            idx = 0;
        } else if idx >= len as isize {
            idx = len as isize - 1;
        }
        self.cursor = idx as usize;
    }

    fn move_candidate_cursor(&mut self, delta: isize) {
        let len = self.form.candidates().len();
        if len == 0 {
            return;
        }
        let mut idx = self.candidate_cursor as isize + delta;
        if idx < 0 {
            idx = 0;
        } else if idx >= len as isize {
            idx = len as isize - 1;
        }
        self.candidate_cursor = idx as usize;
    }

    fn clamp_cursor(&mut self) {
        let len = self.form.entries().len();
        if len == 0 {
            self.cursor = 0;
        } else if self.cursor >= len {
            self.cursor = len - 1;
        }
    }

    fn adjust_rating(&mut self, delta: f64) {
        let Some(entry) = self.form.entry(self.cursor) else {
            return;
        };
        let id = entry.id();
        let value = (entry.rated.rating + delta).clamp(RATING_MIN, RATING_MAX);
        self.form.set_rating(id, value);
    }

    fn set_rating(&mut self, value: f64) {
        if let Some(entry) = self.form.entry(self.cursor) {
            let id = entry.id();
            self.form.set_rating(id, value);
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let size = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Min(8),
                Constraint::Length(3),
            ])
            .split(size);

        self.render_header(frame, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);

        if self.mode == Mode::Search {
            let left = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(4), Constraint::Length(10)])
                .split(body[0]);
            self.render_rows(frame, left[0]);
            self.render_candidates(frame, left[1]);
        } else {
            self.render_rows(frame, body[0]);
        }
        self.render_recommendations(frame, body[1]);
        self.render_status(frame, chunks[2]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let lines = vec![
            Line::from(Span::styled(
                "Game Recommender",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Rate a few games you've enjoyed, then submit for recommendations.",
                Style::default().fg(self.theme.muted),
            )),
        ];
        let header = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        frame.render_widget(header, area);
    }

    fn render_rows(&self, frame: &mut Frame, area: Rect) {
        let entries = self.form.entries();
        let items: Vec<ListItem> = if entries.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                "  No games yet - press 'a' to add one",
                Style::default().fg(self.theme.muted),
            )))]
        } else {
            entries
                .iter()
                .enumerate()
                .map(|(idx, entry)| {
                    let marker = if idx == self.cursor {
                        Span::styled("> ", Style::default().fg(self.theme.accent))
                    } else {
                        Span::raw("  ")
                    };
                    let rating = Span::styled(
                        format!("[{:>4}] ", format_rating(entry.rated.rating)),
                        Style::default().fg(self.theme.primary_fg),
                    );
                    let editing = self.mode == Mode::Search && self.form.focused() == Some(idx);
                    let text = if editing {
                        format!("{}_", entry.search_text)
                    } else if entry.search_text.is_empty() {
                        "(empty)".to_string()
                    } else {
                        entry.search_text.clone()
                    };
                    let mut spans = vec![marker, rating, Span::raw(text)];
                    if let Some(game) = &entry.rated.game {
                        spans.push(Span::styled(
                            format!("  * {}", game.release_year()),
                            Style::default().fg(self.theme.success),
                        ));
                    }
                    ListItem::new(Line::from(spans))
                })
                .collect()
        };

        let block = Block::default().borders(Borders::ALL).title(format!(
            "Your Games ({} rated, {} resolved)",
            entries.len(),
            self.form.resolved_count()
        ));
        let mut state = ListState::default();
        if !entries.is_empty() {
            state.select(Some(self.cursor.min(entries.len() - 1)));
        }
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_candidates(&self, frame: &mut Frame, area: Rect) {
        let candidates = self.form.candidates();
        let items: Vec<ListItem> = if candidates.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                "  Keep typing to search...",
                Style::default().fg(self.theme.muted),
            )))]
        } else {
            candidates
                .iter()
                .enumerate()
                .map(|(idx, game)| {
                    let marker = if idx == self.candidate_cursor {
                        Span::styled("> ", Style::default().fg(self.theme.accent))
                    } else {
                        Span::raw("  ")
                    };
                    ListItem::new(Line::from(vec![marker, Span::raw(game.display_name())]))
                })
                .collect()
        };

        let block = Block::default().borders(Borders::ALL).title("Matches");
        let mut state = ListState::default();
        if !candidates.is_empty() {
            state.select(Some(self.candidate_cursor.min(candidates.len() - 1)));
        }
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_recommendations(&self, frame: &mut Frame, area: Rect) {
        let recommendations = self.form.recommendations();
        let items: Vec<ListItem> = if recommendations.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                "  Nothing yet - submit your ratings with 's'",
                Style::default().fg(self.theme.muted),
            )))]
        } else {
            recommendations
                .iter()
                .enumerate()
                .map(|(idx, rec)| {
                    let name = rec
                        .game
                        .as_ref()
                        .map(Game::display_name)
                        .unwrap_or_else(|| "(unknown)".to_string());
                    ListItem::new(Line::from(vec![
                        Span::styled(
                            format!("{:>3}. ", idx + 1),
                            Style::default().fg(self.theme.muted),
                        ),
                        Span::raw(name),
                        Span::styled(
                            format!("  {:.2}", rec.rating),
                            Style::default().fg(self.theme.accent),
                        ),
                    ]))
                })
                .collect()
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Recommendations");
        let list = List::new(items).block(block);
        frame.render_widget(list, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let primary = if self.mode == Mode::Search {
            format!("Search: {}", self.current_text())
        } else {
            self.status.clone()
        };
        let hints = match self.mode {
            Mode::Rows => {
                if self.form.resolved_count() > 0 {
                    "a add  d delete  enter search  +/- rate  s submit  q quit"
                } else {
                    "a add  d delete  enter search  +/- rate  q quit"
                }
            }
            Mode::Search => "type to search  up/down pick  enter select  esc cancel",
        };
        let paragraph = Paragraph::new(vec![
            Line::from(primary),
            Line::from(Span::styled(hints, Style::default().fg(self.theme.muted))),
        ])
        .block(block)
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn format_rating(rating: f64) -> String {
    if (rating - rating.round()).abs() < f64::EPSILON {
        format!("{}", rating.round() as i64)
    } else {
        format!("{rating:.1}")
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_ratings_render_without_decimals() {
        assert_eq!(format_rating(10.0), "10");
        assert_eq!(format_rating(7.5), "7.5");
    }
}

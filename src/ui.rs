use crate::{
    avatar::AVATAR_PALETTE,
    model::{
        ClaimHistoryEntry,
        PODIUM_SIZE,
        User,
        rank_badge,
    },
    view_state::ViewState,
};
use chrono::Local;
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use itertools::Itertools;
use num_format::{
    Locale,
    ToFormattedString,
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use unicode_width::{
    UnicodeWidthChar,
    UnicodeWidthStr,
};

const TITLE: &str = "🌟 Contribution & Star Tasks Ranking";
const TABS: [&str; 2] = ["🌟 Contribution", "⭐ Star Tasks"];
const NAME_COLUMN_WIDTH: usize = 16;
const AVATAR_COLUMN_WIDTH: usize = 28;
const HISTORY_LINES_PER_ENTRY: usize = 2;
const SCROLL_STEP: usize = 5;

pub type InputEventReceiver = EventStream;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    SelectNext,
    SelectPrev,
    Claim,
    OpenAddUser,
    EditName(String),
    ChooseAvatar(usize),
    SubmitNewUser,
}

pub struct UiState {
    mode: Mode,
    api_url: String,
    pending: usize,
    rankings_scroll: usize,
    history_scroll: usize,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    AddUser,
    /// Stacked over the mode that was active when it arrived; dismissing it
    /// returns there.
    Notice {
        message: String,
        then: Box<Mode>,
    },
    QuitModal,
}

impl UiState {
    pub fn new(api_url: impl Into<String>) -> Self {
        UiState {
            mode: Mode::Normal,
            api_url: api_url.into(),
            pending: 0,
            rankings_scroll: 0,
            history_scroll: 0,
            terminal: None,
        }
    }

    /// Shows a blocking message until the operator dismisses it.
    pub fn show_notice(&mut self, message: impl Into<String>) {
        let then = Box::new(std::mem::take(&mut self.mode));
        self.mode = Mode::Notice {
            message: message.into(),
            then,
        };
    }

    fn dismiss_notice(&mut self) {
        if let Mode::Notice { then, .. } = std::mem::take(&mut self.mode) {
            self.mode = *then;
        }
    }

    pub fn set_pending(&mut self, pending: usize) {
        self.pending = pending;
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, view: &ViewState) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| render(f, state, view))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

/// Maps a terminal event to an action, updating modal state on the way.
/// Returns `None` for events that change nothing.
pub fn interpret_event(
    state: &mut UiState,
    view: &ViewState,
    event: Event,
) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => key,
        Event::Resize(_, _) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if is_ctrl_c(&key) {
        return Some(UserEvent::Quit);
    }
    match state.mode {
        Mode::Notice { .. } => match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') => {
                state.dismiss_notice();
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::AddUser => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => Some(UserEvent::SubmitNewUser),
            KeyCode::Left => Some(UserEvent::ChooseAvatar(step_avatar(
                view.new_user_avatar(),
                false,
            ))),
            KeyCode::Right | KeyCode::Tab => Some(UserEvent::ChooseAvatar(step_avatar(
                view.new_user_avatar(),
                true,
            ))),
            KeyCode::Backspace => {
                let mut name = view.new_user_name().to_string();
                name.pop()?;
                Some(UserEvent::EditName(name))
            }
            KeyCode::Char(c) => {
                let mut name = view.new_user_name().to_string();
                name.push(c);
                Some(UserEvent::EditName(name))
            }
            _ => None,
        },
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') => Some(UserEvent::SelectNext),
            KeyCode::Up | KeyCode::Char('k') => Some(UserEvent::SelectPrev),
            KeyCode::Char('c') => Some(UserEvent::Claim),
            KeyCode::Char(']') | KeyCode::Char('[') => {
                let rows = view.leaderboard().len().saturating_sub(PODIUM_SIZE);
                let forward = key.code == KeyCode::Char(']');
                state.rankings_scroll = scrolled(state.rankings_scroll, forward, rows);
                Some(UserEvent::Redraw)
            }
            KeyCode::PageDown | KeyCode::PageUp => {
                let rows = view.history().len() * HISTORY_LINES_PER_ENTRY;
                let forward = key.code == KeyCode::PageDown;
                state.history_scroll = scrolled(state.history_scroll, forward, rows);
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('a') => {
                state.mode = Mode::AddUser;
                Some(UserEvent::OpenAddUser)
            }
            _ => None,
        },
    }
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Palette index after moving the picker one step. With nothing picked yet
/// the first step lands on either end of the palette.
fn step_avatar(current: Option<&str>, forward: bool) -> usize {
    let len = AVATAR_PALETTE.len();
    match current.and_then(|url| AVATAR_PALETTE.iter().position(|p| *p == url)) {
        None if forward => 0,
        None => len - 1,
        Some(idx) if forward => (idx + 1) % len,
        Some(idx) => (idx + len - 1) % len,
    }
}

/// Moves a panel offset by one step, never past the panel's last row.
fn scrolled(offset: usize, forward: bool, rows: usize) -> usize {
    if forward {
        (offset + SCROLL_STEP).min(rows.saturating_sub(1))
    } else {
        offset.saturating_sub(SCROLL_STEP)
    }
}

/// First row to show so that `row` is the lowest visible one at most.
fn pinned_offset(row: usize, visible: usize) -> u16 {
    let offset = (row + 1).saturating_sub(visible);
    u16::try_from(offset).unwrap_or(u16::MAX)
}

/// Caps `offset` so a scrolled panel never shows blank rows below its end.
fn clamped_offset(offset: usize, total: usize, visible: usize) -> u16 {
    let offset = offset.min(total.saturating_sub(visible));
    u16::try_from(offset).unwrap_or(u16::MAX)
}

fn inner_rows(area: Rect) -> usize {
    area.height.saturating_sub(2) as usize
}

fn render(f: &mut Frame, state: &UiState, view: &ViewState) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // title + tabs
            Constraint::Length(7), // podium
            Constraint::Min(8),    // rankings, claim, history
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_header(f, chunks[0]);
    draw_podium(f, chunks[1], view.leaderboard());
    draw_body(f, chunks[2], state, view);
    draw_help(f, chunks[3], state);
    draw_modals(f, state, view);
}

fn draw_header(f: &mut Frame, area: Rect) {
    let tabs = TABS.iter().join("    ");
    let lines = vec![
        Line::styled(TITLE, Style::default().add_modifier(Modifier::BOLD)),
        Line::styled(tabs, Style::default().fg(Color::Green)),
    ];
    let header = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn draw_podium(f: &mut Frame, area: Rect, leaderboard: &[User]) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("🏆 Top Contributors");
    let inner = block.inner(area);
    f.render_widget(block, area);
    if leaderboard.is_empty() {
        let empty = Paragraph::new("No rankings yet")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, inner);
        return;
    }
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); PODIUM_SIZE])
        .split(inner);
    for (index, user) in leaderboard.iter().take(PODIUM_SIZE).enumerate() {
        let width = columns[index].width.saturating_sub(2) as usize;
        let lines = vec![
            Line::from(rank_badge(index)),
            Line::styled(
                user.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Line::styled(
                fit_width(&user.avatar, width),
                Style::default().fg(Color::DarkGray),
            ),
            Line::from(format!("{} pts", format_points(user.total_points))),
        ];
        let card = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::LEFT | Borders::RIGHT));
        f.render_widget(card, columns[index]);
    }
}

fn draw_body(f: &mut Frame, area: Rect, state: &UiState, view: &ViewState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(36),
            Constraint::Percentage(30),
            Constraint::Percentage(34),
        ])
        .split(area);
    draw_rankings(f, columns[0], view.leaderboard(), state.rankings_scroll);
    draw_claim_panel(f, columns[1], view);
    draw_history(f, columns[2], view.history(), state.history_scroll);
}

fn draw_rankings(f: &mut Frame, area: Rect, leaderboard: &[User], scroll: usize) {
    let lines: Vec<Line> = leaderboard
        .iter()
        .enumerate()
        .skip(PODIUM_SIZE)
        .map(|(index, user)| ranking_line(index, user))
        .collect();
    let lines = if lines.is_empty() {
        vec![Line::styled("None", Style::default().fg(Color::DarkGray))]
    } else {
        lines
    };
    let offset = clamped_offset(scroll, lines.len(), inner_rows(area));
    let rankings = Paragraph::new(lines)
        .scroll((offset, 0))
        .block(Block::default().borders(Borders::ALL).title("Rankings ([/])"));
    f.render_widget(rankings, area);
}

fn ranking_line(index: usize, user: &User) -> Line<'static> {
    Line::from(vec![
        Span::raw(format!("{:<4}", rank_badge(index))),
        Span::styled(
            fit_width(&user.name, NAME_COLUMN_WIDTH),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} pts ", format_points(user.total_points)),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            fit_width(&user.avatar, AVATAR_COLUMN_WIDTH),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn draw_claim_panel(f: &mut Frame, area: Rect, view: &ViewState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(5)])
        .split(area);

    let selected = view.selected_user_id();
    let mut lines = vec![select_line("-- Select --", selected.is_none())];
    let mut selected_row = 0;
    for (index, user) in view.users().iter().enumerate() {
        let is_selected = selected == Some(user.id.as_str());
        if is_selected {
            selected_row = index + 1;
        }
        lines.push(select_line(&user.name, is_selected));
    }
    let offset = pinned_offset(selected_row, inner_rows(rows[0]));
    let users = Paragraph::new(lines).scroll((offset, 0)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Select User (↑/↓, c to claim)"),
    );
    f.render_widget(users, rows[0]);

    let result_lines = match view.claim_result() {
        Some(result) => vec![
            Line::styled(
                result.headline(),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Line::styled(result.user.avatar.clone(), Style::default().fg(Color::DarkGray)),
        ],
        None => vec![Line::styled(
            "No claims yet",
            Style::default().fg(Color::DarkGray),
        )],
    };
    let result = Paragraph::new(result_lines)
        .block(Block::default().borders(Borders::ALL).title("🎯 Claim Points"));
    f.render_widget(result, rows[1]);
}

fn select_line(label: &str, selected: bool) -> Line<'static> {
    if selected {
        Line::styled(
            format!("> {label}"),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Line::from(format!("  {label}"))
    }
}

fn draw_history(f: &mut Frame, area: Rect, history: &[ClaimHistoryEntry], scroll: usize) {
    let mut lines = Vec::new();
    if history.is_empty() {
        lines.push(Line::styled("None", Style::default().fg(Color::DarkGray)));
    }
    for entry in history {
        let when = match entry.claimed_at {
            Some(at) => at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            None => "Unknown time".to_string(),
        };
        lines.push(Line::from(vec![
            Span::styled(
                fit_width(entry.user.display_name(), NAME_COLUMN_WIDTH),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" {when} ")),
            Span::styled(
                format!("+{}", entry.points_claimed),
                Style::default().fg(Color::Green),
            ),
        ]));
        lines.push(Line::styled(
            format!("  {}", entry.user.avatar),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let offset = clamped_offset(scroll, lines.len(), inner_rows(area));
    let widget = Paragraph::new(lines).scroll((offset, 0)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("📜 Claim History (PgUp/PgDn)"),
    );
    f.render_widget(widget, area);
}

fn draw_help(f: &mut Frame, area: Rect, state: &UiState) {
    let pending = if state.pending > 0 {
        format!(" | syncing {}", state.pending)
    } else {
        String::new()
    };
    let help = Paragraph::new(format!(
        "↑/↓ select | c claim | a add user | [/] rankings | PgUp/PgDn history | q/Esc quit | API {}{}",
        state.api_url, pending
    ))
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, view: &ViewState) {
    draw_mode(f, &state.mode, view);
}

fn draw_mode(f: &mut Frame, mode: &Mode, view: &ViewState) {
    match mode {
        Mode::AddUser => {
            let area = centered_rect(60, 60, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title("➕ Add New User");
            let mut lines = vec![
                Line::from(format!("Name: {}_", view.new_user_name())),
                Line::from(""),
                Line::from("Avatar:"),
            ];
            let chosen = view.new_user_avatar();
            for (index, avatar) in AVATAR_PALETTE.iter().enumerate() {
                let line = format!("  [{}] {} {}", index + 1, pick_marker(chosen, avatar), avatar);
                if chosen == Some(*avatar) {
                    lines.push(Line::styled(line, Style::default().fg(Color::Green)));
                } else {
                    lines.push(Line::from(line));
                }
            }
            lines.push(Line::from(""));
            lines.push(Line::from(
                "Enter=add Esc=close ←/→ avatar, type to edit name",
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::Notice { message, then } => {
            draw_mode(f, then, view);
            let area = centered_rect(50, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Notice");
            let p = Paragraph::new(format!("{message}\n\nEnter=close"))
                .wrap(Wrap { trim: false });
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn pick_marker(chosen: Option<&str>, avatar: &str) -> &'static str {
    if chosen == Some(avatar) { "●" } else { "○" }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}

fn format_points(points: u64) -> String {
    points.to_formatted_string(&Locale::en)
}

/// Pads or truncates `text` to exactly `width` terminal columns.
fn fit_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        let padding = width - text.width();
        return format!("{text}{}", " ".repeat(padding));
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

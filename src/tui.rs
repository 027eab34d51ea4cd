use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap},
};
use std::io::stdout;
use std::time::Duration;

use crate::dashboard::{load_filter, save_filter, Dashboard, NewApplication};
use crate::models::{Application, Status, StatusFilter};
use crate::store::{StorageArea, Store, APPLICATIONS_KEY};
use crate::watcher::ChangeWatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Company,
    Role,
    Status,
    Date,
    Link,
}

impl FormField {
    const ORDER: [FormField; 5] = [
        FormField::Company,
        FormField::Role,
        FormField::Status,
        FormField::Date,
        FormField::Link,
    ];

    fn label(&self) -> &'static str {
        match self {
            FormField::Company => "Company",
            FormField::Role => "Role",
            FormField::Status => "Status",
            FormField::Date => "Date",
            FormField::Link => "Link (optional)",
        }
    }

    fn step(self, forward: bool) -> Self {
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        let n = Self::ORDER.len();
        let next = if forward { (i + 1) % n } else { (i + n - 1) % n };
        Self::ORDER[next]
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FormState {
    form: NewApplication,
    field: FormField,
}

impl FormState {
    fn new() -> Self {
        Self {
            form: NewApplication::default(),
            field: FormField::Company,
        }
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match self.field {
            FormField::Company => Some(&mut self.form.company),
            FormField::Role => Some(&mut self.form.role),
            FormField::Date => Some(&mut self.form.date),
            FormField::Link => Some(&mut self.form.link),
            FormField::Status => None,
        }
    }

    fn cycle_status(&mut self, forward: bool) {
        let i = Status::ALL
            .iter()
            .position(|s| *s == self.form.status)
            .unwrap_or(0);
        let n = Status::ALL.len();
        let next = if forward { (i + 1) % n } else { (i + n - 1) % n };
        self.form.status = Status::ALL[next];
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Mode {
    Browse,
    EditStatus { id: i64, choice: usize },
    ConfirmDelete { id: i64 },
    Add(FormState),
}

/// Effects a key press asks the run loop to carry out.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Quit,
    SetStatus(i64, Status),
    Delete(i64),
    Add(NewApplication),
    OpenLink(String),
    FilterChanged(StatusFilter),
}

struct AppState {
    filter: StatusFilter,
    selected: usize,
    mode: Mode,
    message: Option<String>,
}

impl AppState {
    fn new(filter: StatusFilter) -> Self {
        Self {
            filter,
            selected: 0,
            mode: Mode::Browse,
            message: None,
        }
    }

    fn clamp(&mut self, visible_len: usize) {
        if visible_len == 0 {
            self.selected = 0;
        } else if self.selected >= visible_len {
            self.selected = visible_len - 1;
        }
    }

    fn handle_key(&mut self, key: KeyEvent, visible: &[&Application]) -> Option<Command> {
        if self.mode == Mode::Browse {
            return self.handle_browse(key, visible);
        }
        match &mut self.mode {
            Mode::Browse => None,
            Mode::EditStatus { id, choice } => {
                let n = Status::ALL.len();
                match key.code {
                    KeyCode::Esc => self.mode = Mode::Browse,
                    KeyCode::Down | KeyCode::Char('j') => *choice = (*choice + 1) % n,
                    KeyCode::Up | KeyCode::Char('k') => *choice = (*choice + n - 1) % n,
                    KeyCode::Enter => {
                        let cmd = Command::SetStatus(*id, Status::ALL[*choice]);
                        self.mode = Mode::Browse;
                        return Some(cmd);
                    }
                    _ => {}
                }
                None
            }
            Mode::ConfirmDelete { id } => {
                let id = *id;
                self.mode = Mode::Browse;
                match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => Some(Command::Delete(id)),
                    _ => None,
                }
            }
            Mode::Add(state) => {
                match key.code {
                    KeyCode::Esc => self.mode = Mode::Browse,
                    KeyCode::Tab | KeyCode::Down => state.field = state.field.step(true),
                    KeyCode::BackTab | KeyCode::Up => state.field = state.field.step(false),
                    KeyCode::Enter => return Some(Command::Add(state.form.clone())),
                    KeyCode::Left if state.field == FormField::Status => state.cycle_status(false),
                    KeyCode::Right | KeyCode::Char(' ') if state.field == FormField::Status => {
                        state.cycle_status(true)
                    }
                    KeyCode::Backspace => {
                        if let Some(text) = state.text_mut() {
                            text.pop();
                        }
                    }
                    KeyCode::Char(c) => {
                        if let Some(text) = state.text_mut() {
                            text.push(c);
                        }
                    }
                    _ => {}
                }
                None
            }
        }
    }

    fn handle_browse(&mut self, key: KeyEvent, visible: &[&Application]) -> Option<Command> {
        let current = visible.get(self.selected);
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(Command::Quit),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < visible.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Char('f') => {
                self.filter = self.filter.cycle();
                self.selected = 0;
                return Some(Command::FilterChanged(self.filter));
            }
            KeyCode::Char('s') | KeyCode::Enter => {
                if let Some(app) = current {
                    let choice = Status::ALL.iter().position(|s| *s == app.status).unwrap_or(0);
                    self.mode = Mode::EditStatus { id: app.id, choice };
                }
            }
            KeyCode::Char('d') => {
                if let Some(app) = current {
                    self.mode = Mode::ConfirmDelete { id: app.id };
                }
            }
            KeyCode::Char('a') => self.mode = Mode::Add(FormState::new()),
            KeyCode::Char('o') => {
                if let Some(app) = current {
                    return Some(Command::OpenLink(app.link.clone()));
                }
            }
            _ => {}
        }
        None
    }
}

pub fn run_dashboard(store: &Store, dashboard: &mut Dashboard, poll_interval: Duration) -> Result<()> {
    let mut watcher = ChangeWatcher::open(store.path())?;
    let changes = watcher.subscribe();
    let mut state = AppState::new(load_filter(store));

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, dashboard, store, &mut watcher, &changes, poll_interval);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    dashboard: &mut Dashboard,
    store: &Store,
    watcher: &mut ChangeWatcher,
    changes: &std::sync::mpsc::Receiver<crate::watcher::ChangeEvent>,
    poll_interval: Duration,
) -> Result<()> {
    let mut table_state = TableState::default();

    loop {
        let visible_len = dashboard.visible(state.filter).len();
        state.clamp(visible_len);
        table_state.select((visible_len > 0).then_some(state.selected));
        terminal.draw(|frame| draw(frame, state, dashboard, &mut table_state))?;

        if event::poll(poll_interval)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let visible = dashboard.visible(state.filter);
                let command = state.handle_key(key, &visible);
                if let Some(command) = command {
                    if command == Command::Quit {
                        break;
                    }
                    apply(command, state, dashboard, store);
                }
            }
        }

        if let Err(e) = watcher.poll() {
            tracing::warn!(error = %e, "change poll failed");
        }
        let mut stale = false;
        while let Ok(event) = changes.try_recv() {
            stale |= event.touches(StorageArea::Sync, APPLICATIONS_KEY);
        }
        if stale {
            if let Err(e) = dashboard.reload() {
                state.message = Some(format!("Reload failed: {}", e));
            }
        }
    }
    Ok(())
}

fn apply(command: Command, state: &mut AppState, dashboard: &mut Dashboard, store: &Store) {
    let result = match command {
        Command::Quit => return,
        Command::SetStatus(id, status) => dashboard
            .set_status(id, status)
            .map(|_| format!("Status set to {}", status)),
        Command::Delete(id) => dashboard
            .delete(id)
            .map(|app| format!("Deleted {} at {}", app.role, app.company)),
        Command::Add(form) => match dashboard.add(&form) {
            Ok(app) => {
                state.mode = Mode::Browse;
                Ok(format!("Added {} at {}", app.role, app.company))
            }
            Err(e) => Err(e),
        },
        Command::OpenLink(link) => {
            if link.trim().is_empty() || link == "#" {
                state.message = Some("No link saved for this application".to_string());
            } else if let Err(e) = open::that(&link) {
                state.message = Some(format!("Could not open link: {}", e));
            }
            return;
        }
        Command::FilterChanged(filter) => {
            if let Err(e) = save_filter(store, filter) {
                tracing::warn!(error = %e, "could not save filter");
            }
            return;
        }
    };

    state.message = Some(match result {
        Ok(msg) => msg,
        Err(e) => e.to_string(),
    });
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Applied => Color::Blue,
        Status::Interview => Color::Yellow,
        Status::Offer => Color::Green,
        Status::Rejected => Color::Red,
    }
}

fn draw(frame: &mut Frame, state: &AppState, dashboard: &Dashboard, table_state: &mut TableState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(4),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_stats(frame, rows[0], dashboard);

    let visible = dashboard.visible(state.filter);
    let table_rows: Vec<Row> = visible
        .iter()
        .map(|app| {
            Row::new(vec![
                Cell::from(app.company.clone()),
                Cell::from(app.role.clone()),
                Cell::from(Span::styled(
                    app.status.as_str(),
                    Style::default().fg(status_color(app.status)),
                )),
                Cell::from(app.short_date()),
                Cell::from(app.platform.as_str()),
            ])
        })
        .collect();

    let table = Table::new(
        table_rows,
        [
            Constraint::Percentage(25),
            Constraint::Percentage(35),
            Constraint::Length(11),
            Constraint::Length(12),
            Constraint::Length(9),
        ],
    )
    .header(
        Row::new(vec!["COMPANY", "ROLE", "STATUS", "DATE", "PLATFORM"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(format!(
        " Applications ({} of {}) - filter: {} ",
        visible.len(),
        dashboard.applications().len(),
        state.filter.label()
    )))
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("> ");
    frame.render_stateful_widget(table, rows[1], table_state);

    if visible.is_empty() {
        let empty = Paragraph::new("No applications match the filter.")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        let inner = Rect {
            y: rows[1].y + rows[1].height / 2,
            height: 1,
            ..rows[1]
        };
        frame.render_widget(empty, inner);
    }

    let detail = Paragraph::new(build_detail(visible.get(state.selected).copied()))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, rows[2]);

    let footer = match &state.message {
        Some(msg) => Paragraph::new(msg.as_str()).style(Style::default().fg(Color::Yellow)),
        None => Paragraph::new(
            " j/k:navigate  f:filter  s:status  a:add  d:delete  o:open link  q:quit",
        )
        .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(footer, rows[3]);

    match &state.mode {
        Mode::Browse => {}
        Mode::EditStatus { choice, .. } => draw_status_picker(frame, *choice),
        Mode::ConfirmDelete { id } => draw_confirm_delete(frame, dashboard.get(*id)),
        Mode::Add(form) => draw_add_form(frame, form),
    }
}

fn draw_stats(frame: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let counts = dashboard.counts();
    let cells = [
        ("Total", counts.total, Color::Magenta),
        ("Applied", counts.applied, Color::Blue),
        ("Interviews", counts.interview, Color::Yellow),
        ("Offers", counts.offer, Color::Green),
        ("Rejected", counts.rejected, Color::Red),
    ];
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 5); 5])
        .split(area);

    for ((label, count, color), column) in cells.iter().zip(columns.iter()) {
        let widget = Paragraph::new(Line::from(vec![
            Span::styled(count.to_string(), Style::default().fg(*color).add_modifier(Modifier::BOLD)),
            Span::raw(format!(" {}", label)),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(widget, *column);
    }
}

fn build_detail(app: Option<&Application>) -> Text<'static> {
    let Some(app) = app else {
        return Text::raw("No application selected");
    };

    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} at {}", app.role, app.company),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Saved {}  #{}  {}", app.local_date(), app.id, app.platform.as_str())),
    ];
    if !app.link.is_empty() {
        lines.push(Line::from(format!("Link: {}", app.link)));
    }
    for line in textwrap::fill(&app.notes, 100).lines() {
        lines.push(Line::from(format!("  {}", line)));
    }
    Text::from(lines)
}

fn centered(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_status_picker(frame: &mut Frame, choice: usize) {
    let area = centered(24, 6, frame.area());
    let items: Vec<ListItem> = Status::ALL
        .iter()
        .map(|s| ListItem::new(s.as_str()).style(Style::default().fg(status_color(*s))))
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Status "))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    let mut list_state = ListState::default();
    list_state.select(Some(choice));
    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn draw_confirm_delete(frame: &mut Frame, app: Option<&Application>) {
    let area = centered(50, 5, frame.area());
    let what = app
        .map(|a| format!("{} at {}", a.role, a.company))
        .unwrap_or_else(|| "this application".to_string());
    let text = vec![
        Line::from(format!("Delete {}?", what)),
        Line::from(""),
        Line::from(Span::styled("y: delete   any other key: cancel", Style::default().fg(Color::DarkGray))),
    ];
    let widget = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Confirm "));
    frame.render_widget(Clear, area);
    frame.render_widget(widget, area);
}

fn draw_add_form(frame: &mut Frame, state: &FormState) {
    let area = centered(60, 10, frame.area());
    let mut lines: Vec<Line> = FormField::ORDER
        .iter()
        .map(|field| {
            let value = match field {
                FormField::Company => state.form.company.clone(),
                FormField::Role => state.form.role.clone(),
                FormField::Status => format!("< {} >", state.form.status),
                FormField::Date => state.form.date.clone(),
                FormField::Link => state.form.link.clone(),
            };
            let style = if *field == state.field {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("{:<16}", field.label()), style),
                Span::raw(value),
            ])
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "tab:next field  enter:add  esc:cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Add New Application "));
    frame.render_widget(Clear, area);
    frame.render_widget(widget, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::app;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn apps() -> Vec<Application> {
        vec![
            app(1, "https://x.com/jobs/1", Status::Applied),
            app(2, "https://x.com/jobs/2", Status::Offer),
        ]
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let list = apps();
        let visible: Vec<&Application> = list.iter().collect();
        let mut state = AppState::new(StatusFilter::All);
        state.handle_key(key(KeyCode::Up), &visible);
        assert_eq!(state.selected, 0);
        state.handle_key(key(KeyCode::Char('j')), &visible);
        state.handle_key(key(KeyCode::Char('j')), &visible);
        assert_eq!(state.selected, 1);
    }

    #[test]
    fn test_status_edit_flow() {
        let list = apps();
        let visible: Vec<&Application> = list.iter().collect();
        let mut state = AppState::new(StatusFilter::All);
        state.handle_key(key(KeyCode::Char('j')), &visible);
        assert_eq!(state.handle_key(key(KeyCode::Char('s')), &visible), None);
        // Offer is index 2; one down lands on Rejected.
        assert_eq!(state.mode, Mode::EditStatus { id: 2, choice: 2 });
        state.handle_key(key(KeyCode::Down), &visible);
        assert_eq!(
            state.handle_key(key(KeyCode::Enter), &visible),
            Some(Command::SetStatus(2, Status::Rejected))
        );
        assert_eq!(state.mode, Mode::Browse);
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let list = apps();
        let visible: Vec<&Application> = list.iter().collect();
        let mut state = AppState::new(StatusFilter::All);
        state.handle_key(key(KeyCode::Char('d')), &visible);
        assert_eq!(state.handle_key(key(KeyCode::Char('n')), &visible), None);
        assert_eq!(state.mode, Mode::Browse);

        state.handle_key(key(KeyCode::Char('d')), &visible);
        assert_eq!(
            state.handle_key(key(KeyCode::Char('y')), &visible),
            Some(Command::Delete(1))
        );
    }

    #[test]
    fn test_filter_cycles_and_resets_selection() {
        let list = apps();
        let visible: Vec<&Application> = list.iter().collect();
        let mut state = AppState::new(StatusFilter::All);
        state.selected = 1;
        assert_eq!(
            state.handle_key(key(KeyCode::Char('f')), &visible),
            Some(Command::FilterChanged(StatusFilter::Only(Status::Applied)))
        );
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn test_add_form_typing_and_submit() {
        let mut state = AppState::new(StatusFilter::All);
        state.handle_key(key(KeyCode::Char('a')), &[]);
        for c in "Acme".chars() {
            state.handle_key(key(KeyCode::Char(c)), &[]);
        }
        state.handle_key(key(KeyCode::Tab), &[]);
        for c in "Dev".chars() {
            state.handle_key(key(KeyCode::Char(c)), &[]);
        }
        state.handle_key(key(KeyCode::Tab), &[]);
        state.handle_key(key(KeyCode::Right), &[]);
        state.handle_key(key(KeyCode::Tab), &[]);
        for c in "2026-02-01".chars() {
            state.handle_key(key(KeyCode::Char(c)), &[]);
        }
        state.handle_key(key(KeyCode::Backspace), &[]);
        state.handle_key(key(KeyCode::Char('2')), &[]);

        let expected = NewApplication {
            company: "Acme".to_string(),
            role: "Dev".to_string(),
            status: Status::Interview,
            date: "2026-02-02".to_string(),
            link: String::new(),
        };
        assert_eq!(
            state.handle_key(key(KeyCode::Enter), &[]),
            Some(Command::Add(expected))
        );
        // Stays open until the run loop confirms the save.
        assert!(matches!(state.mode, Mode::Add(_)));
    }

    #[test]
    fn test_clamp_after_shrink() {
        let mut state = AppState::new(StatusFilter::All);
        state.selected = 5;
        state.clamp(2);
        assert_eq!(state.selected, 1);
        state.clamp(0);
        assert_eq!(state.selected, 0);
    }
}

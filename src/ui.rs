use std::{fmt, io, sync::Arc, time::Duration};
use tui::{backend::CrosstermBackend, buffer::Buffer, layout::{ Constraint, Direction, Layout, Rect, Alignment }, style::{
        Color, Modifier, Style
    }, text::{ Span, Spans, Text }, widgets::{ Block, Borders, Cell, Paragraph, Row, StatefulWidget, Table,
        TableState, Widget
    }};
use crossterm::{
    event::{ self, EventStream, KeyCode, KeyEvent, KeyModifiers }, execute, ExecutableCommand
};
use futures::StreamExt;
use tokio::sync::{ mpsc, watch };
use tracing::{ info, warn };

use crate::agents::PlcAgent;
use crate::controller::{ PageController, PollOutcome };
use crate::page::{ MemoryPage, Page };
use crate::poller::Poller;
use crate::{ Error, ErrorKind, Field, Result };

type Controller<A> = Arc<PageController<A, Arc<MemoryPage>>>;

fn term_err<E: fmt::Display>(err: E) -> Error {
    Error::new(ErrorKind::IOError, err.to_string())
}

pub enum Event {
    Status(String),
    Polled(String)
}

/// What a key press asks the app to do.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Nothing,
    Send(Field),
    Quit
}

/// One line of the page table.
#[derive(Debug, Clone, PartialEq)]
struct FieldRow {
    field: Field,
    key: String,
    output: String,
    display: String
}

pub struct AppState {
    rows: Vec<FieldRow>,
    selected: usize,
    poll_status: String,
    status: String
}

impl AppState {
    fn new() -> Self {
        AppState {
            rows: vec![],
            selected: 0,
            poll_status: "waiting for first poll".into(),
            status: String::new()
        }
    }

    pub fn next(&mut self) {
        if self.selected + 1 < Field::ALL.len() {
            self.selected += 1;
        } else {
            self.selected = 0;
        }
    }

    pub fn previous(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        } else {
            self.selected = Field::ALL.len() - 1;
        }
    }

    pub fn selected(&self) -> Field {
        Field::ALL[self.selected]
    }
}

/// Short status line text for a poll outcome.
pub fn poll_status(outcome: &Result<PollOutcome>) -> String {
    match outcome {
        Ok(PollOutcome::Updated(_)) => "live".into(),
        Ok(PollOutcome::Status(code)) => format!("error on poll code:{}", code.as_u16()),
        Err(err) => format!("poll failed: {}", err)
    }
}

pub struct App<A> {
    controller: Controller<A>,
    period: Duration,
    state: AppState
}

impl<A> App<A>
    where A: PlcAgent + 'static
{
    pub fn new(controller: Controller<A>, period: Duration) -> Self {
        App {
            controller,
            period,
            state: AppState::new()
        }
    }

    fn page(&self) -> &MemoryPage {
        self.controller.page()
    }

    /// Copy element texts into the rows shown on screen.
    fn refresh(&mut self) {
        let rows = Field::ALL.iter()
            .map(|field| FieldRow {
                field: *field,
                key: self.controller.param_key(*field),
                output: self.page().value(&field.output_id()).unwrap_or_default(),
                display: self.page().value(&field.display_id()).unwrap_or_default()
            })
            .collect();
        self.state.rows = rows;
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        let field = self.state.selected();

        match key.code {
            //== quit app
            KeyCode::Esc => Action::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
            //== Next/previous field
            KeyCode::Down | KeyCode::Tab => {
                self.state.next();
                Action::Nothing
            },
            KeyCode::Up | KeyCode::BackTab => {
                self.state.previous();
                Action::Nothing
            },
            //== edit output control
            KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
                self.edit(field, |text| text.push(c));
                Action::Nothing
            },
            KeyCode::Backspace => {
                self.edit(field, |text| { text.pop(); });
                Action::Nothing
            },
            KeyCode::Enter => Action::Send(field),
            _ => Action::Nothing
        }
    }

    fn edit<F: FnOnce(&mut String)>(&mut self, field: Field, edit: F) {
        if let Err(err) = self.page().update(&field.output_id(), edit) {
            self.state.status = err.to_string();
        }
    }

    fn spawn_send(&self, field: Field, tx: mpsc::UnboundedSender<Event>) {
        let controller = self.controller.clone();
        tokio::spawn(async move {
            let msg = match controller.send(field).await {
                Ok(()) => format!("sent {}", field),
                Err(err) => {
                    warn!(field = %field, error = %err, "send failed");
                    format!("send {} failed: {}", field, err)
                }
            };
            let _ = tx.send(Event::Status(msg));
        });
    }

    fn draw<B>(&mut self, terminal: &mut tui::Terminal<B>) -> Result<()>
        where B: tui::backend::Backend
    {
        self.refresh();
        let state = &mut self.state;
        terminal.draw(|f| {
                f.render_stateful_widget(AppWidget::default(), f.size(), state);
            }
        )?;
        Ok(())
    }

    async fn run_draw_loop(&mut self) -> Result<()> {
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = tui::Terminal::new(backend)?;
        terminal.clear()?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (stop, shutdown) = watch::channel(false);

        //== poll in the background
        let poller = Poller::new(self.controller.clone(), self.period);
        let poll_tx = tx.clone();
        let polling = tokio::spawn(async move {
            poller.run(shutdown, |outcome| {
                let _ = poll_tx.send(Event::Polled(poll_status(outcome)));
            }).await
        });

        let mut keys = EventStream::new();

        //== loop events
        let result = loop {
            if let Err(err) = self.draw(&mut terminal) {
                break Err(err);
            }

            tokio::select! {
                key = keys.next() => match key {
                    Some(Ok(event::Event::Key(key))) => match self.handle_key(key) {
                        Action::Quit => break Ok(()),
                        Action::Send(field) => self.spawn_send(field, tx.clone()),
                        Action::Nothing => {}
                    },
                    Some(Ok(_)) => {},
                    Some(Err(err)) => break Err(term_err(err)),
                    None => break Ok(())
                },
                Some(event) = rx.recv() => match event {
                    Event::Status(msg) => self.state.status = msg,
                    Event::Polled(msg) => self.state.poll_status = msg
                }
            }
        };

        let _ = stop.send(true);
        polling.abort();
        let _ = polling.await;
        terminal.show_cursor()?;

        result
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(url = %self.controller.location(), "opening page");

        //== terminal setup
        crossterm::terminal::enable_raw_mode().map_err(term_err)?;
        if let Err(err) = execute!(io::stdout(), crossterm::terminal::EnterAlternateScreen) {
            let _ = crossterm::terminal::disable_raw_mode();
            return Err(term_err(err));
        }

        let result = self.run_draw_loop().await;

        //== terminal cleanup
        crossterm::terminal::disable_raw_mode().map_err(term_err)?;
        io::stdout().execute(crossterm::terminal::LeaveAlternateScreen).map_err(term_err)?;

        result
    }
}

#[derive(Default)]
struct AppWidget {}

impl StatefulWidget for AppWidget {
    type State=AppState;

    fn render(self, area:Rect, buf: &mut Buffer, state: &mut Self::State) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(3), Constraint::Length(1)])
            .split(area);

        FieldsWidget::default()
            .rows(&state.rows)
            .select(Some(state.selected))
            .render(chunks[0], buf);

        StatusWidget { poll: &state.poll_status, last: &state.status }
            .render(chunks[1], buf);

        Paragraph::new(Span::styled(
                " Up/Down select  type to edit  Enter send  Esc quit ",
                Style::default().fg(Color::DarkGray)
            ))
            .alignment(Alignment::Left)
            .render(chunks[2], buf);
    }
}

#[derive(Default)]
struct FieldsWidget<'a> {
    rows: &'a [FieldRow],
    selected: Option<usize>
}

impl<'a> FieldsWidget<'a> {
    fn rows(mut self, rows: &'a [FieldRow]) -> Self {
        self.rows = rows;
        self
    }

    fn select(mut self, index: Option<usize>) -> Self {
        self.selected = index;
        self
    }
}

impl<'a> From<&'a FieldRow> for Row<'a> {
    fn from(row: &'a FieldRow) -> Self {
        Row::new(vec![
            Cell::from(
                Text::styled(
                    row.field.name(),
                    Style::default().fg(Color::Yellow)
                )
            ),
            Cell::from(Text::raw(row.output.as_str())),
            Cell::from(
                Text::styled(
                    row.display.as_str(),
                    Style::default().fg(Color::LightGreen).add_modifier(Modifier::BOLD)
                )
            ),
            Cell::from(
                Text::styled(
                    row.key.as_str(),
                    Style::default().fg(Color::DarkGray)
                )
            )
        ])
    }
}

impl<'a> Widget for FieldsWidget<'a> {
    fn render(self, area:Rect, buf: &mut Buffer) {
        let color = Color::Rgb(78, 78, 78);
        let header = Row::new(vec!["Field", "Send", "Live", "Key"])
            .style(Style::default().add_modifier(Modifier::UNDERLINED));
        let rows: Vec<Row> = self.rows.iter().map(Row::from).collect();
        let table = Table::new(rows)
            .header(header)
            .block(Block::default().title(" Page ").borders(Borders::ALL))
            .widths(&[Constraint::Length(8), Constraint::Percentage(35), Constraint::Percentage(35), Constraint::Min(12)])
            .highlight_style(Style::default().bg(color))
            .highlight_symbol(" >> ");

        let mut table_state = TableState::default();
        table_state.select(self.selected);

        StatefulWidget::render(table, area, buf, &mut table_state);
    }
}

struct StatusWidget<'a> {
    poll: &'a str,
    last: &'a str
}

impl<'a> Widget for StatusWidget<'a> {
    fn render(self, area:Rect, buf: &mut Buffer) {
        let color = if self.poll == "live" { Color::Green } else { Color::Red };
        let line = Spans::from(vec![
            Span::styled(format!(" {} ", self.poll), Style::default().fg(color)),
            Span::raw(" "),
            Span::raw(self.last)
        ]);

        Paragraph::new(line)
            .block(Block::default().borders(Borders::ALL))
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::tests::MockAgent;
    use hyper::StatusCode;

    fn app() -> App<MockAgent> {
        let page = Arc::new(MemoryPage::with_fields());
        let ctl = PageController::new(MockAgent::default(), page, "http://plc/index.html").unwrap();
        App::new(Arc::new(ctl), Duration::from_secs(1))
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn selection_wraps() {
        let mut state = AppState::new();
        state.previous();
        assert_eq!(state.selected(), Field::Data4);
        state.next();
        assert_eq!(state.selected(), Field::Data1);
        state.next();
        assert_eq!(state.selected(), Field::Data2);
    }

    #[test]
    fn typing_edits_selected_output() {
        let mut app = app();
        app.handle_key(key(KeyCode::Down));
        for c in "42x".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Backspace));

        assert_eq!(app.page().value("data2_out").unwrap(), "42");
        assert_eq!(app.page().value("data1_out").unwrap(), "");
        assert_eq!(app.handle_key(key(KeyCode::Enter)), Action::Send(Field::Data2));
    }

    #[test]
    fn quit_keys() {
        let mut app = app();
        assert_eq!(app.handle_key(key(KeyCode::Esc)), Action::Quit);
        assert_eq!(app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)), Action::Quit);
        assert_eq!(app.page().value("data1_out").unwrap(), "");
    }

    #[test]
    fn modified_chars_are_not_typed() {
        let mut app = app();
        app.handle_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL));
        app.handle_key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT));
        app.handle_key(KeyEvent::new(KeyCode::Char('B'), KeyModifiers::SHIFT));

        assert_eq!(app.page().value("data1_out").unwrap(), "B");
    }

    #[test]
    fn rows_show_page_and_keys() {
        let mut app = app();
        app.page().set_content("data3_in", "17").unwrap();
        app.refresh();

        let row = &app.state.rows[2];
        assert_eq!(row.display, "17");
        assert_eq!(row.key, "\"db2\".data1");
    }

    #[test]
    fn renders_rows() {
        let mut app = app();
        app.page().set_content("data1_in", "hello").unwrap();
        app.refresh();

        let area = Rect::new(0, 0, 80, 12);
        let mut buf = Buffer::empty(area);
        AppWidget::default().render(area, &mut buf, &mut app.state);

        let text: String = buf.content().iter().map(|c| c.symbol.as_str()).collect();
        assert!(text.contains("hello"));
        assert!(text.contains("data4"));
    }

    #[test]
    fn poll_status_text() {
        let outcome = Ok(PollOutcome::Status(StatusCode::NOT_FOUND));
        assert_eq!(poll_status(&outcome), "error on poll code:404");
        let outcome = Err(Error::simple(ErrorKind::HttpError));
        assert_eq!(poll_status(&outcome), "poll failed: HTTP Error");
    }
}

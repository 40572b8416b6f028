use ratatui::{prelude::*, widgets::*};

use robologic_core::{Direction as Heading, engine::Status, level::Cell};

use crate::App;

const HELP: &str = "arrows/wasd add | backspace/1-9 remove | c clear | enter run | r reset | n next | h hint | q quit";

/// Renders the user interface.
pub fn draw(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Mission briefing
            Constraint::Min(9),    // Grid, program and score
            Constraint::Length(3), // Latest message
            Constraint::Length(3), // Hint
            Constraint::Length(2), // Help
        ])
        .split(frame.area());

    render_mission(frame, main_layout[0], app);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(25),
            Constraint::Percentage(35),
        ])
        .split(main_layout[1]);
    render_grid(frame, columns[0], app);
    render_program(frame, columns[1], app);
    render_score(frame, columns[2], app);

    let message = Paragraph::new(app.message.as_str())
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Robot"));
    frame.render_widget(message, main_layout[2]);

    render_hint(frame, main_layout[3], app);

    let help_text = Paragraph::new(HELP)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[4]);
}

fn render_mission(frame: &mut Frame, area: Rect, app: &App) {
    let level = app.session.level();
    let title = if app.loading_level {
        format!("Level {} (loading next...)", level.id)
    } else {
        format!("Level {} - {}", level.id, level.difficulty)
    };
    let story = Paragraph::new(level.story.as_str())
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(story, area);
}

/// Renders the level grid with the robot on top.
fn render_grid(frame: &mut Frame, area: Rect, app: &App) {
    let grid = app.session.grid();
    let state = app.session.state();

    let mut lines: Vec<Line> = Vec::with_capacity(grid.height());
    let mut spans: Vec<Span> = Vec::with_capacity(grid.width());
    for (position, cell) in grid.enumerate() {
        if position == state.position {
            spans.push(robot_span(state.direction, state.status));
        } else {
            spans.push(cell_span(cell));
        }
        if position.x + 1 == grid.width() {
            lines.push(Line::from(std::mem::take(&mut spans)));
        }
    }

    let grid_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Mars").borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(grid_paragraph, area);
}

fn robot_span(heading: Heading, status: Status) -> Span<'static> {
    let arrow = match heading {
        Heading::Up => " ^ ",
        Heading::Down => " v ",
        Heading::Left => " < ",
        Heading::Right => " > ",
    };
    let color = match status {
        Status::Lost => Color::Red,
        Status::Won => Color::Green,
        Status::Idle | Status::Running => Color::Cyan,
    };
    Span::styled(arrow, Style::default().fg(color).bold())
}

fn cell_span(cell: Cell) -> Span<'static> {
    let style = match cell {
        Cell::Empty => Style::default().fg(Color::DarkGray),
        Cell::Obstacle => Style::default().fg(Color::Gray).bold(),
        Cell::Start => Style::default().fg(Color::Blue),
        Cell::Goal => Style::default().fg(Color::Green).bold(),
        Cell::Coin => Style::default().fg(Color::Yellow),
    };
    Span::styled(format!(" {} ", cell.to_char()), style)
}

/// Lists the queued commands, marking the one on screen as executing.
fn render_program(frame: &mut Frame, area: Rect, app: &App) {
    let state = app.session.state();
    let items: Vec<ListItem> = app
        .session
        .program()
        .iter()
        .enumerate()
        .map(|(index, command)| {
            let style = match state.executing_index {
                Some(current) if current == index => {
                    Style::default().fg(Color::Black).bg(Color::Yellow).bold()
                }
                Some(current) if index < current => Style::default().fg(Color::DarkGray),
                _ => Style::default(),
            };
            ListItem::new(format!("{:>2}. {command}", index + 1)).style(style)
        })
        .collect();

    let title = format!("Program ({})", app.session.program().len());
    let program = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(program, area);
}

fn render_score(frame: &mut Frame, area: Rect, app: &App) {
    let state = app.session.state();
    let lines = vec![
        Line::from(vec![
            Span::raw("Status: "),
            Span::styled(app.status_label(), Style::default().bold()),
        ]),
        Line::from(format!("Level score: {}", state.score)),
        Line::from(format!("Total score: {}", app.session.total_score())),
        Line::from(format!(
            "Coins: {}/{}",
            state.coins_collected, state.total_coins
        )),
        Line::from(format!("Par: {} moves", state.par)),
        Line::from(format!("Robot at {}", state.position)),
    ];
    let score = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Score"));
    frame.render_widget(score, area);
}

fn render_hint(frame: &mut Frame, area: Rect, app: &App) {
    let text = if app.loading_hint {
        "Thinking..."
    } else {
        app.session.hint().unwrap_or("Press h for a hint.")
    };
    let hint = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::Magenta))
        .block(Block::default().borders(Borders::ALL).title("Hint"));
    frame.render_widget(hint, area);
}

use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::app::{App, FormField, LogView, Mode, ProjectForm};
use crate::{
    engine::TimerEngine,
    storage::{
        entities::{Project, TimeLog},
        project_store::ProjectStore,
    },
    utils::{
        percentage::progress,
        time::{format_clock, format_session},
    },
};

const FOCUSED_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
const RUNNING_COLOR: Color = Color::Green;
const RECENT_LOGS: usize = 5;

pub fn draw<S: ProjectStore>(frame: &mut Frame, app: &App, engine: &TimerEngine<S>) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(12), Constraint::Length(4)])
        .split(frame.area());

    if let Mode::Logs(view) = &app.mode {
        render_all_logs(frame, layout[0], view);
    } else {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(layout[0]);
        render_project_list(frame, body[0], engine);
        render_project_detail(frame, body[1], engine);
    }
    render_footer(frame, layout[1], app, engine);

    if let Mode::Form(form) = &app.mode {
        render_form_popup(frame, form);
    }
    if let Some(buffer) = engine.tag_buffer() {
        render_tag_popup(frame, buffer, engine.pending_log());
    }
}

fn render_project_list<S: ProjectStore>(frame: &mut Frame, area: Rect, engine: &TimerEngine<S>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(FOCUSED_BORDER_COLOR))
        .title("Projects");

    if engine.projects().is_empty() {
        let empty = Paragraph::new("No projects yet. Press 'n' to add one.").block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items = engine
        .projects()
        .iter()
        .map(|p| {
            let mut spans = vec![
                Span::raw(p.name.clone()),
                Span::raw(" "),
                Span::styled(format_clock(p.remaining()), Style::default().fg(Color::Gray)),
            ];
            if p.running {
                spans.push(Span::styled(" ▶", Style::default().fg(RUNNING_COLOR)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect::<Vec<_>>();

    let list = List::new(items)
        .block(block)
        .highlight_symbol(">> ")
        .highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

    let mut state = ListState::default();
    state.select(engine.selected_index());
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_project_detail<S: ProjectStore>(
    frame: &mut Frame,
    area: Rect,
    engine: &TimerEngine<S>,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(INACTIVE_BORDER_COLOR))
        .title("Timer");
    let Some(project) = engine.selected_project() else {
        frame.render_widget(Paragraph::new("Select a project").block(block), area);
        return;
    };

    let inner = block.inner(area);
    frame.render_widget(block, area);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(1),
            Constraint::Min(3),
        ])
        .split(inner);

    frame.render_widget(Paragraph::new(summary_lines(project)), rows[0]);

    let done = progress(project.elapsed, project.max_time);
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(if project.running {
            RUNNING_COLOR
        } else {
            Color::Blue
        }))
        .ratio(done.ratio())
        .label(done.to_string());
    frame.render_widget(gauge, rows[1]);

    let logs = engine.logs_for(project.id);
    let mut lines = vec![Line::styled(
        "Recent logs",
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if logs.is_empty() {
        lines.push(Line::from("  nothing logged yet"));
    }
    lines.extend(logs.iter().take(RECENT_LOGS).map(log_line));
    frame.render_widget(Paragraph::new(lines), rows[2]);
}

fn summary_lines(project: &Project) -> Vec<Line<'static>> {
    let remaining_style = if project.running {
        Style::default()
            .fg(RUNNING_COLOR)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let status = match (project.running, project.is_complete()) {
        (true, _) => "Running",
        (false, true) => "Done",
        (false, false) => "Paused",
    };
    vec![
        Line::from(format!("Project: {}", project.name)),
        Line::styled(format_clock(project.remaining()), remaining_style),
        Line::from(status),
        Line::from(format!("Max: {}", format_clock(project.max_time))),
        Line::from(format!("Elapsed: {}", format_clock(project.elapsed))),
    ]
}

fn log_line(log: &TimeLog) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            format!(
                "  {}  ",
                log.stopped_at.with_timezone(&Local).format("%b %d %H:%M")
            ),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(format_session(log.duration)),
    ];
    if !log.tag.is_empty() {
        spans.push(Span::styled(
            format!(" [{}]", log.tag),
            Style::default().fg(Color::Cyan),
        ));
    }
    Line::from(spans)
}

fn render_all_logs(frame: &mut Frame, area: Rect, view: &LogView) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(FOCUSED_BORDER_COLOR))
        .title(format!("All logs ({})", view.entries.len()));

    if view.entries.is_empty() {
        frame.render_widget(Paragraph::new("No logs yet").block(block), area);
        return;
    }

    let items = view
        .entries
        .iter()
        .map(|entry| {
            let mut line = log_line(&entry.log);
            line.spans.insert(
                1,
                Span::styled(
                    format!("{}  ", entry.project_name),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            );
            ListItem::new(line)
        })
        .collect::<Vec<_>>();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));
    let mut state = ListState::default();
    state.select(Some(view.scroll.min(view.entries.len() - 1)));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_footer<S: ProjectStore>(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    engine: &TimerEngine<S>,
) {
    let lines = if engine.is_awaiting_tag() {
        vec![Line::from("Enter save | Esc skip (no tag)")]
    } else {
        match &app.mode {
            Mode::Normal => vec![Line::from(
                "j/k or arrows select | Enter/Space start/stop | r reset | n new | e edit \
                 | d delete | l logs | q quit",
            )],
            Mode::Form(_) => vec![Line::from("Tab switch field | Enter next/save | Esc cancel")],
            Mode::Logs(_) => vec![Line::from("j/k or arrows scroll | q/Esc/l back")],
        }
    };
    let mut lines = lines;
    lines.push(Line::from(app.status.clone()));

    let footer =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
    frame.render_widget(footer, area);
}

fn render_form_popup(frame: &mut Frame, form: &ProjectForm) {
    let area = centered_rect(50, 30, frame.area());
    frame.render_widget(Clear, area);

    let title = if form.editing.is_some() {
        "Edit project"
    } else {
        "Add project"
    };
    let field = |label: &str, value: &str, focused: bool| {
        let style = if focused {
            Style::default().fg(FOCUSED_BORDER_COLOR)
        } else {
            Style::default().fg(INACTIVE_BORDER_COLOR)
        };
        let marker = if focused { "> " } else { "  " };
        let cursor = if focused { "█" } else { "" };
        Line::from(vec![
            Span::styled(format!("{marker}{label}: "), style),
            Span::raw(format!("{value}{cursor}")),
        ])
    };
    let lines = vec![
        field("Name", &form.name, form.focus == FormField::Name),
        Line::from(""),
        field(
            "Duration (min or 1h30m)",
            &form.duration,
            form.focus == FormField::Duration,
        ),
    ];
    let popup = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(FOCUSED_BORDER_COLOR))
            .title(title),
    );
    frame.render_widget(popup, area);
}

fn render_tag_popup(frame: &mut Frame, buffer: &str, pending: Option<&TimeLog>) {
    let area = centered_rect(50, 25, frame.area());
    frame.render_widget(Clear, area);

    let duration = pending
        .map(|log| format_session(log.duration))
        .unwrap_or_default();
    let lines = vec![
        Line::from(format!("Session duration: {duration}")),
        Line::from(""),
        Line::from(vec![
            Span::styled("Tag: ", Style::default().fg(FOCUSED_BORDER_COLOR)),
            Span::raw(format!("{buffer}█")),
        ]),
    ];
    let popup = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(FOCUSED_BORDER_COLOR))
            .title("Log session"),
    );
    frame.render_widget(popup, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::time::sleep;

    use super::draw;
    use crate::{
        engine::TimerEngine,
        storage::project_store::SqliteStore,
        tui::app::App,
        utils::clock::testing::PausedClock,
    };

    fn rendered<S: crate::storage::project_store::ProjectStore>(
        app: &App,
        engine: &TimerEngine<S>,
    ) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| draw(frame, app, engine)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_renders_remaining_and_prompt() -> Result<()> {
        let mut engine = TimerEngine::new(
            SqliteStore::open_in_memory()?,
            Box::new(PausedClock::new()),
        )?;
        let app = App::default();
        assert!(rendered(&app, &engine).contains("No projects yet"));

        let id = engine.add_project("Write", "25")?;
        engine.toggle(id)?;
        sleep(Duration::from_millis(3500)).await;
        engine.advance_display();
        let screen = rendered(&app, &engine);
        assert!(screen.contains("Write"));
        assert!(screen.contains("00:24:57"));

        engine.toggle(id)?;
        engine.tag_input('d');
        let screen = rendered(&app, &engine);
        assert!(screen.contains("Log session"));
        assert!(screen.contains("Tag: d"));
        Ok(())
    }
}

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, warn};

use crate::{
    engine::{TimerEngine, ToggleOutcome},
    storage::{
        entities::{LogWithProject, ProjectId},
        project_store::ProjectStore,
    },
};

/// Whether the event loop keeps going after a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Duration,
}

/// Add or edit form. `editing` is `None` when adding.
#[derive(Debug, Clone)]
pub struct ProjectForm {
    pub editing: Option<ProjectId>,
    pub name: String,
    pub duration: String,
    pub focus: FormField,
}

impl ProjectForm {
    fn add() -> Self {
        Self {
            editing: None,
            name: String::new(),
            duration: String::new(),
            focus: FormField::Name,
        }
    }

    fn edit(id: ProjectId, name: &str, max_time: Duration) -> Self {
        Self {
            editing: Some(id),
            name: name.to_string(),
            duration: duration_input(max_time),
            focus: FormField::Name,
        }
    }

    fn focused(&mut self) -> &mut String {
        match self.focus {
            FormField::Name => &mut self.name,
            FormField::Duration => &mut self.duration,
        }
    }

    fn switch_focus(&mut self) {
        self.focus = match self.focus {
            FormField::Name => FormField::Duration,
            FormField::Duration => FormField::Name,
        };
    }
}

/// Whole minutes when possible so the field reads like what was typed.
fn duration_input(v: Duration) -> String {
    let secs = v.as_secs();
    if secs % 60 == 0 {
        (secs / 60).to_string()
    } else {
        format!("{secs}s")
    }
}

/// Snapshot of every log taken when the view was opened.
#[derive(Debug, Default)]
pub struct LogView {
    pub entries: Vec<LogWithProject>,
    pub scroll: usize,
}

#[derive(Debug, Default)]
pub enum Mode {
    #[default]
    Normal,
    Form(ProjectForm),
    Logs(LogView),
}

#[derive(Debug, Default)]
pub struct App {
    pub mode: Mode,
    pub status: String,
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

impl App {
    /// Routes a key press. An open tag prompt takes every key before anything else.
    pub fn handle_key<S: ProjectStore>(
        &mut self,
        engine: &mut TimerEngine<S>,
        key: KeyEvent,
    ) -> Flow {
        if engine.is_awaiting_tag() {
            self.handle_tag_key(engine, key);
            return Flow::Continue;
        }
        match self.mode {
            Mode::Normal => self.handle_normal_key(engine, key),
            Mode::Form(_) => {
                self.handle_form_key(engine, key);
                Flow::Continue
            }
            Mode::Logs(_) => {
                self.handle_logs_key(key);
                Flow::Continue
            }
        }
    }

    fn report(&mut self, result: Result<()>, success: impl Into<String>) {
        match result {
            Ok(()) => self.status = success.into(),
            Err(e) => {
                warn!("Action failed {e:?}");
                self.status = format!("error: {e}");
            }
        }
    }

    fn handle_normal_key<S: ProjectStore>(
        &mut self,
        engine: &mut TimerEngine<S>,
        key: KeyEvent,
    ) -> Flow {
        if is_ctrl_c(&key) {
            return Flow::Quit;
        }
        let selected = engine.selected_project().map(|p| (p.id, p.name.clone()));
        match key.code {
            KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Up | KeyCode::Char('k') => engine.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => engine.select_next(),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some((id, name)) = selected {
                    match engine.toggle(id) {
                        Ok(ToggleOutcome::Started) => self.status = format!("Started {name}"),
                        Ok(ToggleOutcome::AwaitingTag) | Ok(ToggleOutcome::Stopped) => {
                            self.status = format!("Stopped {name}")
                        }
                        Ok(ToggleOutcome::Ignored) => {}
                        Err(e) => self.report(Err(e), ""),
                    }
                }
            }
            KeyCode::Char('r') => {
                if let Some((id, name)) = selected {
                    let result = engine.reset(id);
                    self.report(result, format!("Reset {name}"));
                }
            }
            KeyCode::Char('n') => self.mode = Mode::Form(ProjectForm::add()),
            KeyCode::Char('e') => {
                if let Some(project) = engine.selected_project() {
                    self.mode = Mode::Form(ProjectForm::edit(
                        project.id,
                        &project.name,
                        project.max_time,
                    ));
                }
            }
            KeyCode::Char('d') => {
                if let Some((id, name)) = selected {
                    let result = engine.delete_project(id);
                    self.report(result, format!("Deleted {name}"));
                }
            }
            KeyCode::Char('l') => match engine.all_logs() {
                Ok(entries) => self.mode = Mode::Logs(LogView { entries, scroll: 0 }),
                Err(e) => {
                    warn!("Failed to load logs {e:?}");
                    self.mode = Mode::Logs(LogView::default());
                    self.status = format!("error: {e}");
                }
            },
            other => debug!("Unbound key {other:?}"),
        }
        Flow::Continue
    }

    fn handle_tag_key<S: ProjectStore>(&mut self, engine: &mut TimerEngine<S>, key: KeyEvent) {
        if is_ctrl_c(&key) {
            let result = engine.cancel_tag();
            self.report(result, "Logged session without tag");
            return;
        }
        match key.code {
            KeyCode::Esc => {
                let result = engine.cancel_tag();
                self.report(result, "Logged session without tag");
            }
            KeyCode::Enter => {
                let result = engine.confirm_tag();
                self.report(result, "Logged session");
            }
            KeyCode::Backspace => engine.tag_backspace(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                engine.tag_input(c)
            }
            _ => {}
        }
    }

    fn handle_form_key<S: ProjectStore>(&mut self, engine: &mut TimerEngine<S>, key: KeyEvent) {
        let Mode::Form(form) = &mut self.mode else {
            return;
        };
        if is_ctrl_c(&key) {
            self.mode = Mode::Normal;
            self.status = "Input cancelled".to_string();
            return;
        }
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.status = "Input cancelled".to_string();
            }
            KeyCode::Tab | KeyCode::BackTab => form.switch_focus(),
            KeyCode::Backspace => {
                form.focused().pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                form.focused().push(c)
            }
            KeyCode::Enter if form.focus == FormField::Name => form.focus = FormField::Duration,
            KeyCode::Enter => {
                if form.name.trim().is_empty() {
                    self.status = "error: name can't be empty".to_string();
                    form.focus = FormField::Name;
                    return;
                }
                let form = form.clone();
                self.mode = Mode::Normal;
                let result = match form.editing {
                    Some(id) => engine.edit_project(id, &form.name, &form.duration),
                    None => engine.add_project(&form.name, &form.duration).map(|_| ()),
                };
                let verb = if form.editing.is_some() { "Saved" } else { "Added" };
                self.report(result, format!("{verb} {}", form.name.trim()));
            }
            _ => {}
        }
    }

    fn handle_logs_key(&mut self, key: KeyEvent) {
        let Mode::Logs(view) = &mut self.mode else {
            return;
        };
        if is_ctrl_c(&key) {
            self.mode = Mode::Normal;
            return;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('l') => self.mode = Mode::Normal,
            KeyCode::Up | KeyCode::Char('k') => view.scroll = view.scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if view.scroll + 1 < view.entries.len() {
                    view.scroll += 1;
                }
            }
            _ => {}
        }
    }
}

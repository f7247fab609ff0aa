//! The timer engine owns every project's live [timer::Timer], the open sessions and the tag
//! prompt, and turns user actions into atomic state changes plus store writes.
//!
//! At most one timer runs between actions. This is kept procedurally: starting a project first
//! auto-stops every other running one, logging their sessions without a tag.
//!
//! Store failures never roll the in-memory state back. A multi step action keeps going after a
//! failed write and reports the first failure once it is done.

use std::collections::HashMap;

use anyhow::{Context, Result};
use session::SessionTracker;
use tag::TagCapture;
use timer::Timer;
use tracing::{debug, error, info, warn};

use crate::{
    storage::{
        entities::{LogWithProject, Project, ProjectId, TimeLog},
        project_store::ProjectStore,
    },
    utils::{clock::Clock, time::parse_max_time},
};

pub mod session;
pub mod shutdown;
pub mod tag;
pub mod ticker;
pub mod timer;

/// What a toggle ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The project is running now, others were auto-stopped.
    Started,
    /// The project stopped and its session waits for a tag.
    AwaitingTag,
    /// The project stopped without an open session, nothing to log.
    Stopped,
    /// Unknown project, or a tag prompt is still open.
    Ignored,
}

/// First failure of a multi step action. Later failures are only logged.
#[derive(Default)]
struct Failures(Option<anyhow::Error>);

impl Failures {
    fn record(&mut self, result: Result<()>, action: &str) {
        if let Err(e) = result {
            error!("Failed to {action}: {e:?}");
            self.0.get_or_insert(e);
        }
    }

    fn into_result<T>(self, value: T) -> Result<T> {
        match self.0 {
            Some(e) => Err(e),
            None => Ok(value),
        }
    }
}

pub struct TimerEngine<S: ProjectStore> {
    store: S,
    clock: Box<dyn Clock>,
    projects: Vec<Project>,
    timers: HashMap<ProjectId, Timer>,
    sessions: SessionTracker,
    logs: HashMap<ProjectId, Vec<TimeLog>>,
    tag_capture: TagCapture,
    selected: Option<usize>,
}

impl<S: ProjectStore> TimerEngine<S> {
    /// Loads every project and its logs from `store`.
    ///
    /// A project that was persisted as running is resumed from its persisted elapsed with a new
    /// session, whatever ran after the last write before the previous exit is lost. Should more
    /// than one be marked running, only the first is resumed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: S, clock: Box<dyn Clock>) -> Result<Self> {
        let projects = store.list_projects().context("Failed to load projects")?;

        let mut logs = HashMap::new();
        let mut timers = HashMap::new();
        for project in &projects {
            let project_logs = store
                .list_logs_for_project(project.id)
                .inspect_err(|e| warn!("Failed to load logs of project {}: {e:?}", project.id))
                .unwrap_or_default();
            logs.insert(project.id, project_logs);
            timers.insert(project.id, Timer::new());
        }

        let selected = (!projects.is_empty()).then_some(0);
        let mut engine = Self {
            store,
            clock,
            projects,
            timers,
            sessions: SessionTracker::default(),
            logs,
            tag_capture: TagCapture::Idle,
            selected,
        };
        engine.resume_persisted_running();
        info!("Loaded {} projects", engine.projects.len());
        Ok(engine)
    }

    fn resume_persisted_running(&mut self) {
        let now = self.clock.time();
        let mut resumed = false;
        for project in self.projects.iter_mut().filter(|p| p.running) {
            if resumed {
                warn!(
                    "Project {} was also persisted as running, stopping it",
                    project.id
                );
                project.running = false;
                if let Err(e) = self.store.update_project(project) {
                    error!("Failed to persist stopped project {}: {e:?}", project.id);
                }
                continue;
            }
            if let Some(timer) = self.timers.get(&project.id) {
                timer.set_elapsed(project.elapsed);
                timer.start();
                self.sessions.open(project.id, now);
                resumed = true;
                info!("Resumed running project {}", project.id);
            }
        }
    }

    /// Snapshot of all projects with their last refreshed elapsed time.
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn running_project(&self) -> Option<&Project> {
        self.projects.iter().find(|p| p.running)
    }

    /// Cached logs of a project, newest first.
    pub fn logs_for(&self, id: ProjectId) -> &[TimeLog] {
        self.logs.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every stored log with its project name, newest first. Read straight from the store.
    pub fn all_logs(&self) -> Result<Vec<LogWithProject>> {
        self.store.list_all_logs()
    }

    pub fn session_started_at(&self, id: ProjectId) -> Option<chrono::DateTime<chrono::Utc>> {
        self.sessions.started_at(id)
    }

    pub fn is_awaiting_tag(&self) -> bool {
        self.tag_capture.is_awaiting()
    }

    pub fn pending_log(&self) -> Option<&TimeLog> {
        self.tag_capture.pending()
    }

    pub fn tag_buffer(&self) -> Option<&str> {
        self.tag_capture.buffer()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_project(&self) -> Option<&Project> {
        self.selected.and_then(|i| self.projects.get(i))
    }

    pub fn select_next(&mut self) {
        if let Some(i) = self.selected {
            if i + 1 < self.projects.len() {
                self.selected = Some(i + 1);
            }
        }
    }

    pub fn select_previous(&mut self) {
        if let Some(i) = self.selected {
            self.selected = Some(i.saturating_sub(1));
        }
    }

    /// Copies live elapsed values from running timers into their projects. Only the display is
    /// refreshed, sessions keep their own wall-clock start.
    pub fn advance_display(&mut self) {
        for project in &mut self.projects {
            if let Some(timer) = self.timers.get(&project.id) {
                if timer.running() {
                    project.elapsed = timer.elapsed();
                }
            }
        }
    }

    /// Starts a stopped project or stops a running one.
    ///
    /// Starting auto-stops every other running project and logs their sessions untagged.
    /// Stopping opens the tag prompt when a session was open, the log is written once the
    /// prompt is resolved.
    pub fn toggle(&mut self, id: ProjectId) -> Result<ToggleOutcome> {
        if self.tag_capture.is_awaiting() {
            debug!("Ignoring toggle of {id} while a tag prompt is open");
            return Ok(ToggleOutcome::Ignored);
        }
        let Some(index) = self.index_of(id) else {
            debug!("Ignoring toggle of unknown project {id}");
            return Ok(ToggleOutcome::Ignored);
        };
        if self.timer_running(id) {
            self.stop_interactive(index)
        } else {
            self.start_exclusive(index)
        }
    }

    fn start_exclusive(&mut self, index: usize) -> Result<ToggleOutcome> {
        let mut failures = Failures::default();
        let id = self.projects[index].id;

        let others = (0..self.projects.len())
            .filter(|&i| i != index && self.timer_running(self.projects[i].id))
            .collect::<Vec<_>>();
        if others.len() > 1 {
            warn!("Found {} running projects, stopping all of them", others.len());
        }
        for other in others {
            if let Some(log) = self.halt(other, &mut failures) {
                info!("Auto-stopped project {}", log.project_id);
                self.commit_log(log, &mut failures);
            }
        }

        let now = self.clock.time();
        let project = &mut self.projects[index];
        if let Some(timer) = self.timers.get(&id) {
            timer.set_elapsed(project.elapsed);
            timer.start();
        }
        self.sessions.open(id, now);
        project.running = true;
        failures.record(self.store.update_project(project), "persist started project");
        info!("Started project {id}");

        failures.into_result(ToggleOutcome::Started)
    }

    fn stop_interactive(&mut self, index: usize) -> Result<ToggleOutcome> {
        let mut failures = Failures::default();
        let outcome = match self.halt(index, &mut failures) {
            Some(pending) => {
                self.tag_capture.begin(pending);
                ToggleOutcome::AwaitingTag
            }
            None => ToggleOutcome::Stopped,
        };
        info!("Stopped project {}", self.projects[index].id);
        failures.into_result(outcome)
    }

    /// Stops the timer of the project at `index`, writes the frozen elapsed back and closes the
    /// open session, if any.
    fn halt(&mut self, index: usize, failures: &mut Failures) -> Option<TimeLog> {
        let now = self.clock.time();
        let project = &mut self.projects[index];
        if let Some(timer) = self.timers.get(&project.id) {
            timer.stop();
            project.elapsed = timer.elapsed();
        }
        project.running = false;
        failures.record(self.store.update_project(project), "persist stopped project");
        self.sessions.close(project.id, now)
    }

    fn commit_log(&mut self, mut log: TimeLog, failures: &mut Failures) {
        match self.store.create_log(&log) {
            Ok(id) => log.id = Some(id),
            Err(e) => failures.record(Err(e), "save log"),
        }
        debug!("Committed log {:?}", log);
        self.logs.entry(log.project_id).or_default().insert(0, log);
    }

    /// Stops the project if running and zeroes it. An open session is dropped without a log.
    pub fn reset(&mut self, id: ProjectId) -> Result<()> {
        let Some(index) = self.index_of(id) else {
            return Ok(());
        };
        if let Some(timer) = self.timers.get(&id) {
            timer.reset();
        }
        if self.sessions.discard(id) {
            debug!("Discarded open session of {id}");
        }
        let project = &mut self.projects[index];
        project.elapsed = std::time::Duration::ZERO;
        project.running = false;
        info!("Reset project {id}");
        self.store.update_project(project)
    }

    /// Creates a project and selects it. `duration_input` goes through
    /// [parse_max_time](crate::utils::time::parse_max_time), so bad input means 25 minutes.
    pub fn add_project(&mut self, name: &str, duration_input: &str) -> Result<ProjectId> {
        let max_time = parse_max_time(duration_input);
        let project = self
            .store
            .create_project(name.trim(), max_time)
            .context("Failed to create project")?;
        let id = project.id;
        self.timers.insert(id, Timer::new());
        self.logs.insert(id, vec![]);
        self.projects.push(project);
        self.selected = Some(self.projects.len() - 1);
        info!("Added project {id} with target {max_time:?}");
        Ok(id)
    }

    /// Renames the project and sets a new target. Elapsed is capped to the new target, the
    /// running state is left alone.
    pub fn edit_project(&mut self, id: ProjectId, name: &str, duration_input: &str) -> Result<()> {
        let Some(index) = self.index_of(id) else {
            return Ok(());
        };
        let max_time = parse_max_time(duration_input);
        let project = &mut self.projects[index];
        project.name = name.trim().to_string();
        project.set_max_time(max_time);
        if let Some(timer) = self.timers.get(&id) {
            if timer.elapsed() > max_time {
                timer.set_elapsed(max_time);
            }
        }
        info!("Edited project {id}");
        self.store.update_project(project)
    }

    /// Forgets the project with its timer, session and logs, then deletes it from the store.
    pub fn delete_project(&mut self, id: ProjectId) -> Result<()> {
        let Some(index) = self.index_of(id) else {
            return Ok(());
        };
        self.projects.remove(index);
        self.timers.remove(&id);
        self.sessions.discard(id);
        self.logs.remove(&id);
        if self.tag_capture.pending().is_some_and(|log| log.project_id == id) {
            // its logs are removed together with it
            self.tag_capture.skip();
        }

        self.selected = match self.selected {
            _ if self.projects.is_empty() => None,
            Some(selected) if index < selected => Some(selected - 1),
            Some(selected) => Some(selected.min(self.projects.len() - 1)),
            None => None,
        };

        info!("Deleted project {id}");
        self.store.delete_project(id)
    }

    pub fn tag_input(&mut self, c: char) {
        self.tag_capture.push(c);
    }

    pub fn tag_backspace(&mut self) {
        self.tag_capture.backspace();
    }

    /// Logs the pending session with the typed tag.
    pub fn confirm_tag(&mut self) -> Result<()> {
        let Some(log) = self.tag_capture.confirm() else {
            return Ok(());
        };
        let mut failures = Failures::default();
        self.commit_log(log, &mut failures);
        failures.into_result(())
    }

    /// Logs the pending session without a tag.
    pub fn cancel_tag(&mut self) -> Result<()> {
        let Some(log) = self.tag_capture.skip() else {
            return Ok(());
        };
        let mut failures = Failures::default();
        self.commit_log(log, &mut failures);
        failures.into_result(())
    }

    /// Flushes everything before exit: an open tag prompt is resolved untagged, running
    /// projects are stopped and logged untagged, and the store is closed.
    pub fn shutdown(mut self) -> Result<()> {
        let mut failures = Failures::default();
        if let Some(log) = self.tag_capture.skip() {
            self.commit_log(log, &mut failures);
        }
        for index in 0..self.projects.len() {
            if !self.timer_running(self.projects[index].id) {
                continue;
            }
            if let Some(log) = self.halt(index, &mut failures) {
                self.commit_log(log, &mut failures);
            }
            info!("Stopped project {} on shutdown", self.projects[index].id);
        }
        failures.record(self.store.close(), "close store");
        failures.into_result(())
    }

    fn index_of(&self, id: ProjectId) -> Option<usize> {
        self.projects.iter().position(|p| p.id == id)
    }

    fn timer_running(&self, id: ProjectId) -> bool {
        self.timers.get(&id).is_some_and(Timer::running)
    }
}

#[cfg(test)]
mod engine_tests {
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use chrono::TimeDelta;
    use tempfile::tempdir;
    use tokio::time::sleep;

    use super::{TimerEngine, ToggleOutcome};
    use crate::{
        storage::{
            entities::{Project, ProjectId},
            project_store::{MockProjectStore, ProjectStore, SqliteStore},
        },
        utils::{clock::testing::PausedClock, logging::TEST_LOGGING},
    };

    fn engine() -> TimerEngine<SqliteStore> {
        *TEST_LOGGING;
        TimerEngine::new(
            SqliteStore::open_in_memory().unwrap(),
            Box::new(PausedClock::new()),
        )
        .unwrap()
    }

    fn running_count<S: ProjectStore>(engine: &TimerEngine<S>) -> usize {
        engine.projects().iter().filter(|p| p.running).count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_scenario() -> Result<()> {
        let mut engine = engine();
        let write = engine.add_project("Write", "25")?;

        assert_eq!(engine.toggle(write)?, ToggleOutcome::Started);
        sleep(Duration::from_millis(3500)).await;
        engine.advance_display();
        assert_eq!(engine.project(write).unwrap().elapsed, Duration::from_secs(3));

        assert_eq!(engine.toggle(write)?, ToggleOutcome::AwaitingTag);
        assert!(engine.logs_for(write).is_empty());
        for c in "draft".chars() {
            engine.tag_input(c);
        }
        engine.confirm_tag()?;

        let logs = engine.logs_for(write);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].tag, "draft");
        assert_eq!(logs[0].duration.num_seconds(), 3);
        assert_eq!(logs[0].duration, logs[0].stopped_at - logs[0].started_at);
        assert!(logs[0].id.is_some());

        let project = engine.project(write).unwrap();
        assert_eq!(project.elapsed, Duration::from_secs(3));
        assert!(!project.running);
        assert_eq!(project.remaining(), Duration::from_secs(24 * 60 + 57));
        assert!(!engine.is_awaiting_tag());

        let stored = engine.all_logs()?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].project_name, "Write");
        assert_eq!(stored[0].log.tag, "draft");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_tag_logs_empty_tag() -> Result<()> {
        let mut engine = engine();
        let id = engine.add_project("Read", "10")?;
        engine.toggle(id)?;
        sleep(Duration::from_millis(2500)).await;
        engine.toggle(id)?;
        engine.tag_input('x');
        engine.cancel_tag()?;

        let logs = engine.logs_for(id);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].tag, "");
        assert_eq!(logs[0].duration, TimeDelta::milliseconds(2500));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_starting_auto_stops_other() -> Result<()> {
        let mut engine = engine();
        let a = engine.add_project("A", "10")?;
        let b = engine.add_project("B", "10")?;

        engine.toggle(b)?;
        sleep(Duration::from_millis(2500)).await;
        assert_eq!(engine.toggle(a)?, ToggleOutcome::Started);

        let project_b = engine.project(b).unwrap();
        assert!(!project_b.running);
        assert_eq!(project_b.elapsed, Duration::from_secs(2));
        assert_eq!(engine.logs_for(b).len(), 1);
        assert_eq!(engine.logs_for(b)[0].tag, "");
        assert!(engine.session_started_at(b).is_none());
        assert!(!engine.is_awaiting_tag());

        assert!(engine.project(a).unwrap().running);
        assert!(engine.session_started_at(a).is_some());
        assert_eq!(running_count(&engine), 1);

        // b's frozen elapsed doesn't move anymore
        sleep(Duration::from_millis(2200)).await;
        engine.advance_display();
        assert_eq!(engine.project(b).unwrap().elapsed, Duration::from_secs(2));
        assert_eq!(engine.project(a).unwrap().elapsed, Duration::from_secs(2));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_continues_from_persisted_elapsed() -> Result<()> {
        let mut engine = engine();
        let id = engine.add_project("Write", "25")?;
        engine.toggle(id)?;
        sleep(Duration::from_millis(2500)).await;
        engine.toggle(id)?;
        engine.cancel_tag()?;

        engine.toggle(id)?;
        sleep(Duration::from_millis(1500)).await;
        engine.advance_display();
        assert_eq!(engine.project(id).unwrap().elapsed, Duration::from_secs(3));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_running_over_sequence() -> Result<()> {
        let mut engine = engine();
        let ids = [
            engine.add_project("A", "5")?,
            engine.add_project("B", "5")?,
            engine.add_project("C", "5")?,
        ];
        let sequence = [0, 1, 1, 2, 0, 0, 2, 1, 2, 2, 0, 1];
        for (step, &which) in sequence.iter().enumerate() {
            let outcome = engine.toggle(ids[which])?;
            if outcome == ToggleOutcome::AwaitingTag {
                if step % 2 == 0 {
                    engine.confirm_tag()?;
                } else {
                    engine.cancel_tag()?;
                }
            }
            assert!(running_count(&engine) <= 1, "step {step}");
            sleep(Duration::from_millis(1100)).await;
            engine.advance_display();
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_running_discards_session() -> Result<()> {
        let mut engine = engine();
        let id = engine.add_project("Write", "25")?;
        engine.toggle(id)?;
        sleep(Duration::from_millis(2500)).await;
        engine.reset(id)?;

        let project = engine.project(id).unwrap();
        assert_eq!(project.elapsed, Duration::ZERO);
        assert!(!project.running);
        assert!(engine.session_started_at(id).is_none());
        assert!(engine.logs_for(id).is_empty());
        assert!(engine.all_logs()?.is_empty());
        assert!(!engine.is_awaiting_tag());

        sleep(Duration::from_secs(2)).await;
        engine.advance_display();
        assert_eq!(engine.project(id).unwrap().elapsed, Duration::ZERO);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_clamps_elapsed() -> Result<()> {
        let mut engine = engine();
        let id = engine.add_project("Write", "25")?;
        engine.toggle(id)?;
        sleep(Duration::from_millis(90_500)).await;
        engine.advance_display();

        engine.edit_project(id, " Rewrite ", "1")?;
        let project = engine.project(id).unwrap();
        assert_eq!(project.name, "Rewrite");
        assert_eq!(project.max_time, Duration::from_secs(60));
        assert_eq!(project.elapsed, Duration::from_secs(60));
        assert!(project.running);
        assert!(project.is_complete());
        assert_eq!(project.remaining(), Duration::ZERO);

        engine.edit_project(id, "Rewrite", "garbage")?;
        let project = engine.project(id).unwrap();
        assert_eq!(project.max_time, Duration::from_secs(25 * 60));
        assert_eq!(project.elapsed, Duration::from_secs(60));
        assert!(project.running);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_project_defaults_and_selection() -> Result<()> {
        let mut engine = engine();
        assert!(engine.selected_project().is_none());
        let a = engine.add_project("A", "0")?;
        assert_eq!(engine.project(a).unwrap().max_time, Duration::from_secs(25 * 60));
        let b = engine.add_project("B", "")?;
        assert_eq!(engine.selected_project().map(|p| p.id), Some(b));

        engine.select_previous();
        engine.select_previous();
        assert_eq!(engine.selected_index(), Some(0));
        engine.select_next();
        engine.select_next();
        assert_eq!(engine.selected_index(), Some(1));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_updates_selection() -> Result<()> {
        let mut engine = engine();
        let a = engine.add_project("A", "5")?;
        let b = engine.add_project("B", "5")?;
        let c = engine.add_project("C", "5")?;

        engine.toggle(c)?;
        engine.delete_project(c)?;
        assert_eq!(engine.selected_project().map(|p| p.id), Some(b));
        assert!(engine.running_project().is_none());
        assert!(engine.session_started_at(c).is_none());

        engine.select_previous();
        engine.delete_project(b)?;
        assert_eq!(engine.selected_project().map(|p| p.id), Some(a));

        engine.delete_project(a)?;
        assert_eq!(engine.selected_index(), None);
        assert!(engine.projects().is_empty());

        // unknown ids are no-ops
        engine.delete_project(a)?;
        assert_eq!(engine.toggle(a)?, ToggleOutcome::Ignored);
        engine.reset(a)?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_drops_own_pending_log() -> Result<()> {
        let mut engine = engine();
        let a = engine.add_project("A", "5")?;
        engine.toggle(a)?;
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(engine.toggle(a)?, ToggleOutcome::AwaitingTag);
        engine.tag_input('x');

        engine.delete_project(a)?;
        assert!(!engine.is_awaiting_tag());
        assert!(engine.pending_log().is_none());
        assert!(engine.tag_buffer().is_none());

        // nothing left to commit
        engine.confirm_tag()?;
        engine.cancel_tag()?;
        assert!(engine.all_logs()?.is_empty());
        assert!(engine.logs_for(a).is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_other_project_keeps_pending_log() -> Result<()> {
        let mut engine = engine();
        let a = engine.add_project("A", "5")?;
        let b = engine.add_project("B", "5")?;
        engine.toggle(a)?;
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(engine.toggle(a)?, ToggleOutcome::AwaitingTag);

        engine.delete_project(b)?;
        assert!(engine.is_awaiting_tag());
        assert_eq!(engine.pending_log().map(|log| log.project_id), Some(a));

        engine.tag_input('o');
        engine.tag_input('k');
        engine.confirm_tag()?;
        assert!(!engine.is_awaiting_tag());

        let logs = engine.logs_for(a);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].tag, "ok");
        assert_eq!(logs[0].duration, TimeDelta::milliseconds(1500));
        let stored = engine.all_logs()?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].project_name, "A");
        assert_eq!(stored[0].log.tag, "ok");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_ignored_while_awaiting_tag() -> Result<()> {
        let mut engine = engine();
        let a = engine.add_project("A", "5")?;
        let b = engine.add_project("B", "5")?;
        engine.toggle(a)?;
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(engine.toggle(a)?, ToggleOutcome::AwaitingTag);
        assert_eq!(engine.toggle(b)?, ToggleOutcome::Ignored);
        assert!(!engine.project(b).unwrap().running);
        engine.confirm_tag()?;
        assert_eq!(engine.toggle(b)?, ToggleOutcome::Started);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_logs_running_project() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let path = dir.path().join("timeboxer.db");
        {
            let mut engine =
                TimerEngine::new(SqliteStore::open(&path)?, Box::new(PausedClock::new()))?;
            let id = engine.add_project("Write", "25")?;
            engine.toggle(id)?;
            sleep(Duration::from_millis(4500)).await;
            engine.shutdown()?;
        }

        let store = SqliteStore::open(&path)?;
        let projects = store.list_projects()?;
        assert!(!projects[0].running);
        assert_eq!(projects[0].elapsed, Duration::from_secs(4));
        let logs = store.list_all_logs()?;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].log.tag, "");
        assert_eq!(logs[0].log.duration, TimeDelta::milliseconds(4500));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_resolves_open_prompt() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("timeboxer.db");
        {
            let mut engine =
                TimerEngine::new(SqliteStore::open(&path)?, Box::new(PausedClock::new()))?;
            let id = engine.add_project("Write", "25")?;
            engine.toggle(id)?;
            sleep(Duration::from_millis(1500)).await;
            engine.toggle(id)?;
            engine.tag_input('a');
            engine.shutdown()?;
        }
        let store = SqliteStore::open(&path)?;
        let logs = store.list_all_logs()?;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].log.tag, "");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_resumes_single_running_project() -> Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let mut a = store.create_project("A", Duration::from_secs(600))?;
        let mut b = store.create_project("B", Duration::from_secs(600))?;
        a.running = true;
        a.elapsed = Duration::from_secs(30);
        b.running = true;
        store.update_project(&a)?;
        store.update_project(&b)?;

        let mut engine = TimerEngine::new(store, Box::new(PausedClock::new()))?;
        assert_eq!(running_count(&engine), 1);
        assert!(engine.project(a.id).unwrap().running);
        assert!(engine.session_started_at(a.id).is_some());
        assert!(!engine.project(b.id).unwrap().running);

        sleep(Duration::from_millis(1500)).await;
        engine.advance_display();
        assert_eq!(engine.project(a.id).unwrap().elapsed, Duration::from_secs(31));

        assert_eq!(engine.toggle(b.id)?, ToggleOutcome::Started);
        assert_eq!(engine.logs_for(a.id).len(), 1);
        assert_eq!(running_count(&engine), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_keeps_memory_state() -> Result<()> {
        let mut store = MockProjectStore::new();
        store.expect_list_projects().returning(|| {
            Ok(vec![Project {
                id: ProjectId(7),
                name: "Write".into(),
                max_time: Duration::from_secs(600),
                running: false,
                elapsed: Duration::ZERO,
            }])
        });
        store
            .expect_list_logs_for_project()
            .returning(|_| Err(anyhow!("disk on fire")));
        store
            .expect_update_project()
            .returning(|_| Err(anyhow!("write rejected")));
        store
            .expect_create_log()
            .times(1)
            .returning(|_| Err(anyhow!("write rejected")));

        let mut engine = TimerEngine::new(store, Box::new(PausedClock::new()))?;
        assert!(engine.toggle(ProjectId(7)).is_err());
        assert!(engine.project(ProjectId(7)).unwrap().running);

        sleep(Duration::from_millis(1500)).await;
        assert!(engine.toggle(ProjectId(7)).is_err());
        assert!(engine.is_awaiting_tag());
        assert!(engine.confirm_tag().is_err());

        let logs = engine.logs_for(ProjectId(7));
        assert_eq!(logs.len(), 1);
        assert!(logs[0].id.is_none());
        assert!(!engine.is_awaiting_tag());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_load_is_fatal() {
        let mut store = MockProjectStore::new();
        store
            .expect_list_projects()
            .returning(|| Err(anyhow!("unreachable")));
        assert!(TimerEngine::new(store, Box::new(PausedClock::new())).is_err());
    }
}

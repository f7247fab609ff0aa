use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::warn;

use crate::storage::entities::{ProjectId, TimeLog};

/// Wall-clock start of every open session, keyed by project.
///
/// This is what logged durations are computed from. The timer's own elapsed counter only feeds
/// the live display, so the two may differ by up to one tick.
#[derive(Debug, Default)]
pub struct SessionTracker {
    starts: HashMap<ProjectId, DateTime<Utc>>,
}

impl SessionTracker {
    /// Records `at`, cut to the millisecond precision logs are stored with.
    pub fn open(&mut self, project: ProjectId, at: DateTime<Utc>) {
        let at = at.trunc_subsecs(3);
        if let Some(previous) = self.starts.insert(project, at) {
            warn!("Project {project} already had a session open since {previous}, replacing it");
        }
    }

    /// Closes the open session of `project` and returns its unsaved, untagged log. `None` when
    /// nothing was open.
    pub fn close(&mut self, project: ProjectId, at: DateTime<Utc>) -> Option<TimeLog> {
        let started_at = self.starts.remove(&project)?;
        Some(TimeLog::for_session(project, started_at, at))
    }

    /// Drops the open session without producing a log.
    pub fn discard(&mut self, project: ProjectId) -> bool {
        self.starts.remove(&project).is_some()
    }

    pub fn started_at(&self, project: ProjectId) -> Option<DateTime<Utc>> {
        self.starts.get(&project).copied()
    }
}

use std::{fmt::Display, time::Duration};

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the store when a project is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub i64);

impl Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub i64);

/// A named unit of tracked work with a target duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(with = "secs_ser")]
    pub max_time: Duration,
    pub running: bool,
    #[serde(with = "secs_ser")]
    pub elapsed: Duration,
}

impl Project {
    pub fn remaining(&self) -> Duration {
        self.max_time.saturating_sub(self.elapsed)
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.max_time
    }

    /// Applies a new target. Elapsed is capped to it, the running flag is left alone.
    pub fn set_max_time(&mut self, max_time: Duration) {
        self.max_time = max_time;
        if self.elapsed > max_time {
            self.elapsed = max_time;
        }
    }
}

/// Durable record of one completed session. `id` is `None` until the store accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLog {
    pub id: Option<LogId>,
    pub project_id: ProjectId,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    #[serde(with = "millis_ser")]
    pub duration: TimeDelta,
    pub tag: String,
}

impl TimeLog {
    /// Builds an unsaved log for a session. The duration is always `stopped_at - started_at`.
    ///
    /// Both stamps are cut to milliseconds, the precision they are stored with, so the relation
    /// still holds after a reload.
    pub fn for_session(
        project_id: ProjectId,
        started_at: DateTime<Utc>,
        stopped_at: DateTime<Utc>,
    ) -> Self {
        let started_at = started_at.trunc_subsecs(3);
        let stopped_at = stopped_at.trunc_subsecs(3);
        Self {
            id: None,
            project_id,
            started_at,
            stopped_at,
            duration: stopped_at - started_at,
            tag: String::new(),
        }
    }

    pub fn with_tag(self, tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..self
        }
    }
}

/// A log joined with the name of its project, used by the flat log listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogWithProject {
    #[serde(flatten)]
    pub log: TimeLog,
    pub project_name: String,
}

mod secs_ser {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

mod millis_ser {
    use chrono::TimeDelta;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<TimeDelta, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(TimeDelta::milliseconds(i64::deserialize(deserializer)?))
    }
}

//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by every funnel view.
//! - Provide name normalization used by callers before `add_task`.
//!
//! # Invariants
//! - `id` is stable and never reused for another task in a live collection.
//! - `updated_at` is never earlier than `created_at`.
//! - `optimize` defaults to `more`, `status` defaults to `todo`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Default cap applied to task names by UI callers.
pub const MAX_TASK_NAME_CHARS: usize = 64;

static WHITESPACE_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Opaque task identifier.
///
/// New ids are UUID v4 text, but persisted ids of any non-blank form are
/// accepted so older collections keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a fresh unique id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing id value.
    ///
    /// # Errors
    /// - Returns `TaskValidationError::BlankId` when `value` is blank.
    pub fn parse(value: impl Into<String>) -> Result<Self, TaskValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(TaskValidationError::BlankId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stage-1 classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Survey {
    Primary,
    Secondary,
}

/// Stage-2 classification, meaningful only for `Survey::Primary` tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Higher,
    Lower,
}

/// Stage-3 classification, meaningful only for `Priority::Higher` tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimize {
    #[default]
    More,
    Less,
}

/// Stage-4 lifecycle state, orthogonal to the classification axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Blocked,
    Done,
}

impl Survey {
    pub const ALL: [Self; 2] = [Self::Primary, Self::Secondary];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl Priority {
    pub const ALL: [Self; 2] = [Self::Higher, Self::Lower];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Higher => "higher",
            Self::Lower => "lower",
        }
    }
}

impl Optimize {
    pub const ALL: [Self; 2] = [Self::More, Self::Less];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::More => "more",
            Self::Less => "less",
        }
    }
}

impl TaskStatus {
    pub const ALL: [Self; 4] = [Self::Todo, Self::Doing, Self::Blocked, Self::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Doing => "doing",
            Self::Blocked => "blocked",
            Self::Done => "done",
        }
    }

    pub fn is_done(self) -> bool {
        self == Self::Done
    }
}

/// Model-level validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Task id is empty or whitespace only.
    BlankId,
    /// `updated_at` precedes `created_at`.
    InvalidTimestamps { created_at: i64, updated_at: i64 },
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankId => write!(f, "task id must not be blank"),
            Self::InvalidTimestamps {
                created_at,
                updated_at,
            } => write!(
                f,
                "updatedAt ({updated_at}) must be >= createdAt ({created_at})"
            ),
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical task record.
///
/// Classification fields keep whatever value a previous pass through the
/// funnel left behind, even when the current stage ignores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    /// Display name. Callers cap it via `normalize_task_name`.
    pub name: String,
    /// `None` means unclassified; such tasks never reach stage 2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey: Option<Survey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub optimize: Optimize,
    #[serde(default)]
    pub status: TaskStatus,
    /// Marks seeded demo tasks so they can be removed in bulk.
    #[serde(default, skip_serializing_if = "is_false")]
    pub demo: bool,
    /// Legacy single-field group label, written only by `move_task`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Task {
    /// Creates a task with a fresh id and default `optimize`/`status`.
    pub fn new(name: impl Into<String>, survey: Option<Survey>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: TaskId::generate(),
            name: name.into(),
            survey,
            priority: None,
            optimize: Optimize::default(),
            status: TaskStatus::default(),
            demo: false,
            group: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates record-level invariants.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.id.as_str().trim().is_empty() {
            return Err(TaskValidationError::BlankId);
        }
        if self.updated_at < self.created_at {
            return Err(TaskValidationError::InvalidTimestamps {
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }
        Ok(())
    }

    /// Refreshes `updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self) {
        self.updated_at = now_epoch_ms().max(self.created_at);
    }

    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }
}

/// Field set accepted by `TaskStore::add_task`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub survey: Option<Survey>,
    pub priority: Option<Priority>,
    /// Defaults to `Optimize::More`.
    pub optimize: Option<Optimize>,
    /// Defaults to `TaskStatus::Todo`.
    pub status: Option<TaskStatus>,
    pub demo: bool,
}

impl NewTask {
    pub fn new(name: impl Into<String>, survey: Survey) -> Self {
        Self {
            name: name.into(),
            survey: Some(survey),
            ..Self::default()
        }
    }
}

/// Partial update merged by `TaskStore::update_task`.
///
/// Outer `None` leaves a field untouched; for optional fields the inner
/// `Option` is the new value (so `Some(None)` clears it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub survey: Option<Option<Survey>>,
    pub priority: Option<Option<Priority>>,
    pub optimize: Option<Optimize>,
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub(crate) fn apply_to(self, task: &mut Task) {
        if let Some(name) = self.name {
            task.name = name;
        }
        if let Some(survey) = self.survey {
            task.survey = survey;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(optimize) = self.optimize {
            task.optimize = optimize;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
    }
}

/// Normalizes raw user input into a task name.
///
/// Trims, collapses internal whitespace runs to one space and caps the
/// result to `max_chars` characters. Returns `None` for blank input.
pub fn normalize_task_name(raw: &str, max_chars: usize) -> Option<String> {
    let collapsed = WHITESPACE_RUN_RE.replace_all(raw.trim(), " ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(max_chars).collect())
}

/// Current wall clock as Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

fn is_false(value: &bool) -> bool {
    !*value
}

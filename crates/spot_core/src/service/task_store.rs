//! Canonical task store.
//!
//! # Responsibility
//! - Hold the ordered task sequence and expose CRUD, query and funnel views.
//! - Persist the whole sequence and notify subscribers after every commit.
//! - Provide import/export, migration and demo seeding.
//!
//! # Invariants
//! - The global order is the display order of every axis view; views are
//!   stable filters, never separately ordered lists.
//! - Persistence failures never roll back or fail an in-memory mutation;
//!   the latest failure is kept in `last_persist_error`.
//! - Subscribers run in registration order, after persistence.
//! - A persisted value that did not load cleanly is copied to
//!   `<storage_key>.backup` before the main key is written again.

use crate::config::{ConfigError, SpotConfig, DEFAULT_STORAGE_KEY};
use crate::model::axis::AxisValue;
use crate::model::task::{
    NewTask, Optimize, Priority, Survey, Task, TaskId, TaskPatch, TaskStatus,
};
use crate::repo::kv_repo::{KvRepository, StorageError};
use crate::repo::task_codec::{
    decode_tasks, encode_tasks, export_document, parse_import, ImportError, ImportRecord,
};
use crate::service::reorder::{relocate, ReorderOutcome, ReorderSink};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors surfaced by store operations.
#[derive(Debug)]
pub enum StoreError {
    /// No task with this id exists.
    NotFound(TaskId),
    /// Import payload rejected; state unchanged.
    Import(ImportError),
    /// Export encoding failed.
    Storage(StorageError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::Import(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Import(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<ImportError> for StoreError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Handle returned by `subscribe`; pass it to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&[Task])>;

/// Task store over a durable key-value repository.
pub struct TaskStore<R: KvRepository> {
    repo: R,
    storage_key: String,
    tasks: Vec<Task>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
    pending_upgrade: usize,
    pending_backup: Option<String>,
    last_persist_error: Option<StorageError>,
}

impl<R: KvRepository> TaskStore<R> {
    /// Opens a store under the default storage key.
    pub fn new(repo: R) -> Self {
        Self::open(repo, DEFAULT_STORAGE_KEY.to_string())
    }

    /// Validates `config`, then loads the persisted sequence and runs
    /// `migrate`.
    ///
    /// Records that cannot be repaired are logged and skipped; the raw
    /// value is kept under `backup_key` first.
    pub fn with_config(repo: R, config: &SpotConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::open(repo, config.storage_key.clone()))
    }

    fn open(repo: R, storage_key: String) -> Self {
        let mut store = Self {
            repo,
            storage_key,
            tasks: Vec::new(),
            observers: Vec::new(),
            next_subscription: 0,
            pending_upgrade: 0,
            pending_backup: None,
            last_persist_error: None,
        };
        store.load();
        store.migrate();
        store
    }

    /// Key holding the last persisted value that did not load cleanly.
    pub fn backup_key(&self) -> String {
        format!("{}.backup", self.storage_key)
    }

    fn load(&mut self) {
        let raw = match self.repo.get(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!("event=task_load module=store status=ok count=0 source=empty");
                return;
            }
            Err(err) => {
                error!("event=task_load module=store status=error error_code=read_failed error={err}");
                return;
            }
        };

        match decode_tasks(&raw) {
            Ok(decoded) => {
                for dropped in &decoded.dropped {
                    warn!(
                        "event=task_load module=store status=skip index={} reason={}",
                        dropped.index, dropped.reason
                    );
                }
                info!(
                    "event=task_load module=store status=ok count={} upgraded={} dropped={}",
                    decoded.tasks.len(),
                    decoded.upgraded,
                    decoded.dropped.len()
                );
                if !decoded.dropped.is_empty() {
                    self.pending_backup = Some(raw);
                }
                self.pending_upgrade = decoded.upgraded + decoded.dropped.len();
                self.tasks = decoded.tasks;
            }
            Err(err) => {
                error!("event=task_load module=store status=error error_code=decode_failed error={err}");
                self.pending_backup = Some(raw);
            }
        }
        self.write_backup();
    }

    /// Writes the pending backup; returns false while it is still owed.
    fn write_backup(&mut self) -> bool {
        let Some(raw) = self.pending_backup.take() else {
            return true;
        };
        let key = self.backup_key();
        match self.repo.set(&key, &raw) {
            Ok(()) => {
                info!("event=task_backup module=store status=ok key={key} bytes={}", raw.len());
                true
            }
            Err(err) => {
                error!("event=task_backup module=store status=error error_code=write_failed key={key} error={err}");
                self.pending_backup = Some(raw);
                self.last_persist_error = Some(err);
                false
            }
        }
    }

    /// Rewrites the collection when records loaded repaired or were skipped.
    ///
    /// Returns whether anything was written; a second call is a no-op.
    pub fn migrate(&mut self) -> bool {
        if self.pending_upgrade == 0 {
            return false;
        }
        let upgraded = self.pending_upgrade;
        self.pending_upgrade = 0;
        self.persist();
        info!("event=task_migrate module=store status=ok upgraded={upgraded}");
        true
    }

    // ---- mutations ----

    /// Appends a new task with a fresh id and returns it.
    pub fn add_task(&mut self, fields: NewTask) -> Task {
        let mut task = Task::new(fields.name, fields.survey);
        task.priority = fields.priority;
        task.optimize = fields.optimize.unwrap_or_default();
        task.status = fields.status.unwrap_or_default();
        task.demo = fields.demo;

        debug!("event=task_add module=store status=ok task_id={}", task.id);
        self.tasks.push(task.clone());
        self.commit();
        task
    }

    /// Merges `patch` into the task and refreshes `updated_at`.
    ///
    /// An empty patch returns the task unchanged without a commit.
    pub fn update_task(&mut self, id: &TaskId, patch: TaskPatch) -> StoreResult<Task> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| &task.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if patch.is_empty() {
            return Ok(task.clone());
        }
        patch.apply_to(task);
        task.touch();
        let updated = task.clone();

        debug!("event=task_update module=store status=ok task_id={id}");
        self.commit();
        Ok(updated)
    }

    /// Removes one task and returns it.
    pub fn delete_task(&mut self, id: &TaskId) -> StoreResult<Task> {
        let index = self
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let removed = self.tasks.remove(index);

        debug!("event=task_delete module=store status=ok task_id={id}");
        self.commit();
        Ok(removed)
    }

    /// Empties the collection; returns how many tasks were removed.
    pub fn clear_all_tasks(&mut self) -> usize {
        let removed = self.tasks.len();
        self.tasks.clear();
        info!("event=task_clear module=store status=ok removed={removed}");
        self.commit();
        removed
    }

    /// Legacy single-field move: sets the group label without reordering.
    pub fn move_task(&mut self, id: &TaskId, group: impl Into<String>) -> StoreResult<()> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| &task.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        task.group = Some(group.into());
        task.touch();
        self.commit();
        Ok(())
    }

    /// Moves a task into `target`'s group at a group-relative index.
    ///
    /// Returns `Rejected` without touching anything when the axis
    /// precondition fails; an out-of-range index appends to the tail.
    pub fn move_and_reorder(
        &mut self,
        id: &TaskId,
        target: AxisValue,
        index_in_group: usize,
    ) -> StoreResult<ReorderOutcome> {
        let outcome = relocate(&mut self.tasks, id, target, index_in_group)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        match outcome {
            ReorderOutcome::Moved { from, to } => {
                debug!(
                    "event=task_reorder module=store status=ok task_id={id} target={target} index={index_in_group} from={from} to={to}"
                );
                self.commit();
            }
            ReorderOutcome::Rejected => {
                debug!(
                    "event=task_reorder module=store status=skip task_id={id} target={target} reason=axis_precondition"
                );
            }
        }
        Ok(outcome)
    }

    pub fn move_to_survey_and_reorder(
        &mut self,
        id: &TaskId,
        survey: Survey,
        index_in_group: usize,
    ) -> StoreResult<ReorderOutcome> {
        self.move_and_reorder(id, AxisValue::Survey(survey), index_in_group)
    }

    /// No-op (`Rejected`) unless the task's survey is primary.
    pub fn move_to_priority_and_reorder(
        &mut self,
        id: &TaskId,
        priority: Priority,
        index_in_group: usize,
    ) -> StoreResult<ReorderOutcome> {
        self.move_and_reorder(id, AxisValue::Priority(priority), index_in_group)
    }

    /// No-op (`Rejected`) unless the task's priority is higher.
    pub fn move_to_optimize_and_reorder(
        &mut self,
        id: &TaskId,
        optimize: Optimize,
        index_in_group: usize,
    ) -> StoreResult<ReorderOutcome> {
        self.move_and_reorder(id, AxisValue::Optimize(optimize), index_in_group)
    }

    pub fn move_to_status_and_reorder(
        &mut self,
        id: &TaskId,
        status: TaskStatus,
        index_in_group: usize,
    ) -> StoreResult<ReorderOutcome> {
        self.move_and_reorder(id, AxisValue::Status(status), index_in_group)
    }

    /// Defaults a missing priority to `higher` for tasks entering the
    /// Prioritize stage (primary, not done). Returns how many changed.
    pub fn ensure_priority_defaults(&mut self) -> usize {
        let mut changed = 0;
        for task in self
            .tasks
            .iter_mut()
            .filter(|task| task.survey == Some(Survey::Primary) && !task.is_done())
            .filter(|task| task.priority.is_none())
        {
            task.priority = Some(Priority::Higher);
            task.touch();
            changed += 1;
        }
        if changed > 0 {
            debug!("event=task_priority_default module=store status=ok changed={changed}");
            self.commit();
        }
        changed
    }

    /// Appends the demo task set; returns how many were added.
    pub fn seed_demo_tasks(&mut self) -> usize {
        let demo = [
            ("Review project requirements", Survey::Primary, Priority::Higher, Optimize::More),
            ("Create project timeline", Survey::Primary, Priority::Lower, Optimize::More),
            ("Set up development environment", Survey::Primary, Priority::Higher, Optimize::Less),
            ("Start coding core features", Survey::Secondary, Priority::Higher, Optimize::More),
        ];
        for (name, survey, priority, optimize) in demo {
            let mut task = Task::new(name, Some(survey));
            task.priority = Some(priority);
            task.optimize = optimize;
            task.demo = true;
            self.tasks.push(task);
        }
        info!("event=task_demo_seed module=store status=ok added={}", demo.len());
        self.commit();
        demo.len()
    }

    /// Removes every task flagged `demo`; returns how many were removed.
    pub fn remove_demo_tasks(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| !task.demo);
        let removed = before - self.tasks.len();
        info!("event=task_demo_remove module=store status=ok removed={removed}");
        self.commit();
        removed
    }

    /// Replaces the whole collection; every record gets a fresh id.
    pub fn import_tasks(&mut self, records: Vec<ImportRecord>) -> usize {
        self.tasks = records.into_iter().map(ImportRecord::into_task).collect();
        let count = self.tasks.len();
        info!("event=task_import module=store status=ok count={count}");
        self.commit();
        count
    }

    /// Parses, validates and imports a JSON payload.
    ///
    /// On error nothing is mutated, persisted or notified.
    pub fn import_json(&mut self, text: &str) -> StoreResult<usize> {
        let records = parse_import(text).map_err(|err| {
            warn!("event=task_import module=store status=error error_code=invalid_payload error={err}");
            err
        })?;
        Ok(self.import_tasks(records))
    }

    /// Pretty-printed JSON document of the full sequence.
    pub fn export_tasks(&self) -> StoreResult<String> {
        Ok(export_document(&self.tasks)?)
    }

    // ---- queries ----

    pub fn get_task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    /// Borrowed view of the global sequence.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Owned copy of the global sequence.
    pub fn all_tasks(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks_by_survey(&self, survey: Survey) -> Vec<Task> {
        self.filtered(|task| task.survey == Some(survey))
    }

    pub fn tasks_by_priority(&self, priority: Priority) -> Vec<Task> {
        self.filtered(|task| task.priority == Some(priority))
    }

    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.filtered(|task| task.status == status)
    }

    /// Survey stage group: matching survey, not done.
    pub fn survey_view(&self, survey: Survey) -> Vec<Task> {
        self.filtered(|task| task.survey == Some(survey) && !task.is_done())
    }

    /// Prioritize stage group: primary, not done, matching priority.
    pub fn prioritize_view(&self, priority: Priority) -> Vec<Task> {
        self.filtered(|task| {
            task.survey == Some(Survey::Primary)
                && !task.is_done()
                && task.priority == Some(priority)
        })
    }

    /// Optimize stage group: primary, not done, higher, matching optimize.
    pub fn optimize_view(&self, optimize: Optimize) -> Vec<Task> {
        self.filtered(|task| {
            task.survey == Some(Survey::Primary)
                && !task.is_done()
                && task.priority == Some(Priority::Higher)
                && task.optimize == optimize
        })
    }

    /// Action stage group: every task with this status.
    pub fn action_view(&self, status: TaskStatus) -> Vec<Task> {
        self.tasks_by_status(status)
    }

    /// Funnel view for the group a stage container is tagged with.
    pub fn stage_view(&self, zone: AxisValue) -> Vec<Task> {
        match zone {
            AxisValue::Survey(value) => self.survey_view(value),
            AxisValue::Priority(value) => self.prioritize_view(value),
            AxisValue::Optimize(value) => self.optimize_view(value),
            AxisValue::Status(value) => self.action_view(value),
        }
    }

    // ---- subscriptions ----

    /// Registers an observer called with the sequence after every commit.
    pub fn subscribe(&mut self, observer: impl FnMut(&[Task]) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns whether a subscription was removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    // ---- persistence ----

    /// Latest persistence failure, cleared by the next successful write.
    pub fn last_persist_error(&self) -> Option<&StorageError> {
        self.last_persist_error.as_ref()
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    fn commit(&mut self) {
        self.persist();
        self.notify();
    }

    fn persist(&mut self) {
        if !self.write_backup() {
            warn!(
                "event=task_persist module=store status=skip reason=backup_pending count={}",
                self.tasks.len()
            );
            return;
        }
        let result = encode_tasks(&self.tasks)
            .and_then(|encoded| self.repo.set(&self.storage_key, &encoded));
        match result {
            Ok(()) => self.last_persist_error = None,
            Err(err) => {
                warn!(
                    "event=task_persist module=store status=error error_code=write_failed count={} error={err}",
                    self.tasks.len()
                );
                self.last_persist_error = Some(err);
            }
        }
    }

    fn notify(&mut self) {
        for (_, observer) in &mut self.observers {
            observer(&self.tasks);
        }
    }

    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| &task.id == id)
    }

    fn filtered(&self, predicate: impl Fn(&Task) -> bool) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| predicate(task))
            .cloned()
            .collect()
    }
}

impl<R: KvRepository> ReorderSink for TaskStore<R> {
    fn move_and_reorder(
        &mut self,
        id: &TaskId,
        target: AxisValue,
        index_in_group: usize,
    ) -> StoreResult<ReorderOutcome> {
        TaskStore::move_and_reorder(self, id, target, index_in_group)
    }
}

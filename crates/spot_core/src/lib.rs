//! Core domain logic for SPOT task triage.
//! The task store is the single source of truth for order and axis values.

pub mod config;
pub mod db;
pub mod interaction;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, SpotConfig};
pub use interaction::controller::{
    DragController, DragState, GestureError, GestureEvent, GestureOutcome, ReorderCommand,
};
pub use interaction::host::{ContainerId, DragHost, ItemStyle, Point, Rect};
pub use interaction::layout::StaticLayout;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::axis::{Axis, AxisValue, Stage};
pub use model::task::{
    normalize_task_name, NewTask, Optimize, Priority, Survey, Task, TaskId, TaskPatch,
    TaskStatus, TaskValidationError,
};
pub use repo::kv_repo::{
    KvRepository, MemoryKvRepository, SqliteKvRepository, StorageError, StorageResult,
};
pub use repo::task_codec::{ImportError, ImportRecord};
pub use service::reorder::{ReorderOutcome, ReorderSink};
pub use service::task_store::{StoreError, StoreResult, SubscriptionId, TaskStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Task triage domain model.
//!
//! # Responsibility
//! - Define the canonical task record and its four classification axes.
//! - Define funnel stages and the tagged axis values used for grouping.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId` assigned by the store.
//! - Axis values are plain data; stale values survive stage changes.

pub mod axis;
pub mod task;

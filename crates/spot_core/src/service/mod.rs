//! Task store and reorder engine.
//!
//! # Responsibility
//! - Own the canonical ordered task sequence and its mutation API.
//! - Persist and notify after every committed mutation.
//! - Keep UI/host layers decoupled from storage details.

pub mod reorder;
pub mod task_store;

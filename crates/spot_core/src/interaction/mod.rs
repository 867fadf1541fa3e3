//! Drag-and-drop interaction for axis-tagged task containers.
//!
//! # Responsibility
//! - Track one in-flight mouse or touch drag as an explicit state value.
//! - Resolve the drop container's axis tag and the insertion index from the
//!   live container contents at drop time.
//! - Forward the resulting move to the reorder engine.
//!
//! # Invariants
//! - At most one drag is active per controller.
//! - Drops on untagged containers never mutate anything.
//! - No gesture is retried; every commit is a single attempt.

pub mod controller;
pub mod host;
pub mod layout;

//! Position-preserving reorder engine.
//!
//! # Responsibility
//! - Relocate one task into a group at a group-relative index by moving it
//!   within the single global sequence.
//!
//! # Invariants
//! - The relative order of every other task is unchanged.
//! - After a move to index `k`, the task is the `k`-th member of the target
//!   group, or its last member when `k` is past the end.
//! - An out-of-range index never fails; it appends to the global tail.

use crate::model::axis::AxisValue;
use crate::model::task::{Task, TaskId};
use crate::service::task_store::StoreError;

/// Result of a reorder request against an existing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// Task moved from one global index to another (possibly the same).
    Moved { from: usize, to: usize },
    /// Axis precondition not met (e.g. priority move on a secondary task);
    /// the sequence is untouched.
    Rejected,
}

impl ReorderOutcome {
    pub fn is_moved(self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

/// Seam through which gesture handling invokes the reorder engine.
pub trait ReorderSink {
    /// Moves `id` into `target`'s group at `index_in_group`.
    ///
    /// # Errors
    /// - `StoreError::NotFound` when `id` is not in the collection.
    fn move_and_reorder(
        &mut self,
        id: &TaskId,
        target: AxisValue,
        index_in_group: usize,
    ) -> Result<ReorderOutcome, StoreError>;
}

/// Applies the reorder algorithm to `tasks`.
///
/// Returns `None` when `id` is absent.
pub(crate) fn relocate(
    tasks: &mut Vec<Task>,
    id: &TaskId,
    target: AxisValue,
    index_in_group: usize,
) -> Option<ReorderOutcome> {
    let from = tasks.iter().position(|task| &task.id == id)?;
    if !target.admits(&tasks[from]) {
        return Some(ReorderOutcome::Rejected);
    }

    let mut task = tasks.remove(from);
    target.assign(&mut task);
    task.touch();

    let to = insertion_index(tasks, target, index_in_group);
    tasks.insert(to, task);
    Some(ReorderOutcome::Moved { from, to })
}

/// Global index just before the group member currently at `index_in_group`,
/// or the global tail when the group is shorter than that.
fn insertion_index(tasks: &[Task], target: AxisValue, index_in_group: usize) -> usize {
    tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| target.contains(task))
        .nth(index_in_group)
        .map_or(tasks.len(), |(index, _)| index)
}

/// Position of `id` within `target`'s group, if it is a member.
pub fn group_position(tasks: &[Task], id: &TaskId, target: AxisValue) -> Option<usize> {
    tasks
        .iter()
        .filter(|task| target.contains(task))
        .position(|task| &task.id == id)
}

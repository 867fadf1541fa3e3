//! Classification axes, tagged axis values and funnel stages.
//!
//! # Invariants
//! - A group is the set of tasks for which `AxisValue::contains` holds.
//! - Priority groups only admit `survey = primary` tasks; optimize groups
//!   only admit `priority = higher` tasks.

use crate::model::task::{Optimize, Priority, Survey, Task, TaskStatus};
use std::fmt::{Display, Formatter};

/// One of the four classification dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Survey,
    Priority,
    Optimize,
    Status,
}

impl Axis {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Survey => "survey",
            Self::Priority => "priority",
            Self::Optimize => "optimize",
            Self::Status => "status",
        }
    }
}

/// A concrete value on one axis; names one group.
///
/// The renderer tags every drop container with one of these when it builds
/// the container, so the drag controller never has to sniff markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisValue {
    Survey(Survey),
    Priority(Priority),
    Optimize(Optimize),
    Status(TaskStatus),
}

impl AxisValue {
    pub fn axis(self) -> Axis {
        match self {
            Self::Survey(_) => Axis::Survey,
            Self::Priority(_) => Axis::Priority,
            Self::Optimize(_) => Axis::Optimize,
            Self::Status(_) => Axis::Status,
        }
    }

    /// Whether `task` may be moved along this value's axis at all.
    pub fn admits(self, task: &Task) -> bool {
        match self {
            Self::Priority(_) => task.survey == Some(Survey::Primary),
            Self::Optimize(_) => task.priority == Some(Priority::Higher),
            Self::Survey(_) | Self::Status(_) => true,
        }
    }

    /// Group membership used by the reorder engine.
    pub fn contains(self, task: &Task) -> bool {
        if !self.admits(task) {
            return false;
        }
        match self {
            Self::Survey(value) => task.survey == Some(value),
            Self::Priority(value) => task.priority == Some(value),
            Self::Optimize(value) => task.optimize == value,
            Self::Status(value) => task.status == value,
        }
    }

    /// Writes this value into the matching task field.
    pub fn assign(self, task: &mut Task) {
        match self {
            Self::Survey(value) => task.survey = Some(value),
            Self::Priority(value) => task.priority = Some(value),
            Self::Optimize(value) => task.optimize = value,
            Self::Status(value) => task.status = value,
        }
    }

    fn value_str(self) -> &'static str {
        match self {
            Self::Survey(value) => value.as_str(),
            Self::Priority(value) => value.as_str(),
            Self::Optimize(value) => value.as_str(),
            Self::Status(value) => value.as_str(),
        }
    }
}

impl Display for AxisValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.axis().as_str(), self.value_str())
    }
}

/// Funnel stage, in navigation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Survey,
    Prioritize,
    Optimize,
    Action,
}

impl Stage {
    pub const ALL: [Self; 4] = [Self::Survey, Self::Prioritize, Self::Optimize, Self::Action];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Survey => "survey",
            Self::Prioritize => "prioritize",
            Self::Optimize => "optimize",
            Self::Action => "action",
        }
    }

    /// Axis whose groups this stage displays.
    pub fn axis(self) -> Axis {
        match self {
            Self::Survey => Axis::Survey,
            Self::Prioritize => Axis::Priority,
            Self::Optimize => Axis::Optimize,
            Self::Action => Axis::Status,
        }
    }

    /// Groups rendered by this stage, in display order.
    pub fn groups(self) -> Vec<AxisValue> {
        match self {
            Self::Survey => Survey::ALL.into_iter().map(AxisValue::Survey).collect(),
            Self::Prioritize => Priority::ALL.into_iter().map(AxisValue::Priority).collect(),
            Self::Optimize => Optimize::ALL.into_iter().map(AxisValue::Optimize).collect(),
            Self::Action => TaskStatus::ALL.into_iter().map(AxisValue::Status).collect(),
        }
    }

    pub fn next(self) -> Option<Self> {
        let index = self.index();
        Self::ALL.get(index + 1).copied()
    }

    pub fn previous(self) -> Option<Self> {
        let index = self.index();
        index.checked_sub(1).map(|prev| Self::ALL[prev])
    }

    pub fn is_first(self) -> bool {
        self.previous().is_none()
    }

    pub fn is_last(self) -> bool {
        self.next().is_none()
    }

    fn index(self) -> usize {
        match self {
            Self::Survey => 0,
            Self::Prioritize => 1,
            Self::Optimize => 2,
            Self::Action => 3,
        }
    }
}

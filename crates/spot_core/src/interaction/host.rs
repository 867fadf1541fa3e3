//! Host-side view of the rendered containers.

use crate::model::axis::AxisValue;
use crate::model::task::TaskId;

/// Renderer-assigned container handle; stable until the next re-render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u32);

/// Viewport coordinates in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned rectangle; `contains` is strict on every edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x > self.left
            && point.x < self.left + self.width
            && point.y > self.top
            && point.y < self.top + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// Visual state the controller asks the host to apply to a task item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemStyle {
    /// Back in normal layout flow.
    Normal,
    /// Source of a native mouse drag.
    Dragging,
    /// Detached from layout and offset to follow the finger.
    Lifted { dx: f32, dy: f32 },
}

/// Rendering layer as seen by the drag controller.
///
/// Query methods must reflect the live layout at call time; the controller
/// never caches container contents across events.
pub trait DragHost {
    /// Axis tag attached to a container when it was built.
    fn zone(&self, container: ContainerId) -> Option<AxisValue>;
    /// Task ids currently rendered in the container, in display order.
    fn children(&self, container: ContainerId) -> Vec<TaskId>;
    /// Topmost container under a viewport point.
    fn container_at(&self, point: Point) -> Option<ContainerId>;
    /// Task item under a point inside `container`.
    fn item_at(&self, _container: ContainerId, _point: Point) -> Option<TaskId> {
        None
    }
    fn set_highlight(&mut self, _container: ContainerId, _on: bool) {}
    fn set_item_style(&mut self, _task: &TaskId, _style: ItemStyle) {}
}

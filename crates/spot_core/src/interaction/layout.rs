//! In-memory `DragHost` used by tests and headless callers.
//!
//! Containers are laid out as fixed-width columns with fixed-height rows;
//! every column keeps one empty row at the bottom as a drop area.

use crate::interaction::host::{ContainerId, DragHost, ItemStyle, Point, Rect};
use crate::model::axis::{AxisValue, Stage};
use crate::model::task::TaskId;
use crate::repo::kv_repo::KvRepository;
use crate::service::task_store::TaskStore;
use std::collections::{BTreeSet, HashMap};

pub const COLUMN_WIDTH: f32 = 200.0;
pub const COLUMN_GAP: f32 = 20.0;
pub const ROW_HEIGHT: f32 = 40.0;

#[derive(Debug, Clone)]
struct LayoutContainer {
    id: ContainerId,
    zone: Option<AxisValue>,
    bounds: Rect,
    children: Vec<TaskId>,
}

#[derive(Debug, Default)]
pub struct StaticLayout {
    containers: Vec<LayoutContainer>,
    highlighted: BTreeSet<ContainerId>,
    styles: HashMap<TaskId, ItemStyle>,
}

impl StaticLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one column per stage group from the store's funnel views.
    pub fn for_stage<R: KvRepository>(store: &TaskStore<R>, stage: Stage) -> Self {
        let mut layout = Self::new();
        for zone in stage.groups() {
            let ids = store
                .stage_view(zone)
                .into_iter()
                .map(|task| task.id)
                .collect();
            layout.push_column(Some(zone), ids);
        }
        layout
    }

    /// Appends a column to the right of existing ones.
    pub fn push_column(&mut self, zone: Option<AxisValue>, children: Vec<TaskId>) -> ContainerId {
        let id = ContainerId(u32::try_from(self.containers.len()).unwrap_or(u32::MAX));
        let column = self.containers.len() as f32;
        let bounds = Rect::new(
            column * (COLUMN_WIDTH + COLUMN_GAP),
            0.0,
            COLUMN_WIDTH,
            (children.len() + 1) as f32 * ROW_HEIGHT,
        );
        self.containers.push(LayoutContainer {
            id,
            zone,
            bounds,
            children,
        });
        id
    }

    /// Replaces a column's contents, as a re-render would.
    pub fn set_children(&mut self, container: ContainerId, children: Vec<TaskId>) {
        if let Some(entry) = self.container_mut(container) {
            entry.bounds.height = (children.len() + 1) as f32 * ROW_HEIGHT;
            entry.children = children;
        }
    }

    pub fn container_ids(&self) -> Vec<ContainerId> {
        self.containers.iter().map(|entry| entry.id).collect()
    }

    /// Container tagged with `zone`, if rendered.
    pub fn container_for(&self, zone: AxisValue) -> Option<ContainerId> {
        self.containers
            .iter()
            .find(|entry| entry.zone == Some(zone))
            .map(|entry| entry.id)
    }

    /// Center of the row showing `task`.
    pub fn item_point(&self, task: &TaskId) -> Option<Point> {
        self.containers.iter().find_map(|entry| {
            entry
                .children
                .iter()
                .position(|id| id == task)
                .map(|row| row_rect(entry.bounds, row).center())
        })
    }

    /// Center of the empty drop row at the bottom of a container.
    pub fn empty_area_point(&self, container: ContainerId) -> Option<Point> {
        self.container(container)
            .map(|entry| row_rect(entry.bounds, entry.children.len()).center())
    }

    pub fn is_highlighted(&self, container: ContainerId) -> bool {
        self.highlighted.contains(&container)
    }

    pub fn highlighted_count(&self) -> usize {
        self.highlighted.len()
    }

    /// Last style applied to `task`; `Normal` when never styled.
    pub fn item_style(&self, task: &TaskId) -> ItemStyle {
        self.styles.get(task).copied().unwrap_or(ItemStyle::Normal)
    }

    fn container(&self, id: ContainerId) -> Option<&LayoutContainer> {
        self.containers.iter().find(|entry| entry.id == id)
    }

    fn container_mut(&mut self, id: ContainerId) -> Option<&mut LayoutContainer> {
        self.containers.iter_mut().find(|entry| entry.id == id)
    }
}

impl DragHost for StaticLayout {
    fn zone(&self, container: ContainerId) -> Option<AxisValue> {
        self.container(container).and_then(|entry| entry.zone)
    }

    fn children(&self, container: ContainerId) -> Vec<TaskId> {
        self.container(container)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    fn container_at(&self, point: Point) -> Option<ContainerId> {
        self.containers
            .iter()
            .rev()
            .find(|entry| entry.bounds.contains(point))
            .map(|entry| entry.id)
    }

    fn item_at(&self, container: ContainerId, point: Point) -> Option<TaskId> {
        let entry = self.container(container)?;
        entry
            .children
            .iter()
            .enumerate()
            .find(|(row, _)| row_rect(entry.bounds, *row).contains(point))
            .map(|(_, id)| id.clone())
    }

    fn set_highlight(&mut self, container: ContainerId, on: bool) {
        if on {
            self.highlighted.insert(container);
        } else {
            self.highlighted.remove(&container);
        }
    }

    fn set_item_style(&mut self, task: &TaskId, style: ItemStyle) {
        self.styles.insert(task.clone(), style);
    }
}

fn row_rect(bounds: Rect, row: usize) -> Rect {
    Rect::new(
        bounds.left,
        bounds.top + row as f32 * ROW_HEIGHT,
        bounds.width,
        ROW_HEIGHT,
    )
}

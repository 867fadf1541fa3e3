//! Drag gesture state machine.
//!
//! # Responsibility
//! - Translate mouse and touch gestures into reorder commands.
//! - Drive highlight and item-style feedback on the host.
//!
//! # Invariants
//! - The drag session is owned by `DragState`; no process-wide drag field.
//! - Insertion indices come from `DragHost::children` at drop time.
//! - A touch only becomes a drag after the configured hold delay; moving
//!   further than the scroll slop before that cancels it.

use crate::config::SpotConfig;
use crate::interaction::host::{ContainerId, DragHost, ItemStyle, Point};
use crate::model::axis::AxisValue;
use crate::model::task::TaskId;
use crate::service::reorder::ReorderSink;
use crate::service::task_store::StoreError;
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

/// Input delivered by the host, already mapped to task/container handles.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    DragStart {
        task: TaskId,
    },
    DragOver {
        container: ContainerId,
    },
    DragLeave {
        container: ContainerId,
    },
    /// `over` is the sibling item dropped on; `None` for empty space.
    Drop {
        container: ContainerId,
        over: Option<TaskId>,
    },
    DragEnd,
    TouchStart {
        task: TaskId,
        point: Point,
        touches: usize,
        at: Instant,
    },
    TouchMove {
        point: Point,
        at: Instant,
    },
    /// `point` is the changed touch, when the host has one.
    TouchEnd {
        point: Option<Point>,
        at: Instant,
    },
    TouchCancel,
    /// Timer callback used to elapse the touch hold delay.
    Tick {
        at: Instant,
    },
}

/// A resolved drop, ready for the reorder engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderCommand {
    pub task: TaskId,
    pub target: AxisValue,
    pub index: usize,
}

/// Why a gesture ended without a reorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureError {
    /// Drop container carries no axis tag.
    UnclassifiedContainer(ContainerId),
    /// Finger lifted outside every container.
    NoContainerUnderPoint,
    /// Dragged task was removed before the drop.
    TaskVanished(TaskId),
    /// The reorder sink failed for another reason.
    ReorderFailed { task: TaskId, message: String },
}

impl Display for GestureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnclassifiedContainer(id) => write!(f, "container {} has no axis tag", id.0),
            Self::NoContainerUnderPoint => write!(f, "no container under touch point"),
            Self::TaskVanished(id) => write!(f, "dragged task no longer exists: {id}"),
            Self::ReorderFailed { task, message } => {
                write!(f, "reorder of {task} failed: {message}")
            }
        }
    }
}

impl Error for GestureError {}

/// Result of feeding one event to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// Event did not apply to the current state.
    Ignored,
    /// Drag in progress; for `DragOver` the host should allow a drop.
    Tracking,
    /// Reorder issued. `applied` is false when the axis precondition
    /// rejected it (no mutation happened).
    Committed {
        command: ReorderCommand,
        applied: bool,
    },
    /// Mouse drop discarded without mutation.
    Discarded(GestureError),
    /// Touch drag snapped back without mutation.
    Reverted(GestureError),
    /// Drag ended without a drop (drag end, tap, scroll).
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MouseSession {
    pub task: TaskId,
    pub highlighted: Option<ContainerId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TouchSession {
    pub task: TaskId,
    pub origin: Point,
    pub last: Point,
    pub started_at: Instant,
    pub highlighted: Option<ContainerId>,
}

/// Controller state; the drag session lives inside the active variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(MouseSession),
    /// Touch down, hold delay not yet elapsed.
    TouchPending(TouchSession),
    TouchDragging(TouchSession),
}

impl DragState {
    /// Task being dragged, if any.
    pub fn task(&self) -> Option<&TaskId> {
        match self {
            Self::Idle => None,
            Self::Dragging(session) => Some(&session.task),
            Self::TouchPending(session) | Self::TouchDragging(session) => Some(&session.task),
        }
    }
}

pub struct DragController {
    state: DragState,
    touch_delay: Duration,
    scroll_slop: f32,
}

impl DragController {
    pub fn new(config: &SpotConfig) -> Self {
        Self {
            state: DragState::Idle,
            touch_delay: config.touch_drag_delay(),
            scroll_slop: config.touch_scroll_slop_px,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DragState::Idle
    }

    /// Feeds one event through the state machine.
    pub fn handle<H, S>(&mut self, event: GestureEvent, host: &mut H, sink: &mut S) -> GestureOutcome
    where
        H: DragHost + ?Sized,
        S: ReorderSink + ?Sized,
    {
        let state = std::mem::take(&mut self.state);
        let (next, outcome) = self.step(state, event, host, sink);
        self.state = next;
        outcome
    }

    /// Abandons any in-flight drag, e.g. before containers are destroyed.
    pub fn reset<H: DragHost + ?Sized>(&mut self, host: &mut H) -> GestureOutcome {
        match std::mem::take(&mut self.state) {
            DragState::Idle => GestureOutcome::Ignored,
            DragState::Dragging(session) => {
                release(host, &session.task, session.highlighted);
                GestureOutcome::Cancelled
            }
            DragState::TouchPending(session) | DragState::TouchDragging(session) => {
                release(host, &session.task, session.highlighted);
                GestureOutcome::Cancelled
            }
        }
    }

    fn step<H, S>(
        &self,
        state: DragState,
        event: GestureEvent,
        host: &mut H,
        sink: &mut S,
    ) -> (DragState, GestureOutcome)
    where
        H: DragHost + ?Sized,
        S: ReorderSink + ?Sized,
    {
        match state {
            DragState::Idle => self.on_idle(event, host),
            DragState::Dragging(session) => on_mouse(session, event, host, sink),
            DragState::TouchPending(session) => self.on_touch_pending(session, event, host, sink),
            DragState::TouchDragging(session) => on_touch_drag(session, event, host, sink),
        }
    }

    fn on_idle<H>(&self, event: GestureEvent, host: &mut H) -> (DragState, GestureOutcome)
    where
        H: DragHost + ?Sized,
    {
        match event {
            GestureEvent::DragStart { task } => {
                debug!("event=drag_start module=interaction status=ok mode=mouse task_id={task}");
                host.set_item_style(&task, ItemStyle::Dragging);
                let session = MouseSession {
                    task,
                    highlighted: None,
                };
                (DragState::Dragging(session), GestureOutcome::Tracking)
            }
            GestureEvent::TouchStart {
                task,
                point,
                touches: 1,
                at,
            } => {
                let session = TouchSession {
                    task,
                    origin: point,
                    last: point,
                    started_at: at,
                    highlighted: None,
                };
                (DragState::TouchPending(session), GestureOutcome::Tracking)
            }
            _ => (DragState::Idle, GestureOutcome::Ignored),
        }
    }

    fn on_touch_pending<H, S>(
        &self,
        mut session: TouchSession,
        event: GestureEvent,
        host: &mut H,
        sink: &mut S,
    ) -> (DragState, GestureOutcome)
    where
        H: DragHost + ?Sized,
        S: ReorderSink + ?Sized,
    {
        match event {
            GestureEvent::Tick { at } => {
                if self.hold_elapsed(&session, at) {
                    let session = lift(session, host);
                    (DragState::TouchDragging(session), GestureOutcome::Tracking)
                } else {
                    (DragState::TouchPending(session), GestureOutcome::Tracking)
                }
            }
            GestureEvent::TouchMove { point, at } => {
                if self.hold_elapsed(&session, at) {
                    let session = lift(session, host);
                    return on_touch_drag(session, GestureEvent::TouchMove { point, at }, host, sink);
                }
                if point.distance_to(session.origin) > self.scroll_slop {
                    debug!(
                        "event=touch_cancel module=interaction status=skip task_id={} reason=scroll",
                        session.task
                    );
                    return (DragState::Idle, GestureOutcome::Cancelled);
                }
                session.last = point;
                (DragState::TouchPending(session), GestureOutcome::Tracking)
            }
            GestureEvent::TouchEnd { .. } | GestureEvent::TouchCancel => {
                (DragState::Idle, GestureOutcome::Cancelled)
            }
            _ => (DragState::TouchPending(session), GestureOutcome::Ignored),
        }
    }

    fn hold_elapsed(&self, session: &TouchSession, at: Instant) -> bool {
        at.saturating_duration_since(session.started_at) >= self.touch_delay
    }
}

fn on_mouse<H, S>(
    mut session: MouseSession,
    event: GestureEvent,
    host: &mut H,
    sink: &mut S,
) -> (DragState, GestureOutcome)
where
    H: DragHost + ?Sized,
    S: ReorderSink + ?Sized,
{
    match event {
        GestureEvent::DragOver { container } => {
            if host.zone(container).is_none() {
                return (DragState::Dragging(session), GestureOutcome::Ignored);
            }
            move_highlight(host, &mut session.highlighted, Some(container));
            (DragState::Dragging(session), GestureOutcome::Tracking)
        }
        GestureEvent::DragLeave { container } => {
            if session.highlighted == Some(container) {
                move_highlight(host, &mut session.highlighted, None);
            }
            (DragState::Dragging(session), GestureOutcome::Tracking)
        }
        GestureEvent::Drop { container, over } => {
            release(host, &session.task, session.highlighted);
            let outcome = match commit(&session.task, container, over, host, sink) {
                Ok(outcome) => outcome,
                Err(err) => {
                    debug!(
                        "event=drop module=interaction status=skip mode=mouse task_id={} reason={err}",
                        session.task
                    );
                    GestureOutcome::Discarded(err)
                }
            };
            (DragState::Idle, outcome)
        }
        GestureEvent::DragEnd => {
            release(host, &session.task, session.highlighted);
            (DragState::Idle, GestureOutcome::Cancelled)
        }
        _ => (DragState::Dragging(session), GestureOutcome::Ignored),
    }
}

fn on_touch_drag<H, S>(
    mut session: TouchSession,
    event: GestureEvent,
    host: &mut H,
    sink: &mut S,
) -> (DragState, GestureOutcome)
where
    H: DragHost + ?Sized,
    S: ReorderSink + ?Sized,
{
    match event {
        GestureEvent::TouchMove { point, .. } => {
            session.last = point;
            let style = ItemStyle::Lifted {
                dx: point.x - session.origin.x,
                dy: point.y - session.origin.y,
            };
            host.set_item_style(&session.task, style);
            let under = host
                .container_at(point)
                .filter(|container| host.zone(*container).is_some());
            move_highlight(host, &mut session.highlighted, under);
            (DragState::TouchDragging(session), GestureOutcome::Tracking)
        }
        GestureEvent::Tick { .. } => (DragState::TouchDragging(session), GestureOutcome::Tracking),
        GestureEvent::TouchEnd { point, .. } => finish_touch(session, point, host, sink),
        GestureEvent::TouchCancel => finish_touch(session, None, host, sink),
        _ => (DragState::TouchDragging(session), GestureOutcome::Ignored),
    }
}

fn finish_touch<H, S>(
    session: TouchSession,
    point: Option<Point>,
    host: &mut H,
    sink: &mut S,
) -> (DragState, GestureOutcome)
where
    H: DragHost + ?Sized,
    S: ReorderSink + ?Sized,
{
    release(host, &session.task, session.highlighted);
    let point = point.unwrap_or(session.last);

    let resolved = host
        .container_at(point)
        .ok_or(GestureError::NoContainerUnderPoint)
        .and_then(|container| {
            let over = host.item_at(container, point);
            commit(&session.task, container, over, host, sink)
        });

    let outcome = resolved.unwrap_or_else(|err| {
        debug!(
            "event=drop module=interaction status=skip mode=touch task_id={} reason={err}",
            session.task
        );
        GestureOutcome::Reverted(err)
    });
    (DragState::Idle, outcome)
}

/// Shared commit path for mouse and touch drops.
fn commit<H, S>(
    task: &TaskId,
    container: ContainerId,
    over: Option<TaskId>,
    host: &H,
    sink: &mut S,
) -> Result<GestureOutcome, GestureError>
where
    H: DragHost + ?Sized,
    S: ReorderSink + ?Sized,
{
    let target = host
        .zone(container)
        .ok_or(GestureError::UnclassifiedContainer(container))?;
    let children = host.children(container);
    let index = over
        .and_then(|over| children.iter().position(|id| *id == over))
        .unwrap_or(children.len());

    let command = ReorderCommand {
        task: task.clone(),
        target,
        index,
    };
    match sink.move_and_reorder(task, target, index) {
        Ok(outcome) => {
            debug!(
                "event=drop module=interaction status=ok task_id={task} target={target} index={index} applied={}",
                outcome.is_moved()
            );
            Ok(GestureOutcome::Committed {
                command,
                applied: outcome.is_moved(),
            })
        }
        Err(StoreError::NotFound(id)) => Err(GestureError::TaskVanished(id)),
        Err(err) => {
            warn!("event=drop module=interaction status=error error_code=reorder_failed task_id={task} error={err}");
            Err(GestureError::ReorderFailed {
                task: task.clone(),
                message: err.to_string(),
            })
        }
    }
}

fn lift<H: DragHost + ?Sized>(session: TouchSession, host: &mut H) -> TouchSession {
    debug!(
        "event=drag_start module=interaction status=ok mode=touch task_id={}",
        session.task
    );
    host.set_item_style(&session.task, ItemStyle::Lifted { dx: 0.0, dy: 0.0 });
    session
}

fn move_highlight<H: DragHost + ?Sized>(
    host: &mut H,
    current: &mut Option<ContainerId>,
    next: Option<ContainerId>,
) {
    if *current == next {
        return;
    }
    if let Some(previous) = current.take() {
        host.set_highlight(previous, false);
    }
    if let Some(container) = next {
        host.set_highlight(container, true);
    }
    *current = next;
}

fn release<H: DragHost + ?Sized>(host: &mut H, task: &TaskId, highlighted: Option<ContainerId>) {
    if let Some(container) = highlighted {
        host.set_highlight(container, false);
    }
    host.set_item_style(task, ItemStyle::Normal);
}

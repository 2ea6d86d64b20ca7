//! Drag-and-drop placement controller for the weekly calendar
//!
//! The controller owns the per-interaction [`DragPhase`] and the error
//! banner. Every successful placement is persisted through the backend as a
//! single operation, applied optimistically to the [`TaskStore`] and
//! announced once on the [`EventBus`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::TaskBackend;
use crate::colors::ensure_task_color;
use crate::dnd::{DataTransfer, DragPhase, DraggedTask};
use crate::error::CalendarError;
use crate::events::{AppEvent, EventBus};
use crate::grid::{self, CalendarGrid};
use crate::models::{ProjectStepPlacement, ScheduledTask, Slot, TaskEdit, TaskInput, UnscheduledTask};
use crate::store::TaskStore;
use crate::validation::{validate_task_edit, validate_task_input};

const MOVE_FAILED: &str = "Failed to move task. Please try again.";
const PROJECT_SCHEDULE_FAILED: &str = "Failed to schedule project task. Please try again.";
const SCHEDULE_FAILED: &str = "Failed to schedule task. Please try again.";
const ADD_SCHEDULED_FAILED: &str = "Failed to add scheduled task. Please try again.";
const ADD_FAILED: &str = "Failed to add task. Please try again.";
const REMOVE_FAILED: &str = "Failed to remove task. Please try again.";
const UPDATE_FAILED: &str = "Failed to update task. Please try again.";
const DELETE_FAILED: &str = "Failed to delete task. Please try again.";

/// Result of [`CalendarController::add_task`]
#[derive(Debug, Clone, PartialEq)]
pub enum AddedTask {
    Scheduled(ScheduledTask),
    Unscheduled(UnscheduledTask),
}

pub struct CalendarController {
    backend: Arc<dyn TaskBackend>,
    store: Arc<TaskStore>,
    bus: EventBus,
    phase: DragPhase,
    error: Option<String>,
}

impl CalendarController {
    pub fn new(backend: Arc<dyn TaskBackend>, store: Arc<TaskStore>, bus: EventBus) -> Self {
        Self {
            backend,
            store,
            bus,
            phase: DragPhase::Idle,
            error: None,
        }
    }

    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    /// Banner text of the last failure, until dismissed
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Run `f` against a grid of the currently published scheduled tasks
    pub fn with_grid<R>(&self, f: impl FnOnce(&CalendarGrid<'_>) -> R) -> R {
        let snapshot = self.store.snapshot();
        let grid = CalendarGrid::new(&snapshot.scheduled);
        f(&grid)
    }

    /// Capture the drag source and build the payload for the platform
    pub fn start_drag(
        &mut self,
        task: impl Into<DraggedTask>,
    ) -> Result<DataTransfer, CalendarError> {
        let task = task.into();
        let data = match &task {
            DraggedTask::Scheduled(t) => DataTransfer::for_task(t),
            DraggedTask::ProjectStep(t) | DraggedTask::Unscheduled(t) => DataTransfer::for_task(t),
        }
        .map_err(|e| CalendarError::InvalidPayload(e.to_string()))?;

        self.phase = DragPhase::Dragging {
            task_id: task.id().to_string(),
        };
        Ok(data)
    }

    pub fn cancel_drag(&mut self) {
        self.phase = DragPhase::Idle;
    }

    /// Place the dragged task at `day`/`hour`
    ///
    /// On failure the banner is set and both collections are left as they
    /// were. The phase always ends back at idle.
    pub async fn drop(
        &mut self,
        data: &DataTransfer,
        day: u8,
        hour: u8,
    ) -> Result<ScheduledTask, CalendarError> {
        let result = self.place(data, Slot::new(day, hour)).await;
        self.phase = DragPhase::Idle;
        self.report(result)
    }

    async fn place(
        &mut self,
        data: &DataTransfer,
        slot: Slot,
    ) -> Result<ScheduledTask, CalendarError> {
        let payload = data.read_payload().ok_or(CalendarError::NoPayload)?;
        let dragged = DraggedTask::parse(payload)?;

        if !grid::is_valid_slot(slot) {
            return Err(CalendarError::InvalidSlot {
                day: slot.day,
                hour: slot.hour,
            });
        }

        self.phase = DragPhase::Dropped {
            task_id: dragged.id().to_string(),
        };

        let placed = match dragged {
            DraggedTask::Scheduled(task) => self.move_scheduled(task, slot).await?,
            DraggedTask::ProjectStep(task) => self.schedule_project_step(task, slot).await?,
            DraggedTask::Unscheduled(task) => self.schedule_unscheduled(task, slot).await?,
        };

        let overlapping = self.with_grid(|grid| {
            grid.conflicts(slot, &placed.duration, Some(placed.id.as_str())).len()
        });
        if overlapping > 0 {
            debug!("Task {} overlaps {} other tasks", placed.id, overlapping);
        }

        self.bus.publish(AppEvent::TaskMoved);
        info!(
            "Placed task {} on day {} at {}:00",
            placed.id, slot.day, slot.hour
        );

        Ok(placed)
    }

    async fn move_scheduled(
        &self,
        task: ScheduledTask,
        slot: Slot,
    ) -> Result<ScheduledTask, CalendarError> {
        let moved = self
            .backend
            .move_scheduled(&task.id, slot)
            .await
            .map_err(CalendarError::persistence(MOVE_FAILED))?;
        let moved = ensure_task_color(moved);

        let updated = moved.clone();
        self.store
            .modify(move |scheduled, _| upsert(scheduled, updated))
            .await;

        Ok(moved)
    }

    async fn schedule_project_step(
        &self,
        task: UnscheduledTask,
        slot: Slot,
    ) -> Result<ScheduledTask, CalendarError> {
        let (Some(goal_id), Some(step_id)) = (task.project_id.clone(), task.step_id.clone())
        else {
            return Err(CalendarError::MissingStep(task.id));
        };

        let placement = ProjectStepPlacement {
            goal_id,
            step_id,
            task: task.scheduled_at(slot),
        };
        let created = self
            .backend
            .schedule_project_step(placement)
            .await
            .map_err(CalendarError::persistence(PROJECT_SCHEDULE_FAILED))?;

        Ok(self.apply_scheduled_from_pool(&task.id, created).await)
    }

    async fn schedule_unscheduled(
        &self,
        task: UnscheduledTask,
        slot: Slot,
    ) -> Result<ScheduledTask, CalendarError> {
        let created = self
            .backend
            .schedule_unscheduled(&task.id, slot)
            .await
            .map_err(CalendarError::persistence(SCHEDULE_FAILED))?;

        Ok(self.apply_scheduled_from_pool(&task.id, created).await)
    }

    async fn apply_scheduled_from_pool(&self, pool_id: &str, created: ScheduledTask) -> ScheduledTask {
        let created = ensure_task_color(created);

        let added = created.clone();
        self.store
            .modify(|scheduled, unscheduled| {
                unscheduled.retain(|t| t.id != pool_id);
                upsert(scheduled, added);
            })
            .await;

        created
    }

    /// Create a task from the form: scheduled when it carries a slot,
    /// otherwise into the sidebar pool
    pub async fn add_task(&mut self, input: TaskInput) -> Result<AddedTask, CalendarError> {
        let result = self.create(input).await;
        self.report(result)
    }

    async fn create(&self, input: TaskInput) -> Result<AddedTask, CalendarError> {
        validate_task_input(&input).map_err(CalendarError::Validation)?;

        let added = match input.slot {
            Some(slot) => {
                let created = self
                    .backend
                    .add_scheduled(input.to_scheduled(slot))
                    .await
                    .map_err(CalendarError::persistence(ADD_SCHEDULED_FAILED))?;
                let created = ensure_task_color(created);

                let task = created.clone();
                self.store.modify(move |scheduled, _| scheduled.push(task)).await;
                AddedTask::Scheduled(created)
            }
            None => {
                let created = self
                    .backend
                    .add_unscheduled(input.to_unscheduled())
                    .await
                    .map_err(CalendarError::persistence(ADD_FAILED))?;
                let created = ensure_task_color(created);

                let task = created.clone();
                self.store
                    .modify(move |_, unscheduled| unscheduled.insert(0, task))
                    .await;
                AddedTask::Unscheduled(created)
            }
        };

        self.bus.publish(AppEvent::TaskAdded);
        Ok(added)
    }

    /// Take a task off the calendar and put it back in the pool
    pub async fn remove_task(&mut self, id: &str) -> Result<UnscheduledTask, CalendarError> {
        let result = self.unschedule(id).await;
        self.report(result)
    }

    async fn unschedule(&self, id: &str) -> Result<UnscheduledTask, CalendarError> {
        let returned = self
            .backend
            .unschedule(id)
            .await
            .map_err(CalendarError::persistence(REMOVE_FAILED))?;
        let returned = ensure_task_color(returned);

        let task = returned.clone();
        self.store
            .modify(|scheduled, unscheduled| {
                scheduled.retain(|t| t.id != id);
                unscheduled.insert(0, task);
            })
            .await;

        self.bus.publish(AppEvent::TaskMoved);
        Ok(returned)
    }

    pub async fn edit_task(
        &mut self,
        id: &str,
        edit: TaskEdit,
    ) -> Result<ScheduledTask, CalendarError> {
        let result = self.update(id, edit).await;
        self.report(result)
    }

    async fn update(&self, id: &str, edit: TaskEdit) -> Result<ScheduledTask, CalendarError> {
        validate_task_edit(&edit).map_err(CalendarError::Validation)?;

        let updated = self
            .backend
            .update_scheduled(id, edit)
            .await
            .map_err(CalendarError::persistence(UPDATE_FAILED))?;
        let updated = ensure_task_color(updated);

        let task = updated.clone();
        self.store.modify(move |scheduled, _| upsert(scheduled, task)).await;
        Ok(updated)
    }

    pub async fn toggle_complete(&mut self, id: &str) -> Result<ScheduledTask, CalendarError> {
        let result = self.toggle(id).await;
        self.report(result)
    }

    async fn toggle(&self, id: &str) -> Result<ScheduledTask, CalendarError> {
        let completed = self
            .store
            .snapshot()
            .scheduled
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.completed)
            .ok_or_else(|| CalendarError::UnknownTask(id.to_string()))?;

        let updated = self
            .backend
            .set_completed(id, !completed)
            .await
            .map_err(CalendarError::persistence(UPDATE_FAILED))?;
        let updated = ensure_task_color(updated);

        let task = updated.clone();
        self.store.modify(move |scheduled, _| upsert(scheduled, task)).await;
        Ok(updated)
    }

    /// Delete a task from the calendar or the pool
    pub async fn delete_task(&mut self, id: &str) -> Result<(), CalendarError> {
        let result = self.delete(id).await;
        self.report(result)
    }

    async fn delete(&self, id: &str) -> Result<(), CalendarError> {
        let snapshot = self.store.snapshot();

        if snapshot.scheduled.iter().any(|t| t.id == id) {
            self.backend
                .delete_scheduled(id)
                .await
                .map_err(CalendarError::persistence(DELETE_FAILED))?;
        } else if snapshot.unscheduled.iter().any(|t| t.id == id) {
            self.backend
                .delete_unscheduled(id)
                .await
                .map_err(CalendarError::persistence(DELETE_FAILED))?;
        } else {
            return Err(CalendarError::UnknownTask(id.to_string()));
        }

        self.store
            .modify(|scheduled, unscheduled| {
                scheduled.retain(|t| t.id != id);
                unscheduled.retain(|t| t.id != id);
            })
            .await;
        Ok(())
    }

    fn report<T>(&mut self, result: Result<T, CalendarError>) -> Result<T, CalendarError> {
        match &result {
            Ok(_) => self.error = None,
            Err(e) => {
                warn!("Calendar action failed: {}", e);
                self.error = Some(e.user_message());
            }
        }
        result
    }
}

fn upsert(tasks: &mut Vec<ScheduledTask>, task: ScheduledTask) {
    match tasks.iter_mut().find(|t| t.id == task.id) {
        Some(existing) => *existing = task,
        None => tasks.push(task),
    }
}

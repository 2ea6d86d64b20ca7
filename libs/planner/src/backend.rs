//! Task persistence seam
//!
//! The store and the calendar controller only talk to a [`TaskBackend`].
//! Moves between the scheduled and unscheduled collections are single
//! operations so an implementation can make them atomic.

use async_trait::async_trait;

use crate::error::PlannerResult;
use crate::models::{
    NewScheduledTask, NewUnscheduledTask, ProjectStepPlacement, ScheduledTask, Slot, TaskEdit,
    UnscheduledTask,
};

#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn scheduled_tasks(&self) -> PlannerResult<Vec<ScheduledTask>>;

    async fn unscheduled_tasks(&self) -> PlannerResult<Vec<UnscheduledTask>>;

    /// Sidebar tasks derived from incomplete project steps
    async fn project_tasks(&self) -> PlannerResult<Vec<UnscheduledTask>>;

    async fn add_scheduled(&self, task: NewScheduledTask) -> PlannerResult<ScheduledTask>;

    async fn update_scheduled(&self, id: &str, edit: TaskEdit) -> PlannerResult<ScheduledTask>;

    async fn move_scheduled(&self, id: &str, slot: Slot) -> PlannerResult<ScheduledTask>;

    async fn set_completed(&self, id: &str, completed: bool) -> PlannerResult<ScheduledTask>;

    async fn delete_scheduled(&self, id: &str) -> PlannerResult<()>;

    async fn add_unscheduled(&self, task: NewUnscheduledTask) -> PlannerResult<UnscheduledTask>;

    async fn delete_unscheduled(&self, id: &str) -> PlannerResult<()>;

    /// Place an unscheduled task on the calendar, removing it from the pool
    async fn schedule_unscheduled(&self, id: &str, slot: Slot) -> PlannerResult<ScheduledTask>;

    /// Take a scheduled task off the calendar, returning it to the pool
    async fn unschedule(&self, id: &str) -> PlannerResult<UnscheduledTask>;

    /// Create a scheduled task for a project step and complete the step
    async fn schedule_project_step(
        &self,
        placement: ProjectStepPlacement,
    ) -> PlannerResult<ScheduledTask>;
}

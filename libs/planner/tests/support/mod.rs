//! In-memory task backend shared by the planner integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use planner::{
    NewScheduledTask, NewUnscheduledTask, PlannerError, PlannerResult, ProjectStepPlacement,
    ProjectTaskType, ScheduledTask, Slot, TaskBackend, TaskEdit, UnscheduledTask,
};

#[derive(Debug, Default)]
pub struct FakeState {
    pub scheduled: Vec<ScheduledTask>,
    pub unscheduled: Vec<UnscheduledTask>,
    pub project: Vec<UnscheduledTask>,
    pub completed_steps: Vec<String>,
    next_id: usize,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }
}

#[derive(Debug, Default)]
pub struct FakeBackend {
    pub state: Mutex<FakeState>,
    /// Number of full reloads (scheduled collection fetches)
    pub fetches: AtomicUsize,
    pub mutations: AtomicUsize,
    pub fail_fetches: AtomicBool,
    pub fail_mutations: AtomicBool,
    /// Delays applied to successive scheduled fetches
    pub fetch_delays: Mutex<VecDeque<Duration>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unscheduled(self, tasks: Vec<UnscheduledTask>) -> Self {
        self.state.lock().unwrap().unscheduled = tasks;
        self
    }

    pub fn with_scheduled(self, tasks: Vec<ScheduledTask>) -> Self {
        self.state.lock().unwrap().scheduled = tasks;
        self
    }

    pub fn with_project(self, tasks: Vec<UnscheduledTask>) -> Self {
        self.state.lock().unwrap().project = tasks;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn mutate(&self) -> PlannerResult<std::sync::MutexGuard<'_, FakeState>> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(PlannerError::Backend("write failed".into()));
        }
        Ok(self.state.lock().unwrap())
    }
}

pub fn unscheduled(id: &str, name: &str, category: &str, duration: &str) -> UnscheduledTask {
    UnscheduledTask {
        id: id.into(),
        name: name.into(),
        description: None,
        category: category.into(),
        color: String::new(),
        duration: duration.into(),
        project_id: None,
        step_id: None,
        task_type: None,
    }
}

pub fn scheduled(id: &str, name: &str, day: u8, hour: u8) -> ScheduledTask {
    ScheduledTask {
        id: id.into(),
        name: name.into(),
        description: None,
        category: "busywork".into(),
        color: String::new(),
        duration: "1 hour".into(),
        day,
        hour,
        completed: false,
        project_id: None,
        created_at: None,
        updated_at: None,
    }
}

pub fn project_task(goal_id: &str, step_id: &str, name: &str) -> UnscheduledTask {
    UnscheduledTask {
        id: format!("project-{}-ongoing-{}", goal_id, step_id),
        name: name.into(),
        description: None,
        category: "fitness".into(),
        color: "#10B981".into(),
        duration: "1 hour".into(),
        project_id: Some(goal_id.into()),
        step_id: Some(step_id.into()),
        task_type: Some(ProjectTaskType::Ongoing),
    }
}

fn from_new(id: String, task: NewScheduledTask) -> ScheduledTask {
    ScheduledTask {
        id,
        name: task.name,
        description: task.description,
        category: task.category,
        color: task.color,
        duration: task.duration,
        day: task.day,
        hour: task.hour,
        completed: false,
        project_id: task.project_id,
        created_at: None,
        updated_at: None,
    }
}

#[async_trait]
impl TaskBackend for FakeBackend {
    async fn scheduled_tasks(&self) -> PlannerResult<Vec<ScheduledTask>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let tasks = self.state.lock().unwrap().scheduled.clone();

        let delay = self.fetch_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(PlannerError::Backend("fetch failed".into()));
        }
        Ok(tasks)
    }

    async fn unscheduled_tasks(&self) -> PlannerResult<Vec<UnscheduledTask>> {
        Ok(self.state.lock().unwrap().unscheduled.clone())
    }

    async fn project_tasks(&self) -> PlannerResult<Vec<UnscheduledTask>> {
        Ok(self.state.lock().unwrap().project.clone())
    }

    async fn add_scheduled(&self, task: NewScheduledTask) -> PlannerResult<ScheduledTask> {
        let mut state = self.mutate()?;
        let id = state.next_id("s");
        let created = from_new(id, task);
        state.scheduled.push(created.clone());
        Ok(created)
    }

    async fn update_scheduled(&self, id: &str, edit: TaskEdit) -> PlannerResult<ScheduledTask> {
        let mut state = self.mutate()?;
        let task = state
            .scheduled
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| PlannerError::NotFound(id.into()))?;
        task.name = edit.name;
        task.description = edit.description;
        task.category = edit.category;
        task.color = edit.color;
        task.duration = edit.duration;
        Ok(task.clone())
    }

    async fn move_scheduled(&self, id: &str, slot: Slot) -> PlannerResult<ScheduledTask> {
        let mut state = self.mutate()?;
        let task = state
            .scheduled
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| PlannerError::NotFound(id.into()))?;
        task.day = slot.day;
        task.hour = slot.hour;
        Ok(task.clone())
    }

    async fn set_completed(&self, id: &str, completed: bool) -> PlannerResult<ScheduledTask> {
        let mut state = self.mutate()?;
        let task = state
            .scheduled
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| PlannerError::NotFound(id.into()))?;
        task.completed = completed;
        Ok(task.clone())
    }

    async fn delete_scheduled(&self, id: &str) -> PlannerResult<()> {
        let mut state = self.mutate()?;
        state.scheduled.retain(|t| t.id != id);
        Ok(())
    }

    async fn add_unscheduled(&self, task: NewUnscheduledTask) -> PlannerResult<UnscheduledTask> {
        let mut state = self.mutate()?;
        let id = state.next_id("u");
        let created = UnscheduledTask {
            id,
            name: task.name,
            description: task.description,
            category: task.category,
            color: task.color,
            duration: task.duration,
            project_id: task.project_id,
            step_id: None,
            task_type: None,
        };
        state.unscheduled.insert(0, created.clone());
        Ok(created)
    }

    async fn delete_unscheduled(&self, id: &str) -> PlannerResult<()> {
        let mut state = self.mutate()?;
        state.unscheduled.retain(|t| t.id != id);
        Ok(())
    }

    async fn schedule_unscheduled(&self, id: &str, slot: Slot) -> PlannerResult<ScheduledTask> {
        let mut state = self.mutate()?;
        let position = state
            .unscheduled
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| PlannerError::NotFound(id.into()))?;
        let task = state.unscheduled.remove(position);

        let new_id = state.next_id("s");
        let created = from_new(new_id, task.scheduled_at(slot));
        state.scheduled.push(created.clone());
        Ok(created)
    }

    async fn unschedule(&self, id: &str) -> PlannerResult<UnscheduledTask> {
        let mut state = self.mutate()?;
        let position = state
            .scheduled
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| PlannerError::NotFound(id.into()))?;
        let task = state.scheduled.remove(position);

        let new_id = state.next_id("u");
        let back = task.to_unscheduled();
        let returned = UnscheduledTask {
            id: new_id,
            name: back.name,
            description: back.description,
            category: back.category,
            color: back.color,
            duration: back.duration,
            project_id: back.project_id,
            step_id: None,
            task_type: None,
        };
        state.unscheduled.insert(0, returned.clone());
        Ok(returned)
    }

    async fn schedule_project_step(
        &self,
        placement: ProjectStepPlacement,
    ) -> PlannerResult<ScheduledTask> {
        let mut state = self.mutate()?;
        state
            .project
            .retain(|t| t.step_id.as_deref() != Some(placement.step_id.as_str()));
        state.completed_steps.push(placement.step_id);

        let new_id = state.next_id("s");
        let created = from_new(new_id, placement.task);
        state.scheduled.push(created.clone());
        Ok(created)
    }
}

/// Poll until `condition` holds, panicking after a second
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

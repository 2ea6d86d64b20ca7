//! Sidebar tasks derived from projects
//!
//! Each project contributes at most two sidebar tasks: its first incomplete
//! step (ongoing) and the one after it (next).

use crate::colors::goal_color;
use crate::duration::TaskDuration;
use crate::models::{Goal, GoalStep, ProjectTaskType, UnscheduledTask};
use crate::validation::MAX_TASK_NAME_LEN;

pub const PROJECT_TASK_PREFIX: &str = "project-";

/// Id of a project-derived task
pub fn project_task_id(goal_id: &str, kind: ProjectTaskType, step_id: &str) -> String {
    format!("{}{}-{}-{}", PROJECT_TASK_PREFIX, goal_id, kind.as_str(), step_id)
}

/// Whether an id belongs to a project-derived task
pub fn is_project_task_id(id: &str) -> bool {
    id.starts_with(PROJECT_TASK_PREFIX)
}

/// Build the sidebar tasks for a list of projects, preserving project order
pub fn project_sidebar_tasks(goals: &[Goal]) -> Vec<UnscheduledTask> {
    let mut tasks = Vec::with_capacity(goals.len() * 2);

    for goal in goals {
        let mut pending: Vec<&GoalStep> = goal.steps.iter().filter(|s| !s.completed).collect();
        pending.sort_by_key(|s| s.order_index);

        let kinds = [ProjectTaskType::Ongoing, ProjectTaskType::Next];
        for (step, kind) in pending.into_iter().zip(kinds) {
            tasks.push(sidebar_task(goal, step, kind));
        }
    }

    tasks
}

fn sidebar_task(goal: &Goal, step: &GoalStep, kind: ProjectTaskType) -> UnscheduledTask {
    let category = goal
        .category
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or("project");

    UnscheduledTask {
        id: project_task_id(&goal.id, kind, &step.id),
        name: sidebar_task_name(&goal.title, &step.text),
        description: None,
        category: category.to_string(),
        color: goal_color(goal.category.as_deref()).to_string(),
        duration: TaskDuration::OneHour.label().to_string(),
        project_id: Some(goal.id.clone()),
        step_id: Some(step.id.clone()),
        task_type: Some(kind),
    }
}

/// `"{title}: {step}"`, shortened with an ellipsis to fit a task name
fn sidebar_task_name(title: &str, text: &str) -> String {
    let name = format!("{}: {}", title, text);
    if name.chars().count() <= MAX_TASK_NAME_LEN {
        return name;
    }

    let mut short: String = name.chars().take(MAX_TASK_NAME_LEN - 1).collect();
    short.truncate(short.trim_end().len());
    short.push('…');
    short
}

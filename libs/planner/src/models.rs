//! Task models shared by the planner and the API service
//!
//! Field names follow the `tasks`, `unscheduled_tasks`, `goals` and
//! `goal_steps` tables so the same JSON travels from database rows to the
//! calendar without renaming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duration::TaskDuration;

/// A calendar cell: day index (0 = Monday) and starting hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub day: u8,
    pub hour: u8,
}

impl Slot {
    pub fn new(day: u8, hour: u8) -> Self {
        Self { day, hour }
    }
}

/// Task bound to a calendar slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub color: String,
    #[serde(default = "default_duration")]
    pub duration: String,
    pub day: u8,
    pub hour: u8,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScheduledTask {
    pub fn slot(&self) -> Slot {
        Slot::new(self.day, self.hour)
    }

    /// Length in hours, unknown labels count as one hour
    pub fn hours(&self) -> f64 {
        TaskDuration::hours_for_label(&self.duration)
    }

    /// Input for putting this task back into the unscheduled pool
    pub fn to_unscheduled(&self) -> NewUnscheduledTask {
        NewUnscheduledTask {
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            color: self.color.clone(),
            duration: self.duration.clone(),
            project_id: self.project_id.clone(),
        }
    }
}

/// Sidebar task kinds derived from a project's incomplete steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectTaskType {
    Ongoing,
    Next,
}

impl ProjectTaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectTaskType::Ongoing => "ongoing",
            ProjectTaskType::Next => "next",
        }
    }
}

/// Task waiting in the sidebar pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnscheduledTask {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub color: String,
    #[serde(default = "default_duration")]
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<ProjectTaskType>,
}

impl UnscheduledTask {
    /// Input for a scheduled copy of this task at `slot`
    pub fn scheduled_at(&self, slot: Slot) -> NewScheduledTask {
        NewScheduledTask {
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            color: self.color.clone(),
            duration: self.duration.clone(),
            day: slot.day,
            hour: slot.hour,
            project_id: self.project_id.clone(),
        }
    }
}

/// Payload for creating a scheduled task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScheduledTask {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub color: String,
    pub duration: String,
    pub day: u8,
    pub hour: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl NewScheduledTask {
    pub fn slot(&self) -> Slot {
        Slot::new(self.day, self.hour)
    }
}

/// Payload for creating an unscheduled task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUnscheduledTask {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub color: String,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Editable fields of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEdit {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub color: String,
    pub duration: String,
}

/// Task form input; a slot means "schedule right away"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub color: String,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<Slot>,
}

impl TaskInput {
    pub fn to_scheduled(&self, slot: Slot) -> NewScheduledTask {
        NewScheduledTask {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            category: self.category.clone(),
            color: self.color.clone(),
            duration: self.duration.clone(),
            day: slot.day,
            hour: slot.hour,
            project_id: None,
        }
    }

    pub fn to_unscheduled(&self) -> NewUnscheduledTask {
        NewUnscheduledTask {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            category: self.category.clone(),
            color: self.color.clone(),
            duration: self.duration.clone(),
            project_id: None,
        }
    }
}

/// Scheduling a project-step sidebar task: create the calendar task and
/// complete the step it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStepPlacement {
    pub goal_id: String,
    pub step_id: String,
    pub task: NewScheduledTask,
}

/// A project (goal) with its ordered steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub steps: Vec<GoalStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalStep {
    pub id: String,
    pub goal_id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub order_index: i32,
}

fn default_duration() -> String {
    TaskDuration::default().label().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled_task_from_minimal_json() {
        let task: ScheduledTask = serde_json::from_str(
            r#"{"id":"t1","name":"Write","category":"deepwork","day":1,"hour":9}"#,
        )
        .unwrap();

        assert_eq!(task.duration, "1 hour");
        assert_eq!(task.color, "");
        assert!(!task.completed);
        assert_eq!(task.slot(), Slot::new(1, 9));
    }

    #[test]
    fn test_project_task_type_wire_format() {
        let task = UnscheduledTask {
            id: "project-g-next-s".into(),
            name: "Goal: step".into(),
            description: None,
            category: "fitness".into(),
            color: "#10B981".into(),
            duration: "1 hour".into(),
            project_id: Some("g".into()),
            step_id: Some("s".into()),
            task_type: Some(ProjectTaskType::Next),
        };

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["task_type"], "next");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_unscheduled_to_scheduled_keeps_fields() {
        let task = UnscheduledTask {
            id: "u1".into(),
            name: "Write report".into(),
            description: Some("Q3".into()),
            category: "deepwork".into(),
            color: "#3B82F6".into(),
            duration: "2 hours".into(),
            project_id: None,
            step_id: None,
            task_type: None,
        };

        let new_task = task.scheduled_at(Slot::new(1, 14));
        assert_eq!(new_task.name, "Write report");
        assert_eq!(new_task.duration, "2 hours");
        assert_eq!(new_task.slot(), Slot::new(1, 14));
    }
}

//! Drag payloads
//!
//! A drag carries the serialized task under several MIME types because
//! platforms disagree on which ones survive the drop. Reading tries
//! `text/plain`, then `application/json`, then any non-empty entry.

use serde::Serialize;
use serde_json::Value;

use crate::error::CalendarError;
use crate::models::{ScheduledTask, UnscheduledTask};
use crate::projects::is_project_task_id;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_JSON: &str = "application/json";

/// Ordered MIME type to data map, as handed over by the platform on drop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTransfer {
    entries: Vec<(String, String)>,
}

impl DataTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload written at drag start
    pub fn for_task<T: Serialize>(task: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(task)?;

        let mut data = Self::new();
        data.set_data(MIME_TEXT, &json);
        data.set_data(MIME_JSON, &json);
        Ok(data)
    }

    pub fn set_data(&mut self, mime: &str, data: &str) {
        match self.entries.iter_mut().find(|(m, _)| m == mime) {
            Some(entry) => entry.1 = data.to_string(),
            None => self.entries.push((mime.to_string(), data.to_string())),
        }
    }

    pub fn get_data(&self, mime: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(m, _)| m == mime)
            .map(|(_, data)| data.as_str())
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(m, _)| m.as_str())
    }

    /// First non-empty payload in fallback order
    pub fn read_payload(&self) -> Option<&str> {
        [MIME_TEXT, MIME_JSON]
            .into_iter()
            .filter_map(|mime| self.get_data(mime))
            .chain(self.entries.iter().map(|(_, data)| data.as_str()))
            .find(|data| !data.trim().is_empty())
    }
}

/// The task being dropped, classified by where it came from
#[derive(Debug, Clone, PartialEq)]
pub enum DraggedTask {
    /// Already on the calendar
    Scheduled(ScheduledTask),
    /// Sidebar task derived from a project step
    ProjectStep(UnscheduledTask),
    Unscheduled(UnscheduledTask),
}

impl DraggedTask {
    pub fn parse(payload: &str) -> Result<Self, CalendarError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| CalendarError::InvalidPayload(e.to_string()))?;

        let has_slot = value.get("day").is_some_and(|day| !day.is_null());

        if has_slot {
            let task: ScheduledTask = serde_json::from_value(value)
                .map_err(|e| CalendarError::InvalidPayload(e.to_string()))?;
            return Ok(DraggedTask::Scheduled(task));
        }

        let task: UnscheduledTask = serde_json::from_value(value)
            .map_err(|e| CalendarError::InvalidPayload(e.to_string()))?;

        if is_project_task_id(&task.id) {
            Ok(DraggedTask::ProjectStep(task))
        } else {
            Ok(DraggedTask::Unscheduled(task))
        }
    }

    pub fn id(&self) -> &str {
        match self {
            DraggedTask::Scheduled(task) => &task.id,
            DraggedTask::ProjectStep(task) | DraggedTask::Unscheduled(task) => &task.id,
        }
    }
}

impl From<ScheduledTask> for DraggedTask {
    fn from(task: ScheduledTask) -> Self {
        DraggedTask::Scheduled(task)
    }
}

impl From<UnscheduledTask> for DraggedTask {
    fn from(task: UnscheduledTask) -> Self {
        if is_project_task_id(&task.id) {
            DraggedTask::ProjectStep(task)
        } else {
            DraggedTask::Unscheduled(task)
        }
    }
}

/// Per-interaction drag state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging { task_id: String },
    /// Payload parsed, placement being persisted
    Dropped { task_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_fallback_order() {
        let mut data = DataTransfer::new();
        data.set_data("text/x-task", r#"{"id":"a"}"#);
        data.set_data(MIME_JSON, r#"{"id":"b"}"#);
        assert_eq!(data.read_payload(), Some(r#"{"id":"b"}"#));

        data.set_data(MIME_TEXT, r#"{"id":"c"}"#);
        assert_eq!(data.read_payload(), Some(r#"{"id":"c"}"#));

        let mut only_custom = DataTransfer::new();
        only_custom.set_data(MIME_TEXT, "  ");
        only_custom.set_data("text/x-task", r#"{"id":"a"}"#);
        assert_eq!(only_custom.read_payload(), Some(r#"{"id":"a"}"#));

        assert_eq!(DataTransfer::new().read_payload(), None);
    }

    #[test]
    fn test_classify_dragged_tasks() {
        let scheduled = DraggedTask::parse(
            r#"{"id":"t1","name":"A","category":"deepwork","day":2,"hour":10}"#,
        )
        .unwrap();
        assert!(matches!(scheduled, DraggedTask::Scheduled(_)));

        let step = DraggedTask::parse(
            r#"{"id":"project-g1-next-s2","name":"B","category":"fitness","day":null,"step_id":"s2"}"#,
        )
        .unwrap();
        assert!(matches!(step, DraggedTask::ProjectStep(_)));

        let plain =
            DraggedTask::parse(r#"{"id":"u1","name":"C","category":"busywork"}"#).unwrap();
        assert_eq!(plain.id(), "u1");
        assert!(matches!(plain, DraggedTask::Unscheduled(_)));
    }

    #[test]
    fn test_invalid_payloads() {
        assert!(matches!(
            DraggedTask::parse("{not json"),
            Err(CalendarError::InvalidPayload(_))
        ));
        assert!(matches!(
            DraggedTask::parse(r#"{"name":"no id"}"#),
            Err(CalendarError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_for_task_writes_both_types() {
        let data = DataTransfer::for_task(&serde_json::json!({"id": "x"})).unwrap();
        assert_eq!(data.types().collect::<Vec<_>>(), vec![MIME_TEXT, MIME_JSON]);
    }
}

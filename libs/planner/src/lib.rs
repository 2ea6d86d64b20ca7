//! Planner library for Maker's Schedule
//!
//! The client-side core of the weekly scheduler: task models shared with the
//! API service, calendar grid math, the time-boxed task cache with event
//! driven invalidation, the drag-and-drop placement controller and an HTTP
//! backend that performs the CSRF handshake with the API service.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use planner::{ApiClient, EventBus, HttpTaskBackend, TaskStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new("http://localhost:3001")?;
//!     client.establish_session("access-token-from-the-auth-provider").await?;
//!
//!     let store = Arc::new(TaskStore::new(Arc::new(HttpTaskBackend::new(client))));
//!     let bus = EventBus::default();
//!     let _listener = store.listen(&bus);
//!     store.mount().await;
//!
//!     println!("{} scheduled tasks", store.snapshot().scheduled.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod calendar;
pub mod client;
pub mod colors;
pub mod dnd;
pub mod duration;
pub mod error;
pub mod events;
pub mod grid;
pub mod models;
pub mod projects;
pub mod store;
pub mod validation;
pub mod week;

pub use backend::TaskBackend;
pub use calendar::{AddedTask, CalendarController};
pub use client::{ApiClient, HttpTaskBackend, SessionInfo};
pub use error::{CalendarError, PlannerError, PlannerResult};
pub use events::{AppEvent, EventBus};
pub use grid::CalendarGrid;
pub use models::{
    Goal, GoalStep, NewScheduledTask, NewUnscheduledTask, ProjectStepPlacement, ProjectTaskType,
    ScheduledTask, Slot, TaskEdit, TaskInput, UnscheduledTask,
};
pub use store::{LoadOutcome, TaskSnapshot, TaskStore};

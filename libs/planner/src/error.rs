//! Error types for the planner library

use thiserror::Error;

/// Errors raised by task backends and the HTTP client
#[derive(Error, Debug)]
pub enum PlannerError {
    /// No session, or the session expired
    #[error("Unauthorized")]
    Unauthorized,

    /// The server rejected the CSRF token even after a fresh one was fetched
    #[error("CSRF token rejected")]
    CsrfRejected,

    /// The addressed task or step does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input rejected by validation
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Any other backend failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected status from the API service
    #[error("Unexpected response ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Type alias for Result with PlannerError
pub type PlannerResult<T> = Result<T, PlannerError>;

/// Failures surfaced to the user by the calendar controller
///
/// Every variant maps to a short banner message through
/// [`CalendarError::user_message`].
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("drop carried no task data")]
    NoPayload,

    #[error("drop payload is not a task: {0}")]
    InvalidPayload(String),

    #[error("project task {0} has no originating step")]
    MissingStep(String),

    #[error("slot day {day} hour {hour} is outside the calendar")]
    InvalidSlot { day: u8, hour: u8 },

    #[error("task {0} is not in the calendar")]
    UnknownTask(String),

    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Persistence {
        message: &'static str,
        #[source]
        source: PlannerError,
    },
}

impl CalendarError {
    /// Text for the dismissible error banner
    pub fn user_message(&self) -> String {
        match self {
            CalendarError::NoPayload => {
                "No task data found. Please try dragging the task again.".to_string()
            }
            CalendarError::InvalidPayload(_) => {
                "Invalid task data. Please try dragging the task again.".to_string()
            }
            CalendarError::MissingStep(_) => {
                "Invalid project task. Please try dragging the task again.".to_string()
            }
            CalendarError::InvalidSlot { .. } => {
                "That time slot is outside the calendar.".to_string()
            }
            CalendarError::UnknownTask(_) => {
                "Task not found. Please refresh and try again.".to_string()
            }
            CalendarError::Validation(message) => message.clone(),
            CalendarError::Persistence { message, .. } => (*message).to_string(),
        }
    }

    pub(crate) fn persistence(message: &'static str) -> impl FnOnce(PlannerError) -> Self {
        move |source| CalendarError::Persistence { message, source }
    }
}

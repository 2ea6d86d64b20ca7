//! In-process application events
//!
//! Components that change task data publish on an [`EventBus`] handed to
//! them at construction; the task store listens on the same bus and
//! invalidates its cache. Publishing is fire-and-forget.

use tokio::sync::broadcast;
use tracing::debug;

/// Default number of buffered events per subscriber
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    TaskMoved,
    TaskAdded,
    ProjectUpdated,
    ProjectAdded,
    /// The page became visible or hidden
    VisibilityChanged { visible: bool },
    WindowFocused,
}

impl AppEvent {
    /// Events after which cached task collections must be reloaded
    pub fn invalidates_tasks(&self) -> bool {
        matches!(
            self,
            AppEvent::TaskMoved
                | AppEvent::TaskAdded
                | AppEvent::ProjectUpdated
                | AppEvent::ProjectAdded
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::TaskMoved => "taskMoved",
            AppEvent::TaskAdded => "taskAdded",
            AppEvent::ProjectUpdated => "projectUpdated",
            AppEvent::ProjectAdded => "projectAdded",
            AppEvent::VisibilityChanged { .. } => "visibilitychange",
            AppEvent::WindowFocused => "focus",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event, returning how many subscribers received it
    pub fn publish(&self, event: AppEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!("Published {} to {} subscribers", event.name(), receivers);
                receivers
            }
            Err(_) => {
                debug!("Published {} with no subscribers", event.name());
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

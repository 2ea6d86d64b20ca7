//! Task and project colors

use crate::models::{ScheduledTask, UnscheduledTask};

pub const DEEPWORK_COLOR: &str = "#3B82F6";
pub const BUSYWORK_COLOR: &str = "#F59E0B";
pub const PROJECTS_COLOR: &str = "#10B981";
pub const FALLBACK_COLOR: &str = "#6B7280";
pub const PROJECT_DEFAULT_COLOR: &str = "#DAFF7D";

/// Default color of a task category
pub fn category_color(category: &str) -> &'static str {
    match category {
        "deepwork" => DEEPWORK_COLOR,
        "busywork" => BUSYWORK_COLOR,
        "projects" => PROJECTS_COLOR,
        _ => FALLBACK_COLOR,
    }
}

/// Color of sidebar tasks derived from a goal of the given category
pub fn goal_color(category: Option<&str>) -> &'static str {
    match category.unwrap_or_default() {
        "fitness" => "#10B981",
        "learning" => "#8B5CF6",
        "business" => "#059669",
        "finance" => "#F59E0B",
        "travel" => "#14B8A6",
        "creative" => "#EC4899",
        "health" => "#EF4444",
        "career" => "#6366F1",
        "relationships" => "#F97316",
        "personal" => "#6B7280",
        _ => PROJECT_DEFAULT_COLOR,
    }
}

/// Rows written by older clients carry "undefined" or "null" as text
fn is_missing(color: &str) -> bool {
    matches!(color.trim(), "" | "undefined" | "null")
}

/// Anything with a category-derived color
pub trait Colored {
    fn category(&self) -> &str;
    fn color(&self) -> &str;
    fn set_color(&mut self, color: &str);
}

macro_rules! impl_colored {
    ($($ty:ty),*) => {
        $(
            impl Colored for $ty {
                fn category(&self) -> &str {
                    &self.category
                }

                fn color(&self) -> &str {
                    &self.color
                }

                fn set_color(&mut self, color: &str) {
                    self.color = color.to_string();
                }
            }
        )*
    };
}

impl_colored!(ScheduledTask, UnscheduledTask);

/// Fill in a missing color from the task's category
pub fn ensure_task_color<T: Colored>(mut task: T) -> T {
    if is_missing(task.color()) {
        let color = category_color(task.category());
        task.set_color(color);
    }
    task
}

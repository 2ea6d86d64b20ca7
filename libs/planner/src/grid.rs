//! Calendar grid math
//!
//! The calendar is a fixed grid of 7 days by 13 hourly rows (08:00 to
//! 20:00). A task is drawn once, in the cell where it starts, with a height
//! proportional to its duration. Cells covered by a longer task that started
//! earlier are only marked as spanned.

use std::collections::{HashMap, HashSet};

use crate::duration::TaskDuration;
use crate::models::{ScheduledTask, Slot};

pub const DAYS_PER_WEEK: u8 = 7;
pub const FIRST_HOUR: u8 = 8;
pub const LAST_HOUR: u8 = 20;
pub const HOUR_HEIGHT_PX: f64 = 64.0;

/// Rows of the grid, in display order
pub fn hours() -> impl Iterator<Item = u8> {
    FIRST_HOUR..=LAST_HOUR
}

pub fn is_valid_slot(slot: Slot) -> bool {
    slot.day < DAYS_PER_WEEK && (FIRST_HOUR..=LAST_HOUR).contains(&slot.hour)
}

/// Rendered height of a task with the given duration label
pub fn task_height_px(duration: &str) -> f64 {
    TaskDuration::hours_for_label(duration) * HOUR_HEIGHT_PX
}

/// A task block drawn in its starting cell
#[derive(Debug, Clone, PartialEq)]
pub struct TaskBlock<'a> {
    pub task: &'a ScheduledTask,
    pub height_px: f64,
}

/// What a single cell shows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell<'a> {
    pub blocks: Vec<TaskBlock<'a>>,
    /// Covered by a task that started in an earlier row
    pub spanned: bool,
}

/// Precomputed cell occupancy for one render
#[derive(Debug, Clone)]
pub struct CalendarGrid<'a> {
    starts: HashMap<Slot, Vec<&'a ScheduledTask>>,
    spanned: HashSet<Slot>,
    tasks: &'a [ScheduledTask],
}

impl<'a> CalendarGrid<'a> {
    pub fn new(tasks: &'a [ScheduledTask]) -> Self {
        let mut starts: HashMap<Slot, Vec<&'a ScheduledTask>> = HashMap::new();
        let mut spanned = HashSet::new();

        for task in tasks {
            starts.entry(task.slot()).or_default().push(task);

            let end = f64::from(task.hour) + task.hours();
            for hour in hours().filter(|h| *h > task.hour && f64::from(*h) < end) {
                spanned.insert(Slot::new(task.day, hour));
            }
        }

        Self {
            starts,
            spanned,
            tasks,
        }
    }

    /// Tasks starting exactly at this cell
    pub fn tasks_starting_at(&self, day: u8, hour: u8) -> &[&'a ScheduledTask] {
        self.starts
            .get(&Slot::new(day, hour))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_spanned(&self, day: u8, hour: u8) -> bool {
        self.spanned.contains(&Slot::new(day, hour))
    }

    pub fn cell(&self, day: u8, hour: u8) -> Cell<'a> {
        Cell {
            blocks: self
                .tasks_starting_at(day, hour)
                .iter()
                .copied()
                .map(|task| TaskBlock {
                    task,
                    height_px: task_height_px(&task.duration),
                })
                .collect(),
            spanned: self.is_spanned(day, hour),
        }
    }

    /// Tasks whose occupied hours intersect a candidate placement
    ///
    /// Overlaps are allowed on the calendar; callers use this to warn.
    pub fn conflicts(
        &self,
        slot: Slot,
        duration: &str,
        ignore_id: Option<&str>,
    ) -> Vec<&'a ScheduledTask> {
        let start = f64::from(slot.hour);
        let end = start + TaskDuration::hours_for_label(duration);

        self.tasks
            .iter()
            .filter(|t| t.day == slot.day && Some(t.id.as_str()) != ignore_id)
            .filter(|t| {
                let t_start = f64::from(t.hour);
                t_start < end && start < t_start + t.hours()
            })
            .collect()
    }
}

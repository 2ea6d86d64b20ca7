//! Input validation for task and project forms

use regex::Regex;
use std::sync::OnceLock;

use crate::duration::TaskDuration;
use crate::grid::{self, FIRST_HOUR, LAST_HOUR};
use crate::models::{NewScheduledTask, NewUnscheduledTask, Slot, TaskEdit, TaskInput};

pub const MAX_TASK_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_CATEGORY_LEN: usize = 50;

/// Validate a task name
pub fn validate_task_name(name: &str) -> Result<(), String> {
    let name = name.trim();

    if name.is_empty() {
        return Err("Task name is required".to_string());
    }

    if name.chars().count() > MAX_TASK_NAME_LEN {
        return Err(format!(
            "Task name must be {} characters or less",
            MAX_TASK_NAME_LEN
        ));
    }

    Ok(())
}

/// Validate a category
pub fn validate_category(category: &str) -> Result<(), String> {
    if category.trim().is_empty() {
        return Err("Please select a category".to_string());
    }

    if category.chars().count() > MAX_CATEGORY_LEN {
        return Err(format!(
            "Category must be {} characters or less",
            MAX_CATEGORY_LEN
        ));
    }

    Ok(())
}

/// Validate a color; empty means "use the category color"
pub fn validate_color(color: &str) -> Result<(), String> {
    if color.is_empty() {
        return Ok(());
    }

    static COLOR_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = COLOR_REGEX
        .get_or_init(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("Failed to compile color regex"));

    if !regex.is_match(color) {
        return Err("Color must be a hex value like #3B82F6".to_string());
    }

    Ok(())
}

/// Validate a duration label
pub fn validate_duration(duration: &str) -> Result<(), String> {
    duration
        .parse::<TaskDuration>()
        .map(|_| ())
        .map_err(|_| format!("Unknown duration: {}", duration))
}

/// Validate a calendar slot
pub fn validate_slot(slot: Slot) -> Result<(), String> {
    if !grid::is_valid_slot(slot) {
        return Err(format!(
            "Slot must be a day between 0 and 6 and an hour between {} and {}",
            FIRST_HOUR, LAST_HOUR
        ));
    }

    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), String> {
    match description {
        Some(text) if text.chars().count() > MAX_DESCRIPTION_LEN => Err(format!(
            "Description must be {} characters or less",
            MAX_DESCRIPTION_LEN
        )),
        _ => Ok(()),
    }
}

fn validate_fields(
    name: &str,
    description: Option<&str>,
    category: &str,
    color: &str,
    duration: &str,
) -> Result<(), String> {
    validate_task_name(name)?;
    validate_description(description)?;
    validate_category(category)?;
    validate_color(color)?;
    validate_duration(duration)
}

pub fn validate_task_input(input: &TaskInput) -> Result<(), String> {
    validate_fields(
        &input.name,
        input.description.as_deref(),
        &input.category,
        &input.color,
        &input.duration,
    )?;

    match input.slot {
        Some(slot) => validate_slot(slot),
        None => Ok(()),
    }
}

pub fn validate_task_edit(edit: &TaskEdit) -> Result<(), String> {
    validate_fields(
        &edit.name,
        edit.description.as_deref(),
        &edit.category,
        &edit.color,
        &edit.duration,
    )
}

pub fn validate_new_scheduled(task: &NewScheduledTask) -> Result<(), String> {
    validate_fields(
        &task.name,
        task.description.as_deref(),
        &task.category,
        &task.color,
        &task.duration,
    )?;
    validate_slot(task.slot())
}

pub fn validate_new_unscheduled(task: &NewUnscheduledTask) -> Result<(), String> {
    validate_fields(
        &task.name,
        task.description.as_deref(),
        &task.category,
        &task.color,
        &task.duration,
    )
}

/// Project form input
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInput {
    pub name: String,
    pub description: String,
    pub category: String,
    /// Months
    pub timeline: i32,
    /// Hours per week
    pub effort: i32,
}

/// Validate project form input
pub fn validate_project_input(input: &ProjectInput) -> Result<(), String> {
    if input.name.trim().is_empty() {
        return Err("Project name is required".to_string());
    }

    if input.name.chars().count() > 100 {
        return Err("Project name must be 100 characters or less".to_string());
    }

    if input.description.trim().is_empty() {
        return Err("Project description is required".to_string());
    }

    if input.description.chars().count() > 500 {
        return Err("Project description must be 500 characters or less".to_string());
    }

    if input.category.is_empty() {
        return Err("Please select a project category".to_string());
    }

    if !(1..=60).contains(&input.timeline) {
        return Err("Timeline must be between 1 and 60 months".to_string());
    }

    if !(1..=40).contains(&input.effort) {
        return Err("Weekly effort must be between 1 and 40 hours".to_string());
    }

    Ok(())
}

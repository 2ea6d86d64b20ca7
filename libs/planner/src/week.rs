//! Week navigation and weekly progress
//!
//! Weeks start on Monday; calendar day index 0 is the Monday of the week
//! being shown.

use chrono::{Datelike, Days, NaiveDate};

use crate::models::ScheduledTask;

pub const WEEKLY_TARGET_HOURS: f64 = 40.0;

/// Categories shown in the weekly progress summary
pub const PROGRESS_CATEGORIES: [(&str, &str); 3] = [
    ("deepwork", "Deep Work"),
    ("busywork", "Busywork"),
    ("projects", "Projects"),
];

/// Monday on or before `date`
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// One column header of the calendar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekDay {
    pub index: u8,
    pub label: &'static str,
    pub day_of_month: u32,
    pub date: NaiveDate,
    pub is_today: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekView {
    monday: NaiveDate,
    today: NaiveDate,
}

impl WeekView {
    /// The week containing `today`
    pub fn current(today: NaiveDate) -> Self {
        Self::new(today, today)
    }

    /// The week containing `date`, with `today` marked if it falls inside
    pub fn new(date: NaiveDate, today: NaiveDate) -> Self {
        Self {
            monday: monday_of(date),
            today,
        }
    }

    pub fn monday(&self) -> NaiveDate {
        self.monday
    }

    pub fn previous(&self) -> Self {
        Self {
            monday: self.monday - Days::new(7),
            today: self.today,
        }
    }

    pub fn next(&self) -> Self {
        Self {
            monday: self.monday + Days::new(7),
            today: self.today,
        }
    }

    /// ISO-8601 week number of this week
    pub fn iso_week(&self) -> u32 {
        self.monday.iso_week().week()
    }

    pub fn date_for_day(&self, day: u8) -> Option<NaiveDate> {
        (day < 7).then(|| self.monday + Days::new(u64::from(day)))
    }

    pub fn days(&self) -> Vec<WeekDay> {
        (0..7u8)
            .filter_map(|index| {
                let date = self.date_for_day(index)?;
                Some(WeekDay {
                    index,
                    label: day_label(date),
                    day_of_month: date.day(),
                    date,
                    is_today: date == self.today,
                })
            })
            .collect()
    }
}

fn day_label(date: NaiveDate) -> &'static str {
    match date.weekday() {
        chrono::Weekday::Mon => "Mon",
        chrono::Weekday::Tue => "Tue",
        chrono::Weekday::Wed => "Wed",
        chrono::Weekday::Thu => "Thu",
        chrono::Weekday::Fri => "Fri",
        chrono::Weekday::Sat => "Sat",
        chrono::Weekday::Sun => "Sun",
    }
}

/// Scheduled hours of one category against the weekly target
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryProgress {
    pub category: &'static str,
    pub label: &'static str,
    pub hours: f64,
    /// Share of [`WEEKLY_TARGET_HOURS`], capped at 100
    pub percent: f64,
}

pub fn weekly_progress(tasks: &[ScheduledTask]) -> Vec<CategoryProgress> {
    PROGRESS_CATEGORIES
        .into_iter()
        .map(|(category, label)| {
            let hours: f64 = tasks
                .iter()
                .filter(|t| t.category == category)
                .map(ScheduledTask::hours)
                .sum();

            CategoryProgress {
                category,
                label,
                hours,
                percent: (hours / WEEKLY_TARGET_HOURS * 100.0).min(100.0),
            }
        })
        .collect()
}

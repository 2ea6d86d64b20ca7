//! Task duration labels
//!
//! Durations travel as human labels ("2 hours") and map onto a fixed set of
//! hour values. Unknown labels are treated as one hour.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskDuration {
    HalfHour,
    #[default]
    OneHour,
    TwoHours,
    ThreeHours,
    FourHours,
    SixHours,
    EightHours,
}

impl TaskDuration {
    pub const ALL: [TaskDuration; 7] = [
        TaskDuration::HalfHour,
        TaskDuration::OneHour,
        TaskDuration::TwoHours,
        TaskDuration::ThreeHours,
        TaskDuration::FourHours,
        TaskDuration::SixHours,
        TaskDuration::EightHours,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TaskDuration::HalfHour => "30 minutes",
            TaskDuration::OneHour => "1 hour",
            TaskDuration::TwoHours => "2 hours",
            TaskDuration::ThreeHours => "3 hours",
            TaskDuration::FourHours => "4 hours",
            TaskDuration::SixHours => "6 hours",
            TaskDuration::EightHours => "8 hours",
        }
    }

    pub fn hours(self) -> f64 {
        match self {
            TaskDuration::HalfHour => 0.5,
            TaskDuration::OneHour => 1.0,
            TaskDuration::TwoHours => 2.0,
            TaskDuration::ThreeHours => 3.0,
            TaskDuration::FourHours => 4.0,
            TaskDuration::SixHours => 6.0,
            TaskDuration::EightHours => 8.0,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.label() == label)
    }

    /// Hours for a raw label, defaulting to one hour
    pub fn hours_for_label(label: &str) -> f64 {
        Self::from_label(label).unwrap_or_default().hours()
    }
}

impl fmt::Display for TaskDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("Unknown duration: {}", s))
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a reported delay is, bucketed from its length in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DelaySeverity {
    None,
    Medium,
    High,
    Critical,
}

impl DelaySeverity {
    pub fn from_minutes(minutes: i32) -> Self {
        if minutes >= 30 {
            DelaySeverity::Critical
        } else if minutes >= 15 {
            DelaySeverity::High
        } else if minutes < 5 {
            DelaySeverity::None
        } else {
            DelaySeverity::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DelaySeverity::None => "None",
            DelaySeverity::Medium => "Medium",
            DelaySeverity::High => "High",
            DelaySeverity::Critical => "Critical",
        }
    }
}

impl fmt::Display for DelaySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

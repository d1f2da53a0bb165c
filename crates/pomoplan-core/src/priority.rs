//! Urgency/importance priority classes.
//!
//! Tasks are bucketed into the four quadrants of an urgency/importance matrix.
//! Each quadrant carries a fixed [`PriorityProfile`] that drives the allocator:
//!
//! | class                | order | max delay (days) | auto-schedule |
//! |----------------------|-------|------------------|---------------|
//! | urgent + important   | 0     | 0                | yes           |
//! | important            | 1     | 7                | yes           |
//! | urgent               | 2     | 2                | yes           |
//! | neither              | 3     | 14               | no            |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Fixed scheduling parameters attached to a priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriorityProfile {
    /// Lower values are scheduled first.
    pub sort_order: u8,
    /// How many days past today the allocator may push remaining units.
    pub max_delay_days: u32,
    /// Whether new tasks of this class are auto-scheduled unless told otherwise.
    pub auto_schedule_default: bool,
}

/// One quadrant of the urgency/importance matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityClass {
    UrgentImportant,
    ImportantNotUrgent,
    UrgentNotImportant,
    Neither,
}

const URGENT_IMPORTANT: PriorityProfile = PriorityProfile {
    sort_order: 0,
    max_delay_days: 0,
    auto_schedule_default: true,
};
const IMPORTANT_NOT_URGENT: PriorityProfile = PriorityProfile {
    sort_order: 1,
    max_delay_days: 7,
    auto_schedule_default: true,
};
const URGENT_NOT_IMPORTANT: PriorityProfile = PriorityProfile {
    sort_order: 2,
    max_delay_days: 2,
    auto_schedule_default: true,
};
const NEITHER: PriorityProfile = PriorityProfile {
    sort_order: 3,
    max_delay_days: 14,
    auto_schedule_default: false,
};

impl PriorityClass {
    pub const ALL: [PriorityClass; 4] = [
        PriorityClass::UrgentImportant,
        PriorityClass::ImportantNotUrgent,
        PriorityClass::UrgentNotImportant,
        PriorityClass::Neither,
    ];

    pub fn profile(&self) -> &'static PriorityProfile {
        match self {
            Self::UrgentImportant => &URGENT_IMPORTANT,
            Self::ImportantNotUrgent => &IMPORTANT_NOT_URGENT,
            Self::UrgentNotImportant => &URGENT_NOT_IMPORTANT,
            Self::Neither => &NEITHER,
        }
    }

    pub fn sort_order(&self) -> u8 {
        self.profile().sort_order
    }

    pub fn max_delay_days(&self) -> u32 {
        self.profile().max_delay_days
    }

    pub fn auto_schedule_default(&self) -> bool {
        self.profile().auto_schedule_default
    }

    /// Classes that must land today or be surfaced to the user.
    pub fn is_same_day(&self) -> bool {
        self.max_delay_days() == 0
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrgentImportant => "urgent_important",
            Self::ImportantNotUrgent => "important_not_urgent",
            Self::UrgentNotImportant => "urgent_not_important",
            Self::Neither => "neither",
        }
    }
}

impl Default for PriorityClass {
    fn default() -> Self {
        PriorityClass::ImportantNotUrgent
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ui" | "urgent_important" => Ok(Self::UrgentImportant),
            "inu" | "important" | "important_not_urgent" => Ok(Self::ImportantNotUrgent),
            "uni" | "urgent" | "urgent_not_important" => Ok(Self::UrgentNotImportant),
            "n" | "neither" => Ok(Self::Neither),
            _ => Err(ValidationError::InvalidValue {
                field: "priority".into(),
                message: format!("unknown priority class '{s}'"),
            }),
        }
    }
}

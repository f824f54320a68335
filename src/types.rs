use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::time::to_clock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gap {
    pub hour: u8,
    pub minute: u8,
    pub required: u32,
    pub current: u32,
    pub shortage: u32,
}

impl Gap {
    pub fn new(hour: u8, minute: u8, required: u32, current: u32) -> Self {
        Self {
            hour,
            minute,
            required,
            current,
            shortage: required.saturating_sub(current),
        }
    }

    pub fn start_minutes(&self) -> i64 {
        i64::from(self.hour) * 60 + i64::from(self.minute)
    }

    pub fn start_clock(&self) -> String {
        to_clock(self.start_minutes())
    }

    pub fn end_clock(&self) -> String {
        to_clock(self.start_minutes() + 30)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    Employee,
    PartTime,
}

impl EmploymentType {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::PartTime => "part-time",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableStaffMember {
    pub id: String,
    pub name: String,
    pub employment_type: EmploymentType,
    pub available_from: String,
    pub available_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExistingShiftRef {
    pub staff_name: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProposedShift {
    pub staff_id: String,
    pub staff_name: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UnfilledSlot {
    pub time_range: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSummary {
    pub total_proposed: u32,
    pub coverage_improvement: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentReply {
    pub proposed_shifts: Vec<ProposedShift>,
    pub unfilled_slots: Vec<UnfilledSlot>,
    pub summary: AssignmentSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentInput {
    pub date: NaiveDate,
    #[serde(default)]
    pub day_label: Option<String>,
    #[serde(default)]
    pub gaps: Vec<Gap>,
    #[serde(default)]
    pub available_staff: Vec<AvailableStaffMember>,
    #[serde(default)]
    pub existing_shifts: Vec<ExistingShiftRef>,
}

impl AssignmentInput {
    pub fn resolved_day_label(&self) -> String {
        self.day_label
            .clone()
            .unwrap_or_else(|| day_label(self.date).to_string())
    }
}

pub fn day_label(date: NaiveDate) -> &'static str {
    use chrono::Datelike;
    match date.weekday() {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    }
}

/// Hard-constraint finding on a proposed shift. Reported, never enforced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintViolation {
    pub staff_id: String,
    pub staff_name: String,
    pub kind: ViolationKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    ReversedRange,
    TooShort,
    TooLong,
    OutsideAvailability,
    OverlapsExistingShift,
    UnknownStaff,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub date: NaiveDate,
    pub before_coverage: u32,
    pub after_coverage: u32,
    pub proposed_shifts: Vec<ProposedShift>,
    pub unfilled_slots: Vec<UnfilledSlot>,
    #[serde(default)]
    pub violations: Vec<ConstraintViolation>,
    pub is_loading: bool,
    // Kept for the published JSON shape. Published previews never carry an
    // error: a failure clears the preview and the message lives on the session.
    pub error: Option<String>,
}

impl Preview {
    pub fn loading(date: NaiveDate, before_coverage: u32) -> Self {
        Self {
            date,
            before_coverage,
            after_coverage: before_coverage,
            proposed_shifts: Vec::new(),
            unfilled_slots: Vec::new(),
            violations: Vec::new(),
            is_loading: true,
            error: None,
        }
    }
}

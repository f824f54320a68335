use crate::types::{AssignmentInput, AvailableStaffMember, ExistingShiftRef, Gap};

pub const MAX_SHIFT_HOURS: u32 = 8;
pub const MIN_SHIFT_HOURS: u32 = 3;

const NO_GAPS: &str = "No staffing shortages for this day.";
const NO_STAFF: &str = "No staff available.";
const NO_EXISTING: &str = "No existing shifts.";

pub const HARD_CONSTRAINTS: [&str; 4] = [
    "A shift must not exceed 8 hours.",
    "A staff member may only be assigned within their availability window.",
    "A new shift must not overlap any existing shift of the same staff member.",
    "A shift must be at least 3 hours long.",
];

pub const PREFERENCES: [&str; 3] = [
    "Mix employees and part-time staff where possible.",
    "Spread assignments across several staff members instead of concentrating hours on one person.",
    "Balance coverage across the morning, noon, evening and night periods.",
];

pub const OUTPUT_SCHEMA: &str = r#"{
  "proposedShifts": [
    {"staffId": "string", "staffName": "string", "startTime": "HH:mm", "endTime": "HH:mm", "reason": "string"}
  ],
  "unfilledSlots": [
    {"timeRange": "string", "reason": "string"}
  ],
  "summary": {"totalProposed": 0, "coverageImprovement": 0}
}"#;

/// Renders the request document sent to the recommender. Identical input
/// always produces identical output.
pub fn build_request(input: &AssignmentInput) -> String {
    let mut doc = String::new();
    let day = input.resolved_day_label();

    push_line(&mut doc, "You are assisting a shift scheduler in filling staffing shortages.");
    doc.push('\n');
    push_line(&mut doc, "## Target day");
    push_line(&mut doc, &format!("{} ({day})", input.date.format("%Y-%m-%d")));
    doc.push('\n');

    push_line(&mut doc, "## Staffing shortages (30-minute slots)");
    push_gaps(&mut doc, &input.gaps);
    doc.push('\n');

    push_line(&mut doc, "## Available staff");
    push_staff(&mut doc, &input.available_staff);
    doc.push('\n');

    push_line(&mut doc, "## Existing shifts");
    push_existing(&mut doc, &input.existing_shifts);
    doc.push('\n');

    push_line(&mut doc, "## Hard constraints (must never be violated)");
    for (idx, rule) in HARD_CONSTRAINTS.iter().enumerate() {
        push_line(&mut doc, &format!("{}. {rule}", idx + 1));
    }
    doc.push('\n');

    push_line(&mut doc, "## Preferences");
    for rule in PREFERENCES {
        push_line(&mut doc, &format!("- {rule}"));
    }
    doc.push('\n');

    push_line(&mut doc, "## Output format");
    push_line(
        &mut doc,
        "Reply with a single JSON object and nothing else, matching this schema:",
    );
    push_line(&mut doc, OUTPUT_SCHEMA);
    push_line(
        &mut doc,
        "Times use 24-hour HH:mm. List every shortage you cannot fill in unfilledSlots with a reason. \
coverageImprovement is the expected gain in coverage percentage points.",
    );
    doc
}

fn push_line(doc: &mut String, text: &str) {
    doc.push_str(text);
    doc.push('\n');
}

fn push_gaps(doc: &mut String, gaps: &[Gap]) {
    if gaps.is_empty() {
        push_line(doc, NO_GAPS);
        return;
    }
    for gap in gaps {
        push_line(
            doc,
            &format!(
                "- {}-{}: required {}, current {}, shortage {}",
                gap.start_clock(),
                gap.end_clock(),
                gap.required,
                gap.current,
                gap.shortage
            ),
        );
    }
}

fn push_staff(doc: &mut String, staff: &[AvailableStaffMember]) {
    if staff.is_empty() {
        push_line(doc, NO_STAFF);
        return;
    }
    for member in staff {
        push_line(
            doc,
            &format!(
                "- id: {} | name: {} | type: {} | available: {}-{}",
                member.id,
                member.name,
                member.employment_type.as_label(),
                member.available_from,
                member.available_to
            ),
        );
    }
}

fn push_existing(doc: &mut String, shifts: &[ExistingShiftRef]) {
    if shifts.is_empty() {
        push_line(doc, NO_EXISTING);
        return;
    }
    for shift in shifts {
        push_line(
            doc,
            &format!("- {}: {}-{}", shift.staff_name, shift.from, shift.to),
        );
    }
}

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::recommender::prompt::{MAX_SHIFT_HOURS, MIN_SHIFT_HOURS};
use crate::time::{duration_hours, is_valid_clock, ranges_overlap, to_minutes};
use crate::types::{
    AssignmentInput, AssignmentReply, AssignmentSummary, ConstraintViolation, ProposedShift,
    UnfilledSlot, ViolationKind,
};

/// Turns a parsed reply into an [`AssignmentReply`] with every field present.
///
/// Proposed shifts without a staff id, a staff name, or well-formed start and
/// end clocks are dropped. Unfilled slots pass through. A missing summary is
/// synthesized from the surviving shifts.
pub fn sanitize_reply(value: &Value) -> AssignmentReply {
    let empty = Map::new();
    let object = value.as_object().unwrap_or(&empty);

    let proposed_shifts = field(object, "proposedShifts")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_proposed_shift).collect::<Vec<_>>())
        .unwrap_or_default();

    let unfilled_slots = field(object, "unfilledSlots")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(parse_unfilled_slot).collect::<Vec<_>>())
        .unwrap_or_default();

    let summary = match field(object, "summary").and_then(Value::as_object) {
        Some(summary) => AssignmentSummary {
            total_proposed: field(summary, "totalProposed")
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map_or(proposed_shifts.len() as u32, |v| v.round() as u32),
            coverage_improvement: field(summary, "coverageImprovement")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        },
        None => AssignmentSummary {
            total_proposed: proposed_shifts.len() as u32,
            coverage_improvement: 0.0,
        },
    };

    AssignmentReply {
        proposed_shifts,
        unfilled_slots,
        summary,
    }
}

/// Checks proposed shifts against the hard scheduling rules. Nothing is
/// removed; callers decide what to do with the findings.
pub fn audit_proposal(reply: &AssignmentReply, input: &AssignmentInput) -> Vec<ConstraintViolation> {
    let mut out = Vec::new();
    for shift in &reply.proposed_shifts {
        let mut push = |kind: ViolationKind, detail: String| {
            out.push(ConstraintViolation {
                staff_id: shift.staff_id.clone(),
                staff_name: shift.staff_name.clone(),
                kind,
                detail,
            });
        };
        let range = format!("{}-{}", shift.start_time, shift.end_time);

        let hours = duration_hours(&shift.start_time, &shift.end_time);
        if hours <= 0.0 {
            push(ViolationKind::ReversedRange, format!("{range} ends before it starts"));
        } else if hours < f64::from(MIN_SHIFT_HOURS) {
            push(ViolationKind::TooShort, format!("{range} is {hours:.1}h"));
        } else if hours > f64::from(MAX_SHIFT_HOURS) {
            push(ViolationKind::TooLong, format!("{range} is {hours:.1}h"));
        }

        match input.available_staff.iter().find(|m| m.id == shift.staff_id) {
            Some(member) => {
                let inside = to_minutes(&member.available_from) <= to_minutes(&shift.start_time)
                    && to_minutes(&shift.end_time) <= to_minutes(&member.available_to);
                if !inside {
                    push(
                        ViolationKind::OutsideAvailability,
                        format!(
                            "{range} outside {}-{}",
                            member.available_from, member.available_to
                        ),
                    );
                }
            }
            None => push(
                ViolationKind::UnknownStaff,
                format!("staff id {} is not in the available list", shift.staff_id),
            ),
        }

        for existing in input
            .existing_shifts
            .iter()
            .filter(|e| e.staff_name == shift.staff_name)
        {
            if ranges_overlap(&shift.start_time, &shift.end_time, &existing.from, &existing.to) {
                push(
                    ViolationKind::OverlapsExistingShift,
                    format!("{range} overlaps {}-{}", existing.from, existing.to),
                );
            }
        }
    }
    for violation in &out {
        warn!(
            staff = %violation.staff_name,
            kind = ?violation.kind,
            "proposed shift breaks a hard constraint: {}",
            violation.detail
        );
    }
    out
}

fn parse_proposed_shift(value: &Value) -> Option<ProposedShift> {
    let Some(object) = value.as_object() else {
        debug!("dropping non-object proposed shift");
        return None;
    };
    let staff_id = non_empty_string(object, "staffId");
    let staff_name = non_empty_string(object, "staffName");
    let start_time = clock_string(object, "startTime");
    let end_time = clock_string(object, "endTime");
    match (staff_id, staff_name, start_time, end_time) {
        (Some(staff_id), Some(staff_name), Some(start_time), Some(end_time)) => {
            Some(ProposedShift {
                staff_id,
                staff_name,
                start_time,
                end_time,
                reason: field(object, "reason")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        }
        _ => {
            debug!(shift = %value, "dropping malformed proposed shift");
            None
        }
    }
}

fn parse_unfilled_slot(value: &Value) -> UnfilledSlot {
    let Some(object) = value.as_object() else {
        return UnfilledSlot {
            time_range: value.as_str().unwrap_or_default().to_string(),
            reason: String::new(),
        };
    };
    let text = |key: &str| {
        field(object, key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    UnfilledSlot {
        time_range: text("timeRange"),
        reason: text("reason"),
    }
}

fn non_empty_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    match field(object, key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn clock_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    field(object, key)
        .and_then(Value::as_str)
        .filter(|s| is_valid_clock(s))
        .map(str::to_string)
}

fn field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|v| !v.is_null())
}

use crate::time::to_minutes;
use crate::types::{AssignmentSummary, Gap, ProposedShift};

/// Coverage percentage in `[0, 100]`.
pub fn estimate_coverage(gaps: &[Gap], summary: Option<&AssignmentSummary>) -> u32 {
    let Some(baseline) = baseline_ratio(gaps) else {
        return 100;
    };
    let baseline = (baseline * 100.0).round();
    let improvement = summary
        .map(|s| s.coverage_improvement)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);
    (baseline + improvement).round().clamp(0.0, 100.0) as u32
}

pub fn verified_coverage(gaps: &[Gap], shifts: &[ProposedShift]) -> u32 {
    let filled = apply_shifts(gaps, shifts);
    estimate_coverage(&filled, None)
}

pub fn apply_shifts(gaps: &[Gap], shifts: &[ProposedShift]) -> Vec<Gap> {
    gaps.iter()
        .map(|gap| {
            let slot = gap.start_minutes();
            let added = shifts
                .iter()
                .filter(|shift| {
                    let start = to_minutes(&shift.start_time);
                    let end = to_minutes(&shift.end_time);
                    start <= slot && slot < end
                })
                .count() as u32;
            let current = gap.current.saturating_add(added).min(gap.required.max(gap.current));
            Gap::new(gap.hour, gap.minute, gap.required, current)
        })
        .collect()
}

fn baseline_ratio(gaps: &[Gap]) -> Option<f64> {
    let required: u64 = gaps.iter().map(|g| u64::from(g.required)).sum();
    if required == 0 {
        return None;
    }
    let current: u64 = gaps.iter().map(|g| u64::from(g.current)).sum();
    Some(current as f64 / required as f64)
}

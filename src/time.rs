//! "HH:mm" clock arithmetic shared by every component.

pub const MINUTES_PER_DAY: i64 = 24 * 60;
pub const DEFAULT_LATEST_CLOCK: &str = "23:30";

/// Minutes since midnight. Unparseable components count as zero, and the
/// result is normalized into `[0, 1440)`.
pub fn to_minutes(clock: &str) -> i64 {
    let (hours, minutes) = clock.split_once(':').unwrap_or((clock, "0"));
    let hours = hours.trim().parse::<i64>().unwrap_or(0);
    let minutes = minutes.trim().parse::<i64>().unwrap_or(0);
    hours
        .saturating_mul(60)
        .saturating_add(minutes)
        .rem_euclid(MINUTES_PER_DAY)
}

pub fn to_clock(minutes: i64) -> String {
    let normalized = minutes.rem_euclid(MINUTES_PER_DAY);
    format!("{:02}:{:02}", normalized / 60, normalized % 60)
}

/// Negative when `end` precedes `start`.
pub fn duration_hours(start: &str, end: &str) -> f64 {
    (to_minutes(end) - to_minutes(start)) as f64 / 60.0
}

pub fn add_hours(clock: &str, hours: f64, max: &str) -> String {
    let shifted = to_minutes(clock).saturating_add((hours * 60.0).round() as i64);
    to_clock(shifted.clamp(0, to_minutes(max)))
}

/// True for `H:mm` / `HH:mm` with hour 0-23 and minute 0-59.
pub fn is_valid_clock(value: &str) -> bool {
    let Some((hours, minutes)) = value.split_once(':') else {
        return false;
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(hours) || hours.len() > 2 || !digits(minutes) || minutes.len() != 2 {
        return false;
    }
    matches!(hours.parse::<u32>(), Ok(h) if h <= 23)
        && matches!(minutes.parse::<u32>(), Ok(m) if m <= 59)
}

pub fn ranges_overlap(a_start: &str, a_end: &str, b_start: &str, b_end: &str) -> bool {
    to_minutes(a_start) < to_minutes(b_end) && to_minutes(b_start) < to_minutes(a_end)
}

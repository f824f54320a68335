use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::session::SessionView;
use crate::types::Preview;

pub fn render_preview(preview: &Preview) -> String {
    let mut out = format!(
        "{}  coverage {}% -> {}%\n",
        preview.date.format("%Y-%m-%d"),
        preview.before_coverage,
        preview.after_coverage
    );
    out.push_str(&render_proposed_table(preview));
    if !preview.unfilled_slots.is_empty() {
        out.push('\n');
        out.push_str(&render_unfilled_table(preview));
    }
    if !preview.violations.is_empty() {
        out.push('\n');
        out.push_str(&render_violations_table(preview));
    }
    out
}

pub fn render_proposed_table(preview: &Preview) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Staff", "ID", "Start", "End", "Reason"]);
    for shift in &preview.proposed_shifts {
        let flagged = preview
            .violations
            .iter()
            .any(|v| v.staff_id == shift.staff_id);
        let name = if flagged {
            Cell::new(&shift.staff_name).fg(Color::Yellow)
        } else {
            Cell::new(&shift.staff_name).fg(Color::Green)
        };
        table.add_row(Row::from(vec![
            name,
            Cell::new(&shift.staff_id),
            Cell::new(&shift.start_time),
            Cell::new(&shift.end_time),
            Cell::new(&shift.reason),
        ]));
    }
    table.to_string()
}

pub fn render_unfilled_table(preview: &Preview) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Unfilled", "Reason"]);
    for slot in &preview.unfilled_slots {
        table.add_row(vec![
            Cell::new(&slot.time_range).fg(Color::Red),
            Cell::new(&slot.reason),
        ]);
    }
    table.to_string()
}

pub fn render_violations_table(preview: &Preview) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Staff", "Rule", "Detail"]);
    for v in &preview.violations {
        table.add_row(vec![
            v.staff_name.clone(),
            format!("{:?}", v.kind).to_uppercase(),
            v.detail.clone(),
        ]);
    }
    table.to_string()
}

pub fn render_session_summary(view: &SessionView) -> String {
    let mut out = format!(
        "state: {:?}\ncredential: {}\n",
        view.state,
        if view.initialized { "active" } else { "absent" }
    );
    if let Some(error) = &view.error {
        out.push_str(&format!("last error: {error}\n"));
    }
    if let Some(error) = &view.credential_error {
        out.push_str(&format!("credential error: {error}\n"));
    }
    out
}

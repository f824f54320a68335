use anyhow::{Context, Result};
use serde::Serialize;

pub fn render_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.context("failed serializing output")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::render_json;

    #[test]
    fn compact_output_is_single_line() {
        let value = json!({"beforeCoverage": 50, "afterCoverage": 75});
        let compact = render_json(&value, false).expect("render");
        assert!(!compact.contains('\n'));
        assert!(render_json(&value, true).expect("render").contains('\n'));
    }
}

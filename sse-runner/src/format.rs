//! Output-line formatting for the three places the Runner renders a value:
//! direct evaluation, a successful sample, and loop exhaustion.

use sse_core::Value;

/// `lhs = repr(value)`, with an optional ` # sampled`/` # fallback` marker
/// appended. Used for both the non-LM direct-write line and a successful
/// sample.
pub fn render_assignment(lhs: &str, value: &Value, marker: Option<&str>) -> String {
    let mut line = format!("{lhs} = {}", value.render());
    if let Some(marker) = marker {
        line.push(' ');
        line.push_str(marker);
    }
    line
}

/// The loop-exhaustion fallback line: same as [`render_assignment`], except
/// a string value is single-quoted rather than double-quoted — a literal
/// quirk of `run_formula`'s final fallback branch, preserved exactly.
pub fn render_exhaustion(lhs: &str, value: &Value, marker: &str) -> String {
    let rendered = match value {
        Value::Str(s) => format!("'{s}'"),
        other => other.render(),
    };
    format!("{lhs} = {rendered} {marker}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_assignment_quotes_strings_and_appends_marker() {
        let line = render_assignment("mood", &Value::Str("glad".into()), Some("# sampled"));
        assert_eq!(line, "mood = \"glad\" # sampled");
    }

    #[test]
    fn render_assignment_without_marker_for_direct_writes() {
        let line = render_assignment("world_time", &Value::Int(3), None);
        assert_eq!(line, "world_time = 3");
    }

    #[test]
    fn render_exhaustion_single_quotes_strings() {
        let line = render_exhaustion("mood", &Value::Str("glad".into()), "# sampled");
        assert_eq!(line, "mood = 'glad' # sampled");
    }

    #[test]
    fn render_exhaustion_leaves_numbers_bare() {
        let line = render_exhaustion("count", &Value::Int(3), "# sampled");
        assert_eq!(line, "count = 3 # sampled");
    }
}

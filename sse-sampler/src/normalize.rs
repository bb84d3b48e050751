//! Cleanup applied to a sampled completion before the Runner sees it.
//!
//! A model reply routinely arrives wrapped in code fences and with quotes
//! escaped in whatever style the provider's chat template favors. These
//! helpers turn that into the single assignment line the Runner expects,
//! mirroring the shape (not the exact regex) of the original's
//! `clean_string`/`sampling` post-processing.

use crate::SampleMode;

/// Undo the escaping a model reply tends to apply to quote characters.
/// Order matters: doubled-backslash sequences must collapse before the
/// single-backslash cases are considered, or a `\\"` would be read as an
/// escaped quote rather than a literal backslash.
pub fn unescape_quotes(text: &str) -> String {
    text.replace("\\\"", "\"")
        .replace("\\'", "")
        .replace('"', "\"")
        .replace('\'', "")
}

/// Strip one layer of leading/trailing escaped quote markers from a single
/// line, plus any trailing stray backslash left behind.
pub fn strip_escaped_quote_wrapper(line: &str) -> String {
    let bytes: Vec<char> = line.chars().collect();
    let mut start = 0;
    while start < bytes.len() && bytes[start] == '\\' {
        start += 1;
    }
    let mut out = if start > 0 && start < bytes.len() && (bytes[start] == '"' || bytes[start] == '\'') {
        let marker_len = start + 1;
        if bytes.len() >= marker_len * 2 {
            bytes[marker_len..bytes.len() - marker_len].iter().collect()
        } else {
            line.to_string()
        }
    } else {
        line.to_string()
    };
    if out.ends_with('\\') {
        out.pop();
    }
    out
}

/// Drop leading fenced-code-block marker lines (` ``` ` / ` ```python `).
fn skip_fence_markers(lines: &[&str]) -> Vec<String> {
    let mut rest: Vec<&str> = lines.to_vec();
    while let Some(first) = rest.first() {
        let trimmed = first.trim();
        if trimmed == "```" || trimmed == "```python" {
            rest.remove(0);
        } else {
            break;
        }
    }
    rest.iter().map(|s| s.to_string()).collect()
}

/// Pick the candidate assignment line out of a raw completion, matching
/// the Sampler Oracle's `full` vs `rhs_only` contract: `full` scans for the
/// first line that (after per-line quote stripping) starts with
/// `default_assignment`; `rhs_only` always takes the first non-fence line
/// verbatim (trimmed).
pub fn select_candidate_line(raw: &str, default_assignment: &str, mode: SampleMode) -> String {
    let cleaned = unescape_quotes(raw);
    let all_lines: Vec<&str> = cleaned.split('\n').collect();
    let lines = skip_fence_markers(&all_lines);

    match mode {
        SampleMode::RhsOnly => lines.first().map(|l| l.trim().to_string()).unwrap_or_default(),
        SampleMode::Full => {
            for line in &lines {
                let candidate = strip_escaped_quote_wrapper(line);
                if candidate.trim().starts_with(default_assignment) {
                    return candidate.trim().to_string();
                }
            }
            String::new()
        }
    }
}

//! Assignment-line parsing: splitting `LHS = RHS` and extracting nested
//! subscript keys, grounded on `run_formula`'s direct-evaluation branch.

/// Split `formula` on its first `=`, trimming both sides. `None` if no `=`
/// is present at all. Deliberately naive (first `=` wins, `==` inside the
/// RHS is not special-cased) — this mirrors `formula.split('=', 1)` in the
/// original exactly, quirk included.
pub fn split_assignment(formula: &str) -> Option<(String, String)> {
    let idx = formula.find('=')?;
    let (lhs, rest) = formula.split_at(idx);
    Some((lhs.trim().to_string(), rest[1..].trim().to_string()))
}

/// Extract every `['key']` segment from `lhs`, in order. Mirrors the
/// original's `re.findall(r"\['(.*?)'\]", lhs)` — only straight single
/// quotes are recognised, and each match is non-greedy.
pub fn extract_single_quoted_keys(lhs: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut i = 0;
    while i + 1 < lhs.len() {
        if lhs.as_bytes()[i] == b'[' && lhs.as_bytes()[i + 1] == b'\'' {
            if let Some(rel) = lhs[i + 2..].find("']") {
                let end = i + 2 + rel;
                keys.push(lhs[i + 2..end].to_string());
                i = end + 2;
                continue;
            }
        }
        i += 1;
    }
    keys
}

/// The state path to assign `lhs` into: the bracketed key chain if `lhs`
/// contains `['`, otherwise `lhs` itself as a single flat top-level key.
pub fn assignment_path(lhs: &str) -> Vec<String> {
    if lhs.contains("['") {
        extract_single_quoted_keys(lhs)
    } else {
        vec![lhs.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_equals() {
        assert_eq!(
            split_assignment("mood = 'glad'"),
            Some(("mood".to_string(), "'glad'".to_string()))
        );
    }

    #[test]
    fn no_equals_is_none() {
        assert_eq!(split_assignment("agent_1_mood"), None);
    }

    #[test]
    fn extracts_single_bracket_key() {
        assert_eq!(extract_single_quoted_keys("state['mood']"), vec!["mood".to_string()]);
    }

    #[test]
    fn extracts_nested_bracket_keys_in_order() {
        assert_eq!(
            extract_single_quoted_keys("state['a']['b']"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn assignment_path_falls_back_to_flat_key() {
        assert_eq!(assignment_path("world_time"), vec!["world_time".to_string()]);
    }

    #[test]
    fn assignment_path_ignores_leading_identifier_before_bracket() {
        assert_eq!(assignment_path("state['mood']"), vec!["mood".to_string()]);
    }
}

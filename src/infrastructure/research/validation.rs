use std::collections::HashSet;

use crate::domain::DomainError;

/// Trim, drop blanks and case-insensitive duplicates, then keep exactly `expected` entries
///
/// Fewer than `expected` usable entries is a schema violation.
pub(crate) fn distinct_entries(
    entries: impl IntoIterator<Item = String>,
    expected: usize,
    what: &str,
) -> Result<Vec<String>, DomainError> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(expected);

    for entry in entries {
        let entry = entry.trim();

        if entry.is_empty() || !seen.insert(entry.to_lowercase()) {
            continue;
        }

        kept.push(entry.to_string());

        if kept.len() == expected {
            return Ok(kept);
        }
    }

    Err(DomainError::schema_validation(format!(
        "expected {} distinct {}, got {}",
        expected,
        what,
        kept.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_truncates_to_expected() {
        let kept = distinct_entries(strings(&["a", "b", "c", "d"]), 3, "queries").unwrap();
        assert_eq!(kept, strings(&["a", "b", "c"]));
    }

    #[test]
    fn test_drops_blanks_and_duplicates() {
        let kept =
            distinct_entries(strings(&[" a ", "", "A", "b", "  ", "c"]), 3, "queries").unwrap();
        assert_eq!(kept, strings(&["a", "b", "c"]));
    }

    #[test]
    fn test_too_few_is_schema_violation() {
        let err = distinct_entries(strings(&["a", "a"]), 2, "follow-up questions").unwrap_err();
        assert_eq!(
            err,
            DomainError::schema_validation("expected 2 distinct follow-up questions, got 1")
        );
    }
}

//! Verified reads: parse, write back, and compare with the input.

use crate::error::{HtkError, Result};

/// Collapse runs of whitespace, trim line ends and drop blank lines.
///
/// Each surviving line keeps its 1-based number in the original text.
pub(crate) fn normalize_whitespace(text: &str) -> Vec<(usize, String)> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let normalized = line.split_whitespace().collect::<Vec<_>>().join(" ");
            (!normalized.is_empty()).then_some((i + 1, normalized))
        })
        .collect()
}

/// Fail unless `rewritten` equals `original` up to whitespace.
pub(crate) fn verify_round_trip(original: &str, rewritten: &str) -> Result<()> {
    let expected = normalize_whitespace(original);
    let found = normalize_whitespace(rewritten);

    for (i, (line, text)) in expected.iter().enumerate() {
        match found.get(i) {
            Some((_, out)) if out == text => {}
            Some((_, out)) => {
                return Err(HtkError::Verification {
                    line: *line,
                    expected: text.clone(),
                    found: out.clone(),
                })
            }
            None => {
                return Err(HtkError::Verification {
                    line: *line,
                    expected: text.clone(),
                    found: "<end of output>".to_string(),
                })
            }
        }
    }
    if let Some((_, extra)) = found.get(expected.len()) {
        let line = expected.last().map_or(1, |(line, _)| line + 1);
        return Err(HtkError::Verification {
            line,
            expected: "<end of input>".to_string(),
            found: extra.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_spacing_and_blank_lines() {
        let lines = normalize_whitespace("  a   b \n\n\tc\r\n");
        assert_eq!(lines, vec![(1, "a b".to_string()), (3, "c".to_string())]);
    }

    #[test]
    fn reports_first_differing_line() {
        verify_round_trip("a\n\nb c\n", "a\nb   c").unwrap();
        match verify_round_trip("a\nb\n", "a\nx\n").unwrap_err() {
            HtkError::Verification { line, expected, found } => {
                assert_eq!((line, expected.as_str(), found.as_str()), (2, "b", "x"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn reports_length_mismatch() {
        assert!(matches!(
            verify_round_trip("a\nb\n", "a\n").unwrap_err(),
            HtkError::Verification { line: 2, .. }
        ));
        assert!(matches!(
            verify_round_trip("a\n", "a\nb\n").unwrap_err(),
            HtkError::Verification { line: 2, .. }
        ));
    }
}

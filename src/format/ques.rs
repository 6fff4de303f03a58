//! HTK / HTS question sets.
//!
//! Two spellings are in use:
//!
//! ```text
//! QS "C-a" {*-a+*,*-aa+*}          question file (.hed), name quoted
//! QS C-a { "*-a+*","*-aa+*" }      tree file header, patterns quoted
//! ```
//!
//! Blank lines and `#` comments are ignored.

use std::iter::Peekable;

use serde::{Deserialize, Serialize};

use crate::data::question::{Question, QuestionSet};
use crate::error::{HtkError, Result};
use crate::lex::{Lexer, Lines, SourceLine, Token};

use super::verify::verify_round_trip;

/// Which spelling of `QS` lines to read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuestionDialect {
    /// Stand-alone question file: quoted name, bare patterns.
    #[default]
    QuestionFile,
    /// Header of a tree file: bare name, quoted patterns.
    TreeFile,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a question set. Every non-blank, non-comment line must be a `QS`
/// declaration.
pub fn parse_questions(text: &str, dialect: QuestionDialect) -> Result<QuestionSet> {
    let mut lines = Lexer::new(text).lines().peekable();
    let questions = parse_question_header(&mut lines, dialect)?;
    if let Some(line) = lines.find(|l| !l.is_blank() && !l.is_comment()) {
        let first = line.tokens().next();
        return Err(match first {
            Some(tok) => tok.error(format!("expected `QS`, found `{}`", tok.text)),
            None => line.error_at_end("expected `QS`"),
        });
    }
    log::debug!("parsed {} questions", questions.len());
    Ok(questions)
}

/// Parse a question set from raw bytes.
pub fn parse_question_bytes(bytes: &[u8], dialect: QuestionDialect) -> Result<QuestionSet> {
    parse_questions(Lexer::from_bytes(bytes)?.input(), dialect)
}

/// Parse, re-serialise and check the output matches the input up to
/// whitespace.
pub fn parse_questions_verifying(text: &str, dialect: QuestionDialect) -> Result<QuestionSet> {
    let questions = parse_questions(text, dialect)?;
    verify_round_trip(text, &write_questions(&questions, dialect))?;
    Ok(questions)
}

/// Consume the leading run of `QS` lines (plus blanks and comments).
///
/// Stops at, without consuming, the first line that is anything else.
pub(crate) fn parse_question_header(
    lines: &mut Peekable<Lines<'_>>,
    dialect: QuestionDialect,
) -> Result<QuestionSet> {
    let mut questions = QuestionSet::new();
    while let Some(line) = lines.peek() {
        if line.is_blank() || line.is_comment() {
            lines.next();
            continue;
        }
        if line.tokens().next().map(|t| t.text) != Some("QS") {
            break;
        }
        let line = *line;
        lines.next();

        let (name_token, question) = parse_question_line(&line, dialect)?;
        if questions.contains(&question.name) {
            return Err(name_token.error(format!(
                "duplicate question name {}",
                question.name
            )));
        }
        questions.insert(question)?;
    }
    Ok(questions)
}

fn parse_question_line<'a>(
    line: &SourceLine<'a>,
    dialect: QuestionDialect,
) -> Result<(Token<'a>, Question)> {
    let mut tokens = line.tokens();
    // Caller checked the keyword.
    tokens.next();

    let name_token = match tokens.next() {
        Some(tok) if !tok.text.starts_with('{') => tok,
        Some(tok) => return Err(tok.error("missing question name")),
        None => return Err(line.error_at_end("missing question name")),
    };
    let name = match dialect {
        QuestionDialect::QuestionFile => name_token.unquoted()?,
        QuestionDialect::TreeFile if name_token.text.starts_with('"') => {
            return Err(name_token.error("question names are not quoted in tree files"));
        }
        QuestionDialect::TreeFile => name_token.text,
    };
    if name.is_empty() {
        return Err(name_token.error("empty question name"));
    }

    let body_tokens: Vec<Token<'a>> = tokens.collect();
    let open = match body_tokens.first() {
        Some(tok) if tok.text.starts_with('{') => *tok,
        Some(tok) => return Err(tok.error(format!("expected `{{`, found `{}`", tok.text))),
        None => return Err(line.error_at_end("missing `{`")),
    };
    let body: String = body_tokens.iter().map(|t| t.text).collect();
    let inner = match body.strip_prefix('{').and_then(|b| b.strip_suffix('}')) {
        Some(inner) => inner,
        None => return Err(line.error_at_end("missing `}`")),
    };
    if inner.contains(['{', '}']) {
        return Err(open.error("unbalanced braces in pattern list"));
    }
    if inner.is_empty() {
        return Err(open.error(format!("question {name} has an empty pattern list")));
    }

    let mut patterns = Vec::new();
    for raw in inner.split(',') {
        let pattern = match dialect {
            QuestionDialect::TreeFile => {
                let unquoted = raw
                    .strip_prefix('"')
                    .and_then(|p| p.strip_suffix('"'))
                    .filter(|p| !p.contains('"'));
                match unquoted {
                    Some(p) => p,
                    None => {
                        return Err(open.error(format!(
                            "pattern `{raw}` of question {name} must be quoted"
                        )))
                    }
                }
            }
            QuestionDialect::QuestionFile if raw.contains('"') => {
                return Err(open.error(format!(
                    "pattern `{raw}` of question {name} must not be quoted"
                )));
            }
            QuestionDialect::QuestionFile => raw,
        };
        if pattern.is_empty() {
            return Err(open.error(format!("question {name} has an empty pattern")));
        }
        patterns.push(pattern.to_string());
    }

    let question = Question::new(name, patterns).map_err(|e| match e {
        HtkError::Structure { message, .. } => name_token.error(message),
        other => other,
    })?;
    Ok((name_token, question))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// One `QS` line per question, in set order.
pub fn write_question_lines(questions: &QuestionSet, dialect: QuestionDialect) -> Vec<String> {
    questions
        .iter()
        .map(|q| match dialect {
            QuestionDialect::QuestionFile => {
                format!("QS \"{}\" {{{}}}", q.name, q.patterns.join(","))
            }
            QuestionDialect::TreeFile => {
                let patterns: Vec<String> =
                    q.patterns.iter().map(|p| format!("\"{p}\"")).collect();
                format!("QS {} {{ {} }}", q.name, patterns.join(","))
            }
        })
        .collect()
}

/// Serialise a question set, one newline-terminated line per question.
pub fn write_questions(questions: &QuestionSet, dialect: QuestionDialect) -> String {
    let mut out = String::new();
    for line in write_question_lines(questions, dialect) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(questions: &[(&str, &[&str])]) -> QuestionSet {
        QuestionSet::try_from(
            questions
                .iter()
                .map(|(name, pats)| Question::new(*name, pats.iter().copied()).unwrap())
                .collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn parses_question_file_dialect() {
        let text = "# phone identity\nQS \"C-a\" {*-a+*}\n\nQS \"L-Vowel\" {a^*,e^*}\n";
        let questions = parse_questions(text, QuestionDialect::QuestionFile).unwrap();
        assert_eq!(questions, set(&[("C-a", &["*-a+*"]), ("L-Vowel", &["a^*", "e^*"])]));
    }

    #[test]
    fn parses_tree_file_dialect() {
        let text = "QS C-a { \"*-a+*\",\"*-aa+*\" }\n";
        let questions = parse_questions(text, QuestionDialect::TreeFile).unwrap();
        assert_eq!(questions, set(&[("C-a", &["*-a+*", "*-aa+*"])]));
    }

    #[test]
    fn tolerates_spacing_inside_braces() {
        let text = "QS \"q\" { a, b }\n";
        let questions = parse_questions(text, QuestionDialect::QuestionFile).unwrap();
        assert_eq!(questions.get("q").unwrap().patterns, vec!["a", "b"]);
    }

    #[test]
    fn write_then_parse_is_identity() {
        let questions = set(&[
            ("q1", &["a", "b"]),
            ("q2", &["c"]),
            ("R-Stop", &["*+p=*", "*+t=*", "*+k=*"]),
        ]);
        for dialect in [QuestionDialect::QuestionFile, QuestionDialect::TreeFile] {
            let text = write_questions(&questions, dialect);
            assert_eq!(parse_questions(&text, dialect).unwrap(), questions);
        }
        assert_eq!(
            write_question_lines(&questions, QuestionDialect::TreeFile)[0],
            "QS q1 { \"a\",\"b\" }"
        );
        assert_eq!(
            write_question_lines(&questions, QuestionDialect::QuestionFile)[0],
            "QS \"q1\" {a,b}"
        );
    }

    #[test]
    fn empty_pattern_list_is_a_syntax_error() {
        let err = parse_questions("QS \"name\" { }\n", QuestionDialect::QuestionFile).unwrap_err();
        match err {
            HtkError::Syntax { line, column, .. } => assert_eq!((line, column), (1, 11)),
            other => panic!("expected syntax error, got {other:?}"),
        }
        let err = parse_questions("QS name { }", QuestionDialect::TreeFile).unwrap_err();
        assert!(matches!(err, HtkError::Syntax { .. }));
    }

    #[test]
    fn missing_braces_are_syntax_errors() {
        let err = parse_questions("QS \"q\" a,b}\n", QuestionDialect::QuestionFile).unwrap_err();
        assert!(err.to_string().contains("expected `{`"));
        let err = parse_questions("QS \"q\" {a,b\n", QuestionDialect::QuestionFile).unwrap_err();
        assert!(err.to_string().contains("missing `}`"));
        let err = parse_questions("QS \"q\"\n", QuestionDialect::QuestionFile).unwrap_err();
        assert!(err.to_string().contains("missing `{`"));
    }

    #[test]
    fn duplicate_name_reports_line() {
        let text = "QS \"q\" {a}\nQS \"r\" {b}\nQS \"q\" {c}\n";
        match parse_questions(text, QuestionDialect::QuestionFile).unwrap_err() {
            HtkError::Syntax { line, column, message } => {
                assert_eq!((line, column), (3, 4));
                assert!(message.contains("duplicate question name q"));
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn dialect_quoting_is_enforced() {
        let err = parse_questions("QS q {a}\n", QuestionDialect::QuestionFile).unwrap_err();
        assert!(err.to_string().contains("expected a quoted string"));
        let err = parse_questions("QS q { a }\n", QuestionDialect::TreeFile).unwrap_err();
        assert!(err.to_string().contains("must be quoted"));
        let err = parse_questions("QS \"q\" { \"a\" }\n", QuestionDialect::TreeFile).unwrap_err();
        assert!(err.to_string().contains("not quoted in tree files"));
    }

    #[test]
    fn non_question_line_is_rejected() {
        let err = parse_questions("QS \"q\" {a}\nTB 100 q_s2 {*}\n", QuestionDialect::QuestionFile)
            .unwrap_err();
        match err {
            HtkError::Syntax { line, .. } => assert_eq!(line, 2),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn verifying_read_accepts_canonical_and_flags_rewrites() {
        let canonical = "QS \"q\" {a,b}\nQS \"r\" {c}\n";
        parse_questions_verifying(canonical, QuestionDialect::QuestionFile).unwrap();

        // Extra whitespace is normalised away.
        parse_questions_verifying("QS   \"q\"  {a,b}  \n\nQS \"r\" {c}", QuestionDialect::QuestionFile)
            .unwrap();

        // Spaces inside the braces do not survive re-serialisation.
        let err = parse_questions_verifying("QS \"q\" { a,b }\n", QuestionDialect::QuestionFile)
            .unwrap_err();
        assert!(matches!(err, HtkError::Verification { line: 1, .. }));
    }

    #[test]
    fn invalid_utf8_is_a_lex_error() {
        let err = parse_question_bytes(b"QS \"q\" {\xff}", QuestionDialect::QuestionFile).unwrap_err();
        assert!(matches!(err, HtkError::Lex { line: 1, column: 9, .. }));
    }
}

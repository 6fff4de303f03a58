//! HTS decision tree files (`.inf`).
//!
//! ```text
//! QS C-a { "*-a+*" }
//! QS R-t { "*+t=*" }
//!
//!  {*}[2]
//! {
//!  0 C-a "mgc_s2_1" -1
//!  -1 R-t "mgc_s2_2" "mgc_s2_3"
//! }
//!
//!  dur_s2[2]
//!  "dur_s2_1"
//! ```
//!
//! Each record is `index question no-child yes-child`; a child is another
//! record index or a leaf. Leaves are `"macro"`, `[v1,v2,...]` or both
//! (`"macro"[v1,...]`). A tree that is a lone leaf has no `{ }` block.

use serde::{Deserialize, Serialize};

use crate::data::question::QuestionSet;
use crate::data::tree::{ChildRef, DecisionTree, LeafNode, SplitRecord, StreamSpec, TreeFile, TreeNode};
use crate::error::{HtkError, Result};
use crate::lex::{Lexer, SourceLine, Token};

use super::ques::{parse_question_header, write_question_lines, QuestionDialect};
use super::verify::verify_round_trip;

/// Output settings for tree files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeFormat {
    /// Decimal places for numeric leaf values.
    pub precision: usize,
}

impl Default for TreeFormat {
    fn default() -> Self {
        Self { precision: 6 }
    }
}

impl TreeFormat {
    pub fn with_precision(precision: usize) -> Self {
        Self { precision }
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Parse a complete tree file: question header followed by trees.
///
/// Every question used by a tree must be declared in the header.
pub fn parse_tree_file(text: &str) -> Result<TreeFile> {
    let mut lines = Lexer::new(text).lines().peekable();
    let questions = parse_question_header(&mut lines, QuestionDialect::TreeFile)?;
    let trees = parse_tree_blocks(lines)?;
    let file = TreeFile { questions, trees };
    file.validate()?;
    log::debug!(
        "parsed tree file with {} questions and {} trees",
        file.questions.len(),
        file.trees.len()
    );
    Ok(file)
}

/// Parse a tree file from raw bytes.
pub fn parse_tree_file_bytes(bytes: &[u8]) -> Result<TreeFile> {
    parse_tree_file(Lexer::from_bytes(bytes)?.input())
}

/// Parse a tree file and check that writing it back with `format`
/// reproduces the input up to whitespace.
pub fn parse_tree_file_verifying(text: &str, format: &TreeFormat) -> Result<TreeFile> {
    let file = parse_tree_file(text)?;
    verify_round_trip(text, &write_tree_file(&file, format))?;
    Ok(file)
}

/// Parse tree blocks with no question header, resolving questions against
/// `questions`.
pub fn parse_trees(text: &str, questions: &QuestionSet) -> Result<Vec<DecisionTree>> {
    let trees = parse_tree_blocks(Lexer::new(text).lines())?;
    for tree in &trees {
        tree.validate_questions(questions)?;
    }
    Ok(trees)
}

/// Parse exactly one tree block.
pub fn parse_tree(text: &str, questions: &QuestionSet) -> Result<DecisionTree> {
    let mut trees = parse_trees(text, questions)?;
    match trees.len() {
        1 => Ok(trees.remove(0)),
        n => Err(HtkError::structure(format!("expected one tree, found {n}"))),
    }
}

enum State {
    /// Between trees, expecting a stream spec.
    Stream,
    /// After a stream spec, expecting `{` or a lone leaf.
    Body { stream: StreamSpec, line: usize },
    /// Inside `{ ... }`.
    Records {
        stream: StreamSpec,
        open_line: usize,
        records: Vec<SplitRecord>,
    },
}

fn parse_tree_blocks<'a>(lines: impl Iterator<Item = SourceLine<'a>>) -> Result<Vec<DecisionTree>> {
    let mut trees = Vec::new();
    let mut state = State::Stream;

    for line in lines {
        if line.is_blank() || line.is_comment() {
            continue;
        }
        let tokens = line.tokens().collect_all();
        let first = tokens[0];

        state = match state {
            State::Stream => {
                if first.text == "QS" {
                    return Err(first.error("questions must be declared before the first tree"));
                }
                if let Some(extra) = tokens.get(1) {
                    return Err(extra.error("expected a stream spec on its own line"));
                }
                if first.text == "{" || first.text == "}" || first.text.starts_with('"') {
                    return Err(first.error(format!("expected a stream spec, found `{}`", first.text)));
                }
                let stream = StreamSpec::new(first.text).map_err(|_| first.error("invalid stream spec"))?;
                State::Body {
                    stream,
                    line: line.number,
                }
            }
            State::Body { stream, .. } => {
                if let Some(extra) = tokens.get(1) {
                    return Err(extra.error(format!(
                        "expected `{{` or a leaf after stream spec {stream}"
                    )));
                }
                if first.text == "{" {
                    State::Records {
                        stream,
                        open_line: line.number,
                        records: Vec::new(),
                    }
                } else if is_leaf_token(&first) {
                    log::trace!("tree {stream} is a single leaf");
                    trees.push(DecisionTree::leaf(stream, parse_leaf(&first)?)?);
                    State::Stream
                } else {
                    return Err(first.error(format!(
                        "expected `{{` or a leaf after stream spec {stream}, found `{}`",
                        first.text
                    )));
                }
            }
            State::Records {
                stream,
                open_line,
                mut records,
            } => {
                if tokens.len() == 1 && first.text == "}" {
                    log::trace!("tree {stream} has {} split records", records.len());
                    trees.push(DecisionTree::from_records(stream, records)?);
                    State::Stream
                } else {
                    records.push(parse_record(&line, &tokens)?);
                    State::Records {
                        stream,
                        open_line,
                        records,
                    }
                }
            }
        };
    }

    match state {
        State::Stream => Ok(trees),
        State::Body { stream, line } => Err(HtkError::syntax(
            line,
            1,
            format!("tree {stream} has no body"),
        )),
        State::Records {
            stream, open_line, ..
        } => Err(HtkError::syntax(
            open_line,
            1,
            format!("tree {stream}: `{{` is never closed"),
        )),
    }
}

fn parse_record(line: &SourceLine<'_>, tokens: &[Token<'_>]) -> Result<SplitRecord> {
    let [index, question, no, yes] = tokens else {
        return Err(match tokens.get(4) {
            Some(extra) => extra.error("unexpected field after node record"),
            None => line.error_at_end("expected `index question no-child yes-child`"),
        });
    };
    if question.text.starts_with('"') {
        return Err(question.error("expected a question name, found a leaf"));
    }
    Ok(SplitRecord {
        index: index.parse("a node index")?,
        question: question.text.to_string(),
        no: parse_child(no)?,
        yes: parse_child(yes)?,
        line: Some(line.number),
    })
}

fn is_leaf_token(token: &Token<'_>) -> bool {
    token.text.starts_with('"') || token.text.starts_with('[')
}

fn parse_child(token: &Token<'_>) -> Result<ChildRef> {
    if is_leaf_token(token) {
        Ok(ChildRef::Leaf(parse_leaf(token)?))
    } else {
        Ok(ChildRef::Split(token.parse("a node index or leaf")?))
    }
}

fn parse_leaf(token: &Token<'_>) -> Result<LeafNode> {
    let text = token.text;
    let (macro_id, rest) = match text.strip_prefix('"') {
        Some(quoted) => {
            let close = quoted
                .find('"')
                .ok_or_else(|| token.error("unterminated leaf name"))?;
            if close == 0 {
                return Err(token.error("empty leaf name"));
            }
            (Some(quoted[..close].to_string()), &quoted[close + 1..])
        }
        None => (None, text),
    };

    let values = if rest.is_empty() {
        None
    } else {
        let inner = rest
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .ok_or_else(|| token.error(format!("malformed leaf `{text}`")))?;
        if inner.is_empty() {
            return Err(token.error("empty leaf value list"));
        }
        let values = inner
            .split(',')
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| token.error(format!("leaf value `{v}` is not a number")))
            })
            .collect::<Result<Vec<_>>>()?;
        Some(values)
    };

    Ok(LeafNode { macro_id, values })
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Lines for one tree block, records in arena order.
pub fn write_tree_lines(tree: &DecisionTree, format: &TreeFormat) -> Vec<String> {
    let mut out = vec![format!(" {}", tree.stream())];
    match tree.node(tree.root()) {
        TreeNode::Leaf(leaf) => out.push(format!(" {}", format_leaf(leaf, format))),
        TreeNode::Internal(_) => {
            out.push("{".to_string());
            for record in tree.records() {
                out.push(format!(
                    " {} {} {} {}",
                    record.index,
                    record.question,
                    format_child(&record.no, format),
                    format_child(&record.yes, format)
                ));
            }
            out.push("}".to_string());
        }
    }
    out
}

/// Serialise one tree block.
pub fn write_tree(tree: &DecisionTree, format: &TreeFormat) -> String {
    join_lines(write_tree_lines(tree, format))
}

/// Lines for a complete tree file: the question header, then each tree
/// preceded by a blank line.
pub fn write_tree_file_lines(file: &TreeFile, format: &TreeFormat) -> Vec<String> {
    let mut out = write_question_lines(&file.questions, QuestionDialect::TreeFile);
    for tree in &file.trees {
        out.push(String::new());
        out.extend(write_tree_lines(tree, format));
    }
    out.push(String::new());
    out
}

/// Serialise a complete tree file.
pub fn write_tree_file(file: &TreeFile, format: &TreeFormat) -> String {
    join_lines(write_tree_file_lines(file, format))
}

fn join_lines(lines: Vec<String>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn format_child(child: &ChildRef, format: &TreeFormat) -> String {
    match child {
        ChildRef::Split(index) => index.to_string(),
        ChildRef::Leaf(leaf) => format_leaf(leaf, format),
    }
}

fn format_leaf(leaf: &LeafNode, format: &TreeFormat) -> String {
    let mut out = String::new();
    if let Some(id) = &leaf.macro_id {
        out.push('"');
        out.push_str(id);
        out.push('"');
    }
    if let Some(values) = &leaf.values {
        let values: Vec<String> = values
            .iter()
            .map(|v| format!("{:.*}", format.precision, v))
            .collect();
        out.push('[');
        out.push_str(&values.join(","));
        out.push(']');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::question::Question;
    use crate::data::tree::Node;

    const SAMPLE: &str = "\
QS C-a { \"*-a+*\" }
QS R-t { \"*+t=*\",\"*+d=*\" }

 {*}[2]
{
 0 C-a \"mgc_s2_1\" -1
 -1 R-t \"mgc_s2_2\" \"mgc_s2_3\"
}

 dur_s2[2]
 \"dur_s2_1\"

";

    fn two_questions() -> QuestionSet {
        QuestionSet::try_from(vec![
            Question::new("q1", ["a", "b"]).unwrap(),
            Question::new("q2", ["c"]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn parses_sample_file() {
        let file = parse_tree_file(SAMPLE).unwrap();
        assert_eq!(file.questions.len(), 2);
        assert_eq!(file.trees.len(), 2);

        let tree = &file.trees[0];
        assert_eq!(tree.stream().state(), Some(2));
        let root = tree.internal(tree.root()).unwrap();
        assert_eq!((root.index, root.question.as_str()), (0, "C-a"));
        match tree.node(root.no) {
            TreeNode::Leaf(leaf) => assert_eq!(leaf.macro_id.as_deref(), Some("mgc_s2_1")),
            TreeNode::Internal(_) => panic!("no-branch of root should be a leaf"),
        }
        assert_eq!(tree.internal(root.yes).unwrap().index, -1);

        assert!(file.trees[1].is_degenerate());
        assert_eq!(file.tree("dur_s2[2]").unwrap().len(), 1);
    }

    #[test]
    fn sample_file_round_trips_exactly() {
        let file = parse_tree_file_verifying(SAMPLE, &TreeFormat::default()).unwrap();
        assert_eq!(write_tree_file(&file, &TreeFormat::default()), SAMPLE);
    }

    #[test]
    fn end_to_end_three_node_tree() {
        let questions = two_questions();
        let stream = StreamSpec::new("mgc_s2[2]").unwrap();
        let tree = DecisionTree::from_root(stream, Node::split("q1", Node::leaf("L0"), Node::leaf("L1")))
            .unwrap();

        let text = write_tree(&tree, &TreeFormat::default());
        assert_eq!(text, " mgc_s2[2]\n{\n 0 q1 \"L0\" \"L1\"\n}\n");

        let parsed = parse_tree(&text, &questions).unwrap();
        assert_eq!(parsed, tree);
        assert_eq!(parsed.question_at(parsed.root(), &questions).unwrap().name, "q1");
    }

    #[test]
    fn whole_file_round_trip() {
        let questions = two_questions();
        let trees = vec![
            DecisionTree::from_root(
                StreamSpec::new("{*}[2]").unwrap(),
                Node::split(
                    "q1",
                    Node::split("q2", Node::leaf("a"), Node::leaf("b")),
                    Node::leaf("c"),
                ),
            )
            .unwrap(),
            DecisionTree::leaf(StreamSpec::new("{*}[3]").unwrap(), LeafNode::macro_id("d")).unwrap(),
        ];
        let file = TreeFile { questions, trees };
        let text = write_tree_file(&file, &TreeFormat::default());
        assert_eq!(parse_tree_file(&text).unwrap(), file);
    }

    #[test]
    fn numeric_leaves_use_fixed_precision() {
        let tree = DecisionTree::from_root(
            StreamSpec::new("lf0[2]").unwrap(),
            Node::split(
                "q1",
                Node::Leaf(LeafNode::values(vec![0.5, -1.25])),
                Node::Leaf(LeafNode::macro_id("m").with_values(vec![3.0])),
            ),
        )
        .unwrap();
        let text = write_tree(&tree, &TreeFormat::with_precision(3));
        assert!(text.contains(" 0 q1 [0.500,-1.250] \"m\"[3.000]"));
        assert_eq!(parse_tree(&text, &two_questions()).unwrap(), tree);
    }

    #[test]
    fn any_buildable_tree_reads_back() {
        let questions = two_questions();
        let tree = DecisionTree::from_root(
            StreamSpec::new("[2]").unwrap(),
            Node::split(
                "q1",
                Node::split("q2", Node::leaf("a[1]"), Node::leaf("x,y")),
                Node::Leaf(LeafNode::macro_id("{*}").with_values(vec![-0.5])),
            ),
        )
        .unwrap();
        let text = write_tree(&tree, &TreeFormat::default());
        assert_eq!(parse_tree(&text, &questions).unwrap(), tree);

        // Leaves the writer could not express never reach it.
        let blank = Node::Leaf(LeafNode {
            macro_id: None,
            values: None,
        });
        for bad in [blank, Node::leaf("a b"), Node::Leaf(LeafNode::values(vec![]))] {
            let root = Node::split("q1", bad, Node::leaf("b"));
            let err = DecisionTree::from_root(StreamSpec::new("s[2]").unwrap(), root).unwrap_err();
            assert!(matches!(err, HtkError::Structure { .. }), "{err}");
        }
    }

    #[test]
    fn shared_child_is_a_structure_error() {
        let text = "\
 s[2]
{
 0 q1 1 2
 1 q1 3 \"a\"
 2 q1 3 \"b\"
 3 q2 \"c\" \"d\"
}
";
        match parse_tree(text, &two_questions()).unwrap_err() {
            HtkError::Structure { line, message } => {
                assert_eq!(line, Some(5));
                assert!(message.contains("node 3 is referenced by both node 1 and node 2"));
            }
            other => panic!("expected structure error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_question_is_a_structure_error() {
        let text = " s[2]\n{\n 0 q9 \"a\" \"b\"\n}\n";
        let err = parse_tree(text, &two_questions()).unwrap_err();
        assert!(matches!(err, HtkError::Structure { .. }));

        let file_text = "QS q1 { \"a\" }\n\n s[2]\n{\n 0 q9 \"a\" \"b\"\n}\n";
        assert!(matches!(
            parse_tree_file(file_text).unwrap_err(),
            HtkError::Structure { .. }
        ));
    }

    #[test]
    fn malformed_records_are_syntax_errors() {
        let questions = two_questions();
        let cases = [
            (" s[2]\n{\n 0 q1 \"a\"\n}\n", 3),
            (" s[2]\n{\n x q1 \"a\" \"b\"\n}\n", 3),
            (" s[2]\n{\n 0 q1 \"a\" \"b\" extra\n}\n", 3),
            (" s[2]\n{\n 0 q1 \"a\" [1.0,x]\n}\n", 3),
            (" s[2]\n{\n 0 q1 \"a\" \"b\"\n", 2),
            (" s[2]\n", 1),
        ];
        for (text, expected_line) in cases {
            match parse_tree(text, &questions).unwrap_err() {
                HtkError::Syntax { line, .. } => assert_eq!(line, expected_line, "{text:?}"),
                other => panic!("expected syntax error for {text:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn questions_after_trees_are_rejected() {
        let text = "QS q1 { \"a\" }\n\n s[2]\n \"x\"\nQS q2 { \"b\" }\n";
        let err = parse_tree_file(text).unwrap_err();
        assert!(matches!(err, HtkError::Syntax { line: 5, .. }));
    }

    #[test]
    fn parse_tree_wants_exactly_one_tree() {
        let text = " a[2]\n \"x\"\n b[2]\n \"y\"\n";
        assert_eq!(parse_trees(text, &QuestionSet::new()).unwrap().len(), 2);
        assert!(parse_tree(text, &QuestionSet::new()).is_err());
    }
}

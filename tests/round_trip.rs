use pretty_assertions::assert_eq;

use htk_io::data::loader::{self, HtkFile};
use htk_io::format::{
    parse_questions, parse_tree, write_questions, write_tree, AlignmentFormat, ByteOrder,
    ElementType, QuestionDialect, TreeFormat, VecSeqFormat,
};
use htk_io::{
    AlignedSegment, DecisionTree, HtkError, LeafNode, Node, Question, QuestionSet, Segment,
    StreamSpec, TreeFile, VectorSequence,
};

fn questions() -> QuestionSet {
    QuestionSet::try_from(vec![
        Question::new("q1", ["a", "b"]).unwrap(),
        Question::new("q2", ["c"]).unwrap(),
    ])
    .unwrap()
}

#[test]
fn question_sets_round_trip_in_both_dialects() {
    let set = questions();
    for dialect in [QuestionDialect::QuestionFile, QuestionDialect::TreeFile] {
        let text = write_questions(&set, dialect);
        assert_eq!(parse_questions(&text, dialect).unwrap(), set);
    }
}

#[test]
fn empty_pattern_list_is_syntax_error() {
    let err = parse_questions("QS \"q1\" { }\n", QuestionDialect::QuestionFile).unwrap_err();
    assert!(matches!(err, HtkError::Syntax { line: 1, .. }), "{err}");
}

#[test]
fn three_node_tree_end_to_end() {
    let questions = questions();
    let tree = DecisionTree::from_root(
        StreamSpec::new("mgc_s2[2]").unwrap(),
        Node::split("q1", Node::leaf("L0"), Node::leaf("L1")),
    )
    .unwrap();

    let text = write_tree(&tree, &TreeFormat::default());
    let parsed = parse_tree(&text, &questions).unwrap();
    assert_eq!(parsed, tree);

    let root = parsed.question_at(parsed.root(), &questions).unwrap();
    assert_eq!(root.name, "q1");
    assert_eq!(parsed.find_leaf("b", &questions).unwrap(), &LeafNode::macro_id("L1"));
    assert_eq!(parsed.find_leaf("z", &questions).unwrap(), &LeafNode::macro_id("L0"));
}

#[test]
fn shared_child_is_not_a_tree() {
    let text = " s[2]\n{\n 0 q1 1 2\n 1 q1 3 \"a\"\n 2 q1 3 \"b\"\n 3 q2 \"c\" \"d\"\n}\n";
    let err = parse_tree(text, &questions()).unwrap_err();
    assert!(matches!(err, HtkError::Structure { .. }), "{err}");
}

#[test]
fn tree_file_survives_disk_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trees.inf");
    let file = TreeFile {
        questions: questions(),
        trees: vec![
            DecisionTree::from_root(
                StreamSpec::new("{*}[2]").unwrap(),
                Node::split(
                    "q1",
                    Node::split("q2", Node::leaf("m_1"), Node::leaf("m_2")),
                    Node::Leaf(LeafNode::macro_id("m_3").with_values(vec![0.25, -1.5])),
                ),
            )
            .unwrap(),
            DecisionTree::leaf(StreamSpec::new("{*}[3]").unwrap(), LeafNode::macro_id("m_4"))
                .unwrap(),
        ],
    };
    loader::write_tree_file(&path, &file, &TreeFormat::default()).unwrap();

    let back = loader::read_tree_file_verifying(&path, &TreeFormat::default()).unwrap();
    assert_eq!(back, file);
    assert_eq!(load_trees(&path), file);
}

fn load_trees(path: &std::path::Path) -> TreeFile {
    match loader::load_file(path).unwrap() {
        HtkFile::Trees(file) => file,
        other => panic!("expected a tree file, got {other:?}"),
    }
}

#[test]
fn vectors_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.mgc");
    let seq = VectorSequence::from_rows(3, [[0.5, -0.25, 1.0], [2.0, 0.125, -8.0]]).unwrap();

    for order in [ByteOrder::Little, ByteOrder::Big] {
        for element in [ElementType::F32, ElementType::F64] {
            loader::write_vectors_file(&path, &seq, element, order).unwrap();
            let format = VecSeqFormat::new(3).with_element(element).with_byte_order(order);
            assert_eq!(loader::read_vectors_file(&path, &format).unwrap(), seq);
        }
    }

    let err = loader::read_vectors_file(&path, &VecSeqFormat::new(5)).unwrap_err();
    assert!(matches!(err, HtkError::Format(_)));
}

#[test]
fn labels_and_alignments_through_files() {
    let dir = tempfile::tempdir().unwrap();

    let lab = dir.path().join("utt.lab");
    let segments = vec![
        Segment::timed(0, 500000, "sil"),
        Segment::timed(500000, 900000, "a").with_score(-3.5),
    ];
    loader::write_segments_file(&lab, &segments).unwrap();
    assert_eq!(loader::read_segments_file(&lab).unwrap(), segments);

    let format = AlignmentFormat::new(0.005);
    let alignment = vec![
        AlignedSegment::new(0, 10, "apple").with_children(vec![
            AlignedSegment::new(0, 2, "a"),
            AlignedSegment::new(2, 10, "p"),
        ]),
        AlignedSegment::new(10, 41, "pears").with_children(vec![AlignedSegment::new(10, 41, "s")]),
    ];
    let two_level = dir.path().join("utt2.lab");
    loader::write_alignment_file(&two_level, &alignment, &format).unwrap();
    assert_eq!(
        std::fs::read_to_string(&two_level).unwrap(),
        "0 100000 a apple\n100000 500000 p\n500000 2050000 s pears\n"
    );
    assert_eq!(loader::read_alignment_file(&two_level, &format).unwrap(), alignment);
}

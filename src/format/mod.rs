//! Text and binary codecs. Each submodule turns buffers into the models of
//! [`crate::data`] and back.

pub mod alignment;
pub mod ques;
pub mod tree;
pub mod vecseq;
mod verify;

pub use alignment::{
    parse_label_map, parse_segments, read_alignment, write_alignment, write_label_map,
    write_segments, AlignmentFormat, TICKS_PER_SECOND,
};
pub use ques::{
    parse_question_bytes, parse_questions, parse_questions_verifying, write_question_lines,
    write_questions, QuestionDialect,
};
pub use tree::{
    parse_tree, parse_tree_file, parse_tree_file_bytes, parse_tree_file_verifying, parse_trees,
    write_tree, write_tree_file, write_tree_file_lines, write_tree_lines, TreeFormat,
};
pub use vecseq::{
    read_hmgens_pdf, read_vectors, write_hmgens_pdf, write_vectors, ByteOrder, ElementType,
    HmgensPdf, VecSeqFormat,
};

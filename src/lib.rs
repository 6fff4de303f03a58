//! Readers and writers for HTK / HTS speech-research files: question sets,
//! decision trees, raw vector sequences and label / alignment files.
//!
//! Every codec works on in-memory buffers; [`data::loader`] adds thin file
//! wrappers on top.

pub mod data;
pub mod error;
pub mod format;
pub mod lex;

pub use data::alignment::{AlignedSegment, Alignment, FlatSegment, LabelMap, Segment};
pub use data::question::{Question, QuestionSet};
pub use data::tree::{
    leaf_macro_index, ChildRef, DecisionTree, InternalNode, LeafNode, Node, NodeId, SplitRecord,
    StreamSpec, TreeFile, TreeNode,
};
pub use data::vecseq::VectorSequence;
pub use error::{HtkError, Result};

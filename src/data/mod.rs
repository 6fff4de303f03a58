/// Data layer: in-memory models and file loading.
///
/// Architecture:
/// ```text
///  .hed / .inf / .lab / raw vectors
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  read file → format codec → model
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────────────┐
///   │ question / tree           │  QuestionSet, DecisionTree arena
///   │ vecseq / alignment        │  VectorSequence, Segment, AlignedSegment
///   └──────────────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  pattern  │  glob matching of context labels → find_leaf
///   └──────────┘
/// ```

pub mod alignment;
pub mod loader;
pub mod pattern;
pub mod question;
pub mod tree;
pub mod vecseq;

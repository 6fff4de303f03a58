use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use super::alignment::{AlignedSegment, Alignment, LabelMap, Segment};
use super::question::QuestionSet;
use super::tree::TreeFile;
use super::vecseq::VectorSequence;
use crate::error::{HtkError, Result};
use crate::format::alignment::{self as alignment_format, AlignmentFormat};
use crate::format::ques::{self, QuestionDialect};
use crate::format::tree::{self as tree_format, TreeFormat};
use crate::format::vecseq::{self, ByteOrder, ElementType, HmgensPdf, VecSeqFormat};
use crate::lex::Lexer;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// A file read by [`load_file`].
#[derive(Debug, Clone, PartialEq)]
pub enum HtkFile {
    Questions(QuestionSet),
    Trees(TreeFile),
    Segments(Vec<Segment>),
}

/// Load a text file, dispatching by extension.
///
/// Supported formats:
/// * `.hed` / `.qst` – question file (`QS "name" {pat,...}`)
/// * `.inf` / `.tree` – HTS tree file with its question header
/// * `.lab` – label file, read as raw segments
///
/// Vector files carry no shape information; use [`read_vectors_file`].
pub fn load_file(path: &Path) -> anyhow::Result<HtkFile> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "hed" | "qst" => read_questions_file(path, QuestionDialect::QuestionFile)
            .map(HtkFile::Questions)
            .with_context(|| format!("loading question file {}", path.display())),
        "inf" | "tree" => read_tree_file(path)
            .map(HtkFile::Trees)
            .with_context(|| format!("loading tree file {}", path.display())),
        "lab" => read_segments_file(path)
            .map(HtkFile::Segments)
            .with_context(|| format!("loading label file {}", path.display())),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// Raw file access
// ---------------------------------------------------------------------------

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| HtkError::io(path, e))
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = read_bytes(path)?;
    Ok(Lexer::from_bytes(&bytes)?.input().to_owned())
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(|e| HtkError::io(path, e))?;
    log::debug!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Questions and trees
// ---------------------------------------------------------------------------

pub fn read_questions_file(path: &Path, dialect: QuestionDialect) -> Result<QuestionSet> {
    ques::parse_questions(&read_text(path)?, dialect)
}

/// Read a question file and check that it re-serialises to the same text.
pub fn read_questions_file_verifying(path: &Path, dialect: QuestionDialect) -> Result<QuestionSet> {
    ques::parse_questions_verifying(&read_text(path)?, dialect)
}

pub fn write_questions_file(path: &Path, questions: &QuestionSet, dialect: QuestionDialect) -> Result<()> {
    write_bytes(path, ques::write_questions(questions, dialect).as_bytes())
}

pub fn read_tree_file(path: &Path) -> Result<TreeFile> {
    tree_format::parse_tree_file(&read_text(path)?)
}

pub fn read_tree_file_verifying(path: &Path, format: &TreeFormat) -> Result<TreeFile> {
    tree_format::parse_tree_file_verifying(&read_text(path)?, format)
}

pub fn write_tree_file(path: &Path, file: &TreeFile, format: &TreeFormat) -> Result<()> {
    write_bytes(path, tree_format::write_tree_file(file, format).as_bytes())
}

// ---------------------------------------------------------------------------
// Vector sequences
// ---------------------------------------------------------------------------

pub fn read_vectors_file(path: &Path, format: &VecSeqFormat) -> Result<VectorSequence> {
    vecseq::read_vectors(&read_bytes(path)?, format)
}

pub fn write_vectors_file(
    path: &Path,
    seq: &VectorSequence,
    element: ElementType,
    byte_order: ByteOrder,
) -> Result<()> {
    write_bytes(path, &vecseq::write_vectors(seq, element, byte_order))
}

pub fn read_hmgens_pdf_file(
    path: &Path,
    param_order: usize,
    num_windows: usize,
    element: ElementType,
    byte_order: ByteOrder,
) -> Result<HmgensPdf> {
    vecseq::read_hmgens_pdf(&read_bytes(path)?, param_order, num_windows, element, byte_order)
}

// ---------------------------------------------------------------------------
// Labels and alignments
// ---------------------------------------------------------------------------

pub fn read_segments_file(path: &Path) -> Result<Vec<Segment>> {
    alignment_format::parse_segments(&read_text(path)?)
}

pub fn write_segments_file(path: &Path, segments: &[Segment]) -> Result<()> {
    write_bytes(path, alignment_format::write_segments(segments)?.as_bytes())
}

pub fn read_alignment_file(path: &Path, format: &AlignmentFormat) -> Result<Alignment> {
    alignment_format::read_alignment(&read_text(path)?, format)
}

pub fn write_alignment_file(path: &Path, alignment: &[AlignedSegment], format: &AlignmentFormat) -> Result<()> {
    write_bytes(path, alignment_format::write_alignment(alignment, format)?.as_bytes())
}

pub fn read_label_map_file(path: &Path) -> Result<LabelMap> {
    alignment_format::parse_label_map(&read_text(path)?)
}

/// Reads `<dir>/<utt_id>.<ext>` alignments on demand.
#[derive(Debug, Clone)]
pub struct AlignmentDir {
    pub dir: PathBuf,
    /// File extension without the dot, `lab` by default.
    pub ext: String,
    pub format: AlignmentFormat,
}

impl AlignmentDir {
    pub fn new(dir: impl Into<PathBuf>, format: AlignmentFormat) -> Self {
        Self {
            dir: dir.into(),
            ext: "lab".to_string(),
            format,
        }
    }

    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.ext = ext.into();
        self
    }

    pub fn path(&self, utt_id: &str) -> PathBuf {
        self.dir.join(format!("{utt_id}.{}", self.ext))
    }

    pub fn get(&self, utt_id: &str) -> Result<Alignment> {
        read_alignment_file(&self.path(utt_id), &self.format)
    }
}

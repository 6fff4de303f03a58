//! HTK label / alignment files.
//!
//! Two readings of the same line-oriented format:
//!
//! * the segment layer keeps raw 100 ns tick times and an optional score:
//!   `label`, `start end label` or `start end label score`;
//! * the alignment layer converts ticks to frames and reads extra label
//!   columns as outer levels of a hierarchical alignment:
//!   `start end l0 [l1 ...]`.

use serde::{Deserialize, Serialize};

use crate::data::alignment::{
    flatten, unflatten, AlignedSegment, Alignment, FlatSegment, LabelMap, Segment,
};
use crate::error::{HtkError, Result};
use crate::lex::{Lexer, SourceLine};

/// HTK time unit: ticks of 100 ns.
pub const TICKS_PER_SECOND: f64 = 1e7;

/// Smallest frame period for which frames survive a write-then-read.
const MIN_FRAME_PERIOD: f64 = 1e-7;

// ---------------------------------------------------------------------------
// Segment layer
// ---------------------------------------------------------------------------

/// Parse a label file into raw segments.
///
/// Timed segments must not run backwards or overlap the previous timed
/// segment.
pub fn parse_segments(text: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut previous_end: Option<i64> = None;

    for line in Lexer::new(text).lines() {
        if line.is_blank() {
            continue;
        }
        let segment = parse_segment_line(&line)?;
        if let (Some(start), Some(end)) = (segment.start, segment.end) {
            if end < start {
                return Err(HtkError::structure_at(
                    line.number,
                    format!("segment {} ends ({end}) before it starts ({start})", segment.label),
                ));
            }
            if let Some(prev) = previous_end.filter(|&prev| start < prev) {
                return Err(HtkError::structure_at(
                    line.number,
                    format!(
                        "segment {} starts at {start}, overlapping the previous segment ending at {prev}",
                        segment.label
                    ),
                ));
            }
            previous_end = Some(end);
        }
        segments.push(segment);
    }

    log::debug!("parsed {} label segments", segments.len());
    Ok(segments)
}

fn parse_segment_line(line: &SourceLine<'_>) -> Result<Segment> {
    let tokens = line.tokens().collect_all();
    match tokens.as_slice() {
        [label] => Ok(Segment::untimed(label.text)),
        [start, end, label, rest @ ..] => {
            let start = start.parse("an integer start time")?;
            let end = end.parse("an integer end time")?;
            let mut segment = Segment::timed(start, end, label.text);
            match rest {
                [] => {}
                [score] => segment.score = Some(score.parse("a numeric score")?),
                [_, extra, ..] => return Err(extra.error("too many fields in label line")),
            }
            Ok(segment)
        }
        [first, _] => {
            first.parse::<i64>("a label or start time")?;
            Err(line.error_at_end("missing label"))
        }
        [] => Err(line.error_at_end("empty label line")),
    }
}

/// Serialise raw segments, one per line.
///
/// Untimed segments cannot carry a score and a segment needs both times or
/// neither.
pub fn write_segments(segments: &[Segment]) -> Result<String> {
    let mut out = String::new();
    let mut previous_end: Option<i64> = None;
    for segment in segments {
        check_label(&segment.label)?;
        match (segment.start, segment.end, segment.score) {
            (None, None, None) => out.push_str(&segment.label),
            (None, None, Some(_)) => {
                return Err(HtkError::InvalidArgument(format!(
                    "untimed segment {} cannot carry a score",
                    segment.label
                )))
            }
            (Some(start), Some(end), score) => {
                if end < start || previous_end.is_some_and(|prev| start < prev) {
                    return Err(HtkError::structure(format!(
                        "segment {} ({start}..{end}) runs backwards or overlaps its predecessor",
                        segment.label
                    )));
                }
                previous_end = Some(end);
                out.push_str(&format!("{start} {end} {}", segment.label));
                if let Some(score) = score {
                    out.push_str(&format!(" {score}"));
                }
            }
            _ => {
                return Err(HtkError::InvalidArgument(format!(
                    "segment {} has only one of its start and end times",
                    segment.label
                )))
            }
        }
        out.push('\n');
    }
    Ok(out)
}

fn check_label(label: &str) -> Result<()> {
    if label.is_empty() || label.contains(char::is_whitespace) {
        return Err(HtkError::InvalidArgument(format!(
            "label `{label}` is empty or contains whitespace"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Alignment layer
// ---------------------------------------------------------------------------

/// Frame rate used to convert between ticks and frames, and how the labels
/// of nested levels share a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentFormat {
    /// Seconds between consecutive frames, e.g. `0.005`.
    pub frame_period: f64,
    /// When set, the labels of all levels are joined into one field with
    /// this separator (`X-the`). Otherwise each level is its own column.
    #[serde(default)]
    pub level_separator: Option<String>,
}

impl AlignmentFormat {
    pub fn new(frame_period: f64) -> Self {
        Self {
            frame_period,
            level_separator: None,
        }
    }

    pub fn with_level_separator(mut self, separator: impl Into<String>) -> Self {
        self.level_separator = Some(separator.into());
        self
    }

    fn separator(&self) -> Result<Option<&str>> {
        match self.level_separator.as_deref() {
            Some("") => Err(HtkError::InvalidArgument(
                "level separator must not be empty".to_string(),
            )),
            other => Ok(other),
        }
    }

    fn ticks_per_frame(&self) -> f64 {
        self.frame_period * TICKS_PER_SECOND
    }
}

/// Read a (possibly multi-level) alignment, timed in frames.
pub fn read_alignment(text: &str, format: &AlignmentFormat) -> Result<Alignment> {
    if !(format.frame_period > 0.0 && format.frame_period.is_finite()) {
        return Err(HtkError::InvalidArgument(format!(
            "frame period must be positive, got {}",
            format.frame_period
        )));
    }
    let divisor = format.ticks_per_frame();
    let separator = format.separator()?;

    let mut flat = Vec::new();
    for line in Lexer::new(text).lines() {
        if line.is_blank() {
            continue;
        }
        let tokens = line.tokens().collect_all();
        let [start, end, labels @ ..] = tokens.as_slice() else {
            return Err(line.error_at_end("expected `start end label`"));
        };
        let labels: Vec<String> = match (separator, labels) {
            (_, []) => return Err(line.error_at_end("missing label")),
            (None, labels) => labels.iter().map(|t| t.text.to_string()).collect(),
            (Some(sep), [joined]) => {
                let parts: Vec<String> = joined.text.split(sep).map(str::to_string).collect();
                if parts.iter().any(String::is_empty) {
                    return Err(joined.error(format!(
                        "empty level in `{}` split on `{sep}`",
                        joined.text
                    )));
                }
                parts
            }
            (Some(sep), [_, extra, ..]) => {
                return Err(extra.error(format!(
                    "expected one label field joined with `{sep}`"
                )))
            }
        };
        let start: i64 = start.parse("an integer start time")?;
        let end: i64 = end.parse("an integer end time")?;
        flat.push(FlatSegment {
            start: (start as f64 / divisor).round() as i64,
            end: (end as f64 / divisor).round() as i64,
            labels,
        });
    }

    let alignment = unflatten(&flat)?;
    log::debug!(
        "read alignment with {} top-level segments from {} lines",
        alignment.len(),
        flat.len()
    );
    Ok(alignment)
}

/// Write an alignment, one line per innermost segment.
///
/// Fails if the frame period is below 100 ns, since frame times could then
/// not be recovered from the tick values.
pub fn write_alignment(alignment: &[AlignedSegment], format: &AlignmentFormat) -> Result<String> {
    if format.frame_period.is_nan() || format.frame_period < MIN_FRAME_PERIOD {
        return Err(HtkError::InvalidArgument(format!(
            "frame period {} s is below {MIN_FRAME_PERIOD} s, writing would be lossy",
            format.frame_period
        )));
    }
    let divisor = format.ticks_per_frame();
    let separator = format.separator()?;

    let mut out = String::new();
    for segment in flatten(alignment)? {
        for label in &segment.labels {
            check_label(label)?;
            if let Some(sep) = separator.filter(|sep| label.contains(sep)) {
                return Err(HtkError::InvalidArgument(format!(
                    "label `{label}` contains the level separator `{sep}`"
                )));
            }
        }
        let start = (segment.start as f64 * divisor).round() as i64;
        let end = (segment.end as f64 * divisor).round() as i64;
        let labels = segment.labels.join(separator.unwrap_or(" "));
        out.push_str(&format!("{start} {end} {labels}\n"));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Label maps
// ---------------------------------------------------------------------------

/// Parse a two-column `from to` table. Keys must be unique.
pub fn parse_label_map(text: &str) -> Result<LabelMap> {
    let mut map = LabelMap::new();
    for line in Lexer::new(text).lines() {
        if line.is_blank() {
            continue;
        }
        let tokens = line.tokens().collect_all();
        let [from, to] = tokens.as_slice() else {
            return Err(match tokens.get(2) {
                Some(extra) => extra.error("expected two columns"),
                None => line.error_at_end("expected two columns"),
            });
        };
        if map.insert(from.text.to_string(), to.text.to_string()).is_some() {
            return Err(HtkError::structure_at(
                line.number,
                format!("duplicate label map key {}", from.text),
            ));
        }
    }
    Ok(map)
}

/// Serialise label map entries in the given order.
pub fn write_label_map<K: AsRef<str>, V: AsRef<str>>(entries: impl IntoIterator<Item = (K, V)>) -> String {
    let mut out = String::new();
    for (from, to) in entries {
        out.push_str(&format!("{} {}\n", from.as_ref(), to.as_ref()));
    }
    out
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{HtkError, Result};

// ---------------------------------------------------------------------------
// Segment – one raw label-file record
// ---------------------------------------------------------------------------

/// A single label-file line: optional time bounds in 100 ns ticks, a label,
/// and an optional score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub label: String,
    pub score: Option<f64>,
}

impl Segment {
    /// Segment with times and no score.
    pub fn timed(start: i64, end: i64, label: impl Into<String>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            label: label.into(),
            score: None,
        }
    }

    /// Segment with a label only.
    pub fn untimed(label: impl Into<String>) -> Self {
        Self {
            start: None,
            end: None,
            label: label.into(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

// ---------------------------------------------------------------------------
// AlignedSegment – hierarchical alignment in frames
// ---------------------------------------------------------------------------

/// A segment of a (possibly multi-level) alignment, timed in frames.
///
/// `children` is the finer-grained alignment of the same span, e.g. the
/// phones of a word. `None` marks the innermost level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedSegment {
    pub start: i64,
    pub end: i64,
    pub label: String,
    pub children: Option<Vec<AlignedSegment>>,
}

impl AlignedSegment {
    pub fn new(start: i64, end: i64, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
            children: None,
        }
    }

    pub fn with_children(mut self, children: Vec<AlignedSegment>) -> Self {
        self.children = Some(children);
        self
    }
}

/// An ordered sequence of segments.
pub type Alignment = Vec<AlignedSegment>;

/// A one-level view of a hierarchical alignment.
///
/// `labels[0]` is the innermost label. An outer level's label appears only on
/// the first innermost segment it spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatSegment {
    pub start: i64,
    pub end: i64,
    pub labels: Vec<String>,
}

/// Convert a hierarchical alignment to a flat one.
///
/// Every child list must be non-empty and the alignment must have the same
/// depth everywhere; otherwise it could not be recovered and this fails.
pub fn flatten(alignment: &[AlignedSegment]) -> Result<Vec<FlatSegment>> {
    let flat = flatten_levels(alignment)?;
    match unflatten(&flat) {
        Ok(recovered) if recovered.as_slice() == alignment => Ok(flat),
        _ => Err(HtkError::structure(
            "alignment could not be recovered from flattened alignment \
             (check alignment has consistent depth)",
        )),
    }
}

// One call per nesting level, so depth is the number of label columns.
fn flatten_levels(alignment: &[AlignedSegment]) -> Result<Vec<FlatSegment>> {
    let mut flat = Vec::with_capacity(alignment.len());
    for segment in alignment {
        let inner = match &segment.children {
            None => vec![FlatSegment {
                start: segment.start,
                end: segment.end,
                labels: Vec::new(),
            }],
            Some(children) if children.is_empty() => {
                return Err(HtkError::structure(format!(
                    "segment {} ({}..{}) has an empty sub-alignment",
                    segment.label, segment.start, segment.end
                )));
            }
            Some(children) => flatten_levels(children)?,
        };
        for (i, mut entry) in inner.into_iter().enumerate() {
            if i == 0 {
                entry.labels.push(segment.label.clone());
            }
            flat.push(entry);
        }
    }
    Ok(flat)
}

/// Convert a flat alignment back to a hierarchical one. Inverse of
/// [`flatten`].
pub fn unflatten(flat: &[FlatSegment]) -> Result<Alignment> {
    let Some(first) = flat.first() else {
        return Ok(Vec::new());
    };
    let levels = first.labels.len();
    if levels == 0 {
        return Err(HtkError::structure("first segment has no label"));
    }
    if let Some(bad) = flat
        .iter()
        .find(|s| s.labels.is_empty() || s.labels.len() > levels)
    {
        return Err(HtkError::structure(format!(
            "segment {}..{} has {} labels, expected 1 to {levels}",
            bad.start,
            bad.end,
            bad.labels.len()
        )));
    }

    let mut labels: Vec<Option<String>> = vec![None; levels];
    let mut pending: Vec<Alignment> = vec![Vec::new(); levels];

    for (i, segment) in flat.iter().enumerate() {
        for (slot, label) in labels.iter_mut().zip(&segment.labels) {
            *slot = Some(label.clone());
        }
        // The next segment restates exactly the levels that end here.
        let closing = flat.get(i + 1).map_or(levels, |next| next.labels.len());
        for level in 0..closing {
            let label = labels[level].take().ok_or_else(|| {
                HtkError::structure(format!(
                    "segment {}..{} ends level {level} before it was labelled",
                    segment.start, segment.end
                ))
            })?;
            let closed = if level == 0 {
                AlignedSegment::new(segment.start, segment.end, label)
            } else {
                let children = std::mem::take(&mut pending[level - 1]);
                let (start, end) = match (children.first(), children.last()) {
                    (Some(first), Some(last)) => (first.start, last.end),
                    _ => {
                        return Err(HtkError::structure(format!(
                            "level {level} segment {label} has no sub-segments"
                        )))
                    }
                };
                AlignedSegment::new(start, end, label).with_children(children)
            };
            pending[level].push(closed);
        }
    }

    Ok(pending.pop().unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Label mapping
// ---------------------------------------------------------------------------

/// Label substitution table, e.g. full-context label to leaf macro id.
pub type LabelMap = HashMap<String, String>;

/// Replace every innermost label through `map`, keeping times and the
/// outer levels unchanged.
pub fn map_labels(alignment: &[AlignedSegment], map: &LabelMap) -> Result<Alignment> {
    alignment
        .iter()
        .map(|segment| {
            let mut mapped = segment.clone();
            match &segment.children {
                Some(children) => mapped.children = Some(map_labels(children, map)?),
                None => {
                    mapped.label = map.get(&segment.label).cloned().ok_or_else(|| {
                        HtkError::structure(format!(
                            "no mapping for label {}",
                            segment.label
                        ))
                    })?;
                }
            }
            Ok(mapped)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(start: i64, end: i64, labels: &[&str]) -> FlatSegment {
        FlatSegment {
            start,
            end,
            labels: labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn two_level() -> Alignment {
        vec![
            AlignedSegment::new(0, 2, "a").with_children(vec![
                AlignedSegment::new(0, 1, "X"),
                AlignedSegment::new(1, 2, "Y"),
            ]),
            AlignedSegment::new(2, 3, "b").with_children(vec![AlignedSegment::new(2, 3, "Z")]),
        ]
    }

    #[test]
    fn flatten_two_levels() {
        let flat_alignment = flatten(&two_level()).unwrap();
        assert_eq!(
            flat_alignment,
            vec![
                flat(0, 1, &["X", "a"]),
                flat(1, 2, &["Y"]),
                flat(2, 3, &["Z", "b"]),
            ]
        );
        assert_eq!(unflatten(&flat_alignment).unwrap(), two_level());
    }

    #[test]
    fn three_levels_round_trip() {
        let alignment = vec![
            AlignedSegment::new(0, 3, "0").with_children(vec![
                AlignedSegment::new(0, 2, "a").with_children(vec![
                    AlignedSegment::new(0, 1, "A"),
                    AlignedSegment::new(1, 2, "B"),
                ]),
                AlignedSegment::new(2, 3, "b").with_children(vec![AlignedSegment::new(2, 3, "C")]),
            ]),
            AlignedSegment::new(3, 5, "1").with_children(vec![AlignedSegment::new(3, 5, "d")
                .with_children(vec![AlignedSegment::new(3, 5, "D")])]),
        ];
        let flat_alignment = flatten(&alignment).unwrap();
        assert_eq!(flat_alignment[0].labels, vec!["A", "a", "0"]);
        assert_eq!(flat_alignment[2].labels, vec!["C", "b"]);
        assert_eq!(unflatten(&flat_alignment).unwrap(), alignment);
    }

    #[test]
    fn empty_sub_alignment_is_rejected() {
        let alignment = vec![AlignedSegment::new(0, 1, "a").with_children(vec![])];
        let err = flatten(&alignment).unwrap_err();
        assert!(err.to_string().contains("empty sub-alignment"));
    }

    #[test]
    fn inconsistent_depth_is_rejected() {
        let alignment = vec![
            AlignedSegment::new(0, 2, "a").with_children(vec![
                AlignedSegment::new(0, 1, "A"),
                AlignedSegment::new(1, 2, "B"),
            ]),
            AlignedSegment::new(2, 3, "b"),
        ];
        let err = flatten(&alignment).unwrap_err();
        assert!(err.to_string().contains("could not be recovered"));
    }

    #[test]
    fn empty_alignment_is_allowed() {
        assert!(flatten(&[]).unwrap().is_empty());
        assert!(unflatten(&[]).unwrap().is_empty());
    }

    #[test]
    fn map_labels_replaces_innermost_level() {
        let map: LabelMap = [("X", "x1"), ("Y", "y1"), ("Z", "z1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mapped = map_labels(&two_level(), &map).unwrap();
        let inner: Vec<_> = mapped
            .iter()
            .flat_map(|s| s.children.as_deref().unwrap_or_default())
            .map(|s| s.label.as_str())
            .collect();
        assert_eq!(inner, vec!["x1", "y1", "z1"]);
        assert_eq!(mapped[0].label, "a");

        let err = map_labels(&[AlignedSegment::new(0, 1, "Q")], &map).unwrap_err();
        assert!(err.to_string().contains("no mapping for label Q"));
    }
}

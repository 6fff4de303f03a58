use serde::{Deserialize, Serialize};

use crate::error::{HtkError, Result};

// ---------------------------------------------------------------------------
// VectorSequence – frames of equal dimension
// ---------------------------------------------------------------------------

/// A sequence of fixed-dimension vectors, stored row-major.
///
/// HTS uses this for speech parameter files: one vector per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FlatVectors", into = "FlatVectors")]
pub struct VectorSequence {
    dimension: usize,
    values: Vec<f64>,
}

/// Serialised shape of a [`VectorSequence`], checked on the way in.
#[derive(Serialize, Deserialize)]
struct FlatVectors {
    dimension: usize,
    values: Vec<f64>,
}

impl TryFrom<FlatVectors> for VectorSequence {
    type Error = HtkError;

    fn try_from(flat: FlatVectors) -> Result<Self> {
        VectorSequence::from_flat(flat.dimension, flat.values)
    }
}

impl From<VectorSequence> for FlatVectors {
    fn from(seq: VectorSequence) -> Self {
        FlatVectors {
            dimension: seq.dimension,
            values: seq.values,
        }
    }
}

impl VectorSequence {
    /// An empty sequence of vectors of size `dimension`.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(HtkError::InvalidArgument(
                "vector dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            values: Vec::new(),
        })
    }

    /// Wrap flat row-major values. The length must be a multiple of
    /// `dimension`.
    pub fn from_flat(dimension: usize, values: Vec<f64>) -> Result<Self> {
        if dimension == 0 {
            return Err(HtkError::InvalidArgument(
                "vector dimension must be positive".to_string(),
            ));
        }
        if values.len() % dimension != 0 {
            return Err(HtkError::format(format!(
                "{} values do not form whole vectors of dimension {dimension}",
                values.len()
            )));
        }
        Ok(Self { dimension, values })
    }

    /// Build from rows, which must all have length `dimension`.
    pub fn from_rows<R: AsRef<[f64]>>(
        dimension: usize,
        rows: impl IntoIterator<Item = R>,
    ) -> Result<Self> {
        let mut seq = Self::new(dimension)?;
        for row in rows {
            seq.push_frame(row.as_ref())?;
        }
        Ok(seq)
    }

    /// Append one vector.
    pub fn push_frame(&mut self, frame: &[f64]) -> Result<()> {
        if frame.len() != self.dimension {
            return Err(HtkError::format(format!(
                "frame has {} values, expected {}",
                frame.len(),
                self.dimension
            )));
        }
        self.values.extend_from_slice(frame);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors.
    pub fn len(&self) -> usize {
        self.values.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&[f64]> {
        let start = index.checked_mul(self.dimension)?;
        self.values.get(start..start.checked_add(self.dimension)?)
    }

    pub fn frames(&self) -> std::slice::ChunksExact<'_, f64> {
        self.values.chunks_exact(self.dimension)
    }

    /// All values, row-major.
    pub fn as_flat(&self) -> &[f64] {
        &self.values
    }

    pub fn into_flat(self) -> Vec<f64> {
        self.values
    }

    /// One component across all frames, e.g. the log F0 trajectory.
    pub fn trajectory(&self, component: usize) -> Option<Vec<f64>> {
        (component < self.dimension)
            .then(|| self.frames().map(|frame| frame[component]).collect())
    }
}

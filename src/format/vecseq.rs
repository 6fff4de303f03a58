//! Raw vector-sequence files (`.mgc`, `.lf0`, `.cmp` bodies, HMGenS pdfs).
//!
//! The files have no header: frames of `dimension` fixed-width floats are
//! simply concatenated. Shape and encoding come from the caller.

use serde::{Deserialize, Serialize};

use crate::data::vecseq::VectorSequence;
use crate::error::{HtkError, Result};

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Width of one stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ElementType {
    /// IEEE single precision, 4 bytes.
    #[default]
    F32,
    /// IEEE double precision, 8 bytes.
    F64,
}

impl ElementType {
    pub fn size(self) -> usize {
        match self {
            ElementType::F32 => 4,
            ElementType::F64 => 8,
        }
    }

    /// Element type for a width in bytes.
    pub fn from_size(size: usize) -> Result<Self> {
        match size {
            4 => Ok(ElementType::F32),
            8 => Ok(ElementType::F64),
            other => Err(HtkError::format(format!(
                "unsupported element size {other} (expected 4 or 8)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// How a vector file is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VecSeqFormat {
    /// Values per frame.
    pub dimension: usize,
    pub element: ElementType,
    pub byte_order: ByteOrder,
}

impl VecSeqFormat {
    /// Little-endian `f32` frames of `dimension` values.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            element: ElementType::F32,
            byte_order: ByteOrder::Little,
        }
    }

    pub fn with_element(mut self, element: ElementType) -> Self {
        self.element = element;
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Bytes per frame. A dimension too large to address is a format error.
    pub fn frame_size(&self) -> Result<usize> {
        self.dimension.checked_mul(self.element.size()).ok_or_else(|| {
            HtkError::format(format!(
                "{} x {:?} frames are too large to address",
                self.dimension, self.element
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Reading / writing
// ---------------------------------------------------------------------------

/// Decode a vector file.
///
/// The buffer length must be a whole number of frames; an empty buffer is an
/// empty sequence.
pub fn read_vectors(bytes: &[u8], format: &VecSeqFormat) -> Result<VectorSequence> {
    if format.dimension == 0 {
        return Err(HtkError::format("vector dimension must be positive"));
    }
    let frame_size = format.frame_size()?;
    if bytes.len() % frame_size != 0 {
        return Err(HtkError::format(format!(
            "{} bytes is not a whole number of {}-byte frames ({} x {:?}), {} bytes left over",
            bytes.len(),
            frame_size,
            format.dimension,
            format.element,
            bytes.len() % frame_size
        )));
    }

    let values: Vec<f64> = bytes
        .chunks_exact(format.element.size())
        .map(|chunk| decode(chunk, format.element, format.byte_order))
        .collect();
    log::debug!(
        "decoded {} frames of dimension {}",
        values.len() / format.dimension,
        format.dimension
    );
    VectorSequence::from_flat(format.dimension, values)
}

/// Encode a vector sequence. `F32` output rounds each value to the nearest
/// single; non-finite values are kept.
pub fn write_vectors(seq: &VectorSequence, element: ElementType, byte_order: ByteOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.as_flat().len() * element.size());
    for &value in seq.as_flat() {
        encode(value, element, byte_order, &mut out);
    }
    out
}

fn decode(chunk: &[u8], element: ElementType, byte_order: ByteOrder) -> f64 {
    match element {
        ElementType::F32 => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(chunk);
            let value = match byte_order {
                ByteOrder::Little => f32::from_le_bytes(raw),
                ByteOrder::Big => f32::from_be_bytes(raw),
            };
            f64::from(value)
        }
        ElementType::F64 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            match byte_order {
                ByteOrder::Little => f64::from_le_bytes(raw),
                ByteOrder::Big => f64::from_be_bytes(raw),
            }
        }
    }
}

fn encode(value: f64, element: ElementType, byte_order: ByteOrder, out: &mut Vec<u8>) {
    match (element, byte_order) {
        (ElementType::F32, ByteOrder::Little) => out.extend_from_slice(&(value as f32).to_le_bytes()),
        (ElementType::F32, ByteOrder::Big) => out.extend_from_slice(&(value as f32).to_be_bytes()),
        (ElementType::F64, ByteOrder::Little) => out.extend_from_slice(&value.to_le_bytes()),
        (ElementType::F64, ByteOrder::Big) => out.extend_from_slice(&value.to_be_bytes()),
    }
}

// ---------------------------------------------------------------------------
// HMGenS pdf files
// ---------------------------------------------------------------------------

/// Per-frame Gaussian parameters dumped by HMGenS.
///
/// Each frame stores `num_windows * param_order` b-values followed by as
/// many precisions; window `w`, coefficient `c` sits at `w * param_order + c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HmgensPdf {
    pub b_values: VectorSequence,
    pub precisions: VectorSequence,
}

/// Split an HMGenS pdf file into b-values and precisions.
pub fn read_hmgens_pdf(
    bytes: &[u8],
    param_order: usize,
    num_windows: usize,
    element: ElementType,
    byte_order: ByteOrder,
) -> Result<HmgensPdf> {
    let half = param_order
        .checked_mul(num_windows)
        .ok_or_else(|| HtkError::format("parameter order times window count overflows"))?;
    if half == 0 {
        return Err(HtkError::format(
            "parameter order and window count must be positive",
        ));
    }
    let dimension = half
        .checked_mul(2)
        .ok_or_else(|| HtkError::format(format!("pdf frames of 2 x {half} values overflow")))?;
    let format = VecSeqFormat {
        dimension,
        element,
        byte_order,
    };
    let combined = read_vectors(bytes, &format)?;

    let mut b_values = VectorSequence::new(half)?;
    let mut precisions = VectorSequence::new(half)?;
    for frame in combined.frames() {
        let (b, p) = frame.split_at(half);
        b_values.push_frame(b)?;
        precisions.push_frame(p)?;
    }
    Ok(HmgensPdf {
        b_values,
        precisions,
    })
}

/// Inverse of [`read_hmgens_pdf`]. Both halves must agree in shape.
pub fn write_hmgens_pdf(pdf: &HmgensPdf, element: ElementType, byte_order: ByteOrder) -> Result<Vec<u8>> {
    let half = pdf.b_values.dimension();
    if pdf.precisions.dimension() != half || pdf.precisions.len() != pdf.b_values.len() {
        return Err(HtkError::InvalidArgument(format!(
            "b-values are {} x {} but precisions are {} x {}",
            pdf.b_values.len(),
            half,
            pdf.precisions.len(),
            pdf.precisions.dimension()
        )));
    }
    let dimension = half.checked_mul(2).ok_or_else(|| {
        HtkError::InvalidArgument(format!("pdf frames of 2 x {half} values overflow"))
    })?;
    let mut combined = VectorSequence::new(dimension)?;
    for (b, p) in pdf.b_values.frames().zip(pdf.precisions.frames()) {
        let mut frame = Vec::with_capacity(dimension);
        frame.extend_from_slice(b);
        frame.extend_from_slice(p);
        combined.push_frame(&frame)?;
    }
    Ok(write_vectors(&combined, element, byte_order))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_f32_by_default() {
        let mut bytes = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let seq = read_vectors(&bytes, &VecSeqFormat::new(3)).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.frame(1), Some(&[4.0, 5.0, 6.0][..]));
    }

    #[test]
    fn reads_big_endian_f64() {
        let mut bytes = Vec::new();
        for v in [0.1f64, -2.5] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        let format = VecSeqFormat::new(2)
            .with_element(ElementType::F64)
            .with_byte_order(ByteOrder::Big);
        let seq = read_vectors(&bytes, &format).unwrap();
        assert_eq!(seq.as_flat(), &[0.1, -2.5]);
    }

    #[test]
    fn byte_round_trip_is_exact() {
        let bytes: Vec<u8> = (0u8..48).collect();
        for order in [ByteOrder::Little, ByteOrder::Big] {
            for element in [ElementType::F32, ElementType::F64] {
                let format = VecSeqFormat::new(3)
                    .with_element(element)
                    .with_byte_order(order);
                let seq = read_vectors(&bytes, &format).unwrap();
                assert_eq!(write_vectors(&seq, element, order), bytes);
            }
        }
    }

    #[test]
    fn f32_output_rounds_to_single() {
        let seq = VectorSequence::from_flat(1, vec![0.1]).unwrap();
        let bytes = write_vectors(&seq, ElementType::F32, ByteOrder::Little);
        let back = read_vectors(&bytes, &VecSeqFormat::new(1)).unwrap();
        assert_eq!(back.as_flat(), &[f64::from(0.1f32)]);
    }

    #[test]
    fn ragged_length_is_format_error() {
        let err = read_vectors(&[0u8; 10], &VecSeqFormat::new(2)).unwrap_err();
        assert!(matches!(err, HtkError::Format(_)));
        let err = read_vectors(&[0u8; 8], &VecSeqFormat::new(0)).unwrap_err();
        assert!(matches!(err, HtkError::Format(_)));
    }

    #[test]
    fn oversized_shapes_are_format_errors() {
        let err = read_vectors(&[0u8; 8], &VecSeqFormat::new(1 << 62)).unwrap_err();
        assert!(matches!(err, HtkError::Format(_)), "{err}");
        let err = read_vectors(&[0u8; 8], &VecSeqFormat::new(usize::MAX)).unwrap_err();
        assert!(matches!(err, HtkError::Format(_)), "{err}");

        let bytes = [0u8; 16];
        let cases = [(usize::MAX, 2), (1 << 62, 2), (usize::MAX / 2 + 1, 1)];
        for (order, windows) in cases {
            let err = read_hmgens_pdf(&bytes, order, windows, ElementType::F32, ByteOrder::Little)
                .unwrap_err();
            assert!(matches!(err, HtkError::Format(_)), "{err}");
        }
    }

    #[test]
    fn empty_buffer_is_empty_sequence() {
        let seq = read_vectors(&[], &VecSeqFormat::new(4)).unwrap();
        assert!(seq.is_empty());
        assert_eq!(seq.dimension(), 4);
    }

    #[test]
    fn element_sizes() {
        assert_eq!(ElementType::from_size(4).unwrap(), ElementType::F32);
        assert_eq!(ElementType::from_size(8).unwrap().size(), 8);
        assert!(ElementType::from_size(2).is_err());
    }

    #[test]
    fn hmgens_pdf_splits_halves() {
        // order 2, 2 windows, 2 frames
        let values: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let mut bytes = Vec::new();
        for v in &values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let pdf = read_hmgens_pdf(&bytes, 2, 2, ElementType::F32, ByteOrder::Little).unwrap();
        assert_eq!(pdf.b_values.frame(0), Some(&[0.0, 1.0, 2.0, 3.0][..]));
        assert_eq!(pdf.precisions.frame(0), Some(&[4.0, 5.0, 6.0, 7.0][..]));
        assert_eq!(pdf.precisions.frame(1), Some(&[12.0, 13.0, 14.0, 15.0][..]));

        let written = write_hmgens_pdf(&pdf, ElementType::F32, ByteOrder::Little).unwrap();
        assert_eq!(written, bytes);
    }

    #[test]
    fn hmgens_pdf_rejects_partial_frames() {
        let err = read_hmgens_pdf(&[0u8; 20], 2, 1, ElementType::F32, ByteOrder::Little).unwrap_err();
        assert!(matches!(err, HtkError::Format(_)));
    }
}

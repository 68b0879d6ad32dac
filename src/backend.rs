//! The boundary to the tensor-computation backend.
//!
//! The backend is an opaque engine that executes pre-compiled named
//! computations against named tensor buffers. The client never looks inside
//! the model; it only honors this contract.

use std::collections::HashMap;

use crate::error::{FlError, Result};

/// Input tensor key for `infer` and `train`.
pub const KEY_X: &str = "x";
/// Label tensor key for `train`.
pub const KEY_Y: &str = "y";
/// Scalar loss output key of `train`.
pub const KEY_LOSS: &str = "loss";
/// Prediction output key of `infer`.
pub const KEY_LOGITS: &str = "logits";

/// The output key of the `i`-th parameter slot (`a0`, `a1`, ...).
pub fn slot_key(index: usize) -> String {
    format!("a{index}")
}

/// The named computations a backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signature {
    Parameters,
    Infer,
    Train,
}

impl Signature {
    pub fn as_str(self) -> &'static str {
        match self {
            Signature::Parameters => "parameters",
            Signature::Infer => "infer",
            Signature::Train => "train",
        }
    }
}

/// A named collection of tensor buffers handed to or received from a backend.
pub type TensorMap = HashMap<String, TensorBuffer>;

/// A fixed-size byte buffer with a cursor, the unit of exchange with the
/// backend and with the remote aggregator.
///
/// The byte layout inside a buffer is backend-defined; only the buffer count
/// and lengths are a binding contract. f32 accessors use the platform's
/// native layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorBuffer {
    bytes: Vec<u8>,
    position: usize,
}

impl TensorBuffer {
    /// A zero-filled buffer of exactly `len` bytes, cursor at the start.
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: vec![0; len],
            position: 0,
        }
    }

    /// A buffer holding the given values, cursor at the start.
    pub fn from_f32s(values: &[f32]) -> Self {
        Self {
            bytes: bytemuck::cast_slice(values).to_vec(),
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Resets the cursor to the start of the buffer.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Reads one f32 at the cursor and advances past it. `None` once fewer
    /// than four bytes remain.
    pub fn read_f32(&mut self) -> Option<f32> {
        let end = self.position.checked_add(4)?;
        if end > self.bytes.len() {
            return None;
        }
        let value = bytemuck::pod_read_unaligned(&self.bytes[self.position..end]);
        self.position = end;
        Some(value)
    }

    /// Writes one f32 at the cursor and advances past it. The buffer never
    /// grows; writing past the end is an error.
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        let end = self.position + 4;
        if end > self.bytes.len() {
            return Err(FlError::BufferOverrun {
                len: self.bytes.len(),
            });
        }
        self.bytes[self.position..end].copy_from_slice(&value.to_ne_bytes());
        self.position = end;
        Ok(())
    }

    /// Decodes the whole buffer as f32s, ignoring the cursor. Trailing bytes
    /// that do not fill a whole f32 are dropped.
    pub fn to_f32s(&self) -> Vec<f32> {
        self.bytes
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// An opaque engine executing three named computations.
///
/// Contract: the caller pre-allocates every output slot in `outputs` at its
/// exact size before the call; implementations fill the caller-provided
/// buffers in place and never insert or remove slots. (Some engines refuse to
/// populate an output map they perceive as empty — pre-sizing every slot is
/// the stable form of that contract.)
///
/// `train` mutates the backend's internal weight state; `infer` and
/// `parameters` only read it. The client serializes all three behind a single
/// lock, so implementations need no internal synchronization.
pub trait TensorBackend {
    fn run_signature(
        &mut self,
        signature: Signature,
        inputs: &TensorMap,
        outputs: &mut TensorMap,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_buffer_has_exact_len_and_fresh_cursor() {
        let buffer = TensorBuffer::zeroed(12);
        assert_eq!(buffer.len(), 12);
        assert_eq!(buffer.position(), 0);
        assert_eq!(buffer.to_f32s(), vec![0.0; 3]);
    }

    #[test]
    fn read_advances_and_rewind_resets() {
        let mut buffer = TensorBuffer::from_f32s(&[1.5, -2.0]);
        assert_eq!(buffer.read_f32(), Some(1.5));
        assert_eq!(buffer.position(), 4);
        assert_eq!(buffer.read_f32(), Some(-2.0));
        assert_eq!(buffer.read_f32(), None);

        buffer.rewind();
        assert_eq!(buffer.read_f32(), Some(1.5));
    }

    #[test]
    fn write_respects_fixed_size() {
        let mut buffer = TensorBuffer::zeroed(4);
        buffer.write_f32(3.25).unwrap();
        assert!(matches!(
            buffer.write_f32(1.0),
            Err(FlError::BufferOverrun { len: 4 })
        ));
        buffer.rewind();
        assert_eq!(buffer.read_f32(), Some(3.25));
    }

    #[test]
    fn slot_keys_follow_declaration_order() {
        assert_eq!(slot_key(0), "a0");
        assert_eq!(slot_key(11), "a11");
    }
}

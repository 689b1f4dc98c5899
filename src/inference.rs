//! The inference port: voxscribe never runs neural networks itself, it
//! hands shaped f32 tensors to an [`InferenceEngine`] supplied by the
//! embedding application.

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, VoxscribeError};

/// Which model a tensor batch is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelId {
    /// Recurrent voice-activity model: `[context ++ chunk], h, c` in,
    /// `prob, h', c'` out.
    Vad,
    /// Single-pass CTC acoustic model: features in, per-frame logits out.
    CtcAcoustic,
    /// Autoregressive encoder: features in, encoder states out.
    Encoder,
    /// Autoregressive decoder: token ids + encoder states in, logits out.
    Decoder,
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelId::Vad => "vad",
            ModelId::CtcAcoustic => "ctc-acoustic",
            ModelId::Encoder => "encoder",
            ModelId::Decoder => "decoder",
        };
        write!(f, "{name}")
    }
}

/// A dense row-major f32 tensor. Token ids cross this boundary as f32
/// values; every model port in this crate speaks one numeric type.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(VoxscribeError::TensorShape {
                expected: format!("{shape:?} ({expected} elements)"),
                actual: format!("{} elements", data.len()),
            });
        }
        Ok(Self { shape, data })
    }

    /// One-dimensional tensor over the given data.
    pub fn from_vec(data: Vec<f32>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// The single value of a one-element tensor.
    pub fn scalar(&self) -> Result<f32> {
        if self.data.len() == 1 {
            Ok(self.data[0])
        } else {
            Err(VoxscribeError::TensorShape {
                expected: "scalar".to_string(),
                actual: format!("{:?}", self.shape),
            })
        }
    }
}

/// Port to the application's model runtime.
///
/// Implementations must be safe to call from multiple pipeline threads;
/// failures are recoverable and scoped to the call.
pub trait InferenceEngine: Send + Sync {
    fn run(&self, model: ModelId, inputs: &[Tensor]) -> Result<Vec<Tensor>>;
}

impl<T: InferenceEngine + ?Sized> InferenceEngine for Arc<T> {
    fn run(&self, model: ModelId, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        (**self).run(model, inputs)
    }
}

/// Checks that a model returned the number of outputs its caller expects.
pub(crate) fn expect_outputs(
    model: ModelId,
    outputs: Vec<Tensor>,
    expected: usize,
) -> Result<Vec<Tensor>> {
    if outputs.len() == expected {
        Ok(outputs)
    } else {
        Err(VoxscribeError::InferenceOutputArity {
            model: model.to_string(),
            expected,
            got: outputs.len(),
        })
    }
}

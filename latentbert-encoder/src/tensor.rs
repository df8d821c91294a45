#[cfg(test)]
#[path = "../tests/unit/tensor_test.rs"]
mod tensor_test;

use rayon::prelude::*;

use crate::error::{EncoderError, Result};

/// Dense row-major array of f32 values.
///
/// Rank ranges from 2 to 4 depending on the pipeline stage: batch x
/// sequence x feature for activations, batch x heads x sequence x head
/// width for attention scores.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Vec<usize>,
}

impl Tensor {
    /// Creates a zero-filled tensor of the given shape.
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self { data: vec![0.0; len], shape: shape.to_vec() }
    }

    /// Wraps an existing buffer, checking that it fills the shape exactly.
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(EncoderError::ShapeMismatch(format!(
                "buffer of {} elements cannot form shape {:?} ({} expected)",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self { data, shape: shape.to_vec() })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor").field("shape", &self.shape).finish()
    }
}

/// Computes `out = input · weightᵀ + bias` for a batch of feature rows.
///
/// `input` holds `rows × in_features` values, `weight` is row-major
/// `out_features × in_features`, `bias` has `out_features` entries. Output
/// rows are computed in parallel.
pub fn linear_forward(
    out: &mut [f32],
    input: &[f32],
    weight: &[f32],
    bias: &[f32],
    in_features: usize,
    out_features: usize,
) {
    debug_assert_eq!(input.len() % in_features, 0, "input is not a whole number of rows");
    debug_assert_eq!(out.len(), input.len() / in_features * out_features);
    debug_assert_eq!(weight.len(), in_features * out_features);
    debug_assert_eq!(bias.len(), out_features);

    out.par_chunks_mut(out_features).zip(input.par_chunks(in_features)).for_each(|(out_row, in_row)| {
        for (o, out_val) in out_row.iter_mut().enumerate() {
            let weight_row = &weight[o * in_features..(o + 1) * in_features];
            *out_val =
                bias[o] + in_row.iter().zip(weight_row).map(|(&x, &w)| x * w).sum::<f32>();
        }
    });
}

// Applies softmax normalization to a slice in-place.
pub(crate) fn softmax(x: &mut [f32]) {
    let max_val = x.iter().fold(f32::NEG_INFINITY, |acc, &val| acc.max(val));
    let sum = x
        .iter_mut()
        .map(|val| {
            *val = (*val - max_val).exp();
            *val
        })
        .sum::<f32>();
    let inv_sum = sum.recip();
    x.iter_mut().for_each(|val| *val *= inv_sum);
}

/// Gaussian Error Linear Unit in its exact (erf) form.
pub(crate) fn gelu(v: f32) -> f32 {
    v * 0.5 * (1.0 + libm::erff(v * std::f32::consts::FRAC_1_SQRT_2))
}

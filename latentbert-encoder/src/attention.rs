#[cfg(test)]
#[path = "../tests/unit/attention_test.rs"]
mod attention_test;

use rayon::prelude::*;

use crate::configuration::EncoderConfig;
use crate::error::{EncoderError, Result};
use crate::init::XorShiftRng;
use crate::layers::Linear;
use crate::tensor::{Tensor, softmax};

/// Subtracted from the logits of masked-out keys; large enough to drive
/// their softmax weight to zero without overflowing f32.
const MASK_PENALTY: f32 = 10000.0;

/// Multi-head scaled dot-product attention where queries are projected
/// from the latent array and keys/values from the input sequence.
pub struct CrossAttention {
    /// Query projection, `latent_dim -> latent_dim`.
    pub proj_q: Linear,
    /// Key projection, `input_dim -> latent_dim`.
    pub proj_k: Linear,
    /// Value projection, `input_dim -> latent_dim`.
    pub proj_v: Linear,
    pub n_heads: usize,
}

impl CrossAttention {
    pub(crate) fn new(config: &EncoderConfig, rng: &mut XorShiftRng) -> Self {
        Self {
            proj_q: Linear::new(config.latent_dim, config.latent_dim, rng),
            proj_k: Linear::new(config.input_dim, config.latent_dim, rng),
            proj_v: Linear::new(config.input_dim, config.latent_dim, rng),
            n_heads: config.cross_heads,
        }
    }

    /// Attends the latent array over the input sequence.
    ///
    /// `input` is `[batch, seq, input_dim]`, `latent` is
    /// `[batch, n_latents, latent_dim]`, `mask` is `[batch * seq]` with
    /// 1 = keep, 0 = drop. Returns the attended latent array
    /// `[batch, n_latents, latent_dim]` together with the per-head score
    /// tensor `[batch, heads, n_latents, seq]`.
    pub fn forward(
        &self,
        input: &Tensor,
        latent: &Tensor,
        mask: Option<&[f32]>,
    ) -> Result<(Tensor, Tensor)> {
        let (batch, seq, input_dim) = rank3(input)?;
        let (latent_batch, n_latents, latent_dim) = rank3(latent)?;

        if input_dim != self.proj_k.in_features {
            return Err(EncoderError::ShapeMismatch(format!(
                "input feature width {} does not match the key projection ({})",
                input_dim, self.proj_k.in_features
            )));
        }
        if latent_dim != self.proj_q.in_features {
            return Err(EncoderError::ShapeMismatch(format!(
                "latent feature width {} does not match the query projection ({})",
                latent_dim, self.proj_q.in_features
            )));
        }
        if latent_batch != batch {
            return Err(EncoderError::ShapeMismatch(format!(
                "latent batch {latent_batch} does not match input batch {batch}"
            )));
        }
        check_mask(mask, batch, seq)?;

        let mut q = vec![0.0; batch * n_latents * latent_dim];
        self.proj_q.forward(&mut q, latent.data());
        let mut k = vec![0.0; batch * seq * latent_dim];
        self.proj_k.forward(&mut k, input.data());
        let mut v = vec![0.0; batch * seq * latent_dim];
        self.proj_v.forward(&mut v, input.data());

        Ok(attend(&q, &k, &v, mask, batch, n_latents, seq, latent_dim, self.n_heads))
    }

    pub fn parameter_count(&self) -> usize {
        self.proj_q.parameter_count() + self.proj_k.parameter_count() + self.proj_v.parameter_count()
    }
}

impl std::fmt::Debug for CrossAttention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossAttention")
            .field("n_heads", &self.n_heads)
            .field("proj_q", &self.proj_q)
            .field("proj_k", &self.proj_k)
            .field("proj_v", &self.proj_v)
            .finish()
    }
}

/// Multi-head scaled dot-product attention where queries, keys, and values
/// all derive from the same tensor.
pub struct SelfAttention {
    pub proj_q: Linear,
    pub proj_k: Linear,
    pub proj_v: Linear,
    pub n_heads: usize,
}

impl SelfAttention {
    pub(crate) fn new(config: &EncoderConfig, rng: &mut XorShiftRng) -> Self {
        Self {
            proj_q: Linear::new(config.latent_dim, config.latent_dim, rng),
            proj_k: Linear::new(config.latent_dim, config.latent_dim, rng),
            proj_v: Linear::new(config.latent_dim, config.latent_dim, rng),
            n_heads: config.latent_heads,
        }
    }

    /// Attends `x` over itself.
    ///
    /// `x` is `[batch, len, latent_dim]`; the optional `[batch * len]` mask
    /// follows the same 1 = keep / 0 = drop convention as the cross
    /// variant. Returns the attended tensor and the per-head scores
    /// `[batch, heads, len, len]`.
    pub fn forward(&self, x: &Tensor, mask: Option<&[f32]>) -> Result<(Tensor, Tensor)> {
        let (batch, len, dim) = rank3(x)?;

        if dim != self.proj_q.in_features {
            return Err(EncoderError::ShapeMismatch(format!(
                "feature width {} does not match the projections ({})",
                dim, self.proj_q.in_features
            )));
        }
        check_mask(mask, batch, len)?;

        let mut q = vec![0.0; batch * len * dim];
        self.proj_q.forward(&mut q, x.data());
        let mut k = vec![0.0; batch * len * dim];
        self.proj_k.forward(&mut k, x.data());
        let mut v = vec![0.0; batch * len * dim];
        self.proj_v.forward(&mut v, x.data());

        Ok(attend(&q, &k, &v, mask, batch, len, len, dim, self.n_heads))
    }

    pub fn parameter_count(&self) -> usize {
        self.proj_q.parameter_count() + self.proj_k.parameter_count() + self.proj_v.parameter_count()
    }
}

impl std::fmt::Debug for SelfAttention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfAttention")
            .field("n_heads", &self.n_heads)
            .field("proj_q", &self.proj_q)
            .field("proj_k", &self.proj_k)
            .field("proj_v", &self.proj_v)
            .finish()
    }
}

fn rank3(t: &Tensor) -> Result<(usize, usize, usize)> {
    match t.shape() {
        &[a, b, c] => Ok((a, b, c)),
        other => {
            Err(EncoderError::ShapeMismatch(format!("expected a rank-3 tensor, got shape {other:?}")))
        }
    }
}

fn check_mask(mask: Option<&[f32]>, batch: usize, kv_len: usize) -> Result<()> {
    if let Some(mask) = mask {
        if mask.len() != batch * kv_len {
            return Err(EncoderError::ShapeMismatch(format!(
                "mask has {} elements, expected {batch}x{kv_len}",
                mask.len()
            )));
        }
    }
    Ok(())
}

/// Scaled dot-product head loop shared by both attention variants.
///
/// `q` is `[batch, q_len, dim]`, `k`/`v` are `[batch, kv_len, dim]`; the
/// feature axis is split into `n_heads` groups of `dim / n_heads`, each
/// attended independently. Scores are scaled by 1/sqrt(head width); the
/// optional mask is broadcast over heads and query positions and applied
/// additively before the softmax over the key axis. (batch, head) pairs
/// are processed in parallel.
#[allow(clippy::too_many_arguments)]
fn attend(
    q: &[f32],
    k: &[f32],
    v: &[f32],
    mask: Option<&[f32]>,
    batch: usize,
    q_len: usize,
    kv_len: usize,
    dim: usize,
    n_heads: usize,
) -> (Tensor, Tensor) {
    let head_width = dim / n_heads;
    let scale = (head_width as f32).sqrt().recip();

    let mut scores = Tensor::zeros(&[batch, n_heads, q_len, kv_len]);
    // Context is accumulated head-major, then merged back to feature-major.
    let mut context = vec![0.0; batch * n_heads * q_len * head_width];

    scores
        .data_mut()
        .par_chunks_mut(q_len * kv_len)
        .zip(context.par_chunks_mut(q_len * head_width))
        .enumerate()
        .for_each(|(chunk_idx, (score_chunk, ctx_chunk))| {
            let b = chunk_idx / n_heads;
            let head_offset = (chunk_idx % n_heads) * head_width;
            let mask_row = mask.map(|m| &m[b * kv_len..(b + 1) * kv_len]);

            for qi in 0..q_len {
                let q_row = &q[(b * q_len + qi) * dim + head_offset..][..head_width];
                let score_row = &mut score_chunk[qi * kv_len..(qi + 1) * kv_len];

                for (ki, score) in score_row.iter_mut().enumerate() {
                    let k_row = &k[(b * kv_len + ki) * dim + head_offset..][..head_width];
                    *score = q_row.iter().zip(k_row).map(|(&x, &y)| x * y).sum::<f32>() * scale;
                }

                if let Some(mask_row) = mask_row {
                    score_row.iter_mut().zip(mask_row).for_each(|(score, &keep)| {
                        *score -= MASK_PENALTY * (1.0 - keep);
                    });
                }

                softmax(score_row);

                // Weighted sum of values for this query position.
                let ctx_row = &mut ctx_chunk[qi * head_width..(qi + 1) * head_width];
                for (ki, &weight) in score_row.iter().enumerate() {
                    let v_row = &v[(b * kv_len + ki) * dim + head_offset..][..head_width];
                    ctx_row.iter_mut().zip(v_row).for_each(|(out, &val)| *out += weight * val);
                }
            }
        });

    // Merge heads back into a single dim-wide vector per query position.
    let mut out = Tensor::zeros(&[batch, q_len, dim]);
    let out_data = out.data_mut();
    for b in 0..batch {
        for h in 0..n_heads {
            for qi in 0..q_len {
                let src = &context[((b * n_heads + h) * q_len + qi) * head_width..][..head_width];
                let dst = (b * q_len + qi) * dim + h * head_width;
                out_data[dst..dst + head_width].copy_from_slice(src);
            }
        }
    }

    (out, scores)
}

#[cfg(test)]
#[path = "../tests/unit/layers_test.rs"]
mod layers_test;

use crate::configuration::EncoderConfig;
use crate::error::{EncoderError, Result};
use crate::init::XorShiftRng;
use crate::tensor::{self, Tensor, gelu};

/// Epsilon inside the square root of the variance normalization.
const VARIANCE_EPSILON: f32 = 1e-12;

/// Learned affine projection, `in_features -> out_features`.
pub struct Linear {
    /// Row-major weight, `out_features × in_features`.
    pub weight: Vec<f32>,
    pub bias: Vec<f32>,
    pub in_features: usize,
    pub out_features: usize,
}

impl Linear {
    pub(crate) fn new(in_features: usize, out_features: usize, rng: &mut XorShiftRng) -> Self {
        let bound = 1.0 / (in_features as f32).sqrt();
        let mut weight = vec![0.0; in_features * out_features];
        rng.fill_uniform(&mut weight, bound);

        Self { weight, bias: vec![0.0; out_features], in_features, out_features }
    }

    /// Applies the projection to a batch of feature rows.
    pub fn forward(&self, output: &mut [f32], input: &[f32]) {
        tensor::linear_forward(output, input, &self.weight, &self.bias, self.in_features, self.out_features);
    }

    pub fn parameter_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

impl std::fmt::Debug for Linear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linear")
            .field("in_features", &self.in_features)
            .field("out_features", &self.out_features)
            .finish()
    }
}

/// Layer normalization in the TF style (epsilon inside the square root).
///
/// Each feature vector is centered and scaled to unit variance over the
/// last axis, then mapped through the learned `gamma`/`beta` pair.
pub struct LayerNorm {
    pub gamma: Vec<f32>,
    pub beta: Vec<f32>,
    pub eps: f32,
}

impl LayerNorm {
    pub(crate) fn new(dim: usize) -> Self {
        Self { gamma: vec![1.0; dim], beta: vec![0.0; dim], eps: VARIANCE_EPSILON }
    }

    /// Normalizes a single feature vector in place.
    pub fn forward_row(&self, x: &mut [f32]) {
        debug_assert_eq!(x.len(), self.gamma.len());

        let n = x.len() as f32;
        let mean = x.iter().sum::<f32>() / n;
        let variance = x.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / n;
        let inv_std = (variance + self.eps).sqrt().recip();

        x.iter_mut().zip(self.gamma.iter()).zip(self.beta.iter()).for_each(|((v, &g), &b)| {
            *v = g * ((*v - mean) * inv_std) + b;
        });
    }

    /// Normalizes every feature vector (last axis) of `x` in place.
    pub fn forward_inplace(&self, x: &mut Tensor) {
        let dim = self.gamma.len();
        debug_assert_eq!(x.len() % dim, 0);

        x.data_mut().chunks_mut(dim).for_each(|row| self.forward_row(row));
    }

    pub fn parameter_count(&self) -> usize {
        self.gamma.len() + self.beta.len()
    }
}

impl std::fmt::Debug for LayerNorm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerNorm").field("dim", &self.gamma.len()).finish()
    }
}

/// Position-wise feed-forward net: `fc2(gelu(fc1(x)))`.
pub struct FeedForward {
    pub fc1: Linear,
    pub fc2: Linear,
}

impl FeedForward {
    pub(crate) fn new(dim: usize, ffw: usize, rng: &mut XorShiftRng) -> Self {
        Self { fc1: Linear::new(dim, ffw, rng), fc2: Linear::new(ffw, dim, rng) }
    }

    /// Transforms each position independently; feature width is preserved.
    pub fn forward(&self, x: &Tensor) -> Tensor {
        let rows = x.len() / self.fc1.in_features;

        let mut hidden = vec![0.0; rows * self.fc1.out_features];
        self.fc1.forward(&mut hidden, x.data());
        hidden.iter_mut().for_each(|v| *v = gelu(*v));

        let mut out = Tensor::zeros(x.shape());
        self.fc2.forward(out.data_mut(), &hidden);
        out
    }

    pub fn parameter_count(&self) -> usize {
        self.fc1.parameter_count() + self.fc2.parameter_count()
    }
}

impl std::fmt::Debug for FeedForward {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedForward").field("dim", &self.fc1.in_features).field("ffw", &self.fc1.out_features).finish()
    }
}

/// Word, position, and segment embeddings with factorized token lookup.
///
/// Token ids index a narrow `vocab_size × embedding` table whose rows are
/// projected up to `hidden`; the factorization keeps the parameter count
/// well below a direct `vocab_size × hidden` table.
pub struct Embeddings {
    /// Factorized token table, `vocab_size × embedding`.
    pub tok_embed1: Vec<f32>,
    /// Projection from the factorized width up to `hidden`.
    pub tok_embed2: Linear,
    /// Learned position table, `max_len × hidden`.
    pub pos_embed: Vec<f32>,
    /// Segment-type table, `n_segments × hidden`.
    pub seg_embed: Vec<f32>,
    pub norm: LayerNorm,
    vocab_size: usize,
    embedding: usize,
    hidden: usize,
    max_len: usize,
    n_segments: usize,
}

impl Embeddings {
    pub(crate) fn new(config: &EncoderConfig, rng: &mut XorShiftRng) -> Self {
        let EncoderConfig { vocab_size, embedding, hidden, max_len, n_segments, .. } = *config;

        let mut tok_embed1 = vec![0.0; vocab_size * embedding];
        rng.fill_uniform(&mut tok_embed1, 0.02);
        let tok_embed2 = Linear::new(embedding, hidden, rng);
        let mut pos_embed = vec![0.0; max_len * hidden];
        rng.fill_uniform(&mut pos_embed, 0.02);
        let mut seg_embed = vec![0.0; n_segments * hidden];
        rng.fill_uniform(&mut seg_embed, 0.02);

        Self {
            tok_embed1,
            tok_embed2,
            pos_embed,
            seg_embed,
            norm: LayerNorm::new(hidden),
            vocab_size,
            embedding,
            hidden,
            max_len,
            n_segments,
        }
    }

    /// Embeds token and segment ids into `batch × seq_len × hidden`.
    ///
    /// The three embeddings (projected token, position, segment) are summed
    /// elementwise, then normalized. Fails when any id falls outside its
    /// table or when `seq_len` exceeds the learned position count.
    pub fn forward(
        &self,
        token_ids: &[u32],
        segment_ids: &[u32],
        batch_size: usize,
        seq_len: usize,
    ) -> Result<Tensor> {
        debug_assert_eq!(token_ids.len(), batch_size * seq_len);
        debug_assert_eq!(segment_ids.len(), batch_size * seq_len);

        if seq_len > self.max_len {
            return Err(EncoderError::IndexOutOfRange(format!(
                "sequence length {} exceeds the {} learned positions",
                seq_len, self.max_len
            )));
        }

        // Factorized lookup into the narrow table, projected up to `hidden`.
        let mut narrow = vec![0.0; batch_size * seq_len * self.embedding];
        for (i, &token) in token_ids.iter().enumerate() {
            let token = token as usize;
            if token >= self.vocab_size {
                return Err(EncoderError::IndexOutOfRange(format!(
                    "token id {} exceeds vocabulary of {}",
                    token, self.vocab_size
                )));
            }
            let src = &self.tok_embed1[token * self.embedding..(token + 1) * self.embedding];
            narrow[i * self.embedding..(i + 1) * self.embedding].copy_from_slice(src);
        }

        let mut out = Tensor::zeros(&[batch_size, seq_len, self.hidden]);
        self.tok_embed2.forward(out.data_mut(), &narrow);

        let data = out.data_mut();
        for (i, &segment) in segment_ids.iter().enumerate() {
            let segment = segment as usize;
            if segment >= self.n_segments {
                return Err(EncoderError::IndexOutOfRange(format!(
                    "segment id {} exceeds the {} segment types",
                    segment, self.n_segments
                )));
            }
            // Position indices run 0..seq_len-1 within each batch row.
            let pos = i % seq_len;
            let row = &mut data[i * self.hidden..(i + 1) * self.hidden];
            let pos_row = &self.pos_embed[pos * self.hidden..(pos + 1) * self.hidden];
            let seg_row = &self.seg_embed[segment * self.hidden..(segment + 1) * self.hidden];
            row.iter_mut()
                .zip(pos_row.iter().zip(seg_row.iter()))
                .for_each(|(v, (&p, &s))| *v += p + s);
        }

        self.norm.forward_inplace(&mut out);
        Ok(out)
    }

    pub fn parameter_count(&self) -> usize {
        self.tok_embed1.len()
            + self.tok_embed2.parameter_count()
            + self.pos_embed.len()
            + self.seg_embed.len()
            + self.norm.parameter_count()
    }
}

impl std::fmt::Debug for Embeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embeddings")
            .field("vocab_size", &self.vocab_size)
            .field("embedding", &self.embedding)
            .field("hidden", &self.hidden)
            .field("max_len", &self.max_len)
            .field("n_segments", &self.n_segments)
            .finish()
    }
}

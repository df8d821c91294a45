use log::debug;

use crate::attention::{CrossAttention, SelfAttention};
use crate::configuration::EncoderConfig;
use crate::error::{EncoderError, Result};
use crate::init::XorShiftRng;
use crate::layers::{Embeddings, FeedForward, LayerNorm};
use crate::tensor::Tensor;

/// One batch of encoder inputs with validated dimensions.
///
/// Ids and the optional mask are row-major `batch_size × seq_len` slices;
/// the mask uses 1 = keep, 0 = drop. Inputs are borrowed and never mutated.
#[derive(Debug)]
pub struct EncoderInput<'a> {
    token_ids: &'a [u32],
    segment_ids: &'a [u32],
    attention_mask: Option<&'a [f32]>,
    batch_size: usize,
    seq_len: usize,
}

impl<'a> EncoderInput<'a> {
    pub fn new(
        token_ids: &'a [u32],
        segment_ids: &'a [u32],
        attention_mask: Option<&'a [f32]>,
        batch_size: usize,
        seq_len: usize,
    ) -> Result<Self> {
        let expected = batch_size * seq_len;
        if token_ids.len() != expected {
            return Err(EncoderError::ShapeMismatch(format!(
                "token_ids has {} elements, expected {batch_size}x{seq_len}",
                token_ids.len()
            )));
        }
        if segment_ids.len() != expected {
            return Err(EncoderError::ShapeMismatch(format!(
                "segment_ids has {} elements, expected {batch_size}x{seq_len}",
                segment_ids.len()
            )));
        }
        if let Some(mask) = attention_mask {
            if mask.len() != expected {
                return Err(EncoderError::ShapeMismatch(format!(
                    "attention_mask has {} elements, expected {batch_size}x{seq_len}",
                    mask.len()
                )));
            }
        }

        Ok(Self { token_ids, segment_ids, attention_mask, batch_size, seq_len })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }
}

/// Encoded latent representation plus the attention score tensors retained
/// for inspection; nothing downstream consumes the scores.
#[derive(Debug)]
pub struct EncoderOutput {
    /// Final latent array, `[batch, num_latents, latent_dim]`.
    pub latent: Tensor,
    /// Cross-attention scores, `[batch, cross_heads, num_latents, seq_len]`.
    pub cross_scores: Tensor,
    /// Self-attention scores of the final processing round,
    /// `[batch, latent_heads, num_latents, num_latents]`; `None` when the
    /// configuration runs zero processing rounds.
    pub latent_scores: Option<Tensor>,
}

/// Hybrid encoder with a factorized-embedding front end and a fixed-size
/// latent bottleneck.
///
/// The embedded input sequence is read once by a cross-attention block;
/// afterwards the latent array self-processes for `process_layers` rounds
/// through ONE shared self-attention/feed-forward pair — the rounds reuse
/// the same weights, a deliberate parameter-efficiency choice. Every
/// sub-block is wrapped in a residual add and layer normalization.
///
/// All parameter fields are public so an external trainer can mutate them;
/// the forward pass itself only reads them, so concurrent forward calls on
/// a shared reference are safe.
pub struct LatentTransformer {
    config: EncoderConfig,
    pub embeddings: Embeddings,
    /// Trainable latent array, `num_latents × latent_dim`, broadcast across
    /// the batch on every forward call.
    pub latents: Tensor,
    pub cross_attention: CrossAttention,
    pub cross_feed_forward: FeedForward,
    pub latent_attention: SelfAttention,
    pub latent_feed_forward: FeedForward,
    pub norm1: LayerNorm,
    pub norm2: LayerNorm,
    pub norm3: LayerNorm,
    pub norm4: LayerNorm,
}

impl LatentTransformer {
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Total number of learned scalar parameters.
    pub fn parameter_count(&self) -> usize {
        self.embeddings.parameter_count()
            + self.latents.len()
            + self.cross_attention.parameter_count()
            + self.cross_feed_forward.parameter_count()
            + self.latent_attention.parameter_count()
            + self.latent_feed_forward.parameter_count()
            + self.norm1.parameter_count()
            + self.norm2.parameter_count()
            + self.norm3.parameter_count()
            + self.norm4.parameter_count()
    }

    /// Runs the forward pass over one batch.
    ///
    /// The output shape is `[batch, num_latents, latent_dim]` regardless of
    /// the input sequence length; the latent bottleneck decouples the two.
    pub fn forward(&self, input: &EncoderInput<'_>) -> Result<EncoderOutput> {
        let num_latents = self.config.num_latents;
        let latent_dim = self.config.latent_dim;
        let batch = input.batch_size;

        // Embedded input sequence; the latent path reads it exactly once.
        let h = self.embeddings.forward(input.token_ids, input.segment_ids, input.batch_size, input.seq_len)?;

        // Broadcast the shared latent array across the batch.
        let mut x = Tensor::zeros(&[batch, num_latents, latent_dim]);
        x.data_mut()
            .chunks_mut(num_latents * latent_dim)
            .for_each(|row| row.copy_from_slice(self.latents.data()));

        let (cross, cross_scores) = self.cross_attention.forward(&h, &x, input.attention_mask)?;
        add_residual(&mut x, &cross);
        self.norm1.forward_inplace(&mut x);

        let ff = self.cross_feed_forward.forward(&x);
        add_residual(&mut x, &ff);
        self.norm2.forward_inplace(&mut x);

        // All rounds share the same attention and feed-forward weights.
        let mut latent_scores = None;
        for round in 0..self.config.process_layers {
            let (attended, scores) = self.latent_attention.forward(&x, None)?;
            add_residual(&mut x, &attended);
            self.norm3.forward_inplace(&mut x);

            let ff = self.latent_feed_forward.forward(&x);
            add_residual(&mut x, &ff);
            self.norm4.forward_inplace(&mut x);

            debug!("finished latent processing round {round}");
            latent_scores = Some(scores);
        }

        Ok(EncoderOutput { latent: x, cross_scores, latent_scores })
    }
}

impl std::fmt::Debug for LatentTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatentTransformer")
            .field("embeddings", &self.embeddings)
            .field("latents", &self.latents)
            .field("cross_attention", &self.cross_attention)
            .field("cross_feed_forward", &self.cross_feed_forward)
            .field("latent_attention", &self.latent_attention)
            .field("latent_feed_forward", &self.latent_feed_forward)
            .field("process_layers", &self.config.process_layers)
            .finish()
    }
}

/// Builder for [`LatentTransformer`] instances.
pub struct TransformerBuilder {
    config: EncoderConfig,
    seed: u64,
}

impl TransformerBuilder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config, seed: 42 }
    }

    /// Seed for the deterministic parameter initialization.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validates the configuration and allocates every parameter tensor.
    ///
    /// An inconsistent configuration is rejected here, before any
    /// allocation, rather than failing with an obscure shape error deep in
    /// the first forward pass.
    pub fn build(self) -> Result<LatentTransformer> {
        self.config.validate()?;

        let config = self.config;
        let mut rng = XorShiftRng::new(self.seed);

        let embeddings = Embeddings::new(&config, &mut rng);
        let cross_attention = CrossAttention::new(&config, &mut rng);
        let cross_feed_forward = FeedForward::new(config.latent_dim, config.ffw, &mut rng);
        let latent_attention = SelfAttention::new(&config, &mut rng);
        let latent_feed_forward = FeedForward::new(config.latent_dim, config.ffw, &mut rng);

        let mut latents = Tensor::zeros(&[config.num_latents, config.latent_dim]);
        rng.fill_normal(latents.data_mut());

        let norm1 = LayerNorm::new(config.latent_dim);
        let norm2 = LayerNorm::new(config.latent_dim);
        let norm3 = LayerNorm::new(config.latent_dim);
        let norm4 = LayerNorm::new(config.latent_dim);

        let model = LatentTransformer {
            config,
            embeddings,
            latents,
            cross_attention,
            cross_feed_forward,
            latent_attention,
            latent_feed_forward,
            norm1,
            norm2,
            norm3,
            norm4,
        };

        debug!("{model:#?}");
        Ok(model)
    }
}

// Residual connections add the sub-block output onto its input.
fn add_residual(x: &mut Tensor, delta: &Tensor) {
    debug_assert_eq!(x.shape(), delta.shape());
    x.data_mut().iter_mut().zip(delta.data()).for_each(|(v, &d)| *v += d);
}

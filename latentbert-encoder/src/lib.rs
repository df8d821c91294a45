//! Forward pass of a hybrid encoder: a factorized-embedding transformer
//! front end feeding a fixed-size latent array through one cross-attention
//! read, followed by repeated self-attention/feed-forward processing of the
//! latent array with shared weights.
//!
//! The crate covers the numerical pipeline only — embedding composition,
//! scaled dot-product attention (cross and self variants), position-wise
//! feed-forward transformation, and layer normalization, driven by an
//! immutable [`EncoderConfig`]. Training, checkpoint formats, and
//! tokenization live elsewhere.

mod attention;
mod configuration;
mod encoder;
mod error;
mod init;
mod layers;
mod tensor;

pub use attention::{CrossAttention, SelfAttention};
pub use configuration::EncoderConfig;
pub use encoder::{EncoderInput, EncoderOutput, LatentTransformer, TransformerBuilder};
pub use error::{EncoderError, Result};
pub use layers::{Embeddings, FeedForward, LayerNorm, Linear};
pub use tensor::Tensor;

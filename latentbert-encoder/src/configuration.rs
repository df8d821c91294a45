#[cfg(test)]
#[path = "../tests/unit/configuration_test.rs"]
mod configuration_test;

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{EncoderError, Result};

/// Hyperparameters for the hybrid latent encoder.
///
/// Created once, validated, and then shared by reference across every
/// component; nothing mutates it after construction. Serde aliases accept
/// the upper-case single-letter keys (`M`, `C`, `N`, `D`) used by the
/// original configuration documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Vocabulary size of the factorized token embedding.
    pub vocab_size: usize,
    /// Feature width of the embedded input sequence.
    pub hidden: usize,
    /// Intermediate width of the original encoder stack; unused by the
    /// forward pass, kept for configuration compatibility.
    pub hidden_ff: usize,
    /// Width of the factorized token lookup before projection to `hidden`.
    pub embedding: usize,
    /// Layer count of the original encoder stack; unused, kept for
    /// configuration compatibility.
    pub n_layers: usize,
    /// Head count of the original encoder stack; unused, kept for
    /// configuration compatibility.
    pub n_heads: usize,
    /// Number of learned positions.
    pub max_len: usize,
    /// Number of segment types.
    pub n_segments: usize,
    /// Input array length of the original bottleneck setup; unused, kept
    /// for configuration compatibility.
    #[serde(alias = "M")]
    pub input_len: usize,
    /// Feature width of the cross-attention key/value source. Must equal
    /// `hidden`, since keys and values are read from the embedded sequence.
    #[serde(alias = "C")]
    pub input_dim: usize,
    /// Number of latent positions.
    #[serde(alias = "N")]
    pub num_latents: usize,
    /// Feature width of the latent array.
    #[serde(alias = "D")]
    pub latent_dim: usize,
    /// Head count of the cross-attention block.
    pub cross_heads: usize,
    /// Head count of the latent self-attention block.
    pub latent_heads: usize,
    /// Nominal cross-attention head width; the split actually uses
    /// `latent_dim / cross_heads`. Kept for configuration compatibility.
    pub cross_dim_head: usize,
    /// Nominal latent-attention head width; the split actually uses
    /// `latent_dim / latent_heads`. Kept for configuration compatibility.
    pub latent_dim_head: usize,
    /// Hidden width of the position-wise feed-forward blocks.
    pub ffw: usize,
    /// Number of latent self-processing rounds.
    pub process_layers: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            vocab_size: 30000,
            hidden: 384,
            hidden_ff: 640,
            embedding: 64,
            n_layers: 6,
            n_heads: 12,
            max_len: 256,
            n_segments: 2,
            input_len: 256,
            input_dim: 384,
            num_latents: 128,
            latent_dim: 384,
            cross_heads: 1,
            latent_heads: 8,
            cross_dim_head: 32,
            latent_dim_head: 32,
            ffw: 640,
            process_layers: 12,
        }
    }
}

impl EncoderConfig {
    /// Reads a configuration from a JSON document and validates it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        debug!("loaded encoder configuration: {config:?}");
        Ok(config)
    }

    /// Checks the structural invariants the forward pass relies on.
    ///
    /// Both attention blocks split their `latent_dim`-wide projections into
    /// head groups, so the head counts must divide `latent_dim`; keys and
    /// values of the cross-attention come from the embedded sequence, so
    /// `input_dim` must equal `hidden`.
    pub fn validate(&self) -> Result<()> {
        let dimensions = [
            ("vocab_size", self.vocab_size),
            ("hidden", self.hidden),
            ("embedding", self.embedding),
            ("max_len", self.max_len),
            ("n_segments", self.n_segments),
            ("input_dim", self.input_dim),
            ("num_latents", self.num_latents),
            ("latent_dim", self.latent_dim),
            ("cross_heads", self.cross_heads),
            ("latent_heads", self.latent_heads),
            ("ffw", self.ffw),
        ];

        for (name, value) in dimensions {
            if value == 0 {
                return Err(EncoderError::Config(format!("{name} must be positive")));
            }
        }

        if self.latent_dim % self.latent_heads != 0 {
            return Err(EncoderError::Config(format!(
                "latent_dim ({}) is not divisible by latent_heads ({})",
                self.latent_dim, self.latent_heads
            )));
        }

        if self.latent_dim % self.cross_heads != 0 {
            return Err(EncoderError::Config(format!(
                "latent_dim ({}) is not divisible by cross_heads ({})",
                self.latent_dim, self.cross_heads
            )));
        }

        if self.input_dim % self.cross_heads != 0 {
            return Err(EncoderError::Config(format!(
                "input_dim ({}) is not divisible by cross_heads ({})",
                self.input_dim, self.cross_heads
            )));
        }

        if self.input_dim != self.hidden {
            return Err(EncoderError::Config(format!(
                "input_dim ({}) must equal hidden ({}): cross-attention keys and values \
                 are projected from the embedded sequence",
                self.input_dim, self.hidden
            )));
        }

        Ok(())
    }

    /// Width of one cross-attention head.
    pub fn cross_head_width(&self) -> usize {
        self.latent_dim / self.cross_heads
    }

    /// Width of one latent self-attention head.
    pub fn latent_head_width(&self) -> usize {
        self.latent_dim / self.latent_heads
    }
}

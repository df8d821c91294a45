//! Unit tests for the embedding, normalization, and feed-forward layers.

use super::*;
use anyhow::Result;

use crate::error::EncoderError;

fn small_config() -> EncoderConfig {
    EncoderConfig {
        vocab_size: 100,
        hidden: 8,
        embedding: 4,
        max_len: 16,
        n_segments: 2,
        input_dim: 8,
        num_latents: 4,
        latent_dim: 8,
        cross_heads: 2,
        latent_heads: 2,
        ffw: 16,
        process_layers: 2,
        ..EncoderConfig::default()
    }
}

#[test]
fn test_layernorm_centers_and_scales() {
    let norm = LayerNorm::new(4);
    let mut row = [1.0, 2.0, 3.0, 4.0];

    norm.forward_row(&mut row);

    let mean: f32 = row.iter().sum::<f32>() / 4.0;
    let variance: f32 = row.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / 4.0;
    assert!(mean.abs() < 1e-5, "mean {mean} not centered");
    assert!((variance - 1.0).abs() < 1e-3, "variance {variance} not unit");
}

#[test]
fn test_layernorm_applies_scale_and_shift() {
    let mut norm = LayerNorm::new(4);
    norm.gamma.fill(2.0);
    norm.beta.fill(0.5);
    let mut row = [1.0, 2.0, 3.0, 4.0];

    norm.forward_row(&mut row);

    // Undoing scale/shift must recover a centered unit-variance vector.
    let recovered: Vec<f32> = row.iter().map(|&v| (v - 0.5) / 2.0).collect();
    let mean: f32 = recovered.iter().sum::<f32>() / 4.0;
    let variance: f32 = recovered.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / 4.0;
    assert!(mean.abs() < 1e-5);
    assert!((variance - 1.0).abs() < 1e-3);
}

#[test]
fn test_layernorm_constant_row_stays_finite() {
    let norm = LayerNorm::new(4);
    let mut row = [3.0; 4];

    norm.forward_row(&mut row);

    // Zero variance is held off by the epsilon, not a division by zero.
    assert!(row.iter().all(|v| v.is_finite()));
    assert!(row.iter().all(|&v| v.abs() < 1e-3));
}

#[test]
fn test_feed_forward_preserves_shape() -> Result<()> {
    let mut rng = XorShiftRng::new(7);
    let ff = FeedForward::new(8, 16, &mut rng);
    let x = Tensor::from_vec((0..16).map(|i| (i as f32 * 0.3).sin()).collect(), &[1, 2, 8])?;

    let y = ff.forward(&x);

    assert_eq!(y.shape(), x.shape());
    assert!(y.data().iter().all(|v| v.is_finite()));
    Ok(())
}

#[test]
fn test_feed_forward_zero_projection_gives_zero() -> Result<()> {
    let mut rng = XorShiftRng::new(7);
    let mut ff = FeedForward::new(8, 16, &mut rng);
    ff.fc2.weight.fill(0.0);
    let x = Tensor::from_vec(vec![1.0; 16], &[1, 2, 8])?;

    let y = ff.forward(&x);

    assert!(y.data().iter().all(|&v| v == 0.0));
    Ok(())
}

#[test]
fn test_embeddings_output_shape() -> Result<()> {
    let config = small_config();
    let mut rng = XorShiftRng::new(3);
    let embeddings = Embeddings::new(&config, &mut rng);

    let out = embeddings.forward(&[1, 2, 3, 4, 5, 6], &[0, 0, 0, 1, 1, 1], 2, 3)?;

    assert_eq!(out.shape(), &[2, 3, 8]);
    assert!(out.data().iter().all(|v| v.is_finite()));
    Ok(())
}

#[test]
fn test_embeddings_rows_are_normalized() -> Result<()> {
    let config = small_config();
    let mut rng = XorShiftRng::new(3);
    let embeddings = Embeddings::new(&config, &mut rng);

    let out = embeddings.forward(&[1, 2, 3], &[0, 0, 0], 1, 3)?;

    for row in out.data().chunks(8) {
        let mean: f32 = row.iter().sum::<f32>() / 8.0;
        assert!(mean.abs() < 1e-5);
    }
    Ok(())
}

#[test]
fn test_embeddings_reject_out_of_vocabulary_token() {
    let config = small_config();
    let mut rng = XorShiftRng::new(3);
    let embeddings = Embeddings::new(&config, &mut rng);

    let err = embeddings.forward(&[100], &[0], 1, 1).unwrap_err();
    assert!(matches!(err, EncoderError::IndexOutOfRange(_)));
    assert!(err.to_string().contains("token id"));
}

#[test]
fn test_embeddings_reject_unknown_segment() {
    let config = small_config();
    let mut rng = XorShiftRng::new(3);
    let embeddings = Embeddings::new(&config, &mut rng);

    let err = embeddings.forward(&[1], &[2], 1, 1).unwrap_err();
    assert!(matches!(err, EncoderError::IndexOutOfRange(_)));
    assert!(err.to_string().contains("segment id"));
}

#[test]
fn test_embeddings_reject_over_long_sequence() {
    let config = small_config();
    let mut rng = XorShiftRng::new(3);
    let embeddings = Embeddings::new(&config, &mut rng);

    let token_ids = vec![1u32; 17];
    let segment_ids = vec![0u32; 17];
    let err = embeddings.forward(&token_ids, &segment_ids, 1, 17).unwrap_err();
    assert!(matches!(err, EncoderError::IndexOutOfRange(_)));
    assert!(err.to_string().contains("sequence length"));
}

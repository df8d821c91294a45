//! Unit tests for the tensor primitive.

use super::*;

#[test]
fn test_zeros_allocates_full_shape() {
    let t = Tensor::zeros(&[2, 3, 4]);

    assert_eq!(t.shape(), &[2, 3, 4]);
    assert_eq!(t.len(), 24);
    assert!(t.data().iter().all(|&v| v == 0.0));
}

#[test]
fn test_from_vec_rejects_wrong_element_count() {
    let result = Tensor::from_vec(vec![0.0; 5], &[2, 3]);

    assert!(matches!(result, Err(EncoderError::ShapeMismatch(_))));
}

#[test]
fn test_from_vec_keeps_data() -> anyhow::Result<()> {
    let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2])?;

    assert_eq!(t.shape(), &[2, 2]);
    assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0]);
    Ok(())
}

#[test]
fn test_linear_forward_known_values() {
    // Identity weight rows with distinct biases.
    let input = [1.0, 2.0, 3.0, 4.0]; // two rows of width 2
    let weight = [1.0, 0.0, 0.0, 1.0];
    let bias = [1.0, -1.0];
    let mut out = [0.0; 4];

    linear_forward(&mut out, &input, &weight, &bias, 2, 2);

    assert_eq!(out, [2.0, 1.0, 4.0, 3.0]);
}

#[test]
fn test_softmax_normalizes_to_one() {
    let mut x = [1.0, 2.0, 3.0, 4.0];
    softmax(&mut x);

    let sum: f32 = x.iter().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    // Monotonic inputs stay monotonic after normalization.
    assert!(x.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_softmax_uniform_input() {
    let mut x = [5.0; 4];
    softmax(&mut x);

    for &v in &x {
        assert!((v - 0.25).abs() < 1e-6);
    }
}

#[test]
fn test_gelu_reference_values() {
    assert_eq!(gelu(0.0), 0.0);
    // gelu(1) = Phi(1) = 0.8413447...
    assert!((gelu(1.0) - 0.841_344_7).abs() < 1e-5);
    assert!((gelu(-1.0) + 0.158_655_3).abs() < 1e-5);
    // Far tails pass through / vanish.
    assert!((gelu(10.0) - 10.0).abs() < 1e-4);
    assert!(gelu(-10.0).abs() < 1e-4);
}

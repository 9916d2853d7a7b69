use crate::error::{ensure_len, NnError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fully-connected layer with row-major weights (`[output][input]`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Linear {
    input_dim: usize,
    output_dim: usize,
    weight: Vec<f32>,
    bias: Vec<f32>,
}

impl Linear {
    /// Create a layer with Kaiming-uniform initialisation.
    ///
    /// Weights and bias are drawn from `U(-1/sqrt(in), 1/sqrt(in))`.
    pub fn new<R: Rng + ?Sized>(input_dim: usize, output_dim: usize, rng: &mut R) -> Result<Self> {
        if input_dim == 0 || output_dim == 0 {
            return Err(NnError::InvalidConfiguration(format!(
                "linear layer must have non-zero dimensions, got {}x{}",
                input_dim, output_dim
            )));
        }

        let bound = 1.0 / (input_dim as f32).sqrt();
        let weight = (0..input_dim * output_dim)
            .map(|_| rng.gen_range(-bound..bound))
            .collect();
        let bias = (0..output_dim).map(|_| rng.gen_range(-bound..bound)).collect();

        Ok(Self {
            input_dim,
            output_dim,
            weight,
            bias,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn parameter_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    pub fn forward(&self, input: &[f32]) -> Result<Vec<f32>> {
        ensure_len("linear forward", self.input_dim, input.len())?;

        Ok(self
            .weight
            .chunks_exact(self.input_dim)
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect())
    }

    /// Returns `(grad_input, grad_weight, grad_bias)`.
    pub fn backward(
        &self,
        input: &[f32],
        grad_output: &[f32],
    ) -> Result<(Vec<f32>, Vec<f32>, Vec<f32>)> {
        ensure_len("linear backward input", self.input_dim, input.len())?;
        ensure_len("linear backward grad", self.output_dim, grad_output.len())?;

        let mut grad_input = vec![0.0f32; self.input_dim];
        let mut grad_weight = Vec::with_capacity(self.weight.len());

        for (row, g) in self.weight.chunks_exact(self.input_dim).zip(grad_output) {
            for ((w, x), gi) in row.iter().zip(input).zip(grad_input.iter_mut()) {
                grad_weight.push(g * x);
                *gi += w * g;
            }
        }

        Ok((grad_input, grad_weight, grad_output.to_vec()))
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.input_dim > 0
            && self.output_dim > 0
            && self.weight.len() == self.input_dim * self.output_dim
            && self.bias.len() == self.output_dim
    }

    pub(crate) fn parameters(&self) -> [&[f32]; 2] {
        [&self.weight, &self.bias]
    }

    pub(crate) fn parameters_mut(&mut self) -> [&mut [f32]; 2] {
        [&mut self.weight, &mut self.bias]
    }
}

/// Per-sample layer normalisation with learned affine parameters.
///
/// Used instead of batch normalisation because the estimator trains on one
/// sample at a time; batch statistics over a single row are degenerate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerNorm {
    features: usize,
    epsilon: f32,
    gamma: Vec<f32>,
    beta: Vec<f32>,
}

/// Values captured by [`LayerNorm::forward`] that the backward pass needs.
#[derive(Debug, Clone)]
pub struct LayerNormCache {
    normalized: Vec<f32>,
    inv_std: f32,
}

impl LayerNorm {
    pub const DEFAULT_EPSILON: f32 = 1e-5;

    pub fn new(features: usize) -> Result<Self> {
        if features < 2 {
            return Err(NnError::InvalidConfiguration(format!(
                "layer norm needs at least 2 features, got {}",
                features
            )));
        }

        Ok(Self {
            features,
            epsilon: Self::DEFAULT_EPSILON,
            gamma: vec![1.0; features],
            beta: vec![0.0; features],
        })
    }

    pub fn features(&self) -> usize {
        self.features
    }

    pub fn forward(&self, input: &[f32]) -> Result<(Vec<f32>, LayerNormCache)> {
        ensure_len("layer norm forward", self.features, input.len())?;

        let n = self.features as f32;
        let mean = input.iter().sum::<f32>() / n;
        let variance = input.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
        let inv_std = 1.0 / (variance + self.epsilon).sqrt();

        let normalized: Vec<f32> = input.iter().map(|x| (x - mean) * inv_std).collect();
        let output = normalized
            .iter()
            .zip(self.gamma.iter().zip(&self.beta))
            .map(|(xhat, (g, b))| g * xhat + b)
            .collect();

        Ok((output, LayerNormCache { normalized, inv_std }))
    }

    /// Returns `(grad_input, grad_gamma, grad_beta)`.
    pub fn backward(
        &self,
        cache: &LayerNormCache,
        grad_output: &[f32],
    ) -> Result<(Vec<f32>, Vec<f32>, Vec<f32>)> {
        ensure_len("layer norm backward", self.features, grad_output.len())?;

        let n = self.features as f32;
        let grad_normalized: Vec<f32> = grad_output
            .iter()
            .zip(&self.gamma)
            .map(|(g, gamma)| g * gamma)
            .collect();
        let sum_grad: f32 = grad_normalized.iter().sum();
        let sum_grad_xhat: f32 = grad_normalized
            .iter()
            .zip(&cache.normalized)
            .map(|(d, xhat)| d * xhat)
            .sum();

        let grad_input = grad_normalized
            .iter()
            .zip(&cache.normalized)
            .map(|(d, xhat)| cache.inv_std / n * (n * d - sum_grad - xhat * sum_grad_xhat))
            .collect();
        let grad_gamma = grad_output
            .iter()
            .zip(&cache.normalized)
            .map(|(g, xhat)| g * xhat)
            .collect();

        Ok((grad_input, grad_gamma, grad_output.to_vec()))
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.features >= 2
            && self.gamma.len() == self.features
            && self.beta.len() == self.features
            && self.epsilon > 0.0
    }

    pub(crate) fn parameters(&self) -> [&[f32]; 2] {
        [&self.gamma, &self.beta]
    }

    pub(crate) fn parameters_mut(&mut self) -> [&mut [f32]; 2] {
        [&mut self.gamma, &mut self.beta]
    }
}

pub fn relu(x: f32) -> f32 {
    x.max(0.0)
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

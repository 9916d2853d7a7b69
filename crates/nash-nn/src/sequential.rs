use crate::error::{ensure_len, NnError, Result};
use crate::layers::{relu, sigmoid, LayerNorm, LayerNormCache, Linear};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One stage of a [`Sequential`] network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layer {
    Linear(Linear),
    LayerNorm(LayerNorm),
    Relu,
    Sigmoid,
    Dropout { probability: f32 },
}

impl Layer {
    fn name(&self) -> &'static str {
        match self {
            Layer::Linear(_) => "linear",
            Layer::LayerNorm(_) => "layer_norm",
            Layer::Relu => "relu",
            Layer::Sigmoid => "sigmoid",
            Layer::Dropout { .. } => "dropout",
        }
    }
}

/// Per-layer data recorded during a training forward pass.
#[derive(Debug, Clone)]
enum Trace {
    Plain,
    Mask(Vec<f32>),
    Norm(LayerNormCache),
}

/// Activations recorded by [`Sequential::forward_train`].
#[derive(Debug, Clone)]
pub struct Tape {
    activations: Vec<Vec<f32>>,
    traces: Vec<Trace>,
}

impl Tape {
    pub fn output(&self) -> &[f32] {
        self.activations.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Parameter gradients in the order of [`Sequential::parameters_mut`].
#[derive(Debug, Clone)]
pub struct Gradients {
    slots: Vec<Vec<f32>>,
}

impl Gradients {
    pub fn slots(&self) -> &[Vec<f32>] {
        &self.slots
    }
}

/// Feed-forward stack of layers evaluated one sample at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sequential {
    input_dim: usize,
    layers: Vec<Layer>,
}

impl Sequential {
    pub fn builder(input_dim: usize) -> SequentialBuilder {
        SequentialBuilder::new(input_dim)
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| match layer {
                Layer::Linear(linear) => Some(linear.output_dim()),
                Layer::LayerNorm(norm) => Some(norm.features()),
                _ => None,
            })
            .unwrap_or(self.input_dim)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|slot| slot.len()).sum()
    }

    /// Check the layer chain after deserialisation: every layer must accept
    /// the width produced by the one before it.
    pub fn validate(&self) -> Result<()> {
        let mut width = self.input_dim;
        for layer in &self.layers {
            match layer {
                Layer::Linear(linear) => {
                    if !linear.is_consistent() {
                        return Err(NnError::LayoutMismatch(
                            "linear layer buffers do not match its dimensions".to_string(),
                        ));
                    }
                    ensure_len("sequential chain", width, linear.input_dim())?;
                    width = linear.output_dim();
                }
                Layer::LayerNorm(norm) => {
                    if !norm.is_consistent() {
                        return Err(NnError::LayoutMismatch(
                            "layer norm buffers do not match its width".to_string(),
                        ));
                    }
                    ensure_len("sequential chain", width, norm.features())?;
                }
                Layer::Dropout { probability } => validate_dropout(*probability)?,
                Layer::Relu | Layer::Sigmoid => {}
            }
        }
        Ok(())
    }

    /// Inference pass. Dropout is the identity and nothing is mutated.
    pub fn forward(&self, input: &[f32]) -> Result<Vec<f32>> {
        ensure_len("sequential input", self.input_dim, input.len())?;

        let mut x = input.to_vec();
        for layer in &self.layers {
            x = match layer {
                Layer::Linear(linear) => linear.forward(&x)?,
                Layer::LayerNorm(norm) => norm.forward(&x)?.0,
                Layer::Relu => x.into_iter().map(relu).collect(),
                Layer::Sigmoid => x.into_iter().map(sigmoid).collect(),
                Layer::Dropout { .. } => x,
            };
        }

        ensure_finite("sequential forward", &x)?;
        Ok(x)
    }

    /// Training pass: samples dropout masks and records every activation.
    pub fn forward_train<R: Rng + ?Sized>(&self, input: &[f32], rng: &mut R) -> Result<Tape> {
        ensure_len("sequential input", self.input_dim, input.len())?;

        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        let mut traces = Vec::with_capacity(self.layers.len());
        activations.push(input.to_vec());

        for layer in &self.layers {
            let x = activations.last().map(Vec::as_slice).unwrap_or(&[]);
            let (next, trace) = match layer {
                Layer::Linear(linear) => (linear.forward(x)?, Trace::Plain),
                Layer::LayerNorm(norm) => {
                    let (out, cache) = norm.forward(x)?;
                    (out, Trace::Norm(cache))
                }
                Layer::Relu => (x.iter().copied().map(relu).collect(), Trace::Plain),
                Layer::Sigmoid => (x.iter().copied().map(sigmoid).collect(), Trace::Plain),
                Layer::Dropout { probability } => {
                    let mask = sample_mask(*probability, x.len(), rng);
                    let out = x.iter().zip(&mask).map(|(v, m)| v * m).collect();
                    (out, Trace::Mask(mask))
                }
            };
            ensure_finite(layer.name(), &next)?;
            activations.push(next);
            traces.push(trace);
        }

        Ok(Tape {
            activations,
            traces,
        })
    }

    /// Backpropagate `grad_output` (d loss / d output) through a recorded tape.
    pub fn backward(&self, tape: &Tape, grad_output: &[f32]) -> Result<Gradients> {
        ensure_len("tape layers", self.layers.len(), tape.traces.len())?;
        ensure_len("backward grad", self.output_dim(), grad_output.len())?;

        let mut grad = grad_output.to_vec();
        // Collected back to front; each parametrised layer pushes its slots in
        // reverse so a final reverse restores forward order.
        let mut reversed_slots: Vec<Vec<f32>> = Vec::new();

        for (idx, layer) in self.layers.iter().enumerate().rev() {
            let input = &tape.activations[idx];
            let output = &tape.activations[idx + 1];

            grad = match (layer, &tape.traces[idx]) {
                (Layer::Linear(linear), _) => {
                    let (grad_input, grad_weight, grad_bias) = linear.backward(input, &grad)?;
                    reversed_slots.push(grad_bias);
                    reversed_slots.push(grad_weight);
                    grad_input
                }
                (Layer::LayerNorm(norm), Trace::Norm(cache)) => {
                    let (grad_input, grad_gamma, grad_beta) = norm.backward(cache, &grad)?;
                    reversed_slots.push(grad_beta);
                    reversed_slots.push(grad_gamma);
                    grad_input
                }
                (Layer::Relu, _) => grad
                    .iter()
                    .zip(input)
                    .map(|(g, x)| if *x > 0.0 { *g } else { 0.0 })
                    .collect(),
                (Layer::Sigmoid, _) => grad
                    .iter()
                    .zip(output)
                    .map(|(g, y)| g * y * (1.0 - y))
                    .collect(),
                (Layer::Dropout { .. }, Trace::Mask(mask)) => {
                    grad.iter().zip(mask).map(|(g, m)| g * m).collect()
                }
                (layer, _) => {
                    return Err(NnError::LayoutMismatch(format!(
                        "tape entry {} does not match {} layer",
                        idx,
                        layer.name()
                    )))
                }
            };
        }

        reversed_slots.reverse();
        Ok(Gradients {
            slots: reversed_slots,
        })
    }

    pub fn parameters(&self) -> Vec<&[f32]> {
        let mut slots = Vec::new();
        for layer in &self.layers {
            match layer {
                Layer::Linear(linear) => slots.extend(linear.parameters()),
                Layer::LayerNorm(norm) => slots.extend(norm.parameters()),
                _ => {}
            }
        }
        slots
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut [f32]> {
        let mut slots = Vec::new();
        for layer in &mut self.layers {
            match layer {
                Layer::Linear(linear) => slots.extend(linear.parameters_mut()),
                Layer::LayerNorm(norm) => slots.extend(norm.parameters_mut()),
                _ => {}
            }
        }
        slots
    }
}

/// Builder that tracks the running width so each layer is sized correctly.
pub struct SequentialBuilder {
    input_dim: usize,
    width: usize,
    layers: Vec<Layer>,
    error: Option<NnError>,
}

impl SequentialBuilder {
    pub fn new(input_dim: usize) -> Self {
        Self {
            input_dim,
            width: input_dim,
            layers: Vec::new(),
            error: None,
        }
    }

    pub fn linear<R: Rng + ?Sized>(mut self, output_dim: usize, rng: &mut R) -> Self {
        if self.error.is_none() {
            match Linear::new(self.width, output_dim, rng) {
                Ok(linear) => {
                    self.width = output_dim;
                    self.layers.push(Layer::Linear(linear));
                }
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    pub fn layer_norm(mut self) -> Self {
        if self.error.is_none() {
            match LayerNorm::new(self.width) {
                Ok(norm) => self.layers.push(Layer::LayerNorm(norm)),
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    pub fn relu(mut self) -> Self {
        self.layers.push(Layer::Relu);
        self
    }

    pub fn sigmoid(mut self) -> Self {
        self.layers.push(Layer::Sigmoid);
        self
    }

    pub fn dropout(mut self, probability: f32) -> Self {
        if self.error.is_none() {
            match validate_dropout(probability) {
                Ok(()) => self.layers.push(Layer::Dropout { probability }),
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    pub fn build(self) -> Result<Sequential> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.input_dim == 0 {
            return Err(NnError::InvalidConfiguration(
                "network input width must be non-zero".to_string(),
            ));
        }
        Ok(Sequential {
            input_dim: self.input_dim,
            layers: self.layers,
        })
    }
}

fn validate_dropout(probability: f32) -> Result<()> {
    if !(0.0..1.0).contains(&probability) {
        return Err(NnError::InvalidConfiguration(format!(
            "dropout probability must be in [0, 1), got {}",
            probability
        )));
    }
    Ok(())
}

fn sample_mask<R: Rng + ?Sized>(probability: f32, len: usize, rng: &mut R) -> Vec<f32> {
    if probability == 0.0 {
        return vec![1.0; len];
    }
    let keep_scale = 1.0 / (1.0 - probability);
    (0..len)
        .map(|_| {
            if rng.gen::<f32>() >= probability {
                keep_scale
            } else {
                0.0
            }
        })
        .collect()
}

fn ensure_finite(context: &'static str, values: &[f32]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(NnError::NonFinite(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::mse_loss;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn smooth_network(seed: u64) -> Sequential {
        let mut rng = StdRng::seed_from_u64(seed);
        Sequential::builder(4)
            .linear(6, &mut rng)
            .layer_norm()
            .sigmoid()
            .linear(3, &mut rng)
            .sigmoid()
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_tracks_widths() {
        let mut rng = StdRng::seed_from_u64(1);
        let net = Sequential::builder(32)
            .linear(64, &mut rng)
            .relu()
            .layer_norm()
            .dropout(0.2)
            .linear(4, &mut rng)
            .sigmoid()
            .build()
            .unwrap();

        assert_eq!(net.input_dim(), 32);
        assert_eq!(net.output_dim(), 4);
        assert_eq!(net.parameter_count(), 32 * 64 + 64 + 64 * 2 + 64 * 4 + 4);
        net.validate().unwrap();
    }

    #[test]
    fn test_builder_rejects_bad_dropout() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = Sequential::builder(4)
            .linear(4, &mut rng)
            .dropout(1.0)
            .build();
        assert!(matches!(result, Err(NnError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_inference_ignores_dropout_and_is_repeatable() {
        let mut rng = StdRng::seed_from_u64(3);
        let net = Sequential::builder(5)
            .linear(8, &mut rng)
            .relu()
            .dropout(0.5)
            .linear(2, &mut rng)
            .build()
            .unwrap();
        let input = [0.1, -0.4, 0.9, 0.0, 2.0];

        let a = net.forward(&input).unwrap();
        let b = net.forward(&input).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_training_pass_without_dropout_matches_inference() {
        let net = smooth_network(5);
        let input = [0.3, -1.2, 0.8, 0.05];
        let mut rng = StdRng::seed_from_u64(99);

        let tape = net.forward_train(&input, &mut rng).unwrap();
        let inference = net.forward(&input).unwrap();
        assert_eq!(tape.output(), inference.as_slice());
    }

    #[test]
    fn test_backward_matches_numerical_gradient() {
        let net = smooth_network(21);
        let input = [0.5, -0.25, 1.5, -0.75];
        let target = [0.2, 0.9, 0.4];
        let mut rng = StdRng::seed_from_u64(0);

        let tape = net.forward_train(&input, &mut rng).unwrap();
        let (_, grad_out) = mse_loss(tape.output(), &target).unwrap();
        let grads = net.backward(&tape, &grad_out).unwrap();
        assert_eq!(grads.slots().len(), net.parameters().len());

        let eps = 1e-2f32;
        for (slot_idx, slot) in grads.slots().iter().enumerate() {
            for param_idx in [0, slot.len() / 2, slot.len() - 1] {
                let mut plus = net.clone();
                {
                    let mut params = plus.parameters_mut();
                    params[slot_idx][param_idx] += eps;
                }
                let mut minus = net.clone();
                {
                    let mut params = minus.parameters_mut();
                    params[slot_idx][param_idx] -= eps;
                }

                let (loss_plus, _) = mse_loss(&plus.forward(&input).unwrap(), &target).unwrap();
                let (loss_minus, _) = mse_loss(&minus.forward(&input).unwrap(), &target).unwrap();
                let numerical = (loss_plus - loss_minus) / (2.0 * eps);
                let analytic = slot[param_idx];

                assert!(
                    (numerical - analytic).abs() < 1e-3 + 0.05 * analytic.abs(),
                    "slot {} param {}: numerical {} vs analytic {}",
                    slot_idx,
                    param_idx,
                    numerical,
                    analytic
                );
            }
        }
    }

    #[test]
    fn test_backward_rejects_foreign_tape() {
        let net = smooth_network(2);
        let mut rng = StdRng::seed_from_u64(4);
        let other = Sequential::builder(4)
            .linear(3, &mut rng)
            .build()
            .unwrap();
        let tape = other.forward_train(&[0.0; 4], &mut rng).unwrap();

        assert!(net.backward(&tape, &[0.0; 3]).is_err());
    }

    #[test]
    fn test_serialized_network_validates() {
        let net = smooth_network(8);
        let json = serde_json::to_string(&net).unwrap();
        let restored: Sequential = serde_json::from_str(&json).unwrap();

        restored.validate().unwrap();
        let input = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(net.forward(&input).unwrap(), restored.forward(&input).unwrap());
    }
}

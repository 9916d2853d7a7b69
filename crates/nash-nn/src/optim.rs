use crate::error::{NnError, Result};
use crate::sequential::Gradients;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// Adam optimiser holding first/second moment buffers per parameter slot.
///
/// Moment buffers are allocated on the first step so one optimiser can be
/// created before the network it will drive.
#[derive(Debug, Clone)]
pub struct Adam {
    config: AdamConfig,
    step: u64,
    first_moment: Vec<Vec<f32>>,
    second_moment: Vec<Vec<f32>>,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            step: 0,
            first_moment: Vec::new(),
            second_moment: Vec::new(),
        }
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Apply one update. `params` and `grads` must share slot order and sizes.
    pub fn step(&mut self, mut params: Vec<&mut [f32]>, grads: &Gradients) -> Result<()> {
        let slots = grads.slots();
        if params.len() != slots.len() {
            return Err(NnError::LayoutMismatch(format!(
                "{} parameter slots but {} gradient slots",
                params.len(),
                slots.len()
            )));
        }
        for (idx, (param, grad)) in params.iter().zip(slots).enumerate() {
            if param.len() != grad.len() {
                return Err(NnError::LayoutMismatch(format!(
                    "slot {}: {} parameters but {} gradients",
                    idx,
                    param.len(),
                    grad.len()
                )));
            }
        }

        let layout_changed = self.first_moment.len() != slots.len()
            || self
                .first_moment
                .iter()
                .zip(slots)
                .any(|(m, g)| m.len() != g.len());
        if layout_changed {
            self.first_moment = slots.iter().map(|g| vec![0.0; g.len()]).collect();
            self.second_moment = slots.iter().map(|g| vec![0.0; g.len()]).collect();
            self.step = 0;
        }

        self.step += 1;
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config;
        let bias1 = 1.0 - beta1.powi(self.step.min(i32::MAX as u64) as i32);
        let bias2 = 1.0 - beta2.powi(self.step.min(i32::MAX as u64) as i32);

        for (slot, grad) in slots.iter().enumerate() {
            let m = &mut self.first_moment[slot];
            let v = &mut self.second_moment[slot];
            let param = &mut params[slot];

            for i in 0..grad.len() {
                let g = grad[i];
                m[i] = beta1 * m[i] + (1.0 - beta1) * g;
                v[i] = beta2 * v[i] + (1.0 - beta2) * g * g;
                let m_hat = m[i] / bias1;
                let v_hat = v[i] / bias2;
                param[i] -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::mse_loss;
    use crate::sequential::Sequential;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_adam_drives_loss_down() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut net = Sequential::builder(6)
            .linear(12, &mut rng)
            .relu()
            .linear(4, &mut rng)
            .sigmoid()
            .build()
            .unwrap();
        let mut adam = Adam::new(AdamConfig {
            learning_rate: 0.01,
            ..Default::default()
        });
        let input = [0.4, -0.3, 1.1, 0.0, -0.9, 0.25];
        let target = [0.9, 0.1, 0.6, 0.3];

        let (initial, _) = mse_loss(&net.forward(&input).unwrap(), &target).unwrap();
        for _ in 0..200 {
            let tape = net.forward_train(&input, &mut rng).unwrap();
            let (_, grad) = mse_loss(tape.output(), &target).unwrap();
            let grads = net.backward(&tape, &grad).unwrap();
            adam.step(net.parameters_mut(), &grads).unwrap();
        }
        let (trained, _) = mse_loss(&net.forward(&input).unwrap(), &target).unwrap();

        assert_eq!(adam.steps(), 200);
        assert!(trained < initial * 0.1, "loss {} -> {}", initial, trained);
    }

    #[test]
    fn test_adam_rejects_layout_mismatch() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut net = Sequential::builder(2)
            .linear(2, &mut rng)
            .build()
            .unwrap();
        let other = Sequential::builder(2)
            .linear(3, &mut rng)
            .build()
            .unwrap();
        let tape = other.forward_train(&[1.0, 1.0], &mut rng).unwrap();
        let grads = other.backward(&tape, &[1.0, 1.0, 1.0]).unwrap();

        let mut adam = Adam::new(AdamConfig::default());
        assert!(matches!(
            adam.step(net.parameters_mut(), &grads),
            Err(NnError::LayoutMismatch(_))
        ));
        assert_eq!(adam.steps(), 0);
    }
}

use crate::error::{ensure_len, NnError, Result};

/// Mean squared error and its gradient with respect to `prediction`.
pub fn mse_loss(prediction: &[f32], target: &[f32]) -> Result<(f32, Vec<f32>)> {
    ensure_len("mse target", prediction.len(), target.len())?;
    if prediction.is_empty() {
        return Err(NnError::InvalidConfiguration(
            "mse loss over an empty vector".to_string(),
        ));
    }

    let n = prediction.len() as f32;
    let loss = prediction
        .iter()
        .zip(target)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f32>()
        / n;
    let grad = prediction
        .iter()
        .zip(target)
        .map(|(p, t)| 2.0 * (p - t) / n)
        .collect();

    if !loss.is_finite() {
        return Err(NnError::NonFinite("mse loss"));
    }
    Ok((loss, grad))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mse_loss_value_and_gradient() {
        let (loss, grad) = mse_loss(&[1.0, 0.0], &[0.0, 0.0]).unwrap();
        assert!((loss - 0.5).abs() < 1e-7);
        assert_eq!(grad, vec![1.0, 0.0]);
    }

    #[test]
    fn test_mse_loss_rejects_mismatched_lengths() {
        assert!(mse_loss(&[1.0], &[1.0, 2.0]).is_err());
    }
}

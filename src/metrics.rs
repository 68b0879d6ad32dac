//! Batch metrics over (sample, prediction) pairs.
//!
//! These are policy functions: the engine receives them through a
//! [`SampleSpec`](crate::sample::SampleSpec) and never picks a metric itself.

use crate::sample::Sample;

/// Index of the largest component, first one on ties. 0 for an empty slice.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

pub(crate) fn mean(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len() as f32
}

/// Fraction of samples whose predicted class matches the true class, read
/// through one-hot indexing: each sample contributes its label's value at the
/// prediction's argmax. NaN on an empty batch.
pub fn classifier_accuracy<X>(samples: &[Sample<X, Vec<f32>>], logits: &[Vec<f32>]) -> f32 {
    let scores: Vec<f32> = samples
        .iter()
        .zip(logits)
        .map(|(sample, logit)| sample.label[argmax(logit)])
        .collect();
    mean(&scores)
}

/// Signifies that "accuracy" makes no sense for the model.
pub fn placeholder_accuracy<X, Y>(_samples: &[Sample<X, Y>], _logits: &[Y]) -> f32 {
    -1.0
}

/// Mean negative log-likelihood of the true class for one-hot labels.
/// Predictions are clamped away from zero so a confident miss stays finite.
pub fn negative_log_likelihood<X>(samples: &[Sample<X, Vec<f32>>], logits: &[Vec<f32>]) -> f32 {
    let losses: Vec<f32> = samples
        .iter()
        .zip(logits)
        .map(|(sample, logit)| -logit[argmax(&sample.label)].max(f32::MIN_POSITIVE).ln())
        .collect();
    mean(&losses)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(pairs: &[(Vec<f32>, Vec<f32>)]) -> (Vec<Sample<(), Vec<f32>>>, Vec<Vec<f32>>) {
        let samples = pairs
            .iter()
            .map(|(label, _)| Sample::new((), label.clone()))
            .collect();
        let logits = pairs.iter().map(|(_, logit)| logit.clone()).collect();
        (samples, logits)
    }

    #[test]
    fn argmax_picks_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn accuracy_is_one_when_every_argmax_matches() {
        let (samples, logits) = batch(&[
            (vec![0.0, 1.0], vec![0.2, 0.8]),
            (vec![1.0, 0.0], vec![0.9, 0.1]),
        ]);
        assert_eq!(classifier_accuracy(&samples, &logits), 1.0);
    }

    #[test]
    fn accuracy_is_zero_when_none_match() {
        let (samples, logits) = batch(&[
            (vec![0.0, 1.0], vec![0.8, 0.2]),
            (vec![1.0, 0.0], vec![0.1, 0.9]),
        ]);
        assert_eq!(classifier_accuracy(&samples, &logits), 0.0);
    }

    #[test]
    fn accuracy_on_empty_batch_is_nan() {
        let (samples, logits) = batch(&[]);
        assert!(classifier_accuracy(&samples, &logits).is_nan());
    }

    #[test]
    fn placeholder_accuracy_is_sentinel() {
        let samples: Vec<Sample<(), f32>> = vec![Sample::new((), 0.3)];
        assert_eq!(placeholder_accuracy(&samples, &[0.5]), -1.0);
    }

    #[test]
    fn nll_of_certain_prediction_is_zero() {
        let (samples, logits) = batch(&[(vec![0.0, 1.0], vec![0.0, 1.0])]);
        assert_eq!(negative_log_likelihood(&samples, &logits), 0.0);
    }

    #[test]
    fn nll_stays_finite_on_a_confident_miss() {
        let (samples, logits) = batch(&[(vec![1.0, 0.0], vec![0.0, 1.0])]);
        assert!(negative_log_likelihood(&samples, &logits).is_finite());
    }
}

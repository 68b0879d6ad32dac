//! Round-level façade for the presentation layer.

use std::sync::Arc;

use rand::Rng;

use crate::backend::{TensorBackend, TensorBuffer};
use crate::config::RoundConfig;
use crate::engine::TrainingEngine;
use crate::metrics::mean;

/// Drives the three round operations and reports progress as plain strings
/// through an injected notification callback.
///
/// Failures never cross this boundary as errors: the diagnostic is logged and
/// the callback receives a human-readable fallback message instead. Callers
/// that need the value get `None` on failure.
pub struct RoundController<X, Y, B, R> {
    engine: Arc<TrainingEngine<X, Y, B, R>>,
    config: RoundConfig,
    notify: Box<dyn Fn(&str) + Send + Sync>,
}

impl<X, Y, B: TensorBackend, R: Rng> RoundController<X, Y, B, R> {
    pub fn new(
        engine: Arc<TrainingEngine<X, Y, B, R>>,
        config: RoundConfig,
        notify: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        Self {
            engine,
            config,
            notify: Box::new(notify),
        }
    }

    /// Fetches the current model parameters for exchange with the aggregator.
    pub fn get_parameters(&self) -> Option<Vec<TensorBuffer>> {
        log::debug!("handling get-parameters");
        (self.notify)("Handling GetParameters");

        match self.engine.get_parameters() {
            Ok(parameters) => {
                (self.notify)(&format!("Fetched {} parameter tensors", parameters.len()));
                Some(parameters)
            }
            Err(e) => {
                log::error!("get-parameters failed: {e}");
                (self.notify)("Failed to fetch model parameters");
                None
            }
        }
    }

    /// Runs one local training round with the configured epoch count and
    /// batch size. Returns the per-epoch mean losses.
    pub fn fit(&self) -> Option<Vec<f32>> {
        log::debug!("handling fit");
        (self.notify)("Handling Fit");

        let per_epoch = |losses: &[f32]| {
            (self.notify)(&format!("Average loss: {}.", mean(losses)));
        };
        match self
            .engine
            .fit(self.config.epochs, self.config.batch_size, Some(&per_epoch))
        {
            Ok(epoch_losses) => Some(epoch_losses),
            Err(e) => {
                log::error!("fit failed: {e}");
                (self.notify)("Training round failed");
                None
            }
        }
    }

    /// Evaluates the model on the test sequence.
    pub fn evaluate(&self) -> Option<(f32, f32)> {
        log::debug!("handling evaluate");
        (self.notify)("Handling Evaluate");

        match self.engine.evaluate() {
            Ok((loss, accuracy)) => {
                (self.notify)(&format!("Test accuracy after this round = {accuracy}"));
                Some((loss, accuracy))
            }
            Err(e) => {
                log::error!("evaluate failed: {e}");
                (self.notify)("Evaluation round failed");
                None
            }
        }
    }
}

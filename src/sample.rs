//! In-memory sample storage and the per-model conversion policy.

use std::sync::RwLock;

use crate::backend::TensorBuffer;
use crate::error::{FlError, Result};

/// A data point and its label. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample<X, Y> {
    pub data_point: X,
    pub label: Y,
}

impl<X, Y> Sample<X, Y> {
    pub fn new(data_point: X, label: Y) -> Self {
        Self { data_point, label }
    }
}

/// The two sample sequences a client trains and evaluates against, each
/// behind its own reader/writer lock.
///
/// The scoped accessors are the only sanctioned way to touch either sequence;
/// they release the lock on every exit path. The training and test locks are
/// independent, so ingestion into one sequence never blocks on the other.
pub struct SampleStore<X, Y> {
    training: RwLock<Vec<Sample<X, Y>>>,
    test: RwLock<Vec<Sample<X, Y>>>,
}

impl<X, Y> Default for SampleStore<X, Y> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X, Y> SampleStore<X, Y> {
    pub fn new() -> Self {
        Self {
            training: RwLock::new(Vec::new()),
            test: RwLock::new(Vec::new()),
        }
    }

    /// Appends a sample to the training or test sequence.
    ///
    /// Blocks until the matching write lock is available; in particular, an
    /// in-flight training round holds the training write lock for its whole
    /// duration, so training-sequence ingestion waits the round out.
    pub fn add_sample(&self, data_point: X, label: Y, is_training: bool) -> Result<()> {
        if is_training {
            self.with_training_write(|samples| samples.push(Sample::new(data_point, label)))
        } else {
            self.with_test_write(|samples| samples.push(Sample::new(data_point, label)))
        }
    }

    /// Runs `op` against the training sequence under its read lock.
    pub fn with_training_read<T>(&self, op: impl FnOnce(&[Sample<X, Y>]) -> T) -> Result<T> {
        let guard = self
            .training
            .read()
            .map_err(|_| FlError::LockPoisoned { what: "training samples" })?;
        Ok(op(&guard))
    }

    /// Runs `op` against the training sequence under its write lock.
    pub fn with_training_write<T>(&self, op: impl FnOnce(&mut Vec<Sample<X, Y>>) -> T) -> Result<T> {
        let mut guard = self
            .training
            .write()
            .map_err(|_| FlError::LockPoisoned { what: "training samples" })?;
        Ok(op(&mut guard))
    }

    /// Runs `op` against the test sequence under its read lock.
    pub fn with_test_read<T>(&self, op: impl FnOnce(&[Sample<X, Y>]) -> T) -> Result<T> {
        let guard = self
            .test
            .read()
            .map_err(|_| FlError::LockPoisoned { what: "test samples" })?;
        Ok(op(&guard))
    }

    /// Runs `op` against the test sequence under its write lock.
    pub fn with_test_write<T>(&self, op: impl FnOnce(&mut Vec<Sample<X, Y>>) -> T) -> Result<T> {
        let mut guard = self
            .test
            .write()
            .map_err(|_| FlError::LockPoisoned { what: "test samples" })?;
        Ok(op(&mut guard))
    }

    pub fn training_len(&self) -> Result<usize> {
        self.with_training_read(|samples| samples.len())
    }

    pub fn test_len(&self) -> Result<usize> {
        self.with_test_read(|samples| samples.len())
    }
}

/// How the engine converts opaque payloads to tensor form and scores
/// predictions. One pack per model, injected at engine construction — the
/// engine never hard-codes a data-point or label shape.
pub struct SampleSpec<X, Y> {
    /// Encodes a batch of data points into the backend's `x` tensor.
    pub convert_x: Box<dyn Fn(&[&X]) -> TensorBuffer + Send + Sync>,
    /// Encodes a batch of labels into the backend's `y` tensor.
    pub convert_y: Box<dyn Fn(&[&Y]) -> TensorBuffer + Send + Sync>,
    /// Pre-sized placeholder for the predictions of `n` data points.
    pub empty_prediction: Box<dyn Fn(usize) -> TensorBuffer + Send + Sync>,
    /// Decodes the filled prediction tensor back into `n` labels.
    pub decode_prediction: Box<dyn Fn(&TensorBuffer, usize) -> Vec<Y> + Send + Sync>,
    /// Loss over a batch of (sample, prediction) pairs.
    pub loss: fn(&[Sample<X, Y>], &[Y]) -> f32,
    /// Accuracy over a batch of (sample, prediction) pairs.
    pub accuracy: fn(&[Sample<X, Y>], &[Y]) -> f32,
}

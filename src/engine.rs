//! The local training/evaluation engine and its locking discipline.
//!
//! Two independent lock domains keep concurrent callers safe: the per-sequence
//! reader/writer locks owned by the [`SampleStore`], and one mutex that
//! serializes every backend invocation. The backend lock is held only for the
//! duration of a single named computation and is never held while acquiring a
//! sequence lock, so the domains cannot deadlock against each other.

use std::ops::Range;
use std::sync::{Arc, Mutex};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::backend::{
    slot_key, Signature, TensorBackend, TensorBuffer, TensorMap, KEY_LOGITS, KEY_LOSS, KEY_X,
    KEY_Y,
};
use crate::error::{FlError, Result};
use crate::metrics::mean;
use crate::sample::{Sample, SampleSpec, SampleStore};

/// Progress notifications emitted by the engine through its injected hook.
/// Purely observational: no engine behavior depends on who listens.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    BatchTrained { epoch: usize, batch: usize, loss: f32 },
    EpochCompleted { epoch: usize, mean_loss: f32, batches: usize },
    EvaluationCompleted { loss: f32, accuracy: f32 },
    ParametersFetched { slots: usize },
}

type EventHook = Box<dyn Fn(&TrainingEvent) + Send + Sync>;

/// Runs local training and evaluation rounds against a pre-compiled model.
///
/// Owns the backend handle and (a share of) the sample store; the embedding
/// application keeps its own `Arc` to the store for ingestion and otherwise
/// only talks to the engine through the round-level operations.
pub struct TrainingEngine<X, Y, B, R> {
    store: Arc<SampleStore<X, Y>>,
    backend: Mutex<B>,
    layers_sizes: Vec<usize>,
    sample_spec: SampleSpec<X, Y>,
    rng: Mutex<R>,
    hook: EventHook,
}

impl<X, Y, B: TensorBackend, R: Rng> TrainingEngine<X, Y, B, R> {
    /// Creates an engine over `backend` with the declared parameter-slot
    /// byte sizes, a per-model conversion/metric pack and a shuffling `rng`.
    pub fn new(
        backend: B,
        layers_sizes: Vec<usize>,
        sample_spec: SampleSpec<X, Y>,
        store: Arc<SampleStore<X, Y>>,
        rng: R,
    ) -> Self {
        Self {
            store,
            backend: Mutex::new(backend),
            layers_sizes,
            sample_spec,
            rng: Mutex::new(rng),
            hook: Box::new(|_| {}),
        }
    }

    /// Installs an observability hook receiving every [`TrainingEvent`].
    pub fn with_event_hook(mut self, hook: impl Fn(&TrainingEvent) + Send + Sync + 'static) -> Self {
        self.hook = Box::new(hook);
        self
    }

    pub fn store(&self) -> &Arc<SampleStore<X, Y>> {
        &self.store
    }

    pub fn layers_sizes(&self) -> &[usize] {
        &self.layers_sizes
    }

    /// Obtains the current model parameters from the backend, one buffer per
    /// declared slot, in slot order, each rewound to its start.
    ///
    /// Touches no sample lock. A slot-count mismatch between the declaration
    /// and the backend's output is a broken exchange contract and fails the
    /// call outright.
    pub fn get_parameters(&self) -> Result<Vec<TensorBuffer>> {
        let inputs = TensorMap::new();
        // The backend fills caller-provided buffers only; every slot must
        // already exist at its exact size.
        let mut outputs = self.empty_parameter_map();
        self.run_backend(Signature::Parameters, &inputs, &mut outputs)?;

        let parameters = self.parameters_from_map(outputs)?;
        (self.hook)(&TrainingEvent::ParametersFetched {
            slots: parameters.len(),
        });
        Ok(parameters)
    }

    /// Trains for `epochs` full passes over the training sequence.
    ///
    /// Holds the training write lock for the entire call: each epoch shuffles
    /// the sequence in place, so the whole round is a write against the
    /// dataset and ingestion waits until it finishes. Returns one mean loss
    /// per epoch; `loss_callback` receives each epoch's raw per-batch losses.
    ///
    /// An empty training sequence is a sanctioned no-op: `Ok` with no epoch
    /// results and zero backend calls.
    pub fn fit(
        &self,
        epochs: usize,
        batch_size: usize,
        loss_callback: Option<&dyn Fn(&[f32])>,
    ) -> Result<Vec<f32>> {
        log::debug!("starting to train for {epochs} epochs with batch size {batch_size}");

        self.store.with_training_write(|samples| {
            if samples.is_empty() {
                log::debug!("no training samples available");
                return Ok(Vec::new());
            }

            let mut rng = self
                .rng
                .lock()
                .map_err(|_| FlError::LockPoisoned { what: "shuffle rng" })?;

            let mut epoch_means = Vec::with_capacity(epochs);
            for epoch in 1..=epochs {
                let losses = self.train_one_epoch(samples, batch_size, &mut *rng, epoch)?;
                let mean_loss = mean(&losses);
                log::debug!("epoch {epoch}: losses = {losses:?}");

                (self.hook)(&TrainingEvent::EpochCompleted {
                    epoch,
                    mean_loss,
                    batches: losses.len(),
                });
                if let Some(callback) = loss_callback {
                    callback(&losses);
                }
                epoch_means.push(mean_loss);
            }
            Ok(epoch_means)
        })?
    }

    /// Computes (loss, accuracy) over the whole test sequence with a single
    /// inference call; both metrics score the same prediction batch.
    ///
    /// Holds the test read lock for the duration. An empty test sequence
    /// yields `(NaN, NaN)` without touching the backend.
    pub fn evaluate(&self) -> Result<(f32, f32)> {
        let (loss, accuracy) = self.store.with_test_read(|samples| {
            if samples.is_empty() {
                return Ok((f32::NAN, f32::NAN));
            }
            let data_points: Vec<&X> = samples.iter().map(|s| &s.data_point).collect();
            let predictions =
                self.run_inference((self.sample_spec.convert_x)(&data_points), samples.len())?;

            let loss = (self.sample_spec.loss)(samples, &predictions);
            let accuracy = (self.sample_spec.accuracy)(samples, &predictions);
            Ok((loss, accuracy))
        })??;

        log::debug!("evaluate loss & accuracy: ({loss}, {accuracy})");
        (self.hook)(&TrainingEvent::EvaluationCompleted { loss, accuracy });
        Ok((loss, accuracy))
    }

    /// Runs the model forward over ad-hoc data points.
    pub fn infer(&self, data_points: &[&X]) -> Result<Vec<Y>> {
        self.run_inference(
            (self.sample_spec.convert_x)(data_points),
            data_points.len(),
        )
    }

    fn train_one_epoch(
        &self,
        samples: &mut [Sample<X, Y>],
        batch_size: usize,
        rng: &mut R,
        epoch: usize,
    ) -> Result<Vec<f32>> {
        samples.shuffle(rng);

        // A zero batch size would never advance the batch walk.
        let effective = batch_size.clamp(1, samples.len());
        let mut losses = Vec::new();
        for (batch, range) in batch_ranges(samples.len(), effective).enumerate() {
            let window = &samples[range];
            let data_points: Vec<&X> = window.iter().map(|s| &s.data_point).collect();
            let labels: Vec<&Y> = window.iter().map(|s| &s.label).collect();

            let loss = self.train_batch(
                (self.sample_spec.convert_x)(&data_points),
                (self.sample_spec.convert_y)(&labels),
            )?;
            (self.hook)(&TrainingEvent::BatchTrained { epoch, batch, loss });
            losses.push(loss);
        }
        Ok(losses)
    }

    fn train_batch(&self, x: TensorBuffer, y: TensorBuffer) -> Result<f32> {
        let mut inputs = TensorMap::new();
        inputs.insert(KEY_X.to_string(), x);
        inputs.insert(KEY_Y.to_string(), y);

        let mut outputs = TensorMap::new();
        outputs.insert(KEY_LOSS.to_string(), TensorBuffer::zeroed(4));

        self.run_backend(Signature::Train, &inputs, &mut outputs)?;

        let mut loss = outputs
            .remove(KEY_LOSS)
            .ok_or_else(|| FlError::MissingTensor {
                key: KEY_LOSS.to_string(),
            })?;
        loss.rewind();
        loss.read_f32().ok_or_else(|| FlError::ShortTensor {
            key: KEY_LOSS.to_string(),
            len: loss.len(),
        })
    }

    fn run_inference(&self, x: TensorBuffer, count: usize) -> Result<Vec<Y>> {
        let mut inputs = TensorMap::new();
        inputs.insert(KEY_X.to_string(), x);

        let mut outputs = TensorMap::new();
        outputs.insert(
            KEY_LOGITS.to_string(),
            (self.sample_spec.empty_prediction)(count),
        );

        self.run_backend(Signature::Infer, &inputs, &mut outputs)?;

        let logits = outputs
            .remove(KEY_LOGITS)
            .ok_or_else(|| FlError::MissingTensor {
                key: KEY_LOGITS.to_string(),
            })?;
        Ok((self.sample_spec.decode_prediction)(&logits, count))
    }

    /// The single place the backend mutex is taken: exactly one named
    /// computation runs at any instant, whatever operation triggered it.
    fn run_backend(
        &self,
        signature: Signature,
        inputs: &TensorMap,
        outputs: &mut TensorMap,
    ) -> Result<()> {
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| FlError::LockPoisoned { what: "tensor backend" })?;
        backend.run_signature(signature, inputs, outputs)
    }

    fn empty_parameter_map(&self) -> TensorMap {
        self.layers_sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| (slot_key(i), TensorBuffer::zeroed(size)))
            .collect()
    }

    fn parameters_from_map(&self, mut outputs: TensorMap) -> Result<Vec<TensorBuffer>> {
        if outputs.len() != self.layers_sizes.len() {
            return Err(FlError::ParameterCountMismatch {
                got: outputs.len(),
                expected: self.layers_sizes.len(),
            });
        }
        (0..self.layers_sizes.len())
            .map(|i| {
                let key = slot_key(i);
                let mut buffer = outputs
                    .remove(&key)
                    .ok_or(FlError::MissingTensor { key })?;
                buffer.rewind();
                Ok(buffer)
            })
            .collect()
    }
}

/// Walks `0..total` in consecutive windows of `batch_size`. When the next
/// window would overrun the end, the final window is instead the trailing
/// `batch_size` indices — it may overlap the previous one, so every batch has
/// exactly `batch_size` elements even when `total` is not evenly divisible.
/// The fixed-batch-shape backend contract depends on this.
pub fn batch_ranges(total: usize, batch_size: usize) -> BatchRanges {
    debug_assert!(batch_size >= 1 && batch_size <= total || total == 0);
    BatchRanges {
        total,
        batch_size,
        next: 0,
    }
}

/// Lazy forward-only batch walk; see [`batch_ranges`].
#[derive(Debug, Clone)]
pub struct BatchRanges {
    total: usize,
    batch_size: usize,
    next: usize,
}

impl Iterator for BatchRanges {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        if self.next >= self.total {
            return None;
        }
        let from = self.next;
        self.next += self.batch_size;

        Some(if self.next >= self.total {
            self.total - self.batch_size..self.total
        } else {
            from..from + self.batch_size
        })
    }
}

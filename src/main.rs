//! Demo client: trains a tiny softmax classifier on synthetic clusters.
//!
//! Stands in for the embedding application: it decodes (here: generates) the
//! dataset, provides a concrete backend, and watches the round through the
//! notification callback. Run with `RUST_LOG=debug` for engine diagnostics.

use std::env;
use std::process;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use fl_client::backend::{
    slot_key, Signature, TensorBackend, TensorBuffer, TensorMap, KEY_LOGITS, KEY_LOSS, KEY_X,
    KEY_Y,
};
use fl_client::config::RoundConfig;
use fl_client::engine::TrainingEngine;
use fl_client::error::FlError;
use fl_client::ingest::{ingest, IngestError};
use fl_client::metrics;
use fl_client::round::RoundController;
use fl_client::sample::{SampleSpec, SampleStore};

const FEATURES: usize = 4;
const CLASSES: usize = 3;
const LEARNING_RATE: f32 = 0.1;

/// Multinomial logistic regression trained by plain gradient steps. A
/// stand-in for the pre-compiled model a real deployment would ship.
struct DemoBackend {
    weights: Vec<f32>, // CLASSES x FEATURES, row-major
    biases: Vec<f32>,  // CLASSES
}

impl DemoBackend {
    fn new() -> Self {
        Self {
            weights: vec![0.0; CLASSES * FEATURES],
            biases: vec![0.0; CLASSES],
        }
    }

    fn forward_row(&self, x: &[f32]) -> Vec<f32> {
        let logits: Vec<f32> = (0..CLASSES)
            .map(|c| {
                self.biases[c]
                    + self.weights[c * FEATURES..(c + 1) * FEATURES]
                        .iter()
                        .zip(x)
                        .map(|(w, v)| w * v)
                        .sum::<f32>()
            })
            .collect();
        softmax(&logits)
    }

    /// One gradient step over the batch; returns the mean cross-entropy.
    fn sgd_step(&mut self, x: &[f32], y: &[f32]) -> f32 {
        let rows = x.len() / FEATURES;
        let scale = LEARNING_RATE / rows as f32;
        let mut loss = 0.0;

        for row in 0..rows {
            let xi = &x[row * FEATURES..(row + 1) * FEATURES];
            let yi = &y[row * CLASSES..(row + 1) * CLASSES];
            let probs = self.forward_row(xi);

            loss -= (0..CLASSES)
                .map(|c| yi[c] * probs[c].max(f32::MIN_POSITIVE).ln())
                .sum::<f32>();

            for c in 0..CLASSES {
                let delta = probs[c] - yi[c];
                self.biases[c] -= scale * delta;
                for f in 0..FEATURES {
                    self.weights[c * FEATURES + f] -= scale * delta * xi[f];
                }
            }
        }
        loss / rows as f32
    }

    fn input(inputs: &TensorMap, key: &str, signature: Signature) -> fl_client::Result<Vec<f32>> {
        inputs
            .get(key)
            .map(TensorBuffer::to_f32s)
            .ok_or_else(|| FlError::Backend {
                signature: signature.as_str(),
                msg: format!("missing input {key:?}"),
            })
    }

    fn fill(outputs: &mut TensorMap, key: &str, values: &[f32]) -> fl_client::Result<()> {
        let buffer = outputs.get_mut(key).ok_or_else(|| FlError::MissingTensor {
            key: key.to_string(),
        })?;
        buffer.rewind();
        for &value in values {
            buffer.write_f32(value)?;
        }
        Ok(())
    }
}

impl TensorBackend for DemoBackend {
    fn run_signature(
        &mut self,
        signature: Signature,
        inputs: &TensorMap,
        outputs: &mut TensorMap,
    ) -> fl_client::Result<()> {
        match signature {
            Signature::Parameters => {
                Self::fill(outputs, &slot_key(0), &self.weights)?;
                Self::fill(outputs, &slot_key(1), &self.biases)
            }
            Signature::Infer => {
                let x = Self::input(inputs, KEY_X, signature)?;
                let predictions: Vec<f32> = x
                    .chunks_exact(FEATURES)
                    .flat_map(|row| self.forward_row(row))
                    .collect();
                Self::fill(outputs, KEY_LOGITS, &predictions)
            }
            Signature::Train => {
                let x = Self::input(inputs, KEY_X, signature)?;
                let y = Self::input(inputs, KEY_Y, signature)?;
                let loss = self.sgd_step(&x, &y);
                Self::fill(outputs, KEY_LOSS, &[loss])
            }
        }
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

fn flatten(rows: &[&Vec<f32>]) -> Vec<f32> {
    rows.iter().flat_map(|row| row.iter().copied()).collect()
}

fn demo_sample_spec() -> SampleSpec<Vec<f32>, Vec<f32>> {
    SampleSpec {
        convert_x: Box::new(|rows| TensorBuffer::from_f32s(&flatten(rows))),
        convert_y: Box::new(|rows| TensorBuffer::from_f32s(&flatten(rows))),
        empty_prediction: Box::new(|n| TensorBuffer::zeroed(n * CLASSES * 4)),
        decode_prediction: Box::new(|buffer, n| {
            buffer
                .to_f32s()
                .chunks(CLASSES)
                .take(n)
                .map(<[f32]>::to_vec)
                .collect()
        }),
        loss: metrics::negative_log_likelihood,
        accuracy: metrics::classifier_accuracy,
    }
}

/// Three Gaussian-ish clusters, one per class, labeled one-hot.
fn synthetic_records(
    rng: &mut StdRng,
    count: usize,
    is_training: bool,
) -> Vec<Result<(Vec<f32>, Vec<f32>, bool), IngestError>> {
    (0..count)
        .map(|i| {
            let class = i % CLASSES;
            let data_point: Vec<f32> = (0..FEATURES)
                .map(|f| {
                    let center = if f == class { 1.0 } else { 0.0 };
                    center + rng.random_range(-0.3..0.3)
                })
                .collect();
            let mut label = vec![0.0; CLASSES];
            label[class] = 1.0;
            Ok((data_point, label, is_training))
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = match args.len() {
        1 => RoundConfig::default(),
        3 => RoundConfig {
            epochs: args[1].parse()?,
            batch_size: args[2].parse()?,
        },
        _ => {
            eprintln!("Usage: {} [<epochs> <batch_size>]", args[0]);
            process::exit(1);
        }
    };

    let store = Arc::new(SampleStore::new());
    let mut data_rng = StdRng::seed_from_u64(42);
    ingest(&store, synthetic_records(&mut data_rng, 150, true))?;
    ingest(&store, synthetic_records(&mut data_rng, 30, false))?;

    let layers_sizes = vec![CLASSES * FEATURES * 4, CLASSES * 4];
    let engine = Arc::new(
        TrainingEngine::new(
            DemoBackend::new(),
            layers_sizes,
            demo_sample_spec(),
            Arc::clone(&store),
            StdRng::seed_from_u64(7),
        )
        .with_event_hook(|event| log::debug!("{event:?}")),
    );

    let controller = RoundController::new(engine, config, |msg| println!("{msg}"));
    controller.get_parameters();
    controller.fit();
    controller.evaluate();

    Ok(())
}

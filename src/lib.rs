//! Client-side engine for on-device federated learning rounds.
//!
//! A client holds a local dataset partition in a [`sample::SampleStore`],
//! runs training and evaluation passes against a pre-compiled model through
//! an opaque [`backend::TensorBackend`], and marshals model parameters to and
//! from the fixed-size byte buffers exchanged with a remote coordinator.
//!
//! The [`engine::TrainingEngine`] guarantees that concurrent sample
//! ingestion, parameter retrieval, training and evaluation never race on the
//! in-memory dataset or on the model weights: each sample sequence sits
//! behind its own reader/writer lock, and a single mutex serializes every
//! backend invocation. [`round::RoundController`] wraps the engine for a
//! presentation layer that only wants progress strings.

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod round;
pub mod sample;

pub use error::{FlError, Result};

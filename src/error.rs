use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used across the whole client.
pub type Result<T> = std::result::Result<T, FlError>;

/// All errors that can occur in the federated-learning client.
#[derive(Debug)]
pub enum FlError {
    /// The backend emitted a different number of parameter slots than the
    /// client declared at construction. Fatal: the parameter exchange
    /// contract with the aggregator is broken.
    ParameterCountMismatch { got: usize, expected: usize },
    /// An expected tensor key was absent from a backend output map.
    MissingTensor { key: String },
    /// A tensor buffer held fewer bytes than the value being read from it.
    ShortTensor { key: String, len: usize },
    /// A write ran past the end of a fixed-size tensor buffer.
    BufferOverrun { len: usize },
    /// A lock was poisoned by a panicking holder.
    LockPoisoned { what: &'static str },
    /// The tensor backend failed while running a named computation.
    Backend {
        signature: &'static str,
        msg: String,
    },
    /// A sample could not be ingested and the failure is not recoverable.
    Ingest { msg: String },
    /// Invalid round configuration — caught before any backend call.
    InvalidConfig(String),
}

impl Display for FlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlError::ParameterCountMismatch { got, expected } => write!(
                f,
                "backend emitted {got} parameter slots, expected {expected}"
            ),
            FlError::MissingTensor { key } => {
                write!(f, "tensor {key:?} is missing from the output map")
            }
            FlError::ShortTensor { key, len } => {
                write!(f, "tensor {key:?} is too short ({len} bytes)")
            }
            FlError::BufferOverrun { len } => {
                write!(f, "write past the end of a {len}-byte tensor buffer")
            }
            FlError::LockPoisoned { what } => {
                write!(f, "the {what} lock was poisoned")
            }
            FlError::Backend { signature, msg } => {
                write!(f, "backend failed running {signature:?}: {msg}")
            }
            FlError::Ingest { msg } => write!(f, "ingestion failed: {msg}"),
            FlError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl Error for FlError {}

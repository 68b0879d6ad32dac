//! Sample ingestion from an already-decoded record stream.
//!
//! Decoding raw assets into payloads is the embedding application's job; this
//! module only applies the per-record failure policy while routing records
//! into the store.

use std::fmt::{self, Display};

use crate::error::{FlError, Result};
use crate::sample::SampleStore;

/// Failure while producing a single record.
#[derive(Debug)]
pub enum IngestError {
    /// The record was interrupted mid-load. Losing one sample is sanctioned;
    /// the record is skipped and loading continues.
    Interrupted,
    /// The record could not be decoded. The whole load is aborted.
    Decode(String),
}

impl Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Interrupted => write!(f, "record load was interrupted"),
            IngestError::Decode(msg) => write!(f, "record decode failed: {msg}"),
        }
    }
}

/// How a completed load was routed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub training: usize,
    pub test: usize,
    pub skipped: usize,
}

/// Feeds a record stream into the store. Each record carries its payload,
/// label and a training/test routing flag.
pub fn ingest<X, Y, I>(store: &SampleStore<X, Y>, records: I) -> Result<IngestReport>
where
    I: IntoIterator<Item = std::result::Result<(X, Y, bool), IngestError>>,
{
    let mut report = IngestReport::default();
    for (index, record) in records.into_iter().enumerate() {
        match record {
            Ok((data_point, label, is_training)) => {
                store.add_sample(data_point, label, is_training)?;
                if is_training {
                    report.training += 1;
                } else {
                    report.test += 1;
                }
            }
            Err(IngestError::Interrupted) => {
                log::warn!("skipping interrupted record {index}");
                report.skipped += 1;
            }
            Err(e @ IngestError::Decode(_)) => {
                return Err(FlError::Ingest {
                    msg: format!("record {index}: {e}"),
                });
            }
        }
    }
    log::info!(
        "ingested {} training and {} test samples ({} skipped)",
        report.training,
        report.test,
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_and_counts_records() {
        let store = SampleStore::new();
        let report = ingest(
            &store,
            vec![Ok((1, 1, true)), Ok((2, 2, true)), Ok((3, 3, false))],
        )
        .unwrap();

        assert_eq!(
            report,
            IngestReport {
                training: 2,
                test: 1,
                skipped: 0
            }
        );
        assert_eq!(store.training_len().unwrap(), 2);
        assert_eq!(store.test_len().unwrap(), 1);
    }

    #[test]
    fn interrupted_records_are_skipped_not_fatal() {
        let store = SampleStore::new();
        let report = ingest(
            &store,
            vec![
                Ok((1, 1, true)),
                Err(IngestError::Interrupted),
                Ok((2, 2, true)),
            ],
        )
        .unwrap();

        assert_eq!(report.training, 2);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn decode_failure_aborts_the_load() {
        let store: SampleStore<u8, u8> = SampleStore::new();
        let result = ingest(
            &store,
            vec![
                Ok((1, 1, true)),
                Err(IngestError::Decode("truncated image".into())),
                Ok((2, 2, true)),
            ],
        );

        assert!(matches!(result, Err(FlError::Ingest { .. })));
        // Records before the failure stay ingested.
        assert_eq!(store.training_len().unwrap(), 1);
    }
}

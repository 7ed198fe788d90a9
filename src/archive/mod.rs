//! The archive boundary.
//!
//! An archive is a finite, time-ordered recording of metric samples. This
//! module defines the interface the report pipeline consumes and the typed
//! sample values that flow out of it. Samples are typed once, here, when the
//! source reads them; downstream code matches on the variant rather than
//! re-inspecting values.

use serde::{Deserialize, Serialize};

mod jsonl;

pub use jsonl::JsonlArchive;

/// How a metric's values are to be interpreted over time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Semantics {
    /// Monotonically increasing value. Converted to a per-interval rate
    /// before charting.
    Counter,
    /// Point-in-time reading, charted as-is.
    Instant,
    /// Discrete value that holds until the next sample, charted as-is.
    Discrete,
}

/// The value domain of a metric. Decided by the archive, fixed for the
/// lifetime of the metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Numeric,
    Text,
}

/// Static metadata for one metric. Owned by the archive, read-only to the
/// pipeline.
#[derive(Clone, Debug)]
pub struct MetricInfo {
    pub kind: ValueKind,
    pub semantics: Semantics,
    pub unit: String,
}

/// One sampled value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Float(f64),
    Text(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Float(_) => ValueKind::Numeric,
            Self::Text(_) => ValueKind::Text,
        }
    }
}

/// Identifies which sub-instance of a metric a sample belongs to, e.g. a
/// specific disk or network interface. `Singleton` is the no-instance case
/// and orders before any named instance.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Instance {
    #[default]
    Singleton,
    Named(String),
}

impl Instance {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Singleton => None,
            Self::Named(name) => Some(name),
        }
    }
}

/// One sample as reported by the archive for one record.
#[derive(Clone, Debug)]
pub struct Sample {
    /// UNIX nanoseconds.
    pub timestamp: u64,
    pub metric: String,
    pub instance: Instance,
    pub value: Value,
}

/// An element of the archive's forward sample stream.
///
/// A conversion failure is sample-local: the metric name is surfaced so the
/// caller can account for it, and the rest of the metric's series is
/// unaffected.
#[derive(Clone, Debug)]
pub enum StreamItem {
    Sample(Sample),
    /// The named metric had a sample that failed value conversion.
    Skipped(String),
}

/// A finite recording of metric samples.
pub trait ArchiveSource {
    /// Every metric name known to the archive.
    fn metrics(&self) -> Vec<String>;

    /// Static metadata for one metric.
    fn metric_info(&self, metric: &str) -> Option<&MetricInfo>;

    /// The host that recorded the archive.
    fn hostname(&self) -> &str;

    /// Start and end of the recording, UNIX nanoseconds.
    fn interval(&self) -> (u64, u64);

    /// The forward-ordered sample stream.
    fn samples(&self) -> Box<dyn Iterator<Item = StreamItem> + '_>;
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to read archive: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed archive line {line}: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },
    #[error("archive has no header record")]
    MissingHeader,
}

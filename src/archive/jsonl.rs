//! JSONL archive recordings.
//!
//! One JSON object per line. The first `header` line names the recording
//! host. `meta` lines declare a metric's kind, semantics, and unit. `sample`
//! lines carry the readings:
//!
//! ```text
//! {"type":"header","hostname":"db01","source":"archreport","version":"1"}
//! {"type":"meta","metric":"network.in.bytes","kind":"numeric","semantics":"counter","unit":"bytes"}
//! {"type":"sample","time":1000000000,"metric":"network.in.bytes","instance":"eth0","value":1024}
//! ```
//!
//! Metrics sampled without a `meta` line are registered on first sight with
//! `instant` semantics and the kind of their first sample. A sample whose
//! value does not convert to the metric's kind becomes a `Skipped` stream
//! item; the rest of the metric's series is unaffected.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;

use super::{
    ArchiveError, ArchiveSource, Instance, MetricInfo, Sample, Semantics, StreamItem, Value,
    ValueKind,
};

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Record {
    Header(Header),
    Meta(Meta),
    Sample(RawSample),
}

#[derive(Deserialize)]
struct Header {
    hostname: String,
    #[serde(default)]
    #[allow(dead_code)]
    source: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    version: Option<String>,
}

#[derive(Deserialize)]
struct Meta {
    metric: String,
    kind: ValueKind,
    semantics: Semantics,
    #[serde(default)]
    unit: String,
}

#[derive(Deserialize)]
struct RawSample {
    /// UNIX nanoseconds.
    time: u64,
    metric: String,
    #[serde(default)]
    instance: Option<String>,
    value: serde_json::Value,
}

#[derive(Debug)]
pub struct JsonlArchive {
    hostname: String,
    info: BTreeMap<String, MetricInfo>,
    items: Vec<StreamItem>,
    interval: (u64, u64),
}

impl JsonlArchive {
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut hostname = None;
        let mut info: BTreeMap<String, MetricInfo> = BTreeMap::new();
        let mut items = Vec::new();
        let mut interval: Option<(u64, u64)> = None;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let record: Record =
                serde_json::from_str(&line).map_err(|source| ArchiveError::Malformed {
                    line: index + 1,
                    source,
                })?;

            match record {
                Record::Header(header) => {
                    hostname.get_or_insert(header.hostname);
                }
                Record::Meta(meta) => {
                    info.insert(
                        meta.metric,
                        MetricInfo {
                            kind: meta.kind,
                            semantics: meta.semantics,
                            unit: meta.unit,
                        },
                    );
                }
                Record::Sample(raw) => {
                    let kind = info
                        .get(&raw.metric)
                        .map(|i| i.kind)
                        .or_else(|| infer_kind(&raw.value));

                    let value = kind.and_then(|kind| convert(&raw.value, kind));

                    let Some(value) = value else {
                        items.push(StreamItem::Skipped(raw.metric));
                        continue;
                    };

                    // Register inferred metadata for metrics without a meta
                    // line so the pipeline always has a kind and semantics.
                    info.entry(raw.metric.clone()).or_insert_with(|| MetricInfo {
                        kind: value.kind(),
                        semantics: Semantics::Instant,
                        unit: String::new(),
                    });

                    interval = Some(match interval {
                        Some((start, end)) => (start.min(raw.time), end.max(raw.time)),
                        None => (raw.time, raw.time),
                    });

                    items.push(StreamItem::Sample(Sample {
                        timestamp: raw.time,
                        metric: raw.metric,
                        instance: raw
                            .instance
                            .map(Instance::Named)
                            .unwrap_or(Instance::Singleton),
                        value,
                    }));
                }
            }
        }

        let hostname = hostname.ok_or(ArchiveError::MissingHeader)?;

        Ok(Self {
            hostname,
            info,
            items,
            interval: interval.unwrap_or((0, 0)),
        })
    }
}

fn infer_kind(value: &serde_json::Value) -> Option<ValueKind> {
    match value {
        serde_json::Value::Number(_) => Some(ValueKind::Numeric),
        serde_json::Value::String(_) => Some(ValueKind::Text),
        _ => None,
    }
}

fn convert(value: &serde_json::Value, kind: ValueKind) -> Option<Value> {
    match (kind, value) {
        (ValueKind::Numeric, serde_json::Value::Number(n)) => n.as_f64().map(Value::Float),
        (ValueKind::Text, serde_json::Value::String(s)) => Some(Value::Text(s.clone())),
        _ => None,
    }
}

impl ArchiveSource for JsonlArchive {
    fn metrics(&self) -> Vec<String> {
        self.info.keys().cloned().collect()
    }

    fn metric_info(&self, metric: &str) -> Option<&MetricInfo> {
        self.info.get(metric)
    }

    fn hostname(&self) -> &str {
        &self.hostname
    }

    fn interval(&self) -> (u64, u64) {
        self.interval
    }

    fn samples(&self) -> Box<dyn Iterator<Item = StreamItem> + '_> {
        Box::new(self.items.iter().cloned())
    }
}

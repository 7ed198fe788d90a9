//! In-memory metric table: every (metric, instance) time series assembled
//! from one full archive scan. Built once per report run, then shared
//! read-only with the render workers.

use std::collections::{BTreeMap, BTreeSet};

use crate::archive::{ArchiveSource, Instance, Semantics, StreamItem, ValueKind};

mod series;

pub use series::{Series, Values};

/// A metric's category is the first segment of its dotted name.
pub fn category(metric: &str) -> &str {
    metric.split('.').next().unwrap_or(metric)
}

/// Optional time window applied to samples before aggregation. A pre-filter:
/// the rate converter only ever sees the filtered series, so window gaps
/// become wider intervals rather than errors.
#[derive(Clone, Copy, Debug, Default)]
pub struct Window {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl Window {
    pub fn contains(&self, timestamp: u64) -> bool {
        if let Some(start) = self.start {
            if timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if timestamp > end {
                return false;
            }
        }
        true
    }
}

/// Metric name -> instance -> series, plus the bookkeeping the report needs:
/// which series were rate converted, which metrics had samples skipped on
/// conversion failure, and how many all-zero series were pruned.
#[derive(Default)]
pub struct MetricTable {
    inner: BTreeMap<String, BTreeMap<Instance, Series>>,
    rate_converted: BTreeMap<String, BTreeSet<Instance>>,
    skipped: BTreeSet<String>,
    pruned: usize,
}

impl MetricTable {
    /// Scan the archive's sample stream into a table.
    ///
    /// The progress callback fires once per distinct record timestamp, with
    /// true when the record landed inside the window.
    pub fn assemble(
        source: &dyn ArchiveSource,
        window: Window,
        mut progress: impl FnMut(bool),
    ) -> Self {
        let mut table = Self::default();
        let mut last_marked = None;

        for item in source.samples() {
            match item {
                StreamItem::Skipped(metric) => {
                    table.skipped.insert(metric);
                }
                StreamItem::Sample(sample) => {
                    let in_window = window.contains(sample.timestamp);

                    if last_marked != Some(sample.timestamp) {
                        progress(in_window);
                        last_marked = Some(sample.timestamp);
                    }

                    if !in_window {
                        continue;
                    }

                    let series = table
                        .inner
                        .entry(sample.metric.clone())
                        .or_default()
                        .entry(sample.instance)
                        .or_insert_with(|| Series::for_value(&sample.value));

                    // A sample whose variant disagrees with the series is a
                    // conversion failure local to that sample.
                    if !series.push(sample.timestamp, sample.value) {
                        table.skipped.insert(sample.metric);
                    }
                }
            }
        }

        table
    }

    /// Drop every series whose values are uniformly zero, then every metric
    /// left with no instances. Returns the number of series dropped.
    pub fn prune_zero_series(&mut self) -> usize {
        let mut dropped = 0;

        for instances in self.inner.values_mut() {
            let before = instances.len();
            instances.retain(|_, series| !series.all_zero());
            dropped += before - instances.len();
        }

        self.inner.retain(|_, instances| !instances.is_empty());
        self.pruned += dropped;
        dropped
    }

    /// Convert every counter-semantics series to per-interval rates, each
    /// instance independently, recording which series were converted.
    pub fn rate_convert(&mut self, source: &dyn ArchiveSource) {
        for (metric, instances) in self.inner.iter_mut() {
            let semantics = source.metric_info(metric).map(|info| info.semantics);
            if semantics != Some(Semantics::Counter) {
                continue;
            }

            for (instance, series) in instances.iter_mut() {
                if series.rate_convert() {
                    self.rate_converted
                        .entry(metric.clone())
                        .or_default()
                        .insert(instance.clone());
                }
            }
        }
    }

    pub fn metrics(&self) -> impl Iterator<Item = &String> {
        self.inner.keys()
    }

    pub fn get(&self, metric: &str) -> Option<&BTreeMap<Instance, Series>> {
        self.inner.get(metric)
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.inner.contains_key(metric)
    }

    /// A metric is string-typed when any of its instance series holds text.
    pub fn is_text_metric(&self, metric: &str) -> bool {
        self.inner
            .get(metric)
            .map(|instances| instances.values().any(|series| series.is_text()))
            .unwrap_or(false)
    }

    pub fn was_rate_converted(&self, metric: &str) -> bool {
        self.rate_converted.contains_key(metric)
    }

    /// Metrics that had at least one sample dropped on conversion failure.
    pub fn skipped(&self) -> &BTreeSet<String> {
        &self.skipped
    }

    pub fn pruned(&self) -> usize {
        self.pruned
    }

    pub fn series_count(&self) -> usize {
        self.inner.values().map(|instances| instances.len()).sum()
    }

    #[cfg(test)]
    pub(crate) fn insert_series(&mut self, metric: &str, instance: Instance, series: Series) {
        self.inner
            .entry(metric.to_string())
            .or_default()
            .insert(instance, series);
    }
}

/// The table half of the typed split: kind as declared by the archive. Used
/// by the selector to route metrics the table never saw (no samples) without
/// guessing.
pub fn declared_text(source: &dyn ArchiveSource, metric: &str) -> bool {
    source
        .metric_info(metric)
        .map(|info| info.kind == ValueKind::Text)
        .unwrap_or(false)
}

//! Report run state and lifecycle.
//!
//! One `Report` value owns one run end to end: metric selection, table
//! assembly, pruning, rate conversion, task building, dispatch, and
//! composition. The scratch directory holding intermediate chart images is
//! owned here too, so images are removed on every exit path when the value
//! drops. There is no state outside this value.

use std::io::Write as _;
use std::path::PathBuf;

use ringlog::*;
use tempfile::TempDir;

use crate::archive::ArchiveSource;
use crate::compose::{Compositor, Document, StringRow};
use crate::config::Config;
use crate::help::HelpLookup;
use crate::render::{self, ChartRenderer, GraphTask};
use crate::tsdb::{category, declared_text, MetricTable};

pub mod select;

use select::CustomGraph;

const ELLIPSIZE_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid configuration: {0}")]
    Select(#[from] select::SelectError),
    #[error("failed to create scratch directory: {0}")]
    Scratch(std::io::Error),
    #[error(transparent)]
    Render(#[from] render::RenderError),
    #[error(transparent)]
    Compose(#[from] crate::compose::ComposeError),
}

/// End-of-run accounting. Every dropped metric, series, or graph shows up
/// here; nothing is lost silently.
#[derive(Debug)]
pub struct Summary {
    pub graphs_drawn: usize,
    pub graphs_skipped: usize,
    pub metrics_skipped: usize,
    pub series_pruned: usize,
    pub output: PathBuf,
}

pub struct Report<'a> {
    config: &'a Config,
    source: &'a dyn ArchiveSource,
    help: &'a dyn HelpLookup,
    scratch: TempDir,
    metrics: Vec<String>,
    custom: Vec<CustomGraph>,
}

impl<'a> Report<'a> {
    /// Resolve the working metric set and custom graphs. All configuration
    /// errors surface here, before any rendering work begins.
    pub fn new(
        config: &'a Config,
        source: &'a dyn ArchiveSource,
        help: &'a dyn HelpLookup,
    ) -> Result<Self, ReportError> {
        let known = source.metrics();
        let metrics = select::select_metrics(&known, &config.include, &config.exclude)?;
        let custom = select::parse_custom_graphs(&config.graphs, &metrics)?;
        let scratch = TempDir::with_prefix("archreport").map_err(ReportError::Scratch)?;

        debug!(
            "selected {} of {} metrics, {} custom graphs",
            metrics.len(),
            known.len(),
            custom.len()
        );

        Ok(Self {
            config,
            source,
            help,
            scratch,
            metrics,
            custom,
        })
    }

    /// Run the whole pipeline and write the document.
    pub fn run(
        &self,
        renderer: &dyn ChartRenderer,
        compositor: &dyn Compositor,
    ) -> Result<Summary, ReportError> {
        print!("Parsing archive: ");
        flush_stdout();
        let mut table = MetricTable::assemble(self.source, self.config.window(), progress_mark);
        println!();

        let pruned = table.prune_zero_series();
        if pruned > 0 {
            debug!("pruned {pruned} all-zero series");
        }

        if self.config.raw {
            debug!("rate conversion disabled by --raw");
        } else {
            table.rate_convert(self.source);
        }

        info!(
            "assembled {} series across {} metrics",
            table.series_count(),
            table.metrics().count()
        );
        if !table.skipped().is_empty() {
            warn!(
                "skipped samples for {} metrics on conversion failure",
                table.skipped().len()
            );
        }

        let (tasks, string_metrics) = self.build_tasks(&table);

        print!("Creating graphs: ");
        flush_stdout();
        let rendered = render::dispatch(
            tasks,
            &table,
            renderer,
            self.config.workers,
            &progress_mark,
        )?;
        println!();

        let strings = string_table(&table, &string_metrics);

        let document = Document {
            hostname: self.source.hostname(),
            interval: self.source.interval(),
            graphs: &rendered.drawn,
            strings: &strings,
            skipped_metrics: table.skipped(),
            skipped_graphs: rendered.skipped.len(),
            pruned_series: pruned,
        };
        compositor.compose(&document, &self.config.output)?;

        Ok(Summary {
            graphs_drawn: rendered.drawn.len(),
            graphs_skipped: rendered.skipped.len(),
            metrics_skipped: table.skipped().len(),
            series_pruned: pruned,
            output: self.config.output.clone(),
        })
    }

    /// Build the full graph-task list: custom graphs first, then one task
    /// per selected chartable metric. Duplicates from overlapping include
    /// patterns are resolved here. String-typed metrics are routed to the
    /// table path and returned separately.
    fn build_tasks(&self, table: &MetricTable) -> (Vec<GraphTask>, Vec<String>) {
        let mut tasks = Vec::new();
        let mut string_metrics = Vec::new();
        let mut seen = std::collections::BTreeSet::new();

        for graph in &self.custom {
            tasks.push(GraphTask::new(
                &graph.label,
                self.scratch.path(),
                graph.metrics.clone(),
                None,
                group_category(&graph.metrics),
            ));
        }

        for metric in &self.metrics {
            if !seen.insert(metric.clone()) {
                continue;
            }

            if table.is_text_metric(metric) || declared_text(self.source, metric) {
                string_metrics.push(metric.clone());
                continue;
            }

            tasks.push(GraphTask::new(
                metric,
                self.scratch.path(),
                vec![metric.clone()],
                Some(self.describe(metric, table)),
                category(metric),
            ));
        }

        (tasks, string_metrics)
    }

    /// Descriptive text shown under a chart: unit, optional help text, and
    /// the rate-conversion annotation.
    fn describe(&self, metric: &str, table: &MetricTable) -> String {
        let unit = self
            .source
            .metric_info(metric)
            .map(|info| info.unit.as_str())
            .unwrap_or("");

        let mut text = match self.help.help_text(metric) {
            Some(help) => format!("{metric}: {help} ({unit})"),
            None => unit.to_string(),
        };

        if table.was_rate_converted(metric) {
            if !text.is_empty() {
                text.push_str(" - ");
            }
            text.push_str("rate converted");
        }

        text
    }
}

/// A custom graph's category: the shared category of its metrics, or
/// `custom` when they span several.
fn group_category(metrics: &[String]) -> String {
    let mut categories = metrics.iter().map(|m| category(m));
    match categories.next() {
        Some(first) if categories.all(|c| c == first) => first.to_string(),
        Some(_) => "custom".to_string(),
        None => "custom".to_string(),
    }
}

/// The string-metrics table records only values that changed over time.
fn string_table(table: &MetricTable, metrics: &[String]) -> Vec<StringRow> {
    let mut rows = Vec::new();

    for metric in metrics {
        let Some(instances) = table.get(metric) else {
            continue;
        };

        let mut last_value: Option<&str> = None;
        for series in instances.values() {
            let Some(values) = series.text_values() else {
                continue;
            };
            for (ts, value) in series.timestamps().iter().zip(values) {
                if last_value != Some(value.as_str()) {
                    rows.push(StringRow {
                        metric: metric.clone(),
                        timestamp: *ts,
                        value: ellipsize(value, ELLIPSIZE_LIMIT),
                    });
                    last_value = Some(value.as_str());
                }
            }
        }
    }

    rows
}

/// Truncate on a word boundary, marking the cut with an ellipsis.
fn ellipsize(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let head: String = text.chars().take(limit).collect();
    let cut = head.rfind(' ').unwrap_or(head.len());
    format!("{}...", &head[..cut])
}

/// One marker character per unit of work, written immediately so the
/// operator sees liveness on large archives. Safe to call from render
/// workers concurrently; each marker is a single atomic write.
fn progress_mark(drawn: bool) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(if drawn { b"." } else { b"-" });
    let _ = out.flush();
}

fn flush_stdout() {
    let _ = std::io::stdout().flush();
}

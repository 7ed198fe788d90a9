//! End-to-end runs over synthetic archives: assembly through rendering and
//! composition, exercising the same path the binary takes.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::PathBuf;

use archreport::archive::{
    ArchiveSource, Instance, JsonlArchive, MetricInfo, Sample, Semantics, StreamItem, Value,
    ValueKind,
};
use archreport::compose::HtmlCompositor;
use archreport::config::Config;
use archreport::help::HelpDb;
use archreport::render::{dispatch, GraphTask, SvgRenderer};
use archreport::report::Report;
use archreport::tsdb::{MetricTable, Window};

const NANOS_PER_SEC: u64 = 1_000_000_000;

struct MemArchive {
    info: BTreeMap<String, MetricInfo>,
    items: Vec<StreamItem>,
}

impl MemArchive {
    fn new() -> Self {
        Self {
            info: BTreeMap::new(),
            items: Vec::new(),
        }
    }

    fn meta(mut self, metric: &str, kind: ValueKind, semantics: Semantics, unit: &str) -> Self {
        self.info.insert(
            metric.to_string(),
            MetricInfo {
                kind,
                semantics,
                unit: unit.to_string(),
            },
        );
        self
    }

    fn numeric(mut self, time_s: u64, metric: &str, instance: Option<&str>, value: f64) -> Self {
        self.items.push(StreamItem::Sample(Sample {
            timestamp: time_s * NANOS_PER_SEC,
            metric: metric.to_string(),
            instance: instance
                .map(|name| Instance::Named(name.to_string()))
                .unwrap_or(Instance::Singleton),
            value: Value::Float(value),
        }));
        self
    }

    fn text(mut self, time_s: u64, metric: &str, value: &str) -> Self {
        self.items.push(StreamItem::Sample(Sample {
            timestamp: time_s * NANOS_PER_SEC,
            metric: metric.to_string(),
            instance: Instance::Singleton,
            value: Value::Text(value.to_string()),
        }));
        self
    }
}

impl ArchiveSource for MemArchive {
    fn metrics(&self) -> Vec<String> {
        self.info.keys().cloned().collect()
    }

    fn metric_info(&self, metric: &str) -> Option<&MetricInfo> {
        self.info.get(metric)
    }

    fn hostname(&self) -> &str {
        "testhost"
    }

    fn interval(&self) -> (u64, u64) {
        (NANOS_PER_SEC, 120 * NANOS_PER_SEC)
    }

    fn samples(&self) -> Box<dyn Iterator<Item = StreamItem> + '_> {
        Box::new(self.items.iter().cloned())
    }
}

/// An archive with a counter (two interfaces), a gauge, an all-zero
/// counter, a single-point metric, and a string metric that changes once.
fn fixture() -> MemArchive {
    let mut archive = MemArchive::new()
        .meta(
            "network.in.bytes",
            ValueKind::Numeric,
            Semantics::Counter,
            "bytes",
        )
        .meta("mem.used", ValueKind::Numeric, Semantics::Instant, "kb")
        .meta(
            "disk.idle.ops",
            ValueKind::Numeric,
            Semantics::Counter,
            "count",
        )
        .meta(
            "disk.blocksize",
            ValueKind::Numeric,
            Semantics::Discrete,
            "bytes",
        )
        .meta("kernel.release", ValueKind::Text, Semantics::Discrete, "");

    for step in 0..4u64 {
        let t = (step + 1) * 30;
        archive = archive
            .numeric(t, "network.in.bytes", Some("eth0"), 1000.0 * step as f64)
            .numeric(t, "network.in.bytes", Some("eth1"), 500.0 * step as f64)
            .numeric(t, "mem.used", None, 4096.0 + step as f64)
            .numeric(t, "disk.idle.ops", None, 0.0);
    }

    archive
        .numeric(30, "disk.blocksize", None, 512.0)
        .text(30, "kernel.release", "6.1.0")
        .text(60, "kernel.release", "6.1.0")
        .text(90, "kernel.release", "6.2.0")
}

fn config(output: PathBuf) -> Config {
    Config {
        archive: PathBuf::new(),
        output,
        include: Vec::new(),
        exclude: Vec::new(),
        graphs: Vec::new(),
        start: None,
        end: None,
        raw: false,
        workers: Some(2),
        help_db: None,
    }
}

#[test]
fn full_run_produces_a_complete_document() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.html");

    let archive = fixture();
    let help = HelpDb::empty();
    let config = config(output.clone());

    let report = Report::new(&config, &archive, &help).unwrap();
    let summary = report.run(&SvgRenderer, &HtmlCompositor).unwrap();

    // network.in.bytes, mem.used drawn; disk.blocksize single-point and
    // disk.idle.ops fully pruned leave nothing to draw.
    assert_eq!(summary.graphs_drawn, 2);
    assert_eq!(summary.graphs_skipped, 2);
    assert_eq!(summary.series_pruned, 1);
    assert_eq!(summary.metrics_skipped, 0);

    let html = std::fs::read_to_string(&output).unwrap();
    assert!(html.contains("testhost"));
    assert!(html.contains("network.in.bytes"));
    // The counter chart is annotated.
    assert!(html.contains("bytes - rate converted"));
    // The gauge is not.
    assert!(!html.contains("kb - rate converted"));
    // String metric lands in the table with only its change points.
    assert!(html.contains("kernel.release"));
    assert!(html.contains("6.1.0"));
    assert!(html.contains("6.2.0"));
    assert_eq!(html.matches("6.1.0").count(), 1);
    // Skipped charts never make it into the document.
    assert!(!html.contains("disk.blocksize"));
}

#[test]
fn custom_graph_combines_metrics_and_leads_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.html");

    let archive = fixture();
    let help = HelpDb::empty();
    let mut config = config(output.clone());
    // network.out is not in the archive and is dropped from the group.
    config.graphs = vec!["throughput:network.in.bytes,network.out".to_string()];

    let report = Report::new(&config, &archive, &help).unwrap();
    let summary = report.run(&SvgRenderer, &HtmlCompositor).unwrap();
    assert_eq!(summary.graphs_drawn, 3);

    let html = std::fs::read_to_string(&output).unwrap();
    let custom = html.find("<h3 id=\"throughput\"").unwrap();
    let per_metric = html.find("<h3 id=\"network-in-bytes\"").unwrap();
    assert!(custom < per_metric);
}

#[test]
fn include_filter_narrows_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.html");

    let archive = fixture();
    let help = HelpDb::empty();
    let mut config = config(output.clone());
    config.include = vec![r"network\..*".to_string()];

    let report = Report::new(&config, &archive, &help).unwrap();
    let summary = report.run(&SvgRenderer, &HtmlCompositor).unwrap();

    assert_eq!(summary.graphs_drawn, 1);
    let html = std::fs::read_to_string(&output).unwrap();
    assert!(html.contains("network.in.bytes"));
    assert!(!html.contains("mem.used"));
}

#[test]
fn raw_flag_disables_rate_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.html");

    let archive = fixture();
    let help = HelpDb::empty();
    let mut config = config(output.clone());
    config.raw = true;

    let report = Report::new(&config, &archive, &help).unwrap();
    report.run(&SvgRenderer, &HtmlCompositor).unwrap();

    let html = std::fs::read_to_string(&output).unwrap();
    assert!(!html.contains("rate converted"));
}

#[test]
fn pool_size_does_not_change_rendered_output() {
    let archive = fixture();
    let mut table = MetricTable::assemble(&archive, Window::default(), |_| {});
    table.prune_zero_series();
    table.rate_convert(&archive);

    let mut outputs = Vec::new();
    for workers in [1, 4] {
        let dir = tempfile::tempdir().unwrap();
        let tasks = vec![
            GraphTask::new(
                "network.in.bytes",
                dir.path(),
                vec!["network.in.bytes".to_string()],
                None,
                "network",
            ),
            GraphTask::new(
                "mem.used",
                dir.path(),
                vec!["mem.used".to_string()],
                None,
                "mem",
            ),
        ];

        let report = dispatch(tasks, &table, &SvgRenderer, Some(workers), &|_| {}).unwrap();
        assert_eq!(report.drawn.len(), 2);

        let mut bytes = Vec::new();
        for task in &report.drawn {
            bytes.push(std::fs::read(&task.image).unwrap());
        }
        outputs.push(bytes);
    }

    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn jsonl_archive_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("recording.jsonl");
    let output = dir.path().join("report.html");

    let mut file = std::fs::File::create(&archive_path).unwrap();
    writeln!(file, r#"{{"type":"header","hostname":"jsonl-host"}}"#).unwrap();
    writeln!(
        file,
        r#"{{"type":"meta","metric":"net.bytes","kind":"numeric","semantics":"counter","unit":"bytes"}}"#
    )
    .unwrap();
    for step in 0..4u64 {
        writeln!(
            file,
            r#"{{"type":"sample","time":{},"metric":"net.bytes","instance":"eth0","value":{}}}"#,
            (step + 1) * 30 * NANOS_PER_SEC,
            1000 * step
        )
        .unwrap();
    }
    // A sample that cannot convert lands the metric on the skip list.
    writeln!(
        file,
        r#"{{"type":"sample","time":{},"metric":"net.bytes","instance":"eth0","value":null}}"#,
        150 * NANOS_PER_SEC
    )
    .unwrap();
    drop(file);

    let archive = JsonlArchive::load(&archive_path).unwrap();
    let help = HelpDb::empty();
    let mut config = config(output.clone());
    config.archive = archive_path;

    let report = Report::new(&config, &archive, &help).unwrap();
    let summary = report.run(&SvgRenderer, &HtmlCompositor).unwrap();

    assert_eq!(summary.graphs_drawn, 1);
    assert_eq!(summary.metrics_skipped, 1);

    let html = std::fs::read_to_string(&output).unwrap();
    assert!(html.contains("jsonl-host"));
    assert!(html.contains("net.bytes"));
    assert!(html.contains("conversion failure"));
}

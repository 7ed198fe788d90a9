//! Document composition.
//!
//! The compositor receives the completed graph tasks in final document
//! order, the string-metric change table, and the run's accounting, and
//! lays out the deliverable. The shipped implementation writes one
//! self-contained HTML file with every chart inlined, so the scratch
//! directory can be discarded as soon as composition finishes.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::clock;
use crate::render::GraphTask;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the string-metrics table: a value observed to change.
#[derive(Clone, Debug, PartialEq)]
pub struct StringRow {
    pub metric: String,
    pub timestamp: u64,
    pub value: String,
}

/// Everything the compositor needs to lay out the final document.
pub struct Document<'a> {
    pub hostname: &'a str,
    pub interval: (u64, u64),
    pub graphs: &'a [GraphTask],
    pub strings: &'a [StringRow],
    pub skipped_metrics: &'a BTreeSet<String>,
    pub skipped_graphs: usize,
    pub pruned_series: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("failed to write document: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing chart image for `{label}`: {source}")]
    MissingImage {
        label: String,
        source: std::io::Error,
    },
}

pub trait Compositor {
    fn compose(&self, doc: &Document, path: &Path) -> Result<(), ComposeError>;
}

pub struct HtmlCompositor;

impl Compositor for HtmlCompositor {
    fn compose(&self, doc: &Document, path: &Path) -> Result<(), ComposeError> {
        let mut out = String::new();

        let _ = writeln!(out, "<!DOCTYPE html>");
        let _ = writeln!(out, r#"<html lang="en"><head><meta charset="utf-8">"#);
        let _ = writeln!(out, "<title>{}</title>", escape(doc.hostname));
        let _ = writeln!(out, "<style>{STYLE}</style>");
        let _ = writeln!(out, "</head><body>");

        let _ = writeln!(out, "<h1>{}</h1>", escape(doc.hostname));
        let _ = writeln!(
            out,
            r#"<p class="interval">{} &ndash; {}</p>"#,
            clock::format(doc.interval.0, TIMESTAMP_FORMAT),
            clock::format(doc.interval.1, TIMESTAMP_FORMAT)
        );

        toc(&mut out, doc);
        string_table(&mut out, doc);
        charts(&mut out, doc)?;
        summary(&mut out, doc);

        let _ = writeln!(out, "</body></html>");

        std::fs::write(path, out)?;
        Ok(())
    }
}

fn toc(out: &mut String, doc: &Document) {
    let _ = writeln!(out, "<h2>Table of contents</h2>");
    let _ = writeln!(out, r#"<ul class="toc">"#);

    let mut last_category = "";
    for graph in doc.graphs {
        if graph.category != last_category {
            if !last_category.is_empty() {
                let _ = writeln!(out, "</ul></li>");
            }
            let _ = writeln!(
                out,
                r##"<li><a href="#cat-{0}">{0}</a><ul>"##,
                escape(&graph.category)
            );
            last_category = &graph.category;
        }
        let _ = writeln!(
            out,
            r##"<li><a href="#{}">{}</a></li>"##,
            anchor(&graph.label),
            escape(&graph.label)
        );
    }
    if !last_category.is_empty() {
        let _ = writeln!(out, "</ul></li>");
    }
    if !doc.strings.is_empty() {
        let _ = writeln!(out, r##"<li><a href="#string-metrics">String metrics</a></li>"##);
    }

    let _ = writeln!(out, "</ul>");
}

fn string_table(out: &mut String, doc: &Document) {
    if doc.strings.is_empty() {
        return;
    }

    let _ = writeln!(out, r#"<h2 id="string-metrics">String metrics</h2>"#);
    let _ = writeln!(out, "<table>");
    let _ = writeln!(
        out,
        "<tr><th>Metric</th><th>Timestamp</th><th>Value</th></tr>"
    );
    for row in doc.strings {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&row.metric),
            clock::format(row.timestamp, TIMESTAMP_FORMAT),
            escape(&row.value)
        );
    }
    let _ = writeln!(out, "</table>");
}

fn charts(out: &mut String, doc: &Document) -> Result<(), ComposeError> {
    let mut last_category = "";
    for graph in doc.graphs {
        if graph.category != last_category {
            let _ = writeln!(
                out,
                r#"<h2 id="cat-{0}">{0}</h2>"#,
                escape(&graph.category)
            );
            last_category = &graph.category;
        }

        let _ = writeln!(
            out,
            r#"<h3 id="{}">{}</h3>"#,
            anchor(&graph.label),
            escape(&graph.label)
        );

        let image =
            std::fs::read_to_string(&graph.image).map_err(|source| ComposeError::MissingImage {
                label: graph.label.clone(),
                source,
            })?;
        let _ = writeln!(out, r#"<div class="chart">{image}</div>"#);

        if let Some(text) = &graph.text {
            let _ = writeln!(out, r#"<p class="description">{}</p>"#, escape(text));
        }
    }
    Ok(())
}

fn summary(out: &mut String, doc: &Document) {
    let _ = writeln!(out, "<h2>Run summary</h2>");
    let _ = writeln!(out, "<ul>");
    let _ = writeln!(out, "<li>{} graphs</li>", doc.graphs.len());
    let _ = writeln!(
        out,
        "<li>{} graphs skipped (nothing to draw)</li>",
        doc.skipped_graphs
    );
    let _ = writeln!(
        out,
        "<li>{} series pruned (all values zero)</li>",
        doc.pruned_series
    );
    if !doc.skipped_metrics.is_empty() {
        let skipped: Vec<&str> = doc.skipped_metrics.iter().map(|s| s.as_str()).collect();
        let _ = writeln!(
            out,
            "<li>{} metrics with samples skipped on conversion failure: {}</li>",
            skipped.len(),
            escape(&skipped.join(", "))
        );
    }
    let _ = writeln!(out, "</ul>");
}

fn anchor(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em auto;max-width:1100px;color:#222}\
h1{text-align:center}p.interval{text-align:center;color:#555}\
table{border-collapse:collapse}td,th{border:1px solid #999;padding:4px 8px;text-align:left}\
.chart svg{max-width:100%;height:auto}.description{color:#444}\
ul.toc{line-height:1.5}";

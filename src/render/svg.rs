//! SVG line charts.
//!
//! One chart per graph task: a time axis, a value axis, and one polyline
//! per (metric, instance) series. Series with fewer than two points are not
//! chartable and are skipped; a task whose every series is skipped draws
//! nothing, which the dispatcher folds into the skipped count.

use std::fmt::Write as _;
use std::path::Path;

use crate::archive::Instance;
use crate::clock;
use crate::tsdb::MetricTable;

use super::{ChartRenderer, GraphTask, RenderError};

// Canvas geometry, in px.
const WIDTH: f64 = 1050.0;
const HEIGHT: f64 = 650.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 70.0;

const X_TICKS: usize = 6;
const Y_TICKS: usize = 5;
const TICK_FORMAT: &str = "%m-%d %H:%M";

const PALETTE: &[&str] = &[
    "#e41a1c", "#377eb8", "#4daf4a", "#984ea3", "#ff7f00", "#a65628", "#f781bf", "#999999",
    "#66c2a5", "#fc8d62",
];

pub struct SvgRenderer;

struct PlottableSeries<'a> {
    label: String,
    timestamps: &'a [u64],
    values: &'a [f64],
}

impl ChartRenderer for SvgRenderer {
    fn render(&self, task: &GraphTask, table: &MetricTable) -> Result<bool, RenderError> {
        let series = collect_series(task, table);
        if series.is_empty() {
            return Ok(false);
        }

        for s in &series {
            if s.values.iter().any(|v| !v.is_finite()) {
                return Err(RenderError::Degenerate {
                    label: task.label.clone(),
                    detail: format!("series `{}` contains a non-finite value", s.label),
                });
            }
        }

        let svg = draw(&task.label, &series);
        std::fs::write(&task.image, svg)?;
        Ok(true)
    }
}

/// Gather every chartable series for the task, labeled the way the original
/// report labels them: in a multi-metric group series are labeled by metric
/// (and instance when named); a single-metric chart uses the task label for
/// its singleton series and the bare instance name otherwise.
fn collect_series<'a>(task: &'a GraphTask, table: &'a MetricTable) -> Vec<PlottableSeries<'a>> {
    let mut out = Vec::new();
    let multi = task.metrics.len() > 1;

    for metric in &task.metrics {
        let Some(instances) = table.get(metric) else {
            continue;
        };

        for (instance, series) in instances {
            // A single point cannot be charted.
            if series.len() <= 1 {
                continue;
            }
            let Some(values) = series.numeric_values() else {
                continue;
            };

            let label = match (multi, instance) {
                (true, Instance::Singleton) => metric.clone(),
                (true, Instance::Named(name)) => format!("{metric} {name}"),
                (false, Instance::Singleton) => task.label.clone(),
                (false, Instance::Named(name)) => name.clone(),
            };

            out.push(PlottableSeries {
                label,
                timestamps: series.timestamps(),
                values,
            });
        }
    }

    out
}

fn draw(title: &str, series: &[PlottableSeries]) -> String {
    let t_min = series.iter().flat_map(|s| s.timestamps.first()).min().copied().unwrap_or(0);
    let t_max = series.iter().flat_map(|s| s.timestamps.last()).max().copied().unwrap_or(0);
    let v_min = series
        .iter()
        .flat_map(|s| s.values.iter())
        .fold(f64::INFINITY, |a, v| a.min(*v));
    let v_max = series
        .iter()
        .flat_map(|s| s.values.iter())
        .fold(f64::NEG_INFINITY, |a, v| a.max(*v));

    // Degenerate ranges still deserve a readable chart.
    let t_span = (t_max.saturating_sub(t_min)).max(1) as f64;
    let v_span = if v_max > v_min { v_max - v_min } else { 1.0 };
    let v_base = if v_max > v_min { v_min } else { v_min - 0.5 };

    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let x = |ts: u64| MARGIN_LEFT + (ts.saturating_sub(t_min)) as f64 / t_span * plot_w;
    let y = |v: f64| MARGIN_TOP + plot_h - (v - v_base) / v_span * plot_h;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">"#
    );
    let _ = writeln!(
        svg,
        r##"<rect width="{WIDTH}" height="{HEIGHT}" fill="#ffffff"/>"##
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="28" font-size="16" text-anchor="middle">{} time series</text>"#,
        WIDTH / 2.0,
        escape(title)
    );

    // Gridlines and value-axis labels.
    for i in 0..=Y_TICKS {
        let v = v_base + v_span * i as f64 / Y_TICKS as f64;
        let ty = y(v);
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{ty:.1}" x2="{:.1}" y2="{ty:.1}" stroke="#dddddd"/>"##,
            MARGIN_LEFT + plot_w
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-size="11" text-anchor="end">{}</text>"#,
            MARGIN_LEFT - 6.0,
            ty + 4.0,
            format_value(v)
        );
    }

    // Time-axis ticks.
    for i in 0..=X_TICKS {
        let ts = t_min + ((t_max.saturating_sub(t_min)) / X_TICKS as u64) * i as u64;
        let tx = x(ts);
        let _ = writeln!(
            svg,
            r##"<line x1="{tx:.1}" y1="{:.1}" x2="{tx:.1}" y2="{:.1}" stroke="#aaaaaa"/>"##,
            MARGIN_TOP + plot_h,
            MARGIN_TOP + plot_h + 5.0
        );
        let _ = writeln!(
            svg,
            r#"<text x="{tx:.1}" y="{:.1}" font-size="11" text-anchor="middle">{}</text>"#,
            MARGIN_TOP + plot_h + 20.0,
            clock::format(ts, TICK_FORMAT)
        );
    }

    // Axes.
    let _ = writeln!(
        svg,
        r##"<rect x="{MARGIN_LEFT}" y="{MARGIN_TOP}" width="{plot_w:.1}" height="{plot_h:.1}" fill="none" stroke="#333333"/>"##
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" font-size="12" text-anchor="middle">Time</text>"#,
        MARGIN_LEFT + plot_w / 2.0,
        HEIGHT - 12.0
    );

    for (i, s) in series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let mut points = String::new();
        for (ts, v) in s.timestamps.iter().zip(s.values) {
            let _ = write!(points, "{:.1},{:.1} ", x(*ts), y(*v));
        }
        let _ = writeln!(
            svg,
            r#"<polyline points="{}" fill="none" stroke="{color}" stroke-width="1.5"/>"#,
            points.trim_end()
        );
    }

    // Legend, only when there is more than one series.
    if series.len() > 1 {
        let lx = MARGIN_LEFT + 10.0;
        for (i, s) in series.iter().enumerate() {
            let color = PALETTE[i % PALETTE.len()];
            let ly = MARGIN_TOP + 12.0 + i as f64 * 16.0;
            let _ = writeln!(
                svg,
                r#"<rect x="{lx}" y="{:.1}" width="10" height="10" fill="{color}"/>"#,
                ly - 9.0
            );
            let _ = writeln!(
                svg,
                r#"<text x="{:.1}" y="{ly:.1}" font-size="11">{}</text>"#,
                lx + 14.0,
                escape(&s.label)
            );
        }
    }

    svg.push_str("</svg>\n");
    svg
}

fn format_value(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    if v.abs() >= 1_000_000.0 || v.abs() < 0.01 {
        return format!("{v:.2e}");
    }
    let s = format!("{v:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

//! Chart rendering fan-out.
//!
//! Every graph is an independent unit of work: it reads only its own
//! metrics' series from the frozen metric table and writes only its own
//! output image. The dispatcher spreads tasks across a rayon pool and folds
//! the outcomes into a drawn/skipped partition, restored to task-definition
//! order. A task that draws nothing is an expected per-task failure; a
//! renderer fault aborts the run, since it means a data-shape invariant was
//! violated upstream.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::tsdb::MetricTable;

mod svg;

pub use svg::SvgRenderer;

/// One unit of rendering work: a labeled group of metrics bound to a
/// deterministic output image.
#[derive(Clone, Debug)]
pub struct GraphTask {
    pub label: String,
    pub image: PathBuf,
    pub metrics: Vec<String>,
    pub text: Option<String>,
    pub category: String,
}

impl GraphTask {
    /// Image file name derived from the constituent metric names, so
    /// repeated requests for the same group reuse the same identity.
    pub fn image_name(metrics: &[String]) -> String {
        let mut name = metrics.join("_").replace(['/', '\\'], "_");
        name.push_str(".svg");
        name
    }

    pub fn new(
        label: impl Into<String>,
        dir: &Path,
        metrics: Vec<String>,
        text: Option<String>,
        category: impl Into<String>,
    ) -> Self {
        let image = dir.join(Self::image_name(&metrics));
        Self {
            label: label.into(),
            image,
            metrics,
            text,
            category: category.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to write chart image: {0}")]
    Io(#[from] std::io::Error),
    #[error("chart `{label}` has malformed series data: {detail}")]
    Degenerate { label: String, detail: String },
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// The plotting collaborator. Returns whether anything was drawn; drawing
/// nothing is not an error.
pub trait ChartRenderer: Sync {
    fn render(&self, task: &GraphTask, table: &MetricTable) -> Result<bool, RenderError>;
}

/// Tasks partitioned by outcome, both in task-definition order.
pub struct RenderReport {
    pub drawn: Vec<GraphTask>,
    pub skipped: Vec<GraphTask>,
}

/// Render every task across a worker pool sized to the available cores, or
/// to `workers` when given.
///
/// The progress callback fires once per completed task, in completion
/// order, with true when the task drew something. The first renderer fault
/// stops dispatch and is returned.
pub fn dispatch(
    tasks: Vec<GraphTask>,
    table: &MetricTable,
    renderer: &dyn ChartRenderer,
    workers: Option<usize>,
    progress: &(dyn Fn(bool) + Sync),
) -> Result<RenderReport, RenderError> {
    let run = || -> Result<Vec<bool>, RenderError> {
        tasks
            .par_iter()
            .map(|task| {
                let drew = renderer.render(task, table)?;
                progress(drew);
                Ok(drew)
            })
            .collect()
    };

    let outcomes = match workers {
        Some(workers) => rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?
            .install(run),
        None => run(),
    }?;

    let mut drawn = Vec::new();
    let mut skipped = Vec::new();
    for (task, drew) in tasks.into_iter().zip(outcomes) {
        if drew {
            drawn.push(task);
        } else {
            skipped.push(task);
        }
    }

    Ok(RenderReport { drawn, skipped })
}

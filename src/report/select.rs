//! Resolves the working metric set from include/exclude filters and parses
//! custom composite-graph definitions. Everything here is a configuration
//! concern: any failure is fatal and reported before rendering begins.

use regex::Regex;

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("failed to parse filter pattern `{pattern}`: {source}")]
    BadPattern {
        pattern: String,
        source: regex::Error,
    },
    #[error("failed to parse custom graph `{0}`: expected `label:metric1,metric2,...`")]
    BadGraphSpec(String),
    #[error("cannot use label `{0}`: it is an existing metric")]
    LabelCollision(String),
    #[error("custom graph `{0}` names no metric in the selected set")]
    EmptyGraph(String),
}

/// A user-defined composite graph: several metrics under one label.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomGraph {
    pub label: String,
    pub metrics: Vec<String>,
}

/// Filter patterns match the whole dotted metric name.
fn compile(pattern: &str) -> Result<Regex, SelectError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| SelectError::BadPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Resolve the ordered working metric list.
///
/// With no filters this is every known metric, sorted. Include-only keeps
/// matches in filter-argument order; exclude-only keeps the sorted
/// complement. With both, include wins over exclude: excluded metrics that
/// also match an include pattern are appended back. Duplicates are tolerated
/// here and resolved later by grouping.
pub fn select_metrics(
    known: &[String],
    include: &[String],
    exclude: &[String],
) -> Result<Vec<String>, SelectError> {
    let mut all: Vec<String> = known.to_vec();
    all.sort();

    if include.is_empty() && exclude.is_empty() {
        return Ok(all);
    }

    if !include.is_empty() && exclude.is_empty() {
        let mut selected = Vec::new();
        for pattern in include {
            let re = compile(pattern)?;
            selected.extend(all.iter().filter(|m| re.is_match(m)).cloned());
        }
        return Ok(selected);
    }

    let mut excluded = Vec::new();
    for pattern in exclude {
        let re = compile(pattern)?;
        excluded.extend(all.iter().filter(|m| re.is_match(m)).cloned());
    }

    let mut selected: Vec<String> = all
        .iter()
        .filter(|m| !excluded.contains(*m))
        .cloned()
        .collect();

    for pattern in include {
        let re = compile(pattern)?;
        selected.extend(all.iter().filter(|m| re.is_match(m)).cloned());
    }

    Ok(selected)
}

/// Parse `label:metric1,metric2,...` specifications against the selected
/// metric set.
///
/// A label that collides with a metric name is fatal, as is a graph none of
/// whose metrics are selected. Listed metrics missing from the selected set
/// are dropped from that one group only.
pub fn parse_custom_graphs(
    specs: &[String],
    selected: &[String],
) -> Result<Vec<CustomGraph>, SelectError> {
    let mut graphs = Vec::new();

    for spec in specs {
        let Some((label, metrics)) = spec.split_once(':') else {
            return Err(SelectError::BadGraphSpec(spec.clone()));
        };

        if label.is_empty() || metrics.is_empty() {
            return Err(SelectError::BadGraphSpec(spec.clone()));
        }

        if selected.iter().any(|m| m == label) {
            return Err(SelectError::LabelCollision(label.to_string()));
        }

        let metrics: Vec<String> = metrics
            .split(',')
            .filter(|m| selected.iter().any(|s| s == m))
            .map(|m| m.to_string())
            .collect();

        if metrics.is_empty() {
            return Err(SelectError::EmptyGraph(label.to_string()));
        }

        graphs.push(CustomGraph {
            label: label.to_string(),
            metrics,
        });
    }

    Ok(graphs)
}

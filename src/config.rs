//! Run configuration, built from the command line. Everything that can be
//! wrong here is a configuration error: fatal, reported before any work
//! starts.

use std::path::PathBuf;

use clap::ArgMatches;

use crate::clock;
use crate::tsdb::Window;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse time `{0}`: expected RFC 3339 or `YYYY-MM-DD HH:MM:SS`")]
    BadTime(String),
    #[error("worker count must be greater than zero")]
    BadWorkers,
    #[error("time window is empty: start is after end")]
    EmptyWindow,
}

#[derive(Debug)]
pub struct Config {
    pub archive: PathBuf,
    pub output: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub graphs: Vec<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub raw: bool,
    pub workers: Option<usize>,
    pub help_db: Option<PathBuf>,
}

fn strings(args: &ArgMatches, id: &str) -> Vec<String> {
    args.get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn time(args: &ArgMatches, id: &str) -> Result<Option<u64>, ConfigError> {
    match args.get_one::<String>(id) {
        Some(s) => clock::parse(s)
            .map(Some)
            .ok_or_else(|| ConfigError::BadTime(s.clone())),
        None => Ok(None),
    }
}

impl Config {
    pub fn from_args(args: &ArgMatches) -> Result<Self, ConfigError> {
        let start = time(args, "start")?;
        let end = time(args, "end")?;

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ConfigError::EmptyWindow);
            }
        }

        let workers = args.get_one::<usize>("workers").copied();
        if workers == Some(0) {
            return Err(ConfigError::BadWorkers);
        }

        Ok(Self {
            archive: args
                .get_one::<PathBuf>("ARCHIVE")
                .cloned()
                .unwrap_or_default(),
            output: args
                .get_one::<PathBuf>("output")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("report.html")),
            include: strings(args, "include"),
            exclude: strings(args, "exclude"),
            graphs: strings(args, "graph"),
            start,
            end,
            raw: args.get_flag("raw"),
            workers,
            help_db: args.get_one::<PathBuf>("help-db").cloned(),
        })
    }

    pub fn window(&self) -> Window {
        Window {
            start: self.start,
            end: self.end,
        }
    }
}

//! Turns a recorded performance-metrics archive into a structured report:
//! one time-series chart per metric or per user-defined metric group,
//! grouped by category, plus a table for string-valued metrics whose value
//! changed over time.
//!
//! The pipeline: archive source -> sample aggregation -> zero-series
//! pruning -> counter rate conversion -> selection and grouping -> parallel
//! chart rendering -> document composition. The metric table is assembled
//! once, synchronously, then frozen for the whole rendering phase; render
//! tasks share nothing else.

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

pub mod archive;
pub mod clock;
pub mod compose;
pub mod config;
pub mod help;
pub mod render;
pub mod report;
pub mod tsdb;

fn filter_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("include")
            .short('i')
            .long("include")
            .action(ArgAction::Append)
            .value_name("REGEX")
            .help("Only report metrics matching this pattern (repeatable)"),
    )
    .arg(
        Arg::new("exclude")
            .short('x')
            .long("exclude")
            .action(ArgAction::Append)
            .value_name("REGEX")
            .help("Drop metrics matching this pattern (repeatable; include wins)"),
    )
}

pub fn cli() -> Command {
    Command::new("archreport")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generate a chart report from a recorded performance-metrics archive")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(filter_args(
            Command::new("report")
                .about("Render every selected metric and build the report document")
                .arg(
                    Arg::new("ARCHIVE")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Archive recording to report on"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_parser(value_parser!(PathBuf))
                        .default_value("report.html")
                        .help("Output document path"),
                )
                .arg(
                    Arg::new("graph")
                        .short('g')
                        .long("graph")
                        .action(ArgAction::Append)
                        .value_name("LABEL:METRIC,METRIC,...")
                        .help("Add a custom graph combining several metrics (repeatable)"),
                )
                .arg(
                    Arg::new("start")
                        .long("start")
                        .value_name("TIME")
                        .help("Ignore samples before this time"),
                )
                .arg(
                    Arg::new("end")
                        .long("end")
                        .value_name("TIME")
                        .help("Ignore samples after this time"),
                )
                .arg(
                    Arg::new("raw")
                        .long("raw")
                        .action(ArgAction::SetTrue)
                        .help("Disable counter rate conversion"),
                )
                .arg(
                    Arg::new("workers")
                        .long("workers")
                        .value_parser(value_parser!(usize))
                        .value_name("N")
                        .help("Worker pool size (default: one per core)"),
                )
                .arg(
                    Arg::new("help-db")
                        .long("help-db")
                        .value_parser(value_parser!(PathBuf))
                        .value_name("PATH")
                        .help("JSON database of per-metric help texts"),
                ),
        ))
        .subcommand(filter_args(
            Command::new("info")
                .about("Print the archive interval and the selected metrics by category")
                .arg(
                    Arg::new("ARCHIVE")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Archive recording to inspect"),
                ),
        ))
}

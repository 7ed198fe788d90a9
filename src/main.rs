use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::ArgMatches;
use ringlog::*;

use archreport::archive::{ArchiveSource, JsonlArchive};
use archreport::clock;
use archreport::compose::HtmlCompositor;
use archreport::config::Config;
use archreport::help::HelpDb;
use archreport::render::SvgRenderer;
use archreport::report::{select, Report};
use archreport::{cli, tsdb};

fn main() {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") {
        Level::Debug
    } else {
        Level::Info
    };

    let log = LogBuilder::new()
        .output(Box::new(Stderr::new()))
        .build()
        .expect("failed to initialize log");

    let mut log = MultiLogBuilder::new()
        .level_filter(level.to_level_filter())
        .default(log)
        .build()
        .start();

    std::thread::spawn(move || loop {
        std::thread::sleep(Duration::from_millis(50));
        let _ = log.flush();
    });

    let result = match matches.subcommand() {
        Some(("report", args)) => run_report(args),
        Some(("info", args)) => run_info(args),
        _ => unreachable!("subcommand is required"),
    };

    if let Err(e) = result {
        error!("{e:#}");
        // Let the flush thread drain before the process goes away.
        std::thread::sleep(Duration::from_millis(200));
        std::process::exit(1);
    }

    std::thread::sleep(Duration::from_millis(200));
}

fn run_report(args: &ArgMatches) -> anyhow::Result<()> {
    let config = Config::from_args(args)?;

    let archive = JsonlArchive::load(&config.archive)?;
    info!(
        "opened archive {} from host {}",
        config.archive.display(),
        archive.hostname()
    );

    let help = match &config.help_db {
        Some(path) => HelpDb::load(path),
        None => HelpDb::empty(),
    };

    let report = Report::new(&config, &archive, &help)?;
    let summary = report.run(&SvgRenderer, &HtmlCompositor)?;

    info!(
        "{} graphs drawn, {} skipped, {} metrics with skipped samples, {} series pruned",
        summary.graphs_drawn,
        summary.graphs_skipped,
        summary.metrics_skipped,
        summary.series_pruned
    );
    println!("Done building: {}", summary.output.display());

    Ok(())
}

fn run_info(args: &ArgMatches) -> anyhow::Result<()> {
    let path = args
        .get_one::<PathBuf>("ARCHIVE")
        .expect("ARCHIVE is required");
    let archive = JsonlArchive::load(path)?;

    let include: Vec<String> = args
        .get_many::<String>("include")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    let exclude: Vec<String> = args
        .get_many::<String>("exclude")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();

    let metrics = select::select_metrics(&archive.metrics(), &include, &exclude)?;

    let (start, end) = archive.interval();
    println!("Host: {}", archive.hostname());
    println!(
        "Interval: {} - {}",
        clock::format(start, "%Y-%m-%d %H:%M:%S"),
        clock::format(end, "%Y-%m-%d %H:%M:%S")
    );

    let mut by_category: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for metric in &metrics {
        let (prefix, rest) = metric
            .split_once('.')
            .unwrap_or((tsdb::category(metric), ""));
        by_category.entry(prefix).or_default().push(rest);
    }

    for (prefix, mut names) in by_category {
        names.sort_unstable();
        names.dedup();
        println!("{prefix}: {}", names.join(", "));
    }

    Ok(())
}

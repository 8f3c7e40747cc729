//! CLI front-end: parse arguments, install logging, and verify each problem directory given on
//! the command line.

mod opt;

use clap::Parser;
use probver_core::{ExternalConverter, Noop, Problem, ShellConverter, ALL_ASPECTS};

fn main() {
    let opt = opt::Opt::parse();

    let level = log_level_for(&opt);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    let items: Vec<&str> = opt.items.iter().map(String::as_str).collect();
    for item in &items {
        if !ALL_ASPECTS.contains(item) {
            eprintln!("unknown aspect {:?}; known aspects are {:?}", item, ALL_ASPECTS);
            std::process::exit(2);
        }
    }

    let converter: Box<dyn ExternalConverter> =
        if opt.no_statement_conversion { Box::new(Noop) } else { Box::new(ShellConverter::new()) };

    for dir in &opt.problems {
        let dir = match dir.canonicalize() {
            Ok(d) => d,
            Err(e) => {
                println!("{}: failed to resolve problem directory: {:#}", dir.display(), e);
                continue;
            }
        };

        let mut problem = match Problem::load(&dir) {
            Ok(p) => p,
            Err(e) => {
                println!("{}: failed to load problem: {:#}", dir.display(), e);
                continue;
            }
        };

        let reporter = problem.check(&items, opt.bail_on_error, converter.as_ref());

        println!(
            "{} tested: {} errors, {} warnings",
            dir.display(),
            reporter.errors(),
            reporter.warnings()
        );
    }
}

fn log_level_for(opt: &opt::Opt) -> log::LevelFilter {
    if opt.verbose > 0 {
        return match opt.verbose {
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
    }
    match opt.log_level.to_lowercase().as_str() {
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warning" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "critical" => log::LevelFilter::Off,
        other => {
            eprintln!("unknown log level {:?}, defaulting to warning", other);
            log::LevelFilter::Warn
        }
    }
}

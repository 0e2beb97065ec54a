mod cli;
mod logging;
mod reporter;

use std::process;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, RunArgs};
use colored::*;
use dotenv::dotenv;
use photo_archiver::config::load_configuration;
use photo_archiver::{AppConfig, ArchiveEngine, Error, RunSummary};
use reporter::CliReporter;
use tracing::error;

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Cli::parse();

    let _guard = logging::init_logger(args.verbose());

    let config = match load_configuration(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    match args.command {
        Some(Commands::Copy(run_args)) => {
            let engine = ArchiveEngine::new(configure(config, &run_args));
            match engine.run(&CliReporter::new()) {
                Ok(summary) => print_summary(&summary),
                Err(err) => exit_with(err),
            }
        }
        Some(Commands::Plan(run_args)) => {
            let mut config = configure(config, &run_args);
            config.dry_run = true;
            let engine = ArchiveEngine::new(config);
            match engine.plan(&CliReporter::new()) {
                Ok(report) => {
                    for task in report.tasks() {
                        println!("{} -> {}", task.source.display(), task.dest.display());
                    }
                    println!();
                    println!("Queued:  {:4}", report.copy_count());
                    println!("Existed: {:4}", report.existed_count());
                    println!("Skipped: {:4}", report.skipped_count());
                }
                Err(err) => exit_with(err),
            }
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
        }
        None => {
            Cli::command().print_long_help()?;
        }
    }

    Ok(())
}

fn configure(mut config: AppConfig, run_args: &RunArgs) -> AppConfig {
    run_args.apply(&mut config);
    config
}

fn exit_with(err: Error) -> ! {
    error!("Error: {}", err);
    match err {
        Error::Copy { .. } => process::exit(2),
        _ => process::exit(1),
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    if summary.dry_run {
        println!("{}", "Dry run, nothing was copied".yellow());
    }
    println!("Copied:  {}", format!("{:4}", summary.copied).green());
    println!("Existed: {}", format!("{:4}", summary.existed).cyan());
    println!("Skipped: {}", format!("{:4}", summary.skipped).yellow());
    if summary.conflicts > 0 {
        println!("Differ:  {}", format!("{:4}", summary.conflicts).red());
    }
    if summary.scan_errors > 0 {
        println!("Errors:  {}", format!("{:4}", summary.scan_errors).red());
    }
    println!();
    println!("Time:    {:4} s", summary.elapsed.as_secs());
    println!("Data: {:7} MB", summary.megabytes_copied());
    println!("Perf: {:.2} MB/s", summary.throughput_mib_per_sec());
}

use clap::{Args, Parser, Subcommand};
use photo_archiver::AppConfig;
use std::path::PathBuf;

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "photo-archiver")]
#[command(version, about = "Copy photos and videos into a YYYY/MM/YYYY-MM-DD tree", long_about = None)]
pub struct Cli {
    /// Extra configuration file, read after Archiver.toml
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile SOURCE against DEST and copy every new file
    Copy(RunArgs),
    /// Reconcile and list the copy queue without copying anything
    Plan(RunArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// The SOURCE tree to copy from
    #[arg(short, long, value_name = "SOURCE")]
    pub source: Option<PathBuf>,

    /// The DEST tree to copy to
    #[arg(short, long, value_name = "DEST")]
    pub dest: Option<PathBuf>,

    /// More output
    #[arg(short, long)]
    pub verbose: bool,

    /// Do everything but the actual copy
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Number of files copied concurrently
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,
}

impl Cli {
    /// Whether the chosen subcommand asked for per-file output.
    pub fn verbose(&self) -> bool {
        match &self.command {
            Some(Commands::Copy(args)) | Some(Commands::Plan(args)) => args.verbose,
            _ => false,
        }
    }
}

impl RunArgs {
    /// Command line values win over loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(source) = &self.source {
            config.source = Some(source.clone());
        }
        if let Some(dest) = &self.dest {
            config.dest = Some(dest.clone());
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        config.verbose |= self.verbose;
        config.dry_run |= self.dry_run;
    }
}

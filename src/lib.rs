pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod fs;
pub mod progress;
pub mod reconcile;

pub use classify::{Classifier, MediaKind};
pub use config::AppConfig;
pub use engine::{ArchiveEngine, RunSummary};
pub use error::{Error, ScanError};
pub use executor::{CopyStats, Copier};
pub use progress::{ProgressReporter, SilentReporter};
pub use reconcile::{CopyTask, ExistingFile, Outcome, QueueBuilder, ReconcileReport, Reason};

use crate::reconcile::CopyTask;

/// Trait for reporting run progress.
///
/// The CLI implements it with indicatif progress bars. All methods have
/// default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _source: &str) {}
    fn on_scan_complete(&self, _to_copy: usize, _existed: usize, _skipped: usize, _duration_secs: f64) {}
    fn on_copy_start(&self, _total_files: usize, _total_bytes: u64) {}
    /// Called once per finished task. May be called from several threads.
    fn on_copy_progress(&self, _task: &CopyTask, _bytes: u64) {}
    fn on_copy_complete(&self, _files: usize, _bytes: u64, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

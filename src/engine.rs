use crate::config::AppConfig;
use crate::error::Error;
use crate::executor::Copier;
use crate::fs::LocalFs;
use crate::progress::ProgressReporter;
use crate::reconcile::{Outcome, QueueBuilder, ReconcileReport, Reason};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct ArchiveEngine {
    config: AppConfig,
}

/// Final numbers of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Files queued for copy. In a dry run nothing is actually copied.
    pub copied: usize,
    pub existed: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub orphans: usize,
    pub scan_errors: usize,
    pub bytes_copied: u64,
    pub dry_run: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn megabytes_copied(&self) -> u64 {
        self.bytes_copied / 1024 / 1024
    }

    /// MiB per second over the whole run; zero when no time has elapsed.
    pub fn throughput_mib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes_copied as f64 / (1024.0 * 1024.0) / secs
    }
}

impl ArchiveEngine {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn roots(&self) -> Result<(&Path, &Path), Error> {
        self.config.validate()?;
        match (self.config.source.as_deref(), self.config.dest.as_deref()) {
            (Some(source), Some(dest)) => Ok((source, dest)),
            _ => Err(Error::Config("source and destination are required".to_string())),
        }
    }

    /// Reconcile the source tree against the destination without copying.
    pub fn plan(&self, reporter: &dyn ProgressReporter) -> Result<ReconcileReport, Error> {
        let (source, dest) = self.roots()?;
        let classifier = self.config.classifier()?;

        info!("Scanning {}", source.display());
        reporter.on_scan_start(&source.to_string_lossy());
        let scan_start = Instant::now();

        let report = QueueBuilder::new(&classifier, &LocalFs)
            .with_time_tolerance(self.config.time_tolerance())
            .with_ignore_patterns(&self.config.ignore_patterns)?
            .build(source, dest)?;

        let scan_duration = scan_start.elapsed();
        reporter.on_scan_complete(
            report.copy_count(),
            report.existed_count(),
            report.skipped_count(),
            scan_duration.as_secs_f64(),
        );
        debug!("Scan completed in {:.2}s", scan_duration.as_secs_f64());

        self.log_outcomes(&report);
        Ok(report)
    }

    /// Scan, reconcile and, unless this is a dry run, copy the queue.
    /// A copy failure stops the run and is returned as `Error::Copy`.
    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<RunSummary, Error> {
        let start = Instant::now();
        info!(
            "Copying photos from '{}' to '{}'",
            display_opt(&self.config.source),
            display_opt(&self.config.dest)
        );

        let report = self.plan(reporter)?;
        let mut summary = RunSummary {
            copied: report.copy_count(),
            existed: report.existed_count(),
            skipped: report.skipped_count(),
            conflicts: report.conflict_count(),
            orphans: report.orphans.len(),
            scan_errors: report.scan_errors.len(),
            bytes_copied: 0,
            dry_run: self.config.dry_run,
            elapsed: Duration::ZERO,
        };

        if self.config.dry_run {
            info!("Dry run, {} files would be copied", summary.copied);
        } else {
            let tasks = report.into_tasks();
            info!("Starting copy of {} files", tasks.len());
            let stats = Copier::new()
                .with_jobs(self.config.jobs)
                .execute(&tasks, reporter)?;
            summary.bytes_copied = stats.bytes;
        }

        summary.elapsed = start.elapsed();
        Ok(summary)
    }

    fn log_outcomes(&self, report: &ReconcileReport) {
        let verbose = self.config.verbose;
        for outcome in &report.outcomes {
            match outcome {
                Outcome::ToCopy(task) => {
                    let sidecar = matches!(task.reason, Reason::SidecarOf(_));
                    if verbose {
                        info!(
                            "Queuing copy{}: {} -> {}",
                            if sidecar { " (sidecar)" } else { "" },
                            task.source.display(),
                            task.dest.display()
                        );
                    } else {
                        debug!("Queuing copy: {} -> {}", task.source.display(), task.dest.display());
                    }
                }
                Outcome::AlreadyExists(existing) => {
                    if existing.is_conflict() {
                        warn!(
                            "Already exists with differences: {} -> {}{}{}",
                            existing.source.display(),
                            existing.dest.display(),
                            if existing.size_mismatch { " [sizes differ]" } else { "" },
                            if existing.time_mismatch {
                                format!(" [times differ by {}s]", existing.time_delta_secs)
                            } else {
                                String::new()
                            },
                        );
                    } else {
                        info!(
                            "Already exists: {} -> {}",
                            existing.source.display(),
                            existing.dest.display()
                        );
                    }
                    if let Some(queued_by) = &existing.queued_by {
                        warn!(
                            "{} targets the same destination as {}",
                            existing.source.display(),
                            queued_by.display()
                        );
                    }
                }
                Outcome::Skipped(skipped) => info!("Skipping {}", skipped.source.display()),
            }
        }

        for scan_error in &report.scan_errors {
            warn!("Scan error: {}", scan_error);
        }
    }
}

fn display_opt(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(bytes: u64, elapsed: Duration) -> RunSummary {
        RunSummary {
            copied: 1,
            existed: 0,
            skipped: 0,
            conflicts: 0,
            orphans: 0,
            scan_errors: 0,
            bytes_copied: bytes,
            dry_run: false,
            elapsed,
        }
    }

    #[test]
    fn test_throughput() {
        let s = summary(10 * 1024 * 1024, Duration::from_secs(2));
        assert_eq!(s.megabytes_copied(), 10);
        assert!((s.throughput_mib_per_sec() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_throughput_with_zero_elapsed() {
        let s = summary(1024, Duration::ZERO);
        assert_eq!(s.throughput_mib_per_sec(), 0.0);
    }

    #[test]
    fn test_run_requires_paths() {
        let engine = ArchiveEngine::new(AppConfig::default());
        let err = engine.run(&crate::progress::SilentReporter).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

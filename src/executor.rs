//! Executes a copy queue.
//!
//! Every copy preserves modification/access times and permissions, never
//! replaces an existing file, and aborts the whole run on the first failure
//! after removing the half-written destination. Copies finished before the
//! failure stay where they are.

use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::reconcile::CopyTask;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rayon::prelude::*;
use std::fs::{self, File, FileTimes, Metadata, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub bytes: u64,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct Copier {
    jobs: usize,
    /// Destination directories known to exist. The entry lock serializes
    /// creation of one directory between threads.
    created_dirs: DashMap<PathBuf, ()>,
}

impl Default for Copier {
    fn default() -> Self {
        Self::new()
    }
}

impl Copier {
    pub fn new() -> Self {
        Self {
            jobs: 1,
            created_dirs: DashMap::new(),
        }
    }

    /// Number of concurrent copies. `1` copies in queue order.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn execute(
        &self,
        tasks: &[CopyTask],
        reporter: &dyn ProgressReporter,
    ) -> Result<CopyStats, Error> {
        let start = Instant::now();
        let files = AtomicUsize::new(0);
        let bytes = AtomicU64::new(0);

        let total_bytes: u64 = tasks.iter().map(|t| t.size).sum();
        reporter.on_copy_start(tasks.len(), total_bytes);

        let run = |task: &CopyTask| -> Result<(), Error> {
            let copied = self.copy_task(task)?;
            files.fetch_add(1, Ordering::Relaxed);
            bytes.fetch_add(copied, Ordering::Relaxed);
            reporter.on_copy_progress(task, copied);
            Ok(())
        };

        if self.jobs == 1 {
            tasks.iter().try_for_each(run)?;
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .map_err(|e| Error::Other(format!("Unable to start copy threads: {}", e)))?;
            pool.install(|| tasks.par_iter().try_for_each(run))?;
        }

        let stats = CopyStats {
            files: files.into_inner(),
            bytes: bytes.into_inner(),
            duration: start.elapsed(),
        };
        reporter.on_copy_complete(stats.files, stats.bytes, stats.duration.as_secs_f64());
        Ok(stats)
    }

    fn copy_task(&self, task: &CopyTask) -> Result<u64, Error> {
        let wrap = |error: io::Error| Error::Copy {
            from: task.source.clone(),
            to: task.dest.clone(),
            error,
        };

        debug!("Copying {} -> {}", task.source.display(), task.dest.display());

        if let Some(parent) = task.dest.parent() {
            self.ensure_dir(parent).map_err(wrap)?;
        }

        let mut reader = File::open(&task.source).map_err(wrap)?;
        let metadata = reader.metadata().map_err(wrap)?;
        // create_new: an existing destination is never replaced, and is
        // never ours to clean up.
        let mut writer = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&task.dest)
            .map_err(wrap)?;

        match write_contents(&mut reader, &mut writer, &metadata) {
            Ok(copied) => Ok(copied),
            Err(err) => {
                drop(writer);
                remove_partial(&task.dest);
                error!(
                    "Copy failed {} -> {}: {}",
                    task.source.display(),
                    task.dest.display(),
                    err
                );
                Err(wrap(err))
            }
        }
    }

    /// Create `dir` if absent. Safe to call from several threads at once.
    fn ensure_dir(&self, dir: &Path) -> io::Result<()> {
        if self.created_dirs.contains_key(dir) {
            return Ok(());
        }
        match self.created_dirs.entry(dir.to_path_buf()) {
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(vacant) => {
                fs::create_dir_all(dir)?;
                vacant.insert(());
                Ok(())
            }
        }
    }
}

fn write_contents(reader: &mut File, writer: &mut File, metadata: &Metadata) -> io::Result<u64> {
    let copied = io::copy(reader, writer)?;

    let mut times = FileTimes::new().set_modified(metadata.modified()?);
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    writer.set_times(times)?;
    writer.set_permissions(metadata.permissions())?;
    Ok(copied)
}

fn remove_partial(dest: &Path) {
    match fs::remove_file(dest) {
        Ok(()) => debug!("Removed partial file {}", dest.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => error!("Unable to remove partial file {}: {}", dest.display(), err),
    }
}

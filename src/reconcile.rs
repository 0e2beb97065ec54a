//! Copy-queue construction.
//!
//! Walks a source tree, pairs every primary media file with its sidecars and
//! decides for each (source, destination) pair whether it has to be copied,
//! already exists at the destination, or is skipped.

use crate::classify::{extension_of, Classifier, MediaKind};
use crate::error::{Error, ScanError};
use crate::fs::{DirEntry, EntryKind, FileStat, MediaFs};
use chrono::{DateTime, Local, TimeZone, Utc};
use glob::Pattern;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

pub const DEFAULT_TIME_TOLERANCE: Duration = Duration::from_secs(5);

/// A file read from the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub stem: String,
    /// Lowercased, without the dot.
    pub extension: String,
    pub size: u64,
    pub modified: SystemTime,
}

impl FileEntry {
    fn new(path: PathBuf, stat: FileStat) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = extension_of(&path).unwrap_or_default();
        Self {
            path,
            stem,
            extension,
            size: stat.size,
            modified: stat.modified,
        }
    }

    fn stat(&self) -> FileStat {
        FileStat {
            size: self.size,
            modified: self.modified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    New,
    /// Copied alongside the given primary file, into its directory.
    SidecarOf(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub size: u64,
    pub reason: Reason,
}

/// A planned destination that is already occupied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingFile {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub size_mismatch: bool,
    pub time_mismatch: bool,
    /// Signed difference source mtime minus destination mtime, in seconds.
    pub time_delta_secs: i64,
    /// Set when the destination is not on disk yet but is the target of an
    /// earlier task of this run; the flags compare against that task's source.
    pub queued_by: Option<PathBuf>,
}

impl ExistingFile {
    pub fn is_conflict(&self) -> bool {
        self.size_mismatch || self.time_mismatch
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub source: PathBuf,
    /// Lowercased extension, empty when the file has none.
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    ToCopy(CopyTask),
    AlreadyExists(ExistingFile),
    Skipped(SkippedFile),
}

/// Everything one reconciliation pass found, in scan order.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub outcomes: Vec<Outcome>,
    /// Sidecars without a primary in their directory. Not counted anywhere.
    pub orphans: Vec<PathBuf>,
    pub scan_errors: Vec<ScanError>,
}

impl ReconcileReport {
    pub fn tasks(&self) -> impl Iterator<Item = &CopyTask> {
        self.outcomes.iter().filter_map(|o| match o {
            Outcome::ToCopy(task) => Some(task),
            _ => None,
        })
    }

    pub fn existing(&self) -> impl Iterator<Item = &ExistingFile> {
        self.outcomes.iter().filter_map(|o| match o {
            Outcome::AlreadyExists(existing) => Some(existing),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SkippedFile> {
        self.outcomes.iter().filter_map(|o| match o {
            Outcome::Skipped(skipped) => Some(skipped),
            _ => None,
        })
    }

    /// Consume the report, keeping only the copy queue.
    pub fn into_tasks(self) -> Vec<CopyTask> {
        self.outcomes
            .into_iter()
            .filter_map(|o| match o {
                Outcome::ToCopy(task) => Some(task),
                _ => None,
            })
            .collect()
    }

    pub fn copy_count(&self) -> usize {
        self.tasks().count()
    }

    pub fn existed_count(&self) -> usize {
        self.existing().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped().count()
    }

    pub fn conflict_count(&self) -> usize {
        self.existing().filter(|e| e.is_conflict()).count()
    }

    pub fn queued_bytes(&self) -> u64 {
        self.tasks().map(|t| t.size).sum()
    }
}

/// `YYYY/MM/YYYY-MM-DD` for a timestamp, in the host's local time zone.
pub fn date_subpath(modified: SystemTime) -> PathBuf {
    date_subpath_in(modified, &Local)
}

pub fn date_subpath_in<Tz>(modified: SystemTime, tz: &Tz) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let local = DateTime::<Utc>::from(modified).with_timezone(tz);
    let mut subpath = PathBuf::new();
    subpath.push(local.format("%Y").to_string());
    subpath.push(local.format("%m").to_string());
    subpath.push(local.format("%Y-%m-%d").to_string());
    subpath
}

fn signed_delta_secs(a: SystemTime, b: SystemTime) -> (Duration, i64) {
    match a.duration_since(b) {
        Ok(d) => (d, d.as_secs() as i64),
        Err(e) => (e.duration(), -(e.duration().as_secs() as i64)),
    }
}

pub struct QueueBuilder<'a, F: MediaFs + ?Sized> {
    classifier: &'a Classifier,
    fs: &'a F,
    time_tolerance: Duration,
    ignore_patterns: Vec<Pattern>,
}

/// Mutable bookkeeping for one `build` call.
#[derive(Default)]
struct BuildState {
    report: ReconcileReport,
    /// Lowercased destination -> source and stat of the task that will
    /// create it. Lowercased so two tasks never collide on a
    /// case-insensitive destination filesystem.
    planned: HashMap<PathBuf, (PathBuf, FileStat)>,
}

impl<'a, F: MediaFs + ?Sized> QueueBuilder<'a, F> {
    pub fn new(classifier: &'a Classifier, fs: &'a F) -> Self {
        Self {
            classifier,
            fs,
            time_tolerance: DEFAULT_TIME_TOLERANCE,
            ignore_patterns: Vec::new(),
        }
    }

    /// Largest modification time difference still treated as identical.
    pub fn with_time_tolerance(mut self, tolerance: Duration) -> Self {
        self.time_tolerance = tolerance;
        self
    }

    /// Glob patterns matched against full source paths. Matching files are
    /// left out entirely and matching directories are not descended.
    pub fn with_ignore_patterns<S: AsRef<str>>(mut self, globs: &[S]) -> Result<Self, Error> {
        for glob in globs {
            let pattern = Pattern::new(glob.as_ref()).map_err(|e| {
                Error::Config(format!("invalid ignore pattern '{}': {}", glob.as_ref(), e))
            })?;
            self.ignore_patterns.push(pattern);
        }
        Ok(self)
    }

    /// Reconcile every file under `source_root` against `dest_root`.
    ///
    /// Only a failure to list `source_root` itself is fatal; unreadable
    /// subdirectories and files end up in `scan_errors`.
    pub fn build(&self, source_root: &Path, dest_root: &Path) -> Result<ReconcileReport, Error> {
        let entries = self.fs.list_dir(source_root).map_err(|err| {
            Error::Io(io::Error::new(
                err.kind(),
                format!("Error reading source {}: {}", source_root.display(), err),
            ))
        })?;

        let mut state = BuildState::default();
        self.visit_dir(source_root, entries, dest_root, &mut state);

        debug!(
            "Reconciled {}: {} to copy, {} existing, {} skipped, {} orphaned, {} errors",
            source_root.display(),
            state.report.copy_count(),
            state.report.existed_count(),
            state.report.skipped_count(),
            state.report.orphans.len(),
            state.report.scan_errors.len(),
        );
        Ok(state.report)
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_patterns.iter().any(|p| p.matches_path(path))
    }

    fn visit_dir(&self, dir: &Path, entries: Vec<DirEntry>, dest_root: &Path, state: &mut BuildState) {
        let files: Vec<&OsString> = entries
            .iter()
            .filter(|e| e.kind == EntryKind::File)
            .map(|e| &e.name)
            .filter(|name| !self.is_ignored(&dir.join(name)))
            .collect();

        // Case-insensitive lookup, scoped to this directory only.
        // A case-sensitive filesystem may hold several case variants of a name.
        let mut index: HashMap<String, Vec<&OsString>> = HashMap::new();
        for &name in &files {
            index
                .entry(name.to_string_lossy().to_lowercase())
                .or_default()
                .push(name);
        }

        let mut claimed: HashSet<&OsString> = HashSet::new();
        let mut sidecars: Vec<&OsString> = Vec::new();

        for &name in &files {
            let path = dir.join(name);
            match self.classifier.classify_path(&path) {
                MediaKind::Ignored => {
                    let extension = extension_of(&path).unwrap_or_default();
                    debug!("Skipping {}", path.display());
                    state
                        .report
                        .outcomes
                        .push(Outcome::Skipped(SkippedFile { source: path, extension }));
                }
                MediaKind::Sidecar => sidecars.push(name),
                MediaKind::Primary => {
                    self.reconcile_primary(dir, path, &index, &mut claimed, dest_root, state)
                }
            }
        }

        for name in sidecars {
            if !claimed.contains(name) {
                let path = dir.join(name);
                debug!("Dropping orphaned sidecar {}", path.display());
                state.report.orphans.push(path);
            }
        }

        for entry in entries.iter().filter(|e| e.kind == EntryKind::Dir) {
            let subdir = dir.join(&entry.name);
            if self.is_ignored(&subdir) {
                debug!("Ignoring directory {}", subdir.display());
                continue;
            }
            match self.fs.list_dir(&subdir) {
                Ok(children) => self.visit_dir(&subdir, children, dest_root, state),
                Err(error) => {
                    warn!("Unable to read directory {}: {}", subdir.display(), error);
                    state.report.scan_errors.push(ScanError { path: subdir, error });
                }
            }
        }
    }

    fn reconcile_primary<'n>(
        &self,
        dir: &Path,
        path: PathBuf,
        index: &HashMap<String, Vec<&'n OsString>>,
        claimed: &mut HashSet<&'n OsString>,
        dest_root: &Path,
        state: &mut BuildState,
    ) {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        // Sidecars present for this primary that no earlier primary took.
        let mut paired: Vec<&OsString> = Vec::new();
        for ext in self.classifier.sidecar_extensions() {
            let key = format!("{}.{}", stem, ext);
            for &name in index.get(&key).into_iter().flatten() {
                if claimed.insert(name) {
                    paired.push(name);
                }
            }
        }

        let stat = match self.stat_source(&path) {
            Ok(stat) => stat,
            Err(error) => {
                warn!("Unable to read {}: {}", path.display(), error);
                for name in paired {
                    debug!(
                        "Dropping sidecar {} of unreadable {}",
                        dir.join(name).display(),
                        path.display()
                    );
                }
                state.report.scan_errors.push(ScanError { path, error });
                return;
            }
        };

        let primary = FileEntry::new(path, stat);
        let dest_dir = dest_root.join(date_subpath(primary.modified));
        let primary_path = primary.path.clone();

        if let Some(name) = primary_path.file_name() {
            self.reconcile(primary, dest_dir.join(name), Reason::New, state);
        }

        for name in paired {
            let sidecar_path = dir.join(name);
            match self.stat_source(&sidecar_path) {
                Ok(stat) => {
                    // Sidecar timestamps are unreliable; the primary's date wins.
                    let sidecar = FileEntry::new(sidecar_path, stat);
                    let reason = Reason::SidecarOf(primary_path.clone());
                    self.reconcile(sidecar, dest_dir.join(name), reason, state);
                }
                Err(error) => {
                    warn!("Unable to read {}: {}", sidecar_path.display(), error);
                    state.report.scan_errors.push(ScanError {
                        path: sidecar_path,
                        error,
                    });
                }
            }
        }
    }

    fn stat_source(&self, path: &Path) -> io::Result<FileStat> {
        self.fs.stat(path)?.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} disappeared during scan", path.display()),
            )
        })
    }

    fn reconcile(&self, entry: FileEntry, dest: PathBuf, reason: Reason, state: &mut BuildState) {
        let planned_key = PathBuf::from(dest.to_string_lossy().to_lowercase());
        if let Some((queued_source, queued_stat)) = state.planned.get(&planned_key) {
            let existing = self.compare(&entry, dest, *queued_stat, Some(queued_source.clone()));
            state.report.outcomes.push(Outcome::AlreadyExists(existing));
            return;
        }

        match self.fs.stat(&dest) {
            Ok(None) => {
                state.planned.insert(planned_key, (entry.path.clone(), entry.stat()));
                state.report.outcomes.push(Outcome::ToCopy(CopyTask {
                    source: entry.path,
                    dest,
                    size: entry.size,
                    reason,
                }));
            }
            Ok(Some(dest_stat)) => {
                let existing = self.compare(&entry, dest, dest_stat, None);
                state.report.outcomes.push(Outcome::AlreadyExists(existing));
            }
            Err(error) => {
                warn!("Unable to read destination {}: {}", dest.display(), error);
                state.report.scan_errors.push(ScanError { path: dest, error });
            }
        }
    }

    fn compare(
        &self,
        entry: &FileEntry,
        dest: PathBuf,
        dest_stat: FileStat,
        queued_by: Option<PathBuf>,
    ) -> ExistingFile {
        let (delta, time_delta_secs) = signed_delta_secs(entry.modified, dest_stat.modified);
        ExistingFile {
            source: entry.path.clone(),
            dest,
            size_mismatch: entry.size != dest_stat.size,
            time_mismatch: delta > self.time_tolerance,
            time_delta_secs,
            queued_by,
        }
    }
}

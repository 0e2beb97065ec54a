use chrono::{Local, TimeZone};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

use photo_archiver::{AppConfig, ArchiveEngine, Copier, Error, SilentReporter};

fn local(y: i32, mo: u32, d: u32, h: u32) -> SystemTime {
    Local
        .with_ymd_and_hms(y, mo, d, h, 0, 0)
        .single()
        .unwrap()
        .into()
}

fn write_file(path: &Path, contents: &[u8], mtime: SystemTime) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(mtime).unwrap();
}

fn count_files_recursive(dir: &Path) -> usize {
    let mut count = 0;
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                count += count_files_recursive(&path);
            } else if path.is_file() {
                count += 1;
            }
        }
    }
    count
}

/// Layout:
///   source/
///     a.jpg          (2024-01-02)
///     clip.mov       (2023-07-14)
///     clip.THM       (2023-09-01, wrong date on purpose)
///     notes.txt      (skipped)
///     orphan.thm     (no primary, dropped)
///     sub/
///       A.JPG        (2024-03-04, same name as a.jpg but a different directory)
fn create_test_tree(root: &Path) {
    write_file(&root.join("a.jpg"), b"jpeg a", local(2024, 1, 2, 10));
    write_file(&root.join("clip.mov"), &[7u8; 4096], local(2023, 7, 14, 18));
    write_file(&root.join("clip.THM"), b"thumb", local(2023, 9, 1, 8));
    write_file(&root.join("notes.txt"), b"notes", local(2024, 1, 2, 10));
    write_file(&root.join("orphan.thm"), b"thumb", local(2024, 1, 2, 10));
    write_file(&root.join("sub/A.JPG"), b"jpeg A!", local(2024, 3, 4, 12));
}

fn config_for(source: &Path, dest: &Path) -> AppConfig {
    AppConfig {
        source: Some(source.to_path_buf()),
        dest: Some(dest.to_path_buf()),
        ..AppConfig::default()
    }
}

fn expected_dests(dest: &Path) -> Vec<PathBuf> {
    vec![
        dest.join("2024/01/2024-01-02/a.jpg"),
        dest.join("2023/07/2023-07-14/clip.mov"),
        dest.join("2023/07/2023-07-14/clip.THM"),
        dest.join("2024/03/2024-03-04/A.JPG"),
    ]
}

#[test]
fn test_full_copy_pipeline() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("source");
    let dest = tmp.path().join("dest");
    create_test_tree(&source);

    let summary = ArchiveEngine::new(config_for(&source, &dest))
        .run(&SilentReporter)
        .unwrap();

    assert_eq!(summary.copied, 4);
    assert_eq!(summary.existed, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.orphans, 1);
    assert_eq!(summary.scan_errors, 0);
    assert_eq!(summary.bytes_copied, 6 + 4096 + 5 + 7);

    for path in expected_dests(&dest) {
        assert!(path.is_file(), "missing {}", path.display());
    }
    assert_eq!(count_files_recursive(&dest), 4);

    // Contents and modification times survive the copy.
    let copied = dest.join("2023/07/2023-07-14/clip.THM");
    assert_eq!(fs::read(&copied).unwrap(), b"thumb");
    assert_eq!(
        fs::metadata(&copied).unwrap().modified().unwrap(),
        local(2023, 9, 1, 8)
    );

    // The source tree is untouched.
    assert_eq!(count_files_recursive(&source), 6);
}

#[test]
fn test_second_run_copies_nothing() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("source");
    let dest = tmp.path().join("dest");
    create_test_tree(&source);

    let engine = ArchiveEngine::new(config_for(&source, &dest));
    engine.run(&SilentReporter).unwrap();
    let second = engine.run(&SilentReporter).unwrap();

    assert_eq!(second.copied, 0);
    assert_eq!(second.existed, 4);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.conflicts, 0);
    assert_eq!(second.bytes_copied, 0);
}

#[test]
fn test_dry_run_leaves_destination_alone() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("source");
    let dest = tmp.path().join("dest");
    create_test_tree(&source);

    let config = AppConfig {
        dry_run: true,
        ..config_for(&source, &dest)
    };
    let summary = ArchiveEngine::new(config).run(&SilentReporter).unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.copied, 4);
    assert_eq!(summary.bytes_copied, 0);
    assert!(!dest.exists());
}

#[test]
fn test_conflicting_destination_is_reported_not_overwritten() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("source");
    let dest = tmp.path().join("dest");
    write_file(&source.join("a.jpg"), b"jpeg a", local(2024, 1, 2, 10));
    let existing = dest.join("2024/01/2024-01-02/a.jpg");
    write_file(&existing, b"something else", local(2024, 1, 2, 10));

    let summary = ArchiveEngine::new(config_for(&source, &dest))
        .run(&SilentReporter)
        .unwrap();

    assert_eq!(summary.copied, 0);
    assert_eq!(summary.existed, 1);
    assert_eq!(summary.conflicts, 1);
    assert_eq!(fs::read(&existing).unwrap(), b"something else");
}

#[test]
fn test_timestamp_within_tolerance_is_not_a_conflict() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("source");
    let dest = tmp.path().join("dest");
    let t = local(2024, 1, 2, 10);
    write_file(&source.join("a.jpg"), b"jpeg a", t);
    write_file(&source.join("b.jpg"), b"jpeg b", t);
    write_file(&dest.join("2024/01/2024-01-02/a.jpg"), b"jpeg a", t + Duration::from_secs(5));
    write_file(&dest.join("2024/01/2024-01-02/b.jpg"), b"jpeg b", t + Duration::from_secs(6));

    let report = ArchiveEngine::new(config_for(&source, &dest))
        .plan(&SilentReporter)
        .unwrap();

    let existing: Vec<_> = report.existing().collect();
    assert_eq!(existing.len(), 2);
    assert!(!existing[0].time_mismatch);
    assert!(existing[1].time_mismatch);
}

#[test]
fn test_copy_failure_aborts_and_keeps_earlier_copies() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("source");
    let dest = tmp.path().join("dest");
    write_file(&source.join("a.jpg"), b"first", local(2024, 1, 2, 10));
    write_file(&source.join("b.jpg"), b"second", local(2024, 1, 2, 10));
    write_file(&source.join("c.jpg"), b"third", local(2024, 1, 2, 10));

    let report = ArchiveEngine::new(config_for(&source, &dest))
        .plan(&SilentReporter)
        .unwrap();
    let tasks = report.into_tasks();
    assert_eq!(tasks.len(), 3);

    // The source vanishes between scan and copy.
    fs::remove_file(source.join("b.jpg")).unwrap();

    let err = Copier::new().execute(&tasks, &SilentReporter).unwrap_err();
    assert!(matches!(err, Error::Copy { .. }));

    let day = dest.join("2024/01/2024-01-02");
    assert!(day.join("a.jpg").is_file());
    assert!(!day.join("b.jpg").exists());
    assert!(!day.join("c.jpg").exists());
}

#[test]
fn test_missing_source_is_an_error() {
    let tmp = tempdir().unwrap();
    let err = ArchiveEngine::new(config_for(&tmp.path().join("nope"), &tmp.path().join("dest")))
        .run(&SilentReporter)
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

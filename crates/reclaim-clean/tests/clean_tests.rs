use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use reclaim_analyze::{DuplicateDetector, DuplicateReport};
use reclaim_clean::{
    CleanError, CleanUpdate, CleaningExecutor, CleaningPlanner, CleaningPreview, CleaningTarget, HelperError,
    HelperPathResult, HelperResponse, PermanentRemover, PlanMode, PlanWarningKind, PrivilegedHelper, Remover,
    SafetyClass, Selection, SkipReason, TargetOutcome, TargetReason, start_clean,
};
use reclaim_core::{Category, DeleteMode, DiagnosticKind, EngineConfig};
use reclaim_scan::{CancellationToken, ScanOptions, ScanReport, TreeScanner};
use tempfile::TempDir;

fn scan(root: &Path) -> ScanReport {
    TreeScanner::new()
        .scan(root, &ScanOptions::default(), &CancellationToken::new())
        .unwrap()
}

fn detect(scan: &ScanReport) -> DuplicateReport {
    DuplicateDetector::new().find_duplicates(scan, &CancellationToken::new())
}

fn planner(scan: &ScanReport) -> CleaningPlanner {
    CleaningPlanner::new(EngineConfig::new(&scan.root_path))
}

fn executor() -> CleaningExecutor {
    CleaningExecutor::new(&EngineConfig::default())
}

fn plan(scan: &ScanReport, duplicates: Option<&DuplicateReport>, selections: &[Selection]) -> CleaningPreview {
    planner(scan)
        .plan(scan, duplicates, selections, PlanMode::Commit, &CancellationToken::new())
        .unwrap()
}

fn set_mtime(path: &Path, seconds_ago: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(seconds_ago))
        .unwrap();
}

/// Every entry below `root` with its size and mtime.
fn snapshot(root: &Path) -> Vec<(PathBuf, u64, SystemTime)> {
    let mut entries = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            let metadata = entry.metadata().unwrap();
            if metadata.is_dir() {
                stack.push(entry.path());
            }
            entries.push((entry.path(), metadata.len(), metadata.modified().unwrap()));
        }
    }
    entries.sort();
    entries
}

/// Fails every removal of one path, and can report a full disk.
struct FailingRemover {
    fail_on: PathBuf,
    kind: io::ErrorKind,
}

impl Remover for FailingRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if path == self.fail_on {
            return Err(io::Error::from(self.kind));
        }
        PermanentRemover.remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        if path == self.fail_on {
            return Err(io::Error::from(self.kind));
        }
        PermanentRemover.remove_dir_all(path)
    }

    fn mode(&self) -> DeleteMode {
        DeleteMode::Permanent
    }
}

/// Records every batch and deletes nothing.
#[derive(Clone, Default)]
struct RecordingHelper {
    calls: Arc<Mutex<Vec<Vec<PathBuf>>>>,
}

impl PrivilegedHelper for RecordingHelper {
    fn delete(&self, paths: &[PathBuf]) -> Result<HelperResponse, HelperError> {
        self.calls.lock().unwrap().push(paths.to_vec());
        Ok(HelperResponse {
            results: paths
                .iter()
                .map(|path| HelperPathResult {
                    path: path.clone(),
                    success: true,
                    bytes_freed: 100,
                    files_deleted: 1,
                    error: None,
                })
                .collect(),
        })
    }
}

fn write_files(root: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = root.join(name);
            fs::write(&path, format!("contents of {name}")).unwrap();
            path
        })
        .collect()
}

#[test]
fn test_preview_never_mutates_filesystem() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("logs")).unwrap();
    fs::write(root.join("logs/app.log"), "log line\n".repeat(50)).unwrap();
    fs::write(root.join("a.txt"), "same").unwrap();
    fs::write(root.join("b.txt"), "same").unwrap();

    let scan = scan(root);
    let duplicates = detect(&scan);
    let before = snapshot(&scan.root_path);

    for mode in [PlanMode::Preview, PlanMode::Commit] {
        let preview = planner(&scan)
            .plan(
                &scan,
                Some(&duplicates),
                &[
                    Selection::category(Category::Logs),
                    Selection::AllDuplicates,
                    Selection::Path(scan.root_path.join("logs")),
                ],
                mode,
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(!preview.is_empty());
    }

    assert_eq!(snapshot(&scan.root_path), before);
}

#[test]
fn test_duplicate_scenario_frees_exactly_one_copy() {
    let temp = TempDir::new().unwrap();
    let content = vec![b'a'; 1024];
    fs::write(temp.path().join("a.txt"), &content).unwrap();
    fs::write(temp.path().join("b.txt"), &content).unwrap();
    fs::write(temp.path().join("c.jpg"), vec![0u8; 2048]).unwrap();
    set_mtime(&temp.path().join("a.txt"), 3600);

    let scan = scan(temp.path());
    let duplicates = detect(&scan);
    let mut preview = plan(&scan, Some(&duplicates), &[Selection::AllDuplicates]);

    assert_eq!(preview.len(), 1);
    let target = &preview.targets[0];
    assert_eq!(target.path, scan.root_path.join("b.txt"));
    assert_eq!(target.safety, SafetyClass::Caution);
    assert!(matches!(
        &target.reason,
        TargetReason::Duplicate { retained, .. } if *retained == scan.root_path.join("a.txt")
    ));
    assert_eq!(preview.total_estimated_bytes, 1024);

    preview.confirm();
    let result = executor().execute(&preview, &CancellationToken::new()).unwrap();

    assert_eq!(result.bytes_freed, 1024);
    assert_eq!(result.files_deleted, 1);
    assert!(result.is_complete());
    assert!(scan.root_path.join("a.txt").exists());
    assert!(!scan.root_path.join("b.txt").exists());
    assert!(scan.root_path.join("c.jpg").exists());
}

#[test]
fn test_retention_is_deterministic() {
    let temp = TempDir::new().unwrap();
    let paths = write_files(temp.path(), &["x", "y", "z"]);
    for path in &paths {
        fs::write(path, "identical").unwrap();
    }
    // Oldest wins regardless of name.
    set_mtime(&paths[0], 10);
    set_mtime(&paths[1], 10);
    set_mtime(&paths[2], 500);

    let scan = scan(temp.path());
    let duplicates = detect(&scan);
    let first = plan(&scan, Some(&duplicates), &[Selection::AllDuplicates]);
    let second = plan(&scan, Some(&duplicates), &[Selection::AllDuplicates]);

    let targeted: Vec<_> = first.targets.iter().map(|t| t.path.clone()).collect();
    assert_eq!(targeted, vec![scan.root_path.join("x"), scan.root_path.join("y")]);
    assert_eq!(
        targeted,
        second.targets.iter().map(|t| t.path.clone()).collect::<Vec<_>>()
    );
}

#[test]
fn test_retention_tie_breaks_by_path() {
    let temp = TempDir::new().unwrap();
    let paths = write_files(temp.path(), &["m", "k"]);
    let when = SystemTime::now() - Duration::from_secs(60);
    for path in &paths {
        fs::write(path, "identical").unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    let scan = scan(temp.path());
    let duplicates = detect(&scan);
    let preview = plan(&scan, Some(&duplicates), &[Selection::AllDuplicates]);

    assert_eq!(preview.len(), 1);
    assert_eq!(preview.targets[0].path, scan.root_path.join("m"));
}

#[test]
fn test_failure_at_one_target_is_isolated() {
    let temp = TempDir::new().unwrap();
    write_files(temp.path(), &["1.log", "2.log", "3.log", "4.log"]);
    let scan = scan(temp.path());
    let mut preview = plan(&scan, None, &[Selection::category(Category::Logs)]);
    preview.confirm();
    assert_eq!(preview.len(), 4);

    let executor = executor().with_remover(FailingRemover {
        fail_on: scan.root_path.join("2.log"),
        kind: io::ErrorKind::Other,
    });
    let result = executor.execute(&preview, &CancellationToken::new()).unwrap();

    assert_eq!(result.deleted_count(), 3);
    assert_eq!(result.failed_count(), 1);
    assert!(!result.is_fatal());
    assert!(matches!(result.outcomes[1].outcome, TargetOutcome::Failed { .. }));
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].path, scan.root_path.join("2.log"));
    assert!(scan.root_path.join("2.log").exists());
    for name in ["1.log", "3.log", "4.log"] {
        assert!(!scan.root_path.join(name).exists());
    }
}

#[test]
fn test_disk_full_halts_remaining_targets() {
    let temp = TempDir::new().unwrap();
    write_files(temp.path(), &["1.log", "2.log", "3.log", "4.log"]);
    let scan = scan(temp.path());
    let mut preview = plan(&scan, None, &[Selection::category(Category::Logs)]);
    preview.confirm();

    let executor = executor().with_remover(FailingRemover {
        fail_on: scan.root_path.join("2.log"),
        kind: io::ErrorKind::StorageFull,
    });
    let result = executor.execute(&preview, &CancellationToken::new()).unwrap();

    assert!(result.is_fatal());
    assert_eq!(result.fatal.as_ref().unwrap().kind, DiagnosticKind::DiskFull);
    assert!(result.outcomes[0].outcome.is_deleted());
    assert!(matches!(
        result.outcomes[1].outcome,
        TargetOutcome::Failed { kind: DiagnosticKind::DiskFull, .. }
    ));
    for outcome in &result.outcomes[2..] {
        assert_eq!(outcome.outcome, TargetOutcome::Skipped { reason: SkipReason::Halted });
    }
    assert_eq!(result.bytes_freed, "contents of 1.log".len() as u64);
    assert!(scan.root_path.join("3.log").exists());
}

#[test]
fn test_replanning_after_commit_is_empty() {
    let temp = TempDir::new().unwrap();
    let paths = write_files(temp.path(), &["one.txt", "two.txt", "three.txt"]);
    for path in &paths {
        fs::write(path, "triplicate").unwrap();
    }

    let scan_before = scan(temp.path());
    let duplicates_before = detect(&scan_before);
    let mut preview = plan(&scan_before, Some(&duplicates_before), &[Selection::AllDuplicates]);
    assert_eq!(preview.len(), 2);
    preview.confirm();
    let result = executor().execute(&preview, &CancellationToken::new()).unwrap();
    assert_eq!(result.deleted_count(), 2);

    // Stale reports: the deleted copies are reported missing and nothing is planned.
    let stale = plan(&scan_before, Some(&duplicates_before), &[Selection::AllDuplicates]);
    assert!(stale.is_empty());
    assert!(stale.warnings.iter().all(|w| w.kind == PlanWarningKind::Missing));

    // Fresh reports: no duplicates are left.
    let scan_after = scan(temp.path());
    let duplicates_after = detect(&scan_after);
    let fresh = plan(&scan_after, Some(&duplicates_after), &[Selection::AllDuplicates]);
    assert!(fresh.is_empty());

    // Re-executing the old plan deletes nothing more.
    let again = executor().execute(&preview, &CancellationToken::new()).unwrap();
    assert_eq!(again.bytes_freed, 0);
    assert!(again
        .outcomes
        .iter()
        .all(|o| o.outcome == TargetOutcome::Skipped { reason: SkipReason::AlreadyGone }));
}

#[test]
fn test_directory_with_unplanned_contents_left_intact() {
    let temp = TempDir::new().unwrap();
    let cache = temp.path().join("cache");
    fs::create_dir_all(cache.join("nested")).unwrap();
    fs::write(cache.join("blob"), vec![0u8; 300]).unwrap();
    fs::write(cache.join("nested/blob"), vec![0u8; 200]).unwrap();

    let scan = scan(temp.path());
    let dir = scan.root_path.join("cache");
    let mut preview = plan(&scan, None, &[Selection::Path(dir.clone())]);
    assert_eq!(preview.len(), 1);
    assert!(preview.targets[0].is_dir);
    assert_eq!(preview.total_estimated_bytes, 500);
    preview.confirm();

    fs::write(dir.join("nested/arrived-later"), "keep me").unwrap();
    let result = executor().execute(&preview, &CancellationToken::new()).unwrap();

    assert_eq!(
        result.outcomes[0].outcome,
        TargetOutcome::Skipped { reason: SkipReason::DirectoryChanged }
    );
    assert!(dir.join("blob").exists());
    assert!(dir.join("nested/arrived-later").exists());

    // Once the plan covers everything again, the directory goes.
    let scan = self::scan(temp.path());
    let mut preview = plan(&scan, None, &[Selection::Path(dir.clone())]);
    preview.confirm();
    let result = executor().execute(&preview, &CancellationToken::new()).unwrap();
    assert!(result.is_complete());
    assert_eq!(result.bytes_freed, 507);
    assert_eq!(result.files_deleted, 3);
    assert!(!dir.exists());
}

#[test]
fn test_nested_selections_are_merged() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("build")).unwrap();
    fs::write(temp.path().join("build/out.log"), "output").unwrap();
    fs::write(temp.path().join("top.log"), "top").unwrap();

    let scan = scan(temp.path());
    let preview = plan(
        &scan,
        None,
        &[
            Selection::category(Category::Logs),
            Selection::Path(scan.root_path.join("build")),
        ],
    );

    let paths: Vec<_> = preview.targets.iter().map(|t| t.path.clone()).collect();
    assert_eq!(paths, vec![scan.root_path.join("build"), scan.root_path.join("top.log")]);
    assert_eq!(preview.total_estimated_bytes, 9);
}

#[test]
fn test_unconfirmed_caution_targets_are_skipped() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("thumbs")).unwrap();
    fs::write(temp.path().join("thumbs/t1.png"), vec![1u8; 64]).unwrap();
    fs::write(temp.path().join("notes.txt"), "precious").unwrap();
    let scan = scan(temp.path());

    let mut config = EngineConfig::new(&scan.root_path);
    config.safe_cache_paths = vec![scan.root_path.join("thumbs")];
    let preview = CleaningPlanner::new(config)
        .plan(
            &scan,
            None,
            &[
                Selection::Path(scan.root_path.join("thumbs/t1.png")),
                Selection::Path(scan.root_path.join("notes.txt")),
            ],
            PlanMode::Commit,
            &CancellationToken::new(),
        )
        .unwrap();

    assert!(preview.requires_confirmation());
    assert_eq!(preview.estimated_bytes(SafetyClass::Safe), 64);

    let result = executor().execute(&preview, &CancellationToken::new()).unwrap();

    assert_eq!(result.deleted_count(), 1);
    assert_eq!(
        result.outcomes[0].outcome,
        TargetOutcome::Skipped { reason: SkipReason::Unconfirmed }
    );
    assert!(scan.root_path.join("notes.txt").exists());
    assert!(!scan.root_path.join("thumbs/t1.png").exists());
}

#[test]
fn test_preview_mode_plan_is_refused() {
    let temp = TempDir::new().unwrap();
    write_files(temp.path(), &["a.log"]);
    let scan = scan(temp.path());
    let preview = planner(&scan)
        .plan(
            &scan,
            None,
            &[Selection::category(Category::Logs)],
            PlanMode::Preview,
            &CancellationToken::new(),
        )
        .unwrap();

    assert!(matches!(
        executor().execute(&preview, &CancellationToken::new()),
        Err(CleanError::PreviewOnly)
    ));
    assert!(scan.root_path.join("a.log").exists());
}

#[test]
fn test_privileged_targets_go_to_helper_in_one_batch() {
    let temp = TempDir::new().unwrap();
    let paths = write_files(temp.path(), &["own.log", "root1.log", "root2.log"]);
    let privileged = |path: &PathBuf| {
        CleaningTarget::file(path, 10, SafetyClass::RequiresPrivilege, TargetReason::Selected)
    };
    let preview = CleaningPreview {
        mode: PlanMode::Commit,
        targets: vec![
            CleaningTarget::file(&paths[0], 10, SafetyClass::Safe, TargetReason::Selected),
            privileged(&paths[1]),
            privileged(&paths[2]),
        ],
        total_estimated_bytes: 30,
        warnings: Vec::new(),
        created_at: SystemTime::now(),
        confirmed: false,
    };

    let helper = RecordingHelper::default();
    let result = executor()
        .with_helper(helper.clone())
        .execute(&preview, &CancellationToken::new())
        .unwrap();

    let calls = helper.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], vec![paths[1].clone(), paths[2].clone()]);
    assert!(result.is_complete());
    assert_eq!(result.outcomes[1].path, paths[1]);
    assert_eq!(
        result.bytes_freed,
        "contents of own.log".len() as u64 + 200
    );
}

#[test]
fn test_missing_helper_fails_privileged_targets_only() {
    let temp = TempDir::new().unwrap();
    let paths = write_files(temp.path(), &["mine.log", "theirs.log"]);
    let preview = CleaningPreview {
        mode: PlanMode::Commit,
        targets: vec![
            CleaningTarget::file(&paths[0], 1, SafetyClass::Safe, TargetReason::Selected),
            CleaningTarget::file(&paths[1], 1, SafetyClass::RequiresPrivilege, TargetReason::Selected),
        ],
        total_estimated_bytes: 2,
        warnings: Vec::new(),
        created_at: SystemTime::now(),
        confirmed: true,
    };

    let result = executor().execute(&preview, &CancellationToken::new()).unwrap();

    assert!(result.outcomes[0].outcome.is_deleted());
    assert!(matches!(
        result.outcomes[1].outcome,
        TargetOutcome::Failed { kind: DiagnosticKind::AccessDenied, .. }
    ));
    assert!(paths[1].exists());
}

#[cfg(unix)]
#[test]
fn test_unwritable_parent_requires_privilege() {
    use std::os::unix::fs::PermissionsExt;

    if reclaim_core::access::is_superuser() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let locked = temp.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("file.log"), "x").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

    let scan = scan(temp.path());
    let preview = plan(&scan, None, &[Selection::category(Category::Logs)]);

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    assert_eq!(preview.len(), 1);
    assert_eq!(preview.targets[0].safety, SafetyClass::RequiresPrivilege);
}

#[test]
fn test_planning_warnings() {
    let temp = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    write_files(temp.path(), &["a.log"]);
    let scan = scan(temp.path());

    let preview = plan(
        &scan,
        None,
        &[
            Selection::Path(elsewhere.path().to_path_buf()),
            Selection::Path(scan.root_path.join("never-existed")),
            Selection::AllDuplicates,
        ],
    );

    assert!(preview.is_empty());
    let kinds: Vec<_> = preview.warnings.iter().map(|w| w.kind).collect();
    assert!(kinds.contains(&PlanWarningKind::OutsideScanRoots));
    assert!(kinds.contains(&PlanWarningKind::Missing));
    assert!(kinds.contains(&PlanWarningKind::UnknownDuplicateGroup));
}

#[test]
fn test_retained_copy_inside_directory_target_protects_group() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("old")).unwrap();
    fs::write(temp.path().join("old/photo.jpg"), "pixels").unwrap();
    fs::write(temp.path().join("photo-copy.jpg"), "pixels").unwrap();
    set_mtime(&temp.path().join("old/photo.jpg"), 1000);

    let scan = scan(temp.path());
    let duplicates = detect(&scan);
    let preview = plan(
        &scan,
        Some(&duplicates),
        &[Selection::AllDuplicates, Selection::Path(scan.root_path.join("old"))],
    );

    let paths: Vec<_> = preview.targets.iter().map(|t| t.path.clone()).collect();
    assert_eq!(paths, vec![scan.root_path.join("old")]);
    assert!(preview
        .warnings
        .iter()
        .any(|w| w.kind == PlanWarningKind::RetainedCopyTargeted));
}

#[test]
fn test_cancelled_commit_skips_everything() {
    let temp = TempDir::new().unwrap();
    write_files(temp.path(), &["a.log", "b.log"]);
    let scan = scan(temp.path());
    let mut preview = plan(&scan, None, &[Selection::category(Category::Logs)]);
    preview.confirm();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = executor().execute(&preview, &cancel).unwrap();

    assert!(result.cancelled);
    assert_eq!(result.skipped_count(), 2);
    assert!(scan.root_path.join("a.log").exists());

    assert!(matches!(
        planner(&scan).plan(&scan, None, &[Selection::AllDuplicates], PlanMode::Commit, &cancel),
        Err(CleanError::Cancelled)
    ));
}

#[tokio::test]
async fn test_start_clean_streams_progress() {
    let temp = TempDir::new().unwrap();
    write_files(temp.path(), &["a.log", "b.log", "c.log"]);
    let scan = scan(temp.path());
    let mut preview = plan(&scan, None, &[Selection::category(Category::Logs)]);
    preview.confirm();

    let mut rx = start_clean(Arc::new(executor()), preview, CancellationToken::new());

    let mut progress_updates = 0;
    let mut completed = None;
    while let Some(update) = rx.recv().await {
        match update {
            CleanUpdate::Progress(progress) => {
                assert_eq!(progress.targets_total, 3);
                progress_updates += 1;
            }
            CleanUpdate::Complete(result) => completed = Some(result),
        }
    }

    assert!(progress_updates >= 3);
    let result = completed.unwrap().unwrap();
    assert_eq!(result.deleted_count(), 3);
    assert!(!scan.root_path.join("a.log").exists());
}

#[test]
fn test_parent_components_cannot_escape_scan_root() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("scanned/sub")).unwrap();
    fs::create_dir(temp.path().join("outside")).unwrap();
    fs::write(temp.path().join("outside/precious.txt"), "do not delete").unwrap();
    fs::write(temp.path().join("scanned/kept.log"), "log").unwrap();
    let scan = scan(&temp.path().join("scanned"));

    let mut preview = plan(
        &scan,
        None,
        &[
            Selection::Path(scan.root_path.join("../outside/precious.txt")),
            Selection::Path(scan.root_path.join("sub/../kept.log")),
            Selection::Path(scan.root_path.join("kept.log")),
        ],
    );

    let paths: Vec<_> = preview.targets.iter().map(|t| t.path.clone()).collect();
    assert_eq!(paths, vec![scan.root_path.join("kept.log")]);
    assert_eq!(preview.warnings.len(), 1);
    assert_eq!(preview.warnings[0].kind, PlanWarningKind::OutsideScanRoots);
    assert_eq!(
        preview.warnings[0].path,
        Some(temp.path().canonicalize().unwrap().join("outside/precious.txt"))
    );

    preview.confirm();
    let result = executor().execute(&preview, &CancellationToken::new()).unwrap();
    assert_eq!(result.deleted_count(), 1);
    assert!(temp.path().join("outside/precious.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_symlinked_directory_cannot_escape_scan_root() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("scanned")).unwrap();
    fs::create_dir(temp.path().join("outside")).unwrap();
    fs::write(temp.path().join("outside/precious.txt"), "do not delete").unwrap();
    std::os::unix::fs::symlink(temp.path().join("outside"), temp.path().join("scanned/link")).unwrap();
    let scan = scan(&temp.path().join("scanned"));

    let preview = plan(&scan, None, &[Selection::Path(scan.root_path.join("link/precious.txt"))]);

    assert!(preview.is_empty());
    assert_eq!(preview.warnings[0].kind, PlanWarningKind::OutsideScanRoots);
}

#[test]
fn test_category_age_filter() {
    let temp = TempDir::new().unwrap();
    let paths = write_files(temp.path(), &["old.log", "recent.log", "old.txt"]);
    set_mtime(&paths[0], 10 * 24 * 60 * 60);
    set_mtime(&paths[2], 10 * 24 * 60 * 60);
    let scan = scan(temp.path());

    let week = Duration::from_secs(7 * 24 * 60 * 60);
    let aged = plan(&scan, None, &[Selection::category_older_than(Category::Logs, week)]);
    let every = plan(&scan, None, &[Selection::category(Category::Logs)]);

    let aged_paths: Vec<_> = aged.targets.iter().map(|t| t.path.clone()).collect();
    assert_eq!(aged_paths, vec![scan.root_path.join("old.log")]);
    assert_eq!(aged.targets[0].reason, TargetReason::Category(Category::Logs));
    assert_eq!(every.len(), 2);
}

#[test]
fn test_safe_caches_are_emptied_but_kept() {
    let temp = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("cache/sub")).unwrap();
    fs::write(root.join("cache/a.bin"), "aaaa").unwrap();
    fs::write(root.join("cache/sub/b.bin"), "bb").unwrap();
    fs::write(root.join("keep.txt"), "keep").unwrap();
    let scan = scan(root);

    let mut config = EngineConfig::new(&scan.root_path);
    config.safe_cache_paths = vec![
        root.join("cache"),
        root.join("absent-cache"),
        elsewhere.path().to_path_buf(),
    ];
    let preview = CleaningPlanner::new(config)
        .plan(&scan, None, &[Selection::SafeCaches], PlanMode::Commit, &CancellationToken::new())
        .unwrap();

    let cache = scan.root_path.join("cache");
    let paths: Vec<_> = preview.targets.iter().map(|t| t.path.clone()).collect();
    assert_eq!(paths, vec![cache.join("a.bin"), cache.join("sub")]);
    assert!(preview.targets.iter().all(|t| t.safety == SafetyClass::Safe));
    assert_eq!(preview.targets[1].reason, TargetReason::SafeCache { cache: cache.clone() });
    assert_eq!(preview.total_estimated_bytes, 6);
    assert!(!preview.requires_confirmation());
    assert_eq!(preview.warnings.len(), 1);
    assert_eq!(preview.warnings[0].kind, PlanWarningKind::OutsideScanRoots);

    let result = executor().execute(&preview, &CancellationToken::new()).unwrap();

    assert_eq!(result.deleted_count(), 2);
    assert_eq!(result.bytes_freed, 6);
    assert!(cache.is_dir());
    assert_eq!(fs::read_dir(&cache).unwrap().count(), 0);
    assert!(root.join("keep.txt").exists());
}

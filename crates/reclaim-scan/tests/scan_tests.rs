use std::fs;
use std::path::Path;

use reclaim_core::access::is_superuser;
use reclaim_core::{
    Category, ConfigError, EngineEvent, Operation, WorkerPool,
};
use reclaim_scan::{
    CancellationToken, DiagnosticKind, DirectoryNode, ScanError, ScanOptions, ScanReport,
    TreeScanner, WalkItem,
};
use tempfile::TempDir;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

fn scan(root: &Path) -> ScanReport {
    TreeScanner::new()
        .scan(root, &ScanOptions::default(), &CancellationToken::new())
        .unwrap()
}

fn assert_aggregates(node: &DirectoryNode) {
    let sum: u64 = node.records().map(|r| r.size).sum();
    assert_eq!(node.aggregate_size, sum, "aggregate mismatch at {}", node.path.display());
    for child in &node.children {
        assert_aggregates(child);
    }
}

#[test]
fn test_aggregate_equals_sum_at_every_depth() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let mut path = root.to_path_buf();
    for level in 0..6u64 {
        path = path.join(format!("level{level}"));
        fs::create_dir(&path).unwrap();
        fs::write(path.join("data.bin"), vec![0u8; (level as usize + 1) * 100]).unwrap();
        fs::write(path.join("extra.bin"), vec![1u8; 7]).unwrap();
    }
    fs::create_dir(root.join("empty")).unwrap();

    let report = scan(root);

    assert_aggregates(&report.root);
    assert_eq!(report.total_size(), (1..=6).map(|n| n * 100 + 7).sum::<u64>());
    assert_eq!(report.file_count(), 12);
    let empty = report.find_dir(&report.root_path.join("empty")).unwrap();
    assert_eq!(empty.aggregate_size, 0);
}

#[test]
fn test_three_file_scenario() {
    let temp = TempDir::new().unwrap();
    let content = vec![b'a'; 1024];
    fs::write(temp.path().join("a.txt"), &content).unwrap();
    fs::write(temp.path().join("b.txt"), &content).unwrap();
    fs::write(temp.path().join("c.jpg"), vec![0u8; 2048]).unwrap();

    let report = scan(temp.path());

    assert_eq!(report.total_size(), 4096);
    assert_eq!(report.file_count(), 3);
    assert!(!report.has_diagnostics());

    let a = report.find_file(&report.root_path.join("a.txt")).unwrap();
    let c = report.find_file(&report.root_path.join("c.jpg")).unwrap();
    assert_eq!(a.category, Category::Documents);
    assert_eq!(c.category, Category::Images);
    assert!(a.fingerprint.is_none());
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_becomes_diagnostic() {
    if is_superuser() {
        return;
    }
    let temp = TempDir::new().unwrap();
    for i in 0..9 {
        fs::write(temp.path().join(format!("ok{i}.dat")), vec![0u8; 10 * (i + 1)]).unwrap();
    }
    let locked = temp.path().join("locked.dat");
    fs::write(&locked, vec![0u8; 5000]).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    let report = scan(temp.path());

    assert_eq!(report.file_count(), 9);
    assert_eq!(report.total_size(), (1..=9).map(|n| n * 10).sum::<u64>());
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::AccessDenied);
    assert!(report.diagnostics[0].path.ends_with("locked.dat"));
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_does_not_abort() {
    if is_superuser() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let private = temp.path().join("private");
    fs::create_dir(&private).unwrap();
    fs::write(private.join("secret"), "x").unwrap();
    fs::write(temp.path().join("public"), "hello").unwrap();
    fs::set_permissions(&private, fs::Permissions::from_mode(0o000)).unwrap();

    let report = scan(temp.path());
    fs::set_permissions(&private, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(report.file_count(), 1);
    assert_eq!(report.total_size(), 5);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::AccessDenied));
}

#[cfg(unix)]
#[test]
fn test_symlink_cycle_is_detected() {
    let temp = TempDir::new().unwrap();
    let inner = temp.path().join("inner");
    fs::create_dir(&inner).unwrap();
    fs::write(inner.join("file.txt"), "abc").unwrap();
    std::os::unix::fs::symlink(temp.path(), inner.join("back")).unwrap();

    let options = ScanOptions {
        follow_symlinks: true,
        ..ScanOptions::default()
    };
    let report = TreeScanner::new()
        .scan(temp.path(), &options, &CancellationToken::new())
        .unwrap();

    assert_eq!(report.file_count(), 1);
    assert_eq!(report.total_size(), 3);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::Cycle));
}

#[cfg(unix)]
#[test]
fn test_symlinks_not_followed_by_default() {
    let temp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    fs::write(outside.path().join("big.bin"), vec![0u8; 4096]).unwrap();
    fs::write(temp.path().join("local.bin"), vec![0u8; 16]).unwrap();
    std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();

    let report = scan(temp.path());

    assert_eq!(report.file_count(), 1);
    assert_eq!(report.total_size(), 16);
    assert!(report.root.children.is_empty());
}

#[cfg(unix)]
#[test]
fn test_hardlinks_counted_once() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.bin"), vec![0u8; 300]).unwrap();
    fs::hard_link(temp.path().join("a.bin"), temp.path().join("b.bin")).unwrap();

    let report = scan(temp.path());

    assert_eq!(report.file_count(), 1);
    assert_eq!(report.total_size(), 300);
    assert!(report.find_file(&report.root_path.join("a.bin")).is_some());
}

#[test]
fn test_content_sniffing_without_extension() {
    let temp = TempDir::new().unwrap();
    let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(&[0u8; 64]);
    fs::write(temp.path().join("picture"), &png).unwrap();
    fs::write(temp.path().join("notes"), "plain words").unwrap();

    let report = scan(temp.path());

    let picture = report.find_file(&report.root_path.join("picture")).unwrap();
    let notes = report.find_file(&report.root_path.join("notes")).unwrap();
    assert_eq!(picture.category, Category::Images);
    assert_eq!(notes.category, Category::Other);
}

#[test]
fn test_cancelled_before_start_returns_partial() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("dir")).unwrap();
    fs::write(temp.path().join("dir/file"), "data").unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = TreeScanner::new()
        .scan(temp.path(), &ScanOptions::default(), &cancel)
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.file_count(), 0);
}

#[test]
fn test_cancel_mid_walk() {
    let temp = TempDir::new().unwrap();
    for i in 0..20 {
        fs::write(temp.path().join(format!("f{i:02}")), "x").unwrap();
    }

    let cancel = CancellationToken::new();
    let scanner = TreeScanner::new();
    let mut walk = scanner
        .walk(temp.path(), &ScanOptions::default(), &cancel)
        .unwrap();

    assert!(matches!(walk.next(), Some(WalkItem::Record(_))));
    cancel.cancel();
    assert!(walk.next().is_none());
    assert!(walk.is_cancelled());
}

#[test]
fn test_missing_root_is_config_error() {
    let temp = TempDir::new().unwrap();
    let result = TreeScanner::new().scan(
        &temp.path().join("missing"),
        &ScanOptions::default(),
        &CancellationToken::new(),
    );
    assert!(matches!(
        result,
        Err(ScanError::Config(ConfigError::RootNotFound { .. }))
    ));

    let file = temp.path().join("file");
    fs::write(&file, "x").unwrap();
    let result = TreeScanner::new().scan(&file, &ScanOptions::default(), &CancellationToken::new());
    assert!(matches!(
        result,
        Err(ScanError::Config(ConfigError::RootNotADirectory { .. }))
    ));
}

#[cfg(unix)]
#[test]
fn test_unreadable_root_fails_scan() {
    if is_superuser() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    fs::create_dir(&root).unwrap();
    fs::set_permissions(&root, fs::Permissions::from_mode(0o000)).unwrap();

    let result = TreeScanner::new().scan(&root, &ScanOptions::default(), &CancellationToken::new());
    fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(result, Err(ScanError::RootUnreadable { .. })));
}

#[test]
fn test_pooled_scan_matches_serial() {
    let temp = TempDir::new().unwrap();
    for d in 0..4 {
        let dir = temp.path().join(format!("d{d}"));
        fs::create_dir(&dir).unwrap();
        for f in 0..5 {
            fs::write(dir.join(format!("f{f}")), vec![0u8; d * 10 + f]).unwrap();
        }
    }

    let serial = scan(temp.path());
    let pool = WorkerPool::start(2).unwrap();
    let pooled = TreeScanner::new()
        .with_pool(pool.clone())
        .scan(temp.path(), &ScanOptions::default(), &CancellationToken::new())
        .unwrap();
    pool.shutdown();

    let serial_paths: Vec<_> = serial.records().map(|r| r.path.clone()).collect();
    let pooled_paths: Vec<_> = pooled.records().map(|r| r.path.clone()).collect();
    assert_eq!(serial_paths, pooled_paths);
    assert_eq!(serial.total_size(), pooled.total_size());
}

#[test]
fn test_scan_publishes_finished_event() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("file"), "data").unwrap();

    let scanner = TreeScanner::new();
    let mut rx = scanner.subscribe();
    scanner
        .scan(temp.path(), &ScanOptions::default(), &CancellationToken::new())
        .unwrap();

    let mut saw_progress = false;
    let mut saw_finished = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            EngineEvent::Scan { bytes_scanned, .. } => {
                saw_progress = true;
                assert_eq!(bytes_scanned, 4);
            }
            EngineEvent::Finished { operation } => {
                saw_finished = operation == Operation::Scan;
            }
            _ => {}
        }
    }
    assert!(saw_progress);
    assert!(saw_finished);
}

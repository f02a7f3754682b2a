//! 업데이터 트랜잭션 테스트
//!
//! ## 테스트 시나리오
//! 1. 정상 교체: 루트가 페이로드로 완전히 바뀌고 상태 토큰이 `ok`
//! 2. 백업 단계 실패: 이미 옮긴 엔트리 복귀, 루트 원상태
//! 3. 교체 단계 실패: 두 단계 모두 역순으로 복귀
//! 4. 롤백 실패: 손상 상태 보고, 추가 변경 없음
//! 5. 예약 이름, 상태 토큰 일관성, 재시도, 정리 경고

use std::cell::Cell;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use crate::{
    FailureKind, FileSystem, InstallLayout, LayoutNames, NoProgress, Phase, StatusToken,
    StdFileSystem, UpdateError, UpdateRunner,
};

// ═══════════════════════════════════════════════════════
// 테스트 유틸리티
// ═══════════════════════════════════════════════════════

/// 디렉터리 스냅샷: 상대 경로 → 파일 내용 (디렉터리는 None)
type Snapshot = BTreeMap<String, Option<Vec<u8>>>;

fn snapshot(dir: &Path) -> Snapshot {
    fn walk(base: &Path, dir: &Path, out: &mut Snapshot) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            let rel = path.strip_prefix(base).unwrap().to_string_lossy().replace('\\', "/");
            if path.is_dir() {
                out.insert(rel, None);
                walk(base, &path, out);
            } else {
                out.insert(rel, Some(std::fs::read(&path).unwrap()));
            }
        }
    }
    let mut out = Snapshot::new();
    walk(dir, dir, &mut out);
    out
}

/// 관리 대상 엔트리만 남긴 스냅샷
fn managed_snapshot(layout: &InstallLayout) -> Snapshot {
    snapshot(layout.root())
        .into_iter()
        .filter(|(rel, _)| {
            let top = rel.split('/').next().unwrap_or_default();
            !layout.is_reserved(std::ffi::OsStr::new(top))
        })
        .collect()
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

struct Fixture {
    _tmp: TempDir,
    layout: InstallLayout,
}

impl Fixture {
    /// 시나리오 A의 레이아웃: 루트 {app.bin, lib/}, 페이로드 {app.bin, lib/, readme.txt}
    fn scenario() -> Self {
        let tmp = TempDir::new().unwrap();
        let names = LayoutNames {
            executable: "app.bin".to_string(),
            ..Default::default()
        };
        let layout = InstallLayout::with_names(tmp.path(), names);
        let root = layout.root().to_path_buf();

        write(&root.join("app.bin"), "old app");
        write(&root.join("lib/core.so"), "old core");
        write(&root.join("data/settings.ini"), "user settings");
        write(&root.join("updatelog.txt"), "");

        write(&layout.updater_binary(), "updater");
        let payload = layout.payload_dir();
        write(&payload.join("app.bin"), "new app");
        write(&payload.join("lib/core.so"), "new core");
        write(&payload.join("lib/extra.so"), "new extra");
        write(&payload.join("readme.txt"), "readme");

        Self { _tmp: tmp, layout }
    }

    fn root(&self) -> &Path {
        self.layout.root()
    }

    fn runner(&self) -> UpdateRunner {
        UpdateRunner::new(self.layout.clone()).with_release_source("https://example.com/fir/releases")
    }

    fn status(&self) -> Option<StatusToken> {
        StatusToken::read(&self.layout.status_file()).unwrap()
    }
}

/// 지정한 이동/삭제/생성을 실패시키는 파일 시스템
struct FaultyFs {
    inner: StdFileSystem,
    fail_move: Box<dyn Fn(&Path, &Path) -> bool>,
    fail_remove: Box<dyn Fn(&Path) -> bool>,
    fail_create: Box<dyn Fn(&Path) -> bool>,
    /// 성공한 이동 직후 호출 (외부 프로세스의 간섭 흉내)
    after_move: Box<dyn Fn(&Path, &Path)>,
    moves: Cell<usize>,
}

impl Default for FaultyFs {
    fn default() -> Self {
        Self {
            inner: StdFileSystem::new(0),
            fail_move: Box::new(|_, _| false),
            fail_remove: Box::new(|_| false),
            fail_create: Box::new(|_| false),
            after_move: Box::new(|_, _| {}),
            moves: Cell::new(0),
        }
    }
}

impl FaultyFs {
    fn failing_move(pred: impl Fn(&Path, &Path) -> bool + 'static) -> Self {
        Self {
            fail_move: Box::new(pred),
            ..Default::default()
        }
    }

    fn failing_remove(pred: impl Fn(&Path) -> bool + 'static) -> Self {
        Self {
            fail_remove: Box::new(pred),
            ..Default::default()
        }
    }

    fn failing_create(pred: impl Fn(&Path) -> bool + 'static) -> Self {
        Self {
            fail_create: Box::new(pred),
            ..Default::default()
        }
    }

    fn after_move(hook: impl Fn(&Path, &Path) + 'static) -> Self {
        Self {
            after_move: Box::new(hook),
            ..Default::default()
        }
    }
}

fn simulated_lock() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "simulated lock")
}

impl FileSystem for FaultyFs {
    fn move_entry(&self, from: &Path, to: &Path) -> io::Result<()> {
        if (self.fail_move)(from, to) {
            return Err(simulated_lock());
        }
        self.moves.set(self.moves.get() + 1);
        self.inner.move_entry(from, to)?;
        (self.after_move)(from, to);
        Ok(())
    }

    fn remove_tree(&self, path: &Path) -> io::Result<()> {
        if (self.fail_remove)(path) {
            return Err(simulated_lock());
        }
        self.inner.remove_tree(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        if (self.fail_create)(path) {
            return Err(simulated_lock());
        }
        self.inner.create_dir(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        if (self.fail_remove)(path) {
            return Err(simulated_lock());
        }
        self.inner.remove_dir(path)
    }
}

// ═══════════════════════════════════════════════════════
// 정상 교체
// ═══════════════════════════════════════════════════════

#[test]
fn scenario_a_commit_replaces_managed_entries() {
    let fx = Fixture::scenario();
    let expected = snapshot(&fx.layout.payload_dir());

    let summary = fx.runner().run(&mut NoProgress).unwrap();

    assert_eq!(managed_snapshot(&fx.layout), expected);
    assert_eq!(fx.status(), Some(StatusToken::Ok));
    assert!(!fx.layout.payload_dir().exists());
    assert!(!fx.layout.backup_dir().exists());
    assert!(fx.layout.updater_binary().exists(), "updater subtree is not moved");
    assert_eq!(std::fs::read_to_string(fx.root().join("data/settings.ini")).unwrap(), "user settings");

    assert_eq!(summary.installed, vec!["app.bin", "lib", "readme.txt"]);
    assert_eq!(summary.backed_up, vec!["app.bin", "lib"]);
    assert!(summary.cleanup_warnings.is_empty());
}

#[test]
fn progress_is_monotonic_and_ends_at_100() {
    let fx = Fixture::scenario();
    let mut seen = Vec::new();
    fx.runner().run(&mut |p: u8| seen.push(p)).unwrap();

    assert_eq!(seen.first(), Some(&0));
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    assert!(seen.contains(&50));
    assert!(seen.contains(&99));
}

#[test]
fn status_token_reads_fail_throughout_the_run() {
    let fx = Fixture::scenario();
    let status_path = fx.layout.status_file();
    let mut observed = Vec::new();

    fx.runner()
        .run(&mut |p: u8| {
            if p > 0 && p < 100 {
                observed.push(StatusToken::read(&status_path).unwrap());
            }
        })
        .unwrap();

    assert!(!observed.is_empty());
    assert!(observed.iter().all(|t| *t == Some(StatusToken::Fail)));
    assert_eq!(fx.status(), Some(StatusToken::Ok));
}

#[test]
fn stale_backup_is_removed_before_run() {
    let fx = Fixture::scenario();
    write(&fx.layout.backup_dir().join("leftover/old.dll"), "stale");

    fx.runner().run(&mut NoProgress).unwrap();

    assert!(!fx.layout.backup_dir().exists());
    assert_eq!(fx.status(), Some(StatusToken::Ok));
}

#[test]
fn reserved_entries_are_never_moved() {
    let fx = Fixture::scenario();
    write(&fx.layout.lock_file(), "lock");
    write(&fx.root().join("updater.toml"), "user config");
    write(&fx.layout.payload_dir().join("updater.toml"), "shipped config");
    // 페이로드 안의 예약 이름도 루트의 예약 엔트리를 덮어쓰지 않아야 함
    write(&fx.layout.payload_dir().join("updatestatus.txt"), "bogus");
    write(&fx.layout.payload_dir().join("data/evil.ini"), "bogus");

    let backed_up: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
    let log = backed_up.clone();
    let backup_dir = fx.layout.backup_dir();
    let fs = FaultyFs::failing_move(move |from, to| {
        if to.parent() == Some(backup_dir.as_path()) {
            log.lock().unwrap().push(from.to_path_buf());
        }
        false
    });

    let summary = fx.runner().with_file_system(fs).run(&mut NoProgress).unwrap();

    let moved: Vec<String> = backed_up
        .lock()
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(moved, vec!["app.bin", "lib"]);
    assert!(!summary.installed.iter().any(|n| n == "data" || n == "updatestatus.txt"));
    assert_eq!(std::fs::read_to_string(fx.layout.lock_file()).unwrap(), "lock");
    assert_eq!(std::fs::read_to_string(fx.root().join("updater.toml")).unwrap(), "user config");
    assert!(!summary.installed.iter().any(|n| n == "updater.toml"));
    assert!(!fx.root().join("data/evil.ini").exists());
    assert_eq!(fx.status(), Some(StatusToken::Ok));
}

// ═══════════════════════════════════════════════════════
// 사전 조건 실패
// ═══════════════════════════════════════════════════════

#[test]
fn missing_payload_aborts_without_mutation() {
    let fx = Fixture::scenario();
    std::fs::remove_dir_all(fx.layout.payload_dir()).unwrap();
    let before = managed_snapshot(&fx.layout);

    let err = fx.runner().run(&mut NoProgress).unwrap_err();

    assert_eq!(err.kind(), FailureKind::PreconditionFailure);
    assert_eq!(err.error_code(), "MISSING_PAYLOAD");
    assert_eq!(managed_snapshot(&fx.layout), before);
    assert!(!fx.layout.backup_dir().exists());
    assert_eq!(fx.status(), Some(StatusToken::Fail));
}

#[test]
fn unwritable_status_file_aborts_immediately() {
    let fx = Fixture::scenario();
    // 상태 파일 자리에 디렉터리가 있으면 쓰기용으로 열 수 없다
    std::fs::create_dir(fx.layout.status_file()).unwrap();
    let before = snapshot(fx.root());

    let err = fx.runner().run(&mut NoProgress).unwrap_err();

    assert!(matches!(err, UpdateError::StatusUnavailable { .. }));
    assert_eq!(err.kind(), FailureKind::PreconditionFailure);
    assert_eq!(snapshot(fx.root()), before);
}

#[test]
fn undeletable_backup_is_preexisting_corruption() {
    let fx = Fixture::scenario();
    write(&fx.layout.backup_dir().join("old.dll"), "stale");
    let before = managed_snapshot(&fx.layout);

    let backup_dir = fx.layout.backup_dir();
    let fs = FaultyFs::failing_remove(move |p| p == backup_dir);
    let err = fx.runner().with_file_system(fs).run(&mut NoProgress).unwrap_err();

    assert_eq!(err.kind(), FailureKind::PreexistingCorruption);
    assert!(!err.is_retryable());
    assert!(err.user_message().contains("backup"));
    assert_eq!(managed_snapshot(&fx.layout), before);
    assert!(fx.layout.payload_dir().join("readme.txt").exists());
    assert_eq!(fx.status(), Some(StatusToken::Fail));
}

#[test]
fn uncreatable_backup_dir_is_a_precondition_failure() {
    let fx = Fixture::scenario();
    let before = managed_snapshot(&fx.layout);
    let payload_before = snapshot(&fx.layout.payload_dir());

    let backup_dir = fx.layout.backup_dir();
    let fs = FaultyFs::failing_create(move |p| p == backup_dir);
    let err = fx.runner().with_file_system(&fs).run(&mut NoProgress).unwrap_err();

    assert!(matches!(err, UpdateError::BackupUnavailable { .. }));
    assert_eq!(err.kind(), FailureKind::PreconditionFailure);
    assert_eq!(err.error_code(), "BACKUP_UNAVAILABLE");
    assert!(err.is_retryable());
    assert_eq!(fs.moves.get(), 0);
    assert_eq!(managed_snapshot(&fx.layout), before);
    assert_eq!(snapshot(&fx.layout.payload_dir()), payload_before);
    assert!(!fx.layout.backup_dir().exists());
    assert_eq!(fx.status(), Some(StatusToken::Fail));
}

// ═══════════════════════════════════════════════════════
// 백업 단계 실패
// ═══════════════════════════════════════════════════════

#[test]
fn scenario_b_stage_failure_restores_root() {
    let fx = Fixture::scenario();
    let before = managed_snapshot(&fx.layout);
    let payload_before = snapshot(&fx.layout.payload_dir());

    let backup_dir = fx.layout.backup_dir();
    let fs = FaultyFs::failing_move(move |from, to| {
        from.ends_with("lib") && to.parent() == Some(backup_dir.as_path())
    });
    let err = fx.runner().with_file_system(&fs).run(&mut NoProgress).unwrap_err();

    assert_eq!(err.kind(), FailureKind::RecoverableBlocked);
    assert_eq!(err.phase(), Some(Phase::Stage));
    assert!(matches!(err, UpdateError::StageBlocked { ref entry, .. } if entry == "lib"));
    // app.bin을 백업으로 옮기고 다시 되돌림
    assert_eq!(fs.moves.get(), 2);
    assert_eq!(managed_snapshot(&fx.layout), before);
    assert_eq!(snapshot(&fx.layout.payload_dir()), payload_before);
    assert!(!fx.layout.backup_dir().exists());
    assert_eq!(fx.status(), Some(StatusToken::Fail));
}

#[test]
fn stage_rollback_failure_is_corrupted() {
    let fx = Fixture::scenario();
    let root = fx.root().to_path_buf();
    let backup_dir = fx.layout.backup_dir();
    let fs = FaultyFs::failing_move(move |from, to| {
        let forward_lib = from.ends_with("lib") && to.parent() == Some(backup_dir.as_path());
        let restore_app = from.parent() == Some(backup_dir.as_path()) && to == root.join("app.bin");
        forward_lib || restore_app
    });

    let err = fx.runner().with_file_system(fs).run(&mut NoProgress).unwrap_err();

    assert_eq!(err.kind(), FailureKind::CorruptedState);
    assert_eq!(err.phase(), Some(Phase::Stage));
    assert!(fx.layout.backup_dir().join("app.bin").exists());
    assert_eq!(fx.status(), Some(StatusToken::Fail));
}

// ═══════════════════════════════════════════════════════
// 교체 단계 실패
// ═══════════════════════════════════════════════════════

#[test]
fn scenario_c_swap_failure_reverses_both_phases() {
    let fx = Fixture::scenario();
    let before = managed_snapshot(&fx.layout);
    let payload_before = snapshot(&fx.layout.payload_dir());

    let payload = fx.layout.payload_dir();
    let fs = FaultyFs::failing_move(move |from, _| from == payload.join("lib"));
    let err = fx.runner().with_file_system(fs).run(&mut NoProgress).unwrap_err();

    assert_eq!(err.kind(), FailureKind::RecoverableBlocked);
    assert_eq!(err.phase(), Some(Phase::Swap));
    assert!(err.is_retryable());
    assert_eq!(managed_snapshot(&fx.layout), before);
    assert_eq!(snapshot(&fx.layout.payload_dir()), payload_before);
    assert!(!fx.layout.backup_dir().exists());
    assert_eq!(fx.status(), Some(StatusToken::Fail));
}

#[test]
fn scenario_d_swap_rollback_failure_is_corrupted() {
    let fx = Fixture::scenario();
    let root = fx.root().to_path_buf();
    let payload = fx.layout.payload_dir();
    let fs = FaultyFs::failing_move(move |from, to| {
        let forward_lib = from == payload.join("lib");
        let revert_app = from == root.join("app.bin") && to == payload.join("app.bin");
        forward_lib || revert_app
    });

    let err = fx.runner().with_file_system(&fs).run(&mut NoProgress).unwrap_err();

    assert_eq!(err.kind(), FailureKind::CorruptedState);
    assert_eq!(err.phase(), Some(Phase::Swap));
    assert!(!err.is_retryable());
    assert!(err.user_message().contains("https://example.com/fir/releases"));

    // 1단계 복원은 시도하지 않는다: 백업 2회 + 새 app.bin 1회
    assert_eq!(fs.moves.get(), 3);
    assert!(fx.layout.backup_dir().join("app.bin").exists());
    assert!(fx.layout.backup_dir().join("lib").exists());
    assert_eq!(std::fs::read_to_string(fx.root().join("app.bin")).unwrap(), "new app");
    assert_eq!(fx.status(), Some(StatusToken::Fail));
}

#[test]
fn swap_failure_on_first_entry_still_restores_backup() {
    let fx = Fixture::scenario();
    let before = managed_snapshot(&fx.layout);

    let payload = fx.layout.payload_dir();
    let fs = FaultyFs::failing_move(move |from, _| from == payload.join("app.bin"));
    let err = fx.runner().with_file_system(fs).run(&mut NoProgress).unwrap_err();

    assert!(matches!(err, UpdateError::SwapBlocked { ref entry, .. } if entry == "app.bin"));
    assert_eq!(managed_snapshot(&fx.layout), before);
}

#[test]
fn vanished_payload_after_backup_restores_root() {
    let fx = Fixture::scenario();
    let before = managed_snapshot(&fx.layout);

    // 마지막 엔트리가 백업으로 옮겨진 직후 페이로드가 사라짐
    let backup_dir = fx.layout.backup_dir();
    let payload = fx.layout.payload_dir();
    let moved_away = fx.layout.staging_dir().join("app.gone");
    let moved_to = moved_away.clone();
    let fs = FaultyFs::after_move(move |_, to| {
        if to == backup_dir.join("lib") {
            std::fs::rename(&payload, &moved_to).unwrap();
        }
    });

    let err = fx.runner().with_file_system(&fs).run(&mut NoProgress).unwrap_err();

    assert!(matches!(err, UpdateError::SwapBlocked { ref entry, .. } if entry == "app"));
    assert_eq!(err.kind(), FailureKind::RecoverableBlocked);
    assert_eq!(err.phase(), Some(Phase::Swap));
    // 백업 2회 + 복원 2회
    assert_eq!(fs.moves.get(), 4);
    assert_eq!(managed_snapshot(&fx.layout), before);
    assert!(!fx.layout.backup_dir().exists());
    assert!(moved_away.join("readme.txt").exists());
    assert_eq!(fx.status(), Some(StatusToken::Fail));
}

#[test]
fn leftover_backup_dir_after_rollback_is_only_a_warning() {
    let fx = Fixture::scenario();
    let before = managed_snapshot(&fx.layout);

    let payload = fx.layout.payload_dir();
    let backup_dir = fx.layout.backup_dir();
    let fs = FaultyFs {
        fail_move: Box::new(move |from: &Path, _: &Path| from == payload.join("lib")),
        // 롤백 후 빈 백업 디렉터리를 지우지 못함
        fail_remove: Box::new(move |p: &Path| p == backup_dir),
        ..Default::default()
    };

    let err = fx.runner().with_file_system(fs).run(&mut NoProgress).unwrap_err();

    assert_eq!(err.kind(), FailureKind::RecoverableBlocked);
    assert_eq!(managed_snapshot(&fx.layout), before);
    assert!(fx.layout.backup_dir().is_dir());
    assert_eq!(std::fs::read_dir(fx.layout.backup_dir()).unwrap().count(), 0);

    // 다음 실행은 남은 빈 백업을 지우고 커밋한다
    fx.runner().run(&mut NoProgress).unwrap();
    assert_eq!(fx.status(), Some(StatusToken::Ok));
}

#[test]
fn retry_after_recoverable_failure_commits() {
    let fx = Fixture::scenario();
    let expected = snapshot(&fx.layout.payload_dir());

    let payload = fx.layout.payload_dir();
    let locked = FaultyFs::failing_move(move |from, _| from == payload.join("readme.txt"));
    let err = fx.runner().with_file_system(locked).run(&mut NoProgress).unwrap_err();
    assert_eq!(err.kind(), FailureKind::RecoverableBlocked);

    // 잠금 해제 후 재실행
    fx.runner().run(&mut NoProgress).unwrap();
    assert_eq!(managed_snapshot(&fx.layout), expected);
    assert_eq!(fx.status(), Some(StatusToken::Ok));
}

// ═══════════════════════════════════════════════════════
// 정리 단계
// ═══════════════════════════════════════════════════════

/// 테스트에서 로그를 모으는 writer
#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn cleanup_failure_is_only_a_warning() {
    let fx = Fixture::scenario();
    let backup_dir = fx.layout.backup_dir();
    // 기존 백업이 없으므로 실패하는 삭제는 정리 단계의 백업 삭제뿐
    let fs = FaultyFs::failing_remove(move |p| p == backup_dir);

    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let summary = tracing::subscriber::with_default(subscriber, || {
        fx.runner().with_file_system(fs).run(&mut NoProgress)
    })
    .unwrap();

    assert_eq!(summary.cleanup_warnings.len(), 1);
    assert!(fx.layout.backup_dir().exists());
    assert!(!fx.layout.payload_dir().exists());
    assert_eq!(fx.status(), Some(StatusToken::Ok));

    let text = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
    assert!(text.contains("[Cleanup] Could not remove"), "{}", text);
    assert!(text.contains("[Status]"));
}

#[test]
fn check_lists_staged_entries_without_mutation() {
    let fx = Fixture::scenario();
    let before = snapshot(fx.root());

    let entries = fx.runner().check().unwrap();

    assert_eq!(entries, vec!["app.bin", "lib", "readme.txt"]);
    assert_eq!(snapshot(fx.root()), before);
}

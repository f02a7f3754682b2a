//! 1단계: 현재 설치본의 관리 대상 엔트리를 백업 디렉터리로 이동

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Phase, UpdateError};
use crate::fs::FileSystem;
use crate::layout::InstallLayout;
use crate::ledger::{apply_moves, Move, MoveLedger};
use crate::progress;

/// 1단계가 커밋된 결과
#[derive(Debug, Clone)]
pub struct StagedBackup {
    /// 백업으로 옮겨진 엔트리 (이동 순서)
    pub entries: Vec<OsString>,
    pub backup_dir: PathBuf,
    pub root: PathBuf,
}

impl StagedBackup {
    /// 1단계 전체를 되돌리기 위한 원장. 되돌릴 때는 이동의 역순을 따릅니다.
    pub fn to_ledger(&self) -> MoveLedger {
        let mut ledger = MoveLedger::new();
        for name in &self.entries {
            ledger.record(Move::between(name.clone(), &self.root, &self.backup_dir));
        }
        ledger
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

/// 이전 실행이 남긴 백업을 지웁니다. 지울 수 없으면 기존 손상으로 간주합니다.
fn clear_stale_backup<F: FileSystem + ?Sized>(fs: &F, backup_dir: &Path) -> Result<(), UpdateError> {
    if backup_dir.symlink_metadata().is_err() {
        return Ok(());
    }
    tracing::info!("[Backup] Deleting old backup at {}", backup_dir.display());
    fs.remove_tree(backup_dir).map_err(|source| {
        tracing::error!("[Backup] Could not remove old backup {}: {}", backup_dir.display(), source);
        UpdateError::StaleBackup {
            path: backup_dir.to_path_buf(),
            source,
        }
    })
}

/// 관리 대상 엔트리를 모두 백업으로 옮깁니다.
///
/// 중간에 실패하면 이미 옮긴 엔트리를 되돌립니다. 되돌리기까지 성공하면
/// [`UpdateError::StageBlocked`], 되돌리기가 실패하면 [`UpdateError::Corrupted`]입니다.
pub fn stage<F: FileSystem + ?Sized>(
    fs: &F,
    layout: &InstallLayout,
    release_source: &str,
    report: &mut dyn FnMut(u8),
) -> Result<StagedBackup, UpdateError> {
    let root = layout.root();
    let backup_dir = layout.backup_dir();

    clear_stale_backup(fs, &backup_dir)?;

    let entries = layout
        .list_entries(root, true)
        .map_err(|source| UpdateError::BackupUnavailable {
            path: root.to_path_buf(),
            source,
        })?;

    fs.create_dir(&backup_dir).map_err(|source| {
        tracing::error!("[Backup] Could not create {}: {}", backup_dir.display(), source);
        UpdateError::BackupUnavailable {
            path: backup_dir.clone(),
            source,
        }
    })?;

    tracing::info!("[Backup] Moving {} entries to {}", entries.len(), backup_dir.display());

    let moves = entries
        .iter()
        .map(|name| Move::between(name.clone(), root, &backup_dir))
        .collect();

    match apply_moves(fs, moves, |done, total| report(progress::stage(done, total))) {
        Ok(_ledger) => {
            report(progress::STAGED);
            Ok(StagedBackup {
                entries,
                backup_dir,
                root: root.to_path_buf(),
            })
        }
        Err(failure) => {
            let entry = failure.failed.display_name();
            match failure.unwind {
                Ok(()) => {
                    // 되돌리기가 끝났으면 백업 디렉터리는 비어 있다
                    if let Err(e) = fs.remove_dir(&backup_dir) {
                        tracing::warn!("[Backup] Could not remove empty backup {}: {}", backup_dir.display(), e);
                    }
                    tracing::warn!(
                        "[Backup] Moving '{}' failed after {} entries, original state restored",
                        entry,
                        failure.completed
                    );
                    Err(UpdateError::StageBlocked {
                        entry,
                        source: failure.source,
                    })
                }
                Err(unwind) => {
                    tracing::error!(
                        "[Backup] Rollback failed at '{}', installation is split between root and backup",
                        unwind.step.display_name()
                    );
                    Err(UpdateError::Corrupted {
                        phase: Phase::Stage,
                        failed_entry: entry,
                        rollback_entry: unwind.step.display_name(),
                        release_source: release_source.to_string(),
                        source: unwind.source,
                    })
                }
            }
        }
    }
}

//! 2단계: 스테이징 페이로드의 엔트리를 설치 루트로 이동
//!
//! 실패하면 두 겹으로 되돌립니다.
//! 1. 이 단계에서 배치한 새 엔트리를 페이로드로 복귀
//! 2. 1단계 전체를 되돌려 백업의 엔트리를 루트로 복귀
//!
//! 둘 중 하나라도 중간에 실패하면 손상 상태로 종료합니다.

use std::ffi::OsString;
use std::io;

use crate::backup::StagedBackup;
use crate::error::{Phase, UpdateError};
use crate::fs::FileSystem;
use crate::layout::InstallLayout;
use crate::ledger::{apply_moves, Move, UnwindFailure};
use crate::progress;

/// 2단계가 커밋된 결과
#[derive(Debug, Clone)]
pub struct SwappedPayload {
    /// 루트에 배치된 엔트리 (이동 순서)
    pub entries: Vec<OsString>,
}

impl SwappedPayload {
    pub fn entry_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

/// 1단계를 되돌립니다. 성공하면 비어 있는 백업 디렉터리도 정리합니다.
fn restore_backup<F: FileSystem + ?Sized>(fs: &F, backup: &StagedBackup) -> Result<(), UnwindFailure> {
    tracing::info!("[Swap] Restoring {} entries from {}", backup.entries.len(), backup.backup_dir.display());
    backup.to_ledger().unwind(fs)?;
    if let Err(e) = fs.remove_dir(&backup.backup_dir) {
        tracing::warn!("[Swap] Could not remove empty backup {}: {}", backup.backup_dir.display(), e);
    }
    Ok(())
}

fn corrupted(failed_entry: String, unwind: UnwindFailure, release_source: &str) -> UpdateError {
    tracing::error!(
        "[Swap] Rollback failed at '{}' ({} -> {}), manual recovery required",
        unwind.step.display_name(),
        unwind.step.from.display(),
        unwind.step.to.display()
    );
    UpdateError::Corrupted {
        phase: Phase::Swap,
        failed_entry,
        rollback_entry: unwind.step.display_name(),
        release_source: release_source.to_string(),
        source: unwind.source,
    }
}

/// 페이로드 엔트리를 루트로 옮깁니다. `backup`은 커밋된 1단계 결과입니다.
pub fn swap<F: FileSystem + ?Sized>(
    fs: &F,
    layout: &InstallLayout,
    backup: &StagedBackup,
    release_source: &str,
    report: &mut dyn FnMut(u8),
) -> Result<SwappedPayload, UpdateError> {
    let root = layout.root();
    let payload = layout.payload_dir();

    let listed = match layout.list_entries(&payload, false) {
        Ok(listed) => listed,
        Err(source) => {
            tracing::error!("[Swap] Could not list {}: {}", payload.display(), source);
            let entry = layout.names().payload_dir.clone();
            return match restore_backup(fs, backup) {
                Ok(()) => Err(UpdateError::SwapBlocked { entry, source }),
                Err(unwind) => Err(corrupted(entry, unwind, release_source)),
            };
        }
    };

    // 페이로드 안의 예약 이름은 루트의 예약 엔트리를 건드리게 되므로 옮기지 않는다
    let (reserved, entries): (Vec<OsString>, Vec<OsString>) =
        listed.into_iter().partition(|name| layout.is_reserved(name));
    for name in &reserved {
        tracing::warn!("[Swap] Skipping reserved name {:?} in staged payload", name);
    }

    tracing::info!("[Swap] Moving {} staged entries into {}", entries.len(), root.display());

    let moves = entries
        .iter()
        .map(|name| Move::between(name.clone(), &payload, root))
        .collect();

    let failure = match apply_moves(fs, moves, |done, total| report(progress::swap(done, total))) {
        Ok(_ledger) => {
            report(progress::SWAPPED);
            return Ok(SwappedPayload { entries });
        }
        Err(failure) => failure,
    };

    let entry = failure.failed.display_name();
    tracing::warn!(
        "[Swap] Moving staged '{}' failed after {} entries, rolling back",
        entry,
        failure.completed
    );

    if let Err(unwind) = failure.unwind {
        return Err(corrupted(entry, unwind, release_source));
    }
    if let Err(unwind) = restore_backup(fs, backup) {
        return Err(corrupted(entry, unwind, release_source));
    }

    tracing::warn!("[Swap] Previous installation restored");
    Err(UpdateError::SwapBlocked {
        entry,
        source: failure.source,
    })
}

/// 백업 없이 페이로드 엔트리 목록만 필요할 때 (점검용)
pub fn staged_entries(layout: &InstallLayout) -> io::Result<Vec<OsString>> {
    Ok(layout
        .list_entries(&layout.payload_dir(), false)?
        .into_iter()
        .filter(|name| !layout.is_reserved(name))
        .collect())
}

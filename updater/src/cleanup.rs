//! 3단계: 비어 있는 페이로드와 백업 디렉터리 정리
//!
//! 두 단계가 모두 커밋된 뒤에만 실행됩니다. 삭제 실패는 경고만 남기고 실행을 실패시키지 않습니다.

use std::path::Path;

use crate::fs::FileSystem;
use crate::layout::InstallLayout;

fn remove_best_effort<F: FileSystem + ?Sized>(fs: &F, path: &Path, warnings: &mut Vec<String>) {
    if path.symlink_metadata().is_err() {
        return;
    }
    match fs.remove_tree(path) {
        Ok(()) => tracing::info!("[Cleanup] Removed {}", path.display()),
        Err(e) => {
            tracing::warn!("[Cleanup] Could not remove {}: {}", path.display(), e);
            warnings.push(format!("Could not remove {}: {}", path.display(), e));
        }
    }
}

/// 정리 후 남은 디렉터리에 대한 경고 목록을 반환합니다.
pub fn cleanup<F: FileSystem + ?Sized>(fs: &F, layout: &InstallLayout) -> Vec<String> {
    let mut warnings = Vec::new();
    remove_best_effort(fs, &layout.payload_dir(), &mut warnings);
    remove_best_effort(fs, &layout.backup_dir(), &mut warnings);
    warnings
}

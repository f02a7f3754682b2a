//! 사전 검증: 파괴적 작업 전에 스테이징 레이아웃이 갖춰졌는지 확인
//!
//! 이 단계만이 부작용 없이 실패할 수 있습니다.

use crate::error::PreflightError;
use crate::layout::InstallLayout;

/// 스테이징 디렉터리 → 업데이터 → 페이로드 → 메인 실행 파일 순으로 확인
pub fn validate(layout: &InstallLayout) -> Result<(), PreflightError> {
    let staging = layout.staging_dir();
    if !staging.is_dir() {
        tracing::error!("[Preflight] Update directory does not exist: {}", staging.display());
        return Err(PreflightError::MissingStagingDir(staging));
    }

    let updater = layout.updater_binary();
    if !updater.exists() {
        tracing::error!("[Preflight] Updater executable is not in place: {}", updater.display());
        return Err(PreflightError::MissingUpdater(updater));
    }

    let payload = layout.payload_dir();
    if !payload.is_dir() {
        tracing::error!("[Preflight] Application directory does not exist: {}", payload.display());
        return Err(PreflightError::MissingPayload(payload));
    }

    let executable = layout.staged_executable();
    if !executable.exists() {
        tracing::error!("[Preflight] Staged executable is missing: {}", executable.display());
        return Err(PreflightError::MissingExecutable(executable));
    }

    tracing::info!("[Preflight] Staged update found at {}", payload.display());
    Ok(())
}

//! # FIR Controller 업데이터 라이브러리
//!
//! 디스크에 미리 스테이징된 새 버전으로 설치 디렉터리를 교체합니다.
//! 어느 단계에서 실패하더라도 원래 상태로 완전히 되돌리거나,
//! 되돌릴 수 없는 경우 그 사실을 명확하게 보고합니다.
//!
//! ## 동작 순서
//! 1. **상태 기록(status.rs)**: 상태 파일에 `fail` 기록
//! 2. **사전 검증(preflight.rs)**: 스테이징/업데이터/페이로드/실행 파일 확인
//! 3. **백업(backup.rs)**: 관리 대상 엔트리를 `backup/`으로 이동
//! 4. **교체(swap.rs)**: `update/app/`의 엔트리를 루트로 이동
//! 5. **정리(cleanup.rs)**: 페이로드/백업 디렉터리 삭제 (실패해도 경고만)
//! 6. **상태 기록**: `ok`로 덮어쓰기
//!
//! 모든 단계는 한 스레드에서 순차적으로 실행됩니다.
//! 단일 인스턴스 보장은 호출 측 책임입니다.

// ══════════════════════════════════════════════════════
// 모듈
// ══════════════════════════════════════════════════════

pub mod backup;
pub mod cleanup;
pub mod error;
pub mod fs;
pub mod hooks;
pub mod layout;
pub mod ledger;
pub mod marker;
pub mod outcome;
pub mod preflight;
pub mod progress;
pub mod status;
pub mod swap;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use error::{FailureKind, Phase, PreflightError, UpdateError};
pub use fs::{FileSystem, StdFileSystem};
pub use hooks::{FailureNotifier, Launcher, NoProgress, ProgressSink};
pub use layout::{InstallLayout, LayoutNames};
pub use marker::UpdateCompletionMarker;
pub use outcome::{CommitSummary, Outcome, RunReport};
pub use status::{StatusRecorder, StatusToken};

/// 수동 재설치 안내에 쓰는 기본 릴리즈 위치
pub const DEFAULT_RELEASE_SOURCE: &str = "https://github.com/fir-controller/fir-controller/releases";

// ══════════════════════════════════════════════════════
// 실행기
// ══════════════════════════════════════════════════════

/// 업데이트 트랜잭션 실행기
pub struct UpdateRunner<F: FileSystem = StdFileSystem> {
    layout: InstallLayout,
    fs: F,
    release_source: String,
}

impl UpdateRunner<StdFileSystem> {
    pub fn new(layout: InstallLayout) -> Self {
        Self {
            layout,
            fs: StdFileSystem::default(),
            release_source: DEFAULT_RELEASE_SOURCE.to_string(),
        }
    }
}

impl<F: FileSystem> UpdateRunner<F> {
    /// 파일 시스템 구현 교체 (재시도 설정, 테스트용 장애 주입)
    pub fn with_file_system<G: FileSystem>(self, fs: G) -> UpdateRunner<G> {
        UpdateRunner {
            layout: self.layout,
            fs,
            release_source: self.release_source,
        }
    }

    pub fn with_release_source(mut self, release_source: impl Into<String>) -> Self {
        self.release_source = release_source.into();
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn release_source(&self) -> &str {
        &self.release_source
    }

    /// 변경 없이 사전 검증만 수행하고, 배치될 엔트리 목록을 반환합니다.
    pub fn check(&self) -> Result<Vec<String>, UpdateError> {
        preflight::validate(&self.layout)?;
        let entries = swap::staged_entries(&self.layout).map_err(|source| UpdateError::PayloadUnreadable {
            path: self.layout.payload_dir(),
            source,
        })?;
        Ok(entries
            .iter()
            .map(|n| n.to_string_lossy().into_owned())
            .collect())
    }

    /// 업데이트를 적용합니다.
    ///
    /// 실패하면 해당 단계에서 가능한 롤백을 모두 마친 뒤 반환하며,
    /// 반환 이후로는 어떤 파일 시스템 작업도 하지 않습니다.
    pub fn run(&self, progress: &mut dyn ProgressSink) -> Result<CommitSummary, UpdateError> {
        tracing::info!("[Updater] Start. install_root={}", self.layout.root().display());
        progress.set_progress(progress::START);

        let status_path = self.layout.status_file();
        let status = StatusRecorder::begin(&status_path).map_err(|source| {
            tracing::error!("[Status] Could not open {} for writing: {}", status_path.display(), source);
            UpdateError::StatusUnavailable {
                path: status_path.clone(),
                source,
            }
        })?;
        progress.set_progress(progress::STATUS_WRITTEN);

        preflight::validate(&self.layout)?;
        progress.set_progress(progress::VALIDATED);

        let mut report = |percent: u8| progress.set_progress(percent);
        let staged = backup::stage(&self.fs, &self.layout, &self.release_source, &mut report)?;
        let swapped = swap::swap(&self.fs, &self.layout, &staged, &self.release_source, &mut report)?;

        let mut cleanup_warnings = cleanup::cleanup(&self.fs, &self.layout);

        if let Err(e) = status.commit() {
            // 교체는 이미 끝났으므로 되돌리지 않는다. 토큰은 fail로 남는다.
            tracing::error!("[Status] Could not write ok to {}: {}", status_path.display(), e);
            cleanup_warnings.push(format!("Could not write status token: {}", e));
        }
        progress.set_progress(progress::FINISHED);

        tracing::info!(
            "[Updater] End. {} entries installed, {} backed up",
            swapped.entries.len(),
            staged.entries.len()
        );
        Ok(CommitSummary {
            installed: swapped.entry_names(),
            backed_up: staged.entry_names(),
            cleanup_warnings,
        })
    }
}

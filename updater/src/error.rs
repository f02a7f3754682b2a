//! 에러 분류 및 사용자 메시지
//!
//! ## 실패 종류
//! - **PreconditionFailure**: 필요한 경로 누락, 상태 파일 열기 실패. 변경 없음, 즉시 재시도 가능
//! - **PreexistingCorruption**: 이전 실행의 백업 디렉터리를 지울 수 없음. 수동 정리 필요
//! - **RecoverableBlocked**: 이동 실패 후 롤백 성공. 설치 상태는 실행 전과 동일
//! - **CorruptedState**: 이동 실패 후 롤백도 실패. 재설치 필요, 자동 재시도 금지

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;

/// 파괴적 작업 전에 검사하는 레이아웃 누락
#[derive(thiserror::Error, Debug)]
pub enum PreflightError {
    #[error("Update directory does not exist: {0}")]
    MissingStagingDir(PathBuf),

    #[error("Updater executable is not in place: {0}")]
    MissingUpdater(PathBuf),

    #[error("Application directory does not exist: {0}")]
    MissingPayload(PathBuf),

    #[error("Staged application executable is missing: {0}")]
    MissingExecutable(PathBuf),
}

/// 이동이 실패한 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// 1단계: 현재 설치본을 백업으로
    Stage,
    /// 2단계: 스테이징 페이로드를 루트로
    Swap,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Stage => write!(f, "backup"),
            Phase::Swap => write!(f, "swap"),
        }
    }
}

/// 실행 결과 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    PreconditionFailure,
    PreexistingCorruption,
    RecoverableBlocked,
    CorruptedState,
}

/// 업데이트 실행 에러
#[derive(thiserror::Error, Debug)]
pub enum UpdateError {
    #[error("Could not open status file {path} for writing: {source}")]
    StatusUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error("Could not read staged application directory {path}: {source}")]
    PayloadUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not prepare backup area {path}: {source}")]
    BackupUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not remove old backup {path}: {source}")]
    StaleBackup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not move '{entry}' into the backup area (rolled back): {source}")]
    StageBlocked {
        entry: String,
        #[source]
        source: io::Error,
    },

    #[error("Could not move staged '{entry}' into place (rolled back): {source}")]
    SwapBlocked {
        entry: String,
        #[source]
        source: io::Error,
    },

    #[error("Installation corrupted during {phase}: moving '{failed_entry}' failed and restoring '{rollback_entry}' also failed: {source}")]
    Corrupted {
        phase: Phase,
        failed_entry: String,
        rollback_entry: String,
        release_source: String,
        #[source]
        source: io::Error,
    },
}

impl UpdateError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::StatusUnavailable { .. }
            | Self::Preflight(_)
            | Self::PayloadUnreadable { .. }
            | Self::BackupUnavailable { .. } => FailureKind::PreconditionFailure,
            Self::StaleBackup { .. } => FailureKind::PreexistingCorruption,
            Self::StageBlocked { .. } | Self::SwapBlocked { .. } => FailureKind::RecoverableBlocked,
            Self::Corrupted { .. } => FailureKind::CorruptedState,
        }
    }

    /// 같은 조건에서 다시 실행해도 되는지 (차단 원인을 해소한 뒤)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::PreconditionFailure | FailureKind::RecoverableBlocked
        )
    }

    /// 실패한 단계 (이동 단계의 실패만)
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::StageBlocked { .. } => Some(Phase::Stage),
            Self::SwapBlocked { .. } => Some(Phase::Swap),
            Self::Corrupted { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// 머신 리더블 에러 코드
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::StatusUnavailable { .. } => "STATUS_UNAVAILABLE",
            Self::Preflight(PreflightError::MissingStagingDir(_)) => "MISSING_STAGING_DIR",
            Self::Preflight(PreflightError::MissingUpdater(_)) => "MISSING_UPDATER",
            Self::Preflight(PreflightError::MissingPayload(_)) => "MISSING_PAYLOAD",
            Self::Preflight(PreflightError::MissingExecutable(_)) => "MISSING_EXECUTABLE",
            Self::PayloadUnreadable { .. } => "PAYLOAD_UNREADABLE",
            Self::BackupUnavailable { .. } => "BACKUP_UNAVAILABLE",
            Self::StaleBackup { .. } => "STALE_BACKUP",
            Self::StageBlocked { .. } => "STAGE_BLOCKED",
            Self::SwapBlocked { .. } => "SWAP_BLOCKED",
            Self::Corrupted { .. } => "CORRUPTED_STATE",
        }
    }

    /// 프로세스 종료 코드
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            FailureKind::PreconditionFailure | FailureKind::PreexistingCorruption => 1,
            FailureKind::RecoverableBlocked => 2,
            FailureKind::CorruptedState => 3,
        }
    }

    /// 사용자에게 표시할 메시지
    pub fn user_message(&self) -> String {
        match self {
            Self::StatusUnavailable { .. } | Self::Preflight(_) | Self::BackupUnavailable { .. } => {
                "Could not apply update. The downloaded update is incomplete or the installation \
                 directory is not writable."
                    .to_string()
            }
            Self::PayloadUnreadable { path, .. } => format!(
                "Could not apply update. The downloaded update in {} could not be read.\n\
                 Download the update again and try again.",
                path.display()
            ),
            Self::StaleBackup { path, .. } => format!(
                "Could not apply update. A backup left by a previous update could not be removed.\n\
                 Delete {} manually and try again.",
                path.display()
            ),
            Self::StageBlocked { entry, .. } => format!(
                "Could not apply update: '{}' is in use. Your installation was left unchanged.\n\
                 Close the application and try again.",
                entry
            ),
            Self::SwapBlocked { entry, .. } => format!(
                "Could not apply update: the new '{}' could not be put in place. \
                 Your installation was restored.\nClose the application and try again.",
                entry
            ),
            Self::Corrupted { release_source, .. } => format!(
                "The update failed and the previous version could not be restored. \
                 The installation is damaged.\nPlease reinstall the application manually \
                 from {}",
                release_source
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err() -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "locked")
    }

    #[test]
    fn classification() {
        let e = UpdateError::Preflight(PreflightError::MissingPayload(PathBuf::from("update/app")));
        assert_eq!(e.kind(), FailureKind::PreconditionFailure);
        assert!(e.is_retryable());
        assert_eq!(e.exit_code(), 1);
        assert_eq!(e.error_code(), "MISSING_PAYLOAD");

        let e = UpdateError::StaleBackup { path: PathBuf::from("backup"), source: io_err() };
        assert_eq!(e.kind(), FailureKind::PreexistingCorruption);
        assert!(!e.is_retryable());

        let e = UpdateError::SwapBlocked { entry: "lib".into(), source: io_err() };
        assert_eq!(e.kind(), FailureKind::RecoverableBlocked);
        assert_eq!(e.phase(), Some(Phase::Swap));
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn unreadable_payload_is_not_a_backup_problem() {
        let e = UpdateError::PayloadUnreadable { path: PathBuf::from("update/app"), source: io_err() };
        assert_eq!(e.kind(), FailureKind::PreconditionFailure);
        assert_eq!(e.error_code(), "PAYLOAD_UNREADABLE");
        assert_eq!(e.exit_code(), 1);
        assert!(e.to_string().contains("staged application directory"));
        assert!(!e.to_string().contains("backup"));
        assert!(e.user_message().contains("update/app"));
    }

    #[test]
    fn corrupted_message_names_release_source() {
        let e = UpdateError::Corrupted {
            phase: Phase::Swap,
            failed_entry: "lib".into(),
            rollback_entry: "app.bin".into(),
            release_source: "https://example.com/releases".into(),
            source: io_err(),
        };
        assert_eq!(e.kind(), FailureKind::CorruptedState);
        assert!(!e.is_retryable());
        assert_eq!(e.exit_code(), 3);
        assert!(e.user_message().contains("https://example.com/releases"));
        assert!(e.user_message().contains("reinstall"));
        assert!(e.to_string().contains("app.bin"));
    }
}

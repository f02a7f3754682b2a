//! 실행의 최종 결과
//!
//! ```text
//!   preflight ──✗──▶ PreconditionFailure
//!       │
//!   stage ──✗(stale backup)──▶ PreexistingCorruption
//!       │ ──✗(rolled back)───▶ RecoverableBlocked
//!       │ ──✗(rollback ✗)────▶ CorruptedState
//!   swap  ──✗(rolled back)───▶ RecoverableBlocked
//!       │ ──✗(rollback ✗)────▶ CorruptedState
//!   cleanup → status ok ─────▶ Committed
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{FailureKind, Phase, UpdateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Committed,
    PreconditionFailure,
    PreexistingCorruption,
    RecoverableBlocked,
    CorruptedState,
}

impl From<FailureKind> for Outcome {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::PreconditionFailure => Outcome::PreconditionFailure,
            FailureKind::PreexistingCorruption => Outcome::PreexistingCorruption,
            FailureKind::RecoverableBlocked => Outcome::RecoverableBlocked,
            FailureKind::CorruptedState => Outcome::CorruptedState,
        }
    }
}

/// 커밋된 실행 요약
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    /// 루트에 새로 배치된 엔트리
    pub installed: Vec<String>,
    /// 교체 전에 백업된 엔트리
    pub backed_up: Vec<String>,
    /// 정리 단계 경고 (실패로 취급하지 않음)
    pub cleanup_warnings: Vec<String>,
}

/// `--json` 출력과 로그에 쓰는 실행 보고서
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: Outcome,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<CommitSummary>,
}

impl RunReport {
    pub fn from_result(result: &Result<CommitSummary, UpdateError>) -> Self {
        match result {
            Ok(summary) => Self {
                outcome: Outcome::Committed,
                exit_code: 0,
                phase: None,
                error_code: None,
                error: None,
                message: None,
                summary: Some(summary.clone()),
            },
            Err(e) => Self {
                outcome: Outcome::from(e.kind()),
                exit_code: e.exit_code(),
                phase: e.phase(),
                error_code: Some(e.error_code().to_string()),
                error: Some(e.to_string()),
                message: Some(e.user_message()),
                summary: None,
            },
        }
    }
}

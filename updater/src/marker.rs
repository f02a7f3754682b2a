//! 업데이트 완료 마커: 재시작된 애플리케이션이 결과를 확인
//!
//! `data/update-complete.json`에 저장합니다. 데이터 디렉터리는 예약 이름이라 스왑 대상이 아닙니다.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::UpdateError;
use crate::outcome::Outcome;

pub const MARKER_FILE: &str = "update-complete.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCompletionMarker {
    pub timestamp: String,
    pub outcome: Outcome,
    pub success: bool,
    pub installed_entries: Vec<String>,
    pub message: Option<String>,
}

impl UpdateCompletionMarker {
    pub fn success(installed_entries: Vec<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            outcome: Outcome::Committed,
            success: true,
            installed_entries,
            message: None,
        }
    }

    pub fn failure(error: &UpdateError) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            outcome: Outcome::from(error.kind()),
            success: false,
            installed_entries: Vec::new(),
            message: Some(error.user_message()),
        }
    }

    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(MARKER_FILE)
    }

    /// 마커 저장 (데이터 디렉터리가 없으면 생성)
    pub fn save(&self, data_dir: &Path) -> Result<PathBuf, String> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| format!("Failed to create directory: {}", e))?;
        let path = Self::path_in(data_dir);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Serialize error: {}", e))?;
        std::fs::write(&path, json).map_err(|e| format!("Write error: {}", e))?;
        Ok(path)
    }

    pub fn load(data_dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(Self::path_in(data_dir)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// 읽은 뒤 삭제 (한 번만 표시)
    pub fn take(data_dir: &Path) -> Option<Self> {
        let marker = Self::load(data_dir)?;
        std::fs::remove_file(Self::path_in(data_dir)).ok();
        Some(marker)
    }
}

//! 단일 인스턴스 락
//!
//! 같은 설치 디렉터리에 대해 업데이터는 한 번에 하나만 실행되어야 합니다.
//! 설치 루트의 `updater.lock` 파일에 PID를 기록하고, 프로세스 수명 동안 유지합니다.
//! 기록된 PID가 더 이상 실행 중이 아니거나 내용을 읽을 수 없으면 오래된 락으로 보고 제거합니다.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 락 파일 내용
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub acquired_at: String,
    pub install_root: String,
}

#[derive(thiserror::Error, Debug)]
pub enum LockError {
    #[error("Another updater (PID {}) is already running since {}", .holder.pid, .holder.acquired_at)]
    AlreadyLocked { holder: LockInfo },

    #[error("Lock file {path} error: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 특정 PID가 실행 중인지 확인
fn is_running(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes();
    sys.process(Pid::from_u32(pid)).is_some()
}

/// 락 핸들: drop 시 해제
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    info: LockInfo,
}

impl InstanceLock {
    /// 락을 한 번 시도합니다. 다른 프로세스가 잡고 있으면 `AlreadyLocked`
    pub fn try_acquire(path: &Path, install_root: &Path) -> Result<Self, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        loop {
            let info = LockInfo {
                pid: std::process::id(),
                acquired_at: chrono::Local::now().to_rfc3339(),
                install_root: install_root.display().to_string(),
            };

            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let content = serde_json::to_string_pretty(&info)
                        .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
                    file.write_all(content.as_bytes()).map_err(io_err)?;
                    file.sync_all().map_err(io_err)?;
                    tracing::info!("[Lock] Acquired {} (pid={})", path.display(), info.pid);
                    return Ok(Self {
                        path: path.to_path_buf(),
                        info,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    match Self::read_holder(path) {
                        // 같은 프로세스의 다른 핸들도 보유자로 취급
                        Some(holder) if holder.pid == info.pid || is_running(holder.pid) => {
                            return Err(LockError::AlreadyLocked { holder });
                        }
                        Some(holder) => {
                            tracing::warn!("[Lock] Removing stale lock held by pid {}", holder.pid);
                        }
                        None => {
                            tracing::warn!("[Lock] Removing unreadable lock file {}", path.display());
                        }
                    }
                    match std::fs::remove_file(path) {
                        Ok(()) => continue,
                        Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                        Err(e) => return Err(io_err(e)),
                    }
                }
                Err(e) => return Err(io_err(e)),
            }
        }
    }

    /// 락이 풀릴 때까지 최대 `timeout` 동안 대기합니다.
    pub fn acquire(path: &Path, install_root: &Path, timeout: Duration) -> Result<Self, LockError> {
        let start = Instant::now();
        let mut announced = false;
        loop {
            match Self::try_acquire(path, install_root) {
                Err(LockError::AlreadyLocked { holder }) if start.elapsed() < timeout => {
                    if !announced {
                        tracing::info!("[Lock] Waiting for updater pid {} to finish...", holder.pid);
                        announced = true;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                other => return other,
            }
        }
    }

    fn read_holder(path: &Path) -> Option<LockInfo> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    /// 아직 이 프로세스가 락을 보유하고 있는지
    pub fn is_held(&self) -> bool {
        Self::read_holder(&self.path)
            .map(|holder| holder.pid == self.info.pid)
            .unwrap_or(false)
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if !self.is_held() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("[Lock] Released {}", self.path.display()),
            Err(e) => tracing::warn!("[Lock] Could not release {}: {}", self.path.display(), e),
        }
    }
}

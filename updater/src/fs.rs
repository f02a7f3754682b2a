//! 파일 시스템 경계
//!
//! 각 단계가 수행하는 변경 작업(이동, 삭제, 백업 디렉터리 생성)은 모두 [`FileSystem`]을 거칩니다.
//! 테스트에서는 잠긴 파일이나 롤백 실패를 흉내 내는 구현을 주입합니다.

use std::io;
use std::path::Path;
use std::time::Duration;

/// 단계에서 사용하는 변경 연산
pub trait FileSystem {
    /// 엔트리(파일 또는 디렉터리)를 `to`로 옮깁니다. `to`는 비어 있어야 합니다.
    fn move_entry(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// 디렉터리 트리(또는 단일 파일)를 삭제합니다.
    fn remove_tree(&self, path: &Path) -> io::Result<()>;

    /// 빈 디렉터리를 만듭니다. 이미 있으면 실패합니다.
    fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// 빈 디렉터리를 삭제합니다.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn move_entry(&self, from: &Path, to: &Path) -> io::Result<()> {
        (**self).move_entry(from, to)
    }

    fn remove_tree(&self, path: &Path) -> io::Result<()> {
        (**self).remove_tree(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        (**self).remove_dir(path)
    }
}

/// `std::fs` 기반 구현
#[derive(Debug, Clone)]
pub struct StdFileSystem {
    /// rename 실패 시 재시도 횟수
    move_retries: u32,
    /// 첫 재시도 대기 시간 (이후 지수 백오프)
    base_delay: Duration,
}

impl Default for StdFileSystem {
    fn default() -> Self {
        Self {
            move_retries: 2,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl StdFileSystem {
    pub fn new(move_retries: u32) -> Self {
        Self {
            move_retries,
            ..Default::default()
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Windows에서는 종료 중인 프로세스가 잡고 있던 파일이 잠시 후 풀리는 경우가 많아
    /// 지수 백오프로 재시도합니다.
    fn rename_with_retry(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut attempt = 0;
        loop {
            match std::fs::rename(from, to) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.move_retries && e.kind() != io::ErrorKind::NotFound => {
                    let delay = self.base_delay * 2u32.pow(attempt);
                    tracing::warn!(
                        "[Fs] rename {} -> {} failed (attempt {}/{}): {}, retrying in {:?}...",
                        from.display(),
                        to.display(),
                        attempt + 1,
                        self.move_retries + 1,
                        e,
                        delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl FileSystem for StdFileSystem {
    fn move_entry(&self, from: &Path, to: &Path) -> io::Result<()> {
        // 유닉스의 rename은 기존 파일을 덮어쓰므로 직접 막는다
        if to.symlink_metadata().is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("destination {} already exists", to.display()),
            ));
        }
        self.rename_with_retry(from, to)
    }

    fn remove_tree(&self, path: &Path) -> io::Result<()> {
        let meta = path.symlink_metadata()?;
        if meta.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }
}

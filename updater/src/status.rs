//! 상태 토큰 기록
//!
//! 실행이 시작되면 가장 먼저 `fail`을 쓰고, 모든 단계가 끝난 뒤에만 `ok`로 바꿉니다.
//! 중간에 프로세스가 죽으면 토큰은 `fail`로 남습니다.
//! 파일은 교체(rename)하지 않고 제자리에서 잘라낸 뒤 다시 씁니다.

use std::fmt;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusToken {
    Fail,
    Ok,
}

impl StatusToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusToken::Fail => "fail",
            StatusToken::Ok => "ok",
        }
    }

    /// 상태 파일 읽기. 파일이 없으면 `Ok(None)`
    pub fn read(path: &Path) -> io::Result<Option<StatusToken>> {
        match std::fs::read_to_string(path) {
            Ok(content) => content
                .parse()
                .map(Some)
                .map_err(|e: String| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl fmt::Display for StatusToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fail" => Ok(StatusToken::Fail),
            "ok" => Ok(StatusToken::Ok),
            other => Err(format!("unknown status token '{}'", other)),
        }
    }
}

/// 실행 동안 열려 있는 상태 파일 핸들
#[derive(Debug)]
pub struct StatusRecorder {
    path: PathBuf,
    file: File,
}

impl StatusRecorder {
    /// 상태 파일을 열고 `fail`을 기록합니다. 열 수 없으면 실행 전체가 중단됩니다.
    pub fn begin(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut recorder = Self {
            path: path.to_path_buf(),
            file,
        };
        recorder.write_token(StatusToken::Fail)?;
        tracing::info!("[Status] {} -> fail", path.display());
        Ok(recorder)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_token(&mut self, token: StatusToken) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.set_len(0)?;
        self.file.write_all(token.as_str().as_bytes())?;
        self.file.flush()?;
        self.file.sync_all()
    }

    /// `ok`로 덮어쓰고 파일을 닫습니다.
    pub fn commit(mut self) -> io::Result<()> {
        self.write_token(StatusToken::Ok)?;
        tracing::info!("[Status] {} -> ok", self.path.display());
        Ok(())
    }
}

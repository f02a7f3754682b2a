//! 설치 디렉터리 레이아웃
//!
//! 업데이터가 다루는 모든 경로는 `install_root` 기준입니다.
//!
//! ```text
//! <install_root>/
//! ├── update/                 ← 스테이징 (예약)
//! │   ├── updater/updater     ← 업데이터 실행 파일 (외부 프로세스가 사용, 이동하지 않음)
//! │   └── app/                ← 새 버전 페이로드
//! ├── data/                   ← 사용자 데이터 (예약)
//! ├── backup/                 ← 실행 중에만 존재 (예약)
//! ├── updatelog.txt           ← 로그 (예약)
//! ├── updatestatus.txt        ← 상태 토큰 (예약)
//! ├── updater.lock            ← 인스턴스 락 (예약)
//! ├── updater.toml            ← 업데이터 설정 (예약)
//! └── ...                     ← 관리 대상 엔트리
//! ```

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};

/// 업데이터 설정 파일. 설정을 읽기 전에 찾아야 하므로 이름을 바꿀 수 없다
pub const CONFIG_FILE: &str = "updater.toml";

/// 레이아웃을 구성하는 이름들. 설정 파일에서 개별 오버라이드 가능
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutNames {
    /// 스테이징 디렉터리 이름
    pub staging_dir: String,
    /// 스테이징 내부의 업데이터 서브트리
    pub updater_dir: String,
    /// 업데이터 서브트리 안의 실행 파일
    pub updater_binary: String,
    /// 스테이징 내부의 애플리케이션 페이로드
    pub payload_dir: String,
    /// 페이로드 안에 반드시 있어야 하는 메인 실행 파일
    pub executable: String,
    pub data_dir: String,
    pub log_file: String,
    pub status_file: String,
    pub backup_dir: String,
    pub lock_file: String,
}

impl Default for LayoutNames {
    fn default() -> Self {
        Self {
            staging_dir: "update".to_string(),
            updater_dir: "updater".to_string(),
            updater_binary: format!("updater{}", std::env::consts::EXE_SUFFIX),
            payload_dir: "app".to_string(),
            executable: format!("fir-controller{}", std::env::consts::EXE_SUFFIX),
            data_dir: "data".to_string(),
            log_file: "updatelog.txt".to_string(),
            status_file: "updatestatus.txt".to_string(),
            backup_dir: "backup".to_string(),
            lock_file: "updater.lock".to_string(),
        }
    }
}

/// 설치 루트와 이름 집합으로 결정되는 레이아웃
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    names: LayoutNames,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_names(root, LayoutNames::default())
    }

    pub fn with_names(root: impl Into<PathBuf>, names: LayoutNames) -> Self {
        Self {
            root: root.into(),
            names,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn names(&self) -> &LayoutNames {
        &self.names
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(&self.names.staging_dir)
    }

    pub fn updater_dir(&self) -> PathBuf {
        self.staging_dir().join(&self.names.updater_dir)
    }

    pub fn updater_binary(&self) -> PathBuf {
        self.updater_dir().join(&self.names.updater_binary)
    }

    pub fn payload_dir(&self) -> PathBuf {
        self.staging_dir().join(&self.names.payload_dir)
    }

    /// 스테이징 페이로드 안의 메인 실행 파일
    pub fn staged_executable(&self) -> PathBuf {
        self.payload_dir().join(&self.names.executable)
    }

    /// 교체가 끝난 뒤 루트에 놓이는 메인 실행 파일
    pub fn executable(&self) -> PathBuf {
        self.root.join(&self.names.executable)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(&self.names.data_dir)
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join(&self.names.log_file)
    }

    pub fn status_file(&self) -> PathBuf {
        self.root.join(&self.names.status_file)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(&self.names.backup_dir)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(&self.names.lock_file)
    }

    /// 스왑 대상에서 제외되는 예약 이름인지 확인
    pub fn is_reserved(&self, name: &OsStr) -> bool {
        [
            self.names.staging_dir.as_str(),
            self.names.data_dir.as_str(),
            self.names.log_file.as_str(),
            self.names.status_file.as_str(),
            self.names.backup_dir.as_str(),
            self.names.lock_file.as_str(),
            CONFIG_FILE,
        ]
        .iter()
        .any(|reserved| names_equal(name, OsStr::new(reserved)))
    }

    /// 디렉터리의 최상위 엔트리를 이름순으로 나열
    ///
    /// 정렬된 순서가 곧 이동 순서이며, 롤백은 이 순서를 역으로 따라갑니다.
    pub fn list_entries(&self, dir: &Path, skip_reserved: bool) -> io::Result<Vec<OsString>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let name = entry?.file_name();
            if skip_reserved && self.is_reserved(&name) {
                tracing::debug!("[Layout] Skipping reserved entry {:?} in {}", name, dir.display());
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(windows)]
fn names_equal(a: &OsStr, b: &OsStr) -> bool {
    a.to_string_lossy().eq_ignore_ascii_case(&b.to_string_lossy())
}

#[cfg(not(windows))]
fn names_equal(a: &OsStr, b: &OsStr) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_hang_off_root() {
        let layout = InstallLayout::new("/opt/fir");
        assert_eq!(layout.staging_dir(), Path::new("/opt/fir/update"));
        assert_eq!(layout.payload_dir(), Path::new("/opt/fir/update/app"));
        assert_eq!(layout.updater_dir(), Path::new("/opt/fir/update/updater"));
        assert_eq!(layout.backup_dir(), Path::new("/opt/fir/backup"));
        assert_eq!(layout.status_file(), Path::new("/opt/fir/updatestatus.txt"));
    }

    #[test]
    fn reserved_names() {
        let layout = InstallLayout::new("/opt/fir");
        for name in ["update", "data", "updatelog.txt", "updatestatus.txt", "backup", "updater.lock", "updater.toml"] {
            assert!(layout.is_reserved(OsStr::new(name)), "{} should be reserved", name);
        }
        assert!(!layout.is_reserved(OsStr::new("lib")));
        assert!(!layout.is_reserved(OsStr::new("app.bin")));
    }

    #[test]
    fn list_entries_is_sorted_and_filtered() {
        let tmp = tempfile::TempDir::new().unwrap();
        let layout = InstallLayout::new(tmp.path());
        std::fs::write(tmp.path().join("zeta.dll"), b"z").unwrap();
        std::fs::write(tmp.path().join("alpha.bin"), b"a").unwrap();
        std::fs::create_dir(tmp.path().join("lib")).unwrap();
        std::fs::create_dir(tmp.path().join("update")).unwrap();
        std::fs::write(tmp.path().join("updatestatus.txt"), b"fail").unwrap();

        let managed = layout.list_entries(tmp.path(), true).unwrap();
        assert_eq!(managed, vec![
            OsString::from("alpha.bin"),
            OsString::from("lib"),
            OsString::from("zeta.dll"),
        ]);

        let all = layout.list_entries(tmp.path(), false).unwrap();
        assert_eq!(all.len(), 5);
    }
}

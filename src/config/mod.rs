//! 업데이터 설정 파일 관리
//!
//! `updater.toml`에서 설정을 로드합니다. 파일이 없으면 모든 값이 기본값입니다.
//!
//! ## 검색 순서
//! 1. `--config <path>`로 지정한 파일
//! 2. 설치 루트(`--install-root` 또는 현재 디렉터리)의 `updater.toml`
//! 3. 업데이터 실행 파일 옆의 `updater.toml`

use anyhow::{Context, Result};
use fir_updater_lib::{InstallLayout, LayoutNames, DEFAULT_RELEASE_SOURCE};
use std::path::{Path, PathBuf};

/// 설치 루트의 예약 이름이라 업데이트로 교체되지 않음
pub const CONFIG_FILE_NAME: &str = fir_updater_lib::layout::CONFIG_FILE;

#[derive(Debug, Clone, PartialEq)]
pub struct UpdaterConfig {
    /// 설치 루트 (없으면 현재 디렉터리)
    pub install_root: Option<PathBuf>,
    pub names: LayoutNames,
    /// 손상 시 재설치 안내에 표시할 릴리즈 위치
    pub release_source: String,
    /// 알림 창 제목
    pub app_title: String,
    /// 커밋 후 새 실행 파일을 실행할지 여부
    pub relaunch: bool,
    pub relaunch_args: Vec<String>,
    /// rename 재시도 횟수
    pub move_retries: u32,
    /// 다른 업데이터가 락을 잡고 있을 때 대기할 최대 시간
    pub lock_timeout_secs: u64,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            install_root: None,
            names: LayoutNames::default(),
            release_source: DEFAULT_RELEASE_SOURCE.to_string(),
            app_title: "FIR Controller".to_string(),
            relaunch: true,
            relaunch_args: Vec::new(),
            move_retries: 2,
            lock_timeout_secs: 60,
        }
    }
}

impl UpdaterConfig {
    /// 설치 루트 결정: 명시값 → 설정 파일 → 현재 디렉터리
    pub fn resolve_root(&self, override_root: Option<&Path>) -> Result<PathBuf> {
        if let Some(root) = override_root {
            return Ok(root.to_path_buf());
        }
        if let Some(ref root) = self.install_root {
            return Ok(root.clone());
        }
        std::env::current_dir().context("Could not determine current directory")
    }

    pub fn layout(&self, root: PathBuf) -> InstallLayout {
        InstallLayout::with_names(root, self.names.clone())
    }

    /// 화면 출력용 TOML 테이블
    pub fn to_toml_value(&self) -> toml::Value {
        let mut table = toml::value::Table::new();
        if let Some(ref root) = self.install_root {
            table.insert("install_root".into(), toml::Value::String(root.display().to_string()));
        }
        let names = &self.names;
        for (key, value) in [
            ("staging_dir", &names.staging_dir),
            ("updater_dir", &names.updater_dir),
            ("updater_binary", &names.updater_binary),
            ("payload_dir", &names.payload_dir),
            ("executable", &names.executable),
            ("data_dir", &names.data_dir),
            ("log_file", &names.log_file),
            ("status_file", &names.status_file),
            ("backup_dir", &names.backup_dir),
            ("lock_file", &names.lock_file),
            ("release_source", &self.release_source),
            ("app_title", &self.app_title),
        ] {
            table.insert(key.into(), toml::Value::String(value.clone()));
        }
        table.insert("relaunch".into(), toml::Value::Boolean(self.relaunch));
        table.insert(
            "relaunch_args".into(),
            toml::Value::Array(self.relaunch_args.iter().cloned().map(toml::Value::String).collect()),
        );
        table.insert("move_retries".into(), toml::Value::Integer(self.move_retries as i64));
        table.insert("lock_timeout_secs".into(), toml::Value::Integer(self.lock_timeout_secs as i64));
        toml::Value::Table(table)
    }
}

/// 설정 파일 경로 결정. 아무 파일도 없으면 `None`
pub fn find_config_file(explicit: Option<&Path>, root: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    // 1. 설치 루트 (없으면 CWD)
    let root_dir = root
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok());
    if let Some(dir) = root_dir {
        let cfg = dir.join(CONFIG_FILE_NAME);
        if cfg.exists() {
            return Some(cfg);
        }
    }

    // 2. 실행 파일 옆
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let cfg = dir.join(CONFIG_FILE_NAME);
            if cfg.exists() {
                return Some(cfg);
            }
        }
    }

    None
}

/// 설정 로드 (파일이 없으면 기본값)
pub fn load_config(explicit: Option<&Path>, root: Option<&Path>) -> Result<UpdaterConfig> {
    let Some(path) = find_config_file(explicit, root) else {
        tracing::debug!("[Config] No {} found, using defaults", CONFIG_FILE_NAME);
        return Ok(UpdaterConfig::default());
    };
    load_config_file(&path)
}

pub fn load_config_file(path: &Path) -> Result<UpdaterConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read config file {}", path.display()))?;
    let parsed: toml::Value = content
        .parse()
        .with_context(|| format!("Invalid TOML in {}", path.display()))?;
    tracing::info!("[Config] Loaded {}", path.display());
    Ok(parse_config(&parsed))
}

fn read_string(val: &toml::Value, key: &str, target: &mut String) {
    match val.get(key) {
        Some(toml::Value::String(s)) => *target = s.clone(),
        Some(other) => tracing::warn!("[Config] '{}' must be a string, got {}", key, other.type_str()),
        None => {}
    }
}

pub fn parse_config(val: &toml::Value) -> UpdaterConfig {
    let mut cfg = UpdaterConfig::default();

    match val.get("install_root") {
        Some(toml::Value::String(s)) => cfg.install_root = Some(PathBuf::from(s)),
        Some(other) => tracing::warn!("[Config] 'install_root' must be a string, got {}", other.type_str()),
        None => {}
    }

    let names = &mut cfg.names;
    read_string(val, "staging_dir", &mut names.staging_dir);
    read_string(val, "updater_dir", &mut names.updater_dir);
    read_string(val, "updater_binary", &mut names.updater_binary);
    read_string(val, "payload_dir", &mut names.payload_dir);
    read_string(val, "executable", &mut names.executable);
    read_string(val, "data_dir", &mut names.data_dir);
    read_string(val, "log_file", &mut names.log_file);
    read_string(val, "status_file", &mut names.status_file);
    read_string(val, "backup_dir", &mut names.backup_dir);
    read_string(val, "lock_file", &mut names.lock_file);
    read_string(val, "release_source", &mut cfg.release_source);
    read_string(val, "app_title", &mut cfg.app_title);

    match val.get("relaunch") {
        Some(toml::Value::Boolean(b)) => cfg.relaunch = *b,
        Some(other) => tracing::warn!("[Config] 'relaunch' must be a boolean, got {}", other.type_str()),
        None => {}
    }
    if let Some(v) = val.get("relaunch_args") {
        match v.as_array() {
            Some(items) => {
                cfg.relaunch_args = items
                    .iter()
                    .filter_map(|i| i.as_str().map(String::from))
                    .collect();
            }
            None => tracing::warn!("[Config] 'relaunch_args' must be an array of strings"),
        }
    }
    match val.get("move_retries").map(|v| v.as_integer()) {
        Some(Some(n)) if (0..=10).contains(&n) => cfg.move_retries = n as u32,
        Some(_) => tracing::warn!("[Config] 'move_retries' must be an integer between 0 and 10"),
        None => {}
    }
    match val.get("lock_timeout_secs").map(|v| v.as_integer()) {
        Some(Some(n)) if n >= 0 => cfg.lock_timeout_secs = n as u64,
        Some(_) => tracing::warn!("[Config] 'lock_timeout_secs' must be a non-negative integer"),
        None => {}
    }

    cfg
}

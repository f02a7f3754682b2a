//! 명령줄 인터페이스
//!
//! ## 사용법
//! ```text
//! fir-updater [--install-root <dir>] [--config <file>] [--no-relaunch] [--json]   # 업데이트 적용
//! fir-updater --cli check      # 사전 검증만 (변경 없음)
//! fir-updater --cli status     # 상태 토큰 표시
//! fir-updater --cli config     # 적용되는 설정 표시
//! fir-updater --cli help
//! fir-updater --version
//! ```
//!
//! ## 종료 코드
//! - `0`: 커밋 완료 / 검증 통과
//! - `1`: 전제 조건 실패, 기존 손상, 락 획득 실패
//! - `2`: 차단되었지만 원래 상태로 복구됨 (재시도 가능)
//! - `3`: 설치 손상 (수동 재설치 필요)

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fir_updater_lib::{
    FailureKind, FailureNotifier, Launcher, Outcome, ProgressSink, RunReport, StatusToken,
    StdFileSystem, UpdateCompletionMarker, UpdateRunner,
};

use crate::config::{load_config, UpdaterConfig};
use crate::console::{ConsoleNotifier, ConsoleProgress};
use crate::launcher::DetachedLauncher;
use crate::lock::{InstanceLock, LockError};
use crate::logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Apply,
    Check,
    Status,
    Config,
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub command: Command,
    pub install_root: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub no_relaunch: bool,
    pub json: bool,
}

/// 프로그램 이름을 제외한 인자를 파싱합니다.
pub fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut parsed = CliArgs {
        command: Command::Apply,
        install_root: None,
        config: None,
        no_relaunch: false,
        json: false,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--install-root" => {
                let value = iter.next().context("--install-root requires a directory")?;
                parsed.install_root = Some(PathBuf::from(value));
            }
            "--config" => {
                let value = iter.next().context("--config requires a file path")?;
                parsed.config = Some(PathBuf::from(value));
            }
            "--no-relaunch" => parsed.no_relaunch = true,
            "--json" => parsed.json = true,
            "--version" | "-V" => parsed.command = Command::Version,
            "--help" | "-h" => parsed.command = Command::Help,
            "--cli" => {
                parsed.command = match iter.next().map(String::as_str) {
                    None | Some("help") => Command::Help,
                    Some("check") => Command::Check,
                    Some("status") => Command::Status,
                    Some("config") => Command::Config,
                    Some("apply") => Command::Apply,
                    Some(other) => bail!("Unknown command: {}", other),
                };
            }
            other => bail!("Unknown argument: {}", other),
        }
    }

    Ok(parsed)
}

/// 명령 실행. 프로세스 종료 코드를 반환합니다.
pub fn run(args: CliArgs) -> i32 {
    match args.command {
        Command::Help => {
            print_help();
            return 0;
        }
        Command::Version => {
            println!("fir-updater {}", env!("CARGO_PKG_VERSION"));
            return 0;
        }
        Command::Apply => {}
        Command::Check | Command::Status | Command::Config => logging::init_console(),
    }

    let result = match args.command {
        Command::Apply => cmd_apply(&args),
        Command::Check => cmd_check(&args),
        Command::Status => cmd_status(&args),
        Command::Config => cmd_config(&args),
        Command::Help | Command::Version => Ok(0),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("✗ Error: {:#}", e);
            1
        }
    }
}

/// 설정을 로드하고 설치 루트를 결정
fn load(args: &CliArgs) -> Result<(UpdaterConfig, PathBuf)> {
    let cfg = load_config(args.config.as_deref(), args.install_root.as_deref())?;
    let root = cfg.resolve_root(args.install_root.as_deref())?;
    Ok((cfg, root))
}

// ═══════════════════════════════════════════════════════
// 명령어 핸들러
// ═══════════════════════════════════════════════════════

fn cmd_apply(args: &CliArgs) -> Result<i32> {
    let (mut cfg, root) = match load(args) {
        Ok(loaded) => loaded,
        Err(e) => {
            // 로그 파일 위치도 모르는 상태이므로 콘솔로만
            logging::init_console();
            return Err(e);
        }
    };
    if args.no_relaunch {
        cfg.relaunch = false;
    }

    // 다른 업데이터가 쓰고 있는 로그를 잘라내지 않도록 락을 잡은 뒤에 로그 파일을 연다
    let locked = tracing::subscriber::with_default(logging::console_subscriber(), || {
        lock_install(&cfg, &root, &ConsoleNotifier)
    });

    let report = match locked {
        Ok(lock) => {
            logging::init_with_file(&cfg.layout(root.clone()).log_file());
            let mut progress = ConsoleProgress::stderr();
            apply_locked(
                &cfg,
                &root,
                &lock,
                &mut progress,
                &ConsoleNotifier,
                &DetachedLauncher::default(),
            )
        }
        Err(report) => report,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.outcome == Outcome::Committed {
        println!("✓ Update applied");
    }
    Ok(report.exit_code)
}

/// 락 → 실행 → 완료 마커 → 재실행 순서로 업데이트를 적용합니다.
pub fn apply_update(
    cfg: &UpdaterConfig,
    root: &Path,
    progress: &mut dyn ProgressSink,
    notifier: &dyn FailureNotifier,
    launcher: &dyn Launcher,
) -> RunReport {
    match lock_install(cfg, root, notifier) {
        Ok(lock) => apply_locked(cfg, root, &lock, progress, notifier, launcher),
        Err(report) => report,
    }
}

/// 설치 루트의 인스턴스 락을 잡습니다. 실패하면 알림을 보내고 보고서를 반환합니다.
pub fn lock_install(
    cfg: &UpdaterConfig,
    root: &Path,
    notifier: &dyn FailureNotifier,
) -> Result<InstanceLock, RunReport> {
    let layout = cfg.layout(root.to_path_buf());
    InstanceLock::acquire(
        &layout.lock_file(),
        layout.root(),
        Duration::from_secs(cfg.lock_timeout_secs),
    )
    .map_err(|e| {
        tracing::error!("[Lock] {}", e);
        notifier.notify_failure(&cfg.app_title, &format!("Could not apply update: {}", e));
        lock_failure_report(&e)
    })
}

/// 락을 보유한 상태에서 업데이트를 실행합니다.
pub fn apply_locked(
    cfg: &UpdaterConfig,
    root: &Path,
    lock: &InstanceLock,
    progress: &mut dyn ProgressSink,
    notifier: &dyn FailureNotifier,
    launcher: &dyn Launcher,
) -> RunReport {
    let layout = cfg.layout(root.to_path_buf());
    tracing::debug!("[Lock] Held by pid {}", lock.info().pid);

    let runner = UpdateRunner::new(layout)
        .with_file_system(StdFileSystem::new(cfg.move_retries))
        .with_release_source(cfg.release_source.as_str());
    let result = runner.run(progress);
    let report = RunReport::from_result(&result);
    let data_dir = runner.layout().data_dir();

    match &result {
        Ok(summary) => {
            for warning in &summary.cleanup_warnings {
                tracing::warn!("[Updater] {}", warning);
            }
            let marker = UpdateCompletionMarker::success(summary.installed.clone());
            if let Err(e) = marker.save(&data_dir) {
                tracing::warn!("[Marker] Could not write completion marker: {}", e);
            }

            if cfg.relaunch {
                let executable = runner.layout().executable();
                if let Err(e) = launcher.launch(&executable, &cfg.relaunch_args) {
                    tracing::warn!("[Launch] Could not start {}: {}", executable.display(), e);
                }
            }
        }
        Err(e) => {
            tracing::error!("[Updater] {} ({})", e, e.error_code());
            notifier.notify_failure(&cfg.app_title, &e.user_message());

            if e.kind() != FailureKind::CorruptedState {
                let marker = UpdateCompletionMarker::failure(e);
                if let Err(e) = marker.save(&data_dir) {
                    tracing::warn!("[Marker] Could not write completion marker: {}", e);
                }
            }
        }
    }

    report
}

fn lock_failure_report(error: &LockError) -> RunReport {
    RunReport {
        outcome: Outcome::PreconditionFailure,
        exit_code: 1,
        phase: None,
        error_code: Some("UPDATER_LOCKED".to_string()),
        error: Some(error.to_string()),
        message: Some("Another update is already in progress.".to_string()),
        summary: None,
    }
}

fn cmd_check(args: &CliArgs) -> Result<i32> {
    let (cfg, root) = load(args)?;
    let runner = UpdateRunner::new(cfg.layout(root));

    match runner.check() {
        Ok(entries) => {
            if args.json {
                let out = serde_json::json!({ "ready": true, "entries": entries });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("✓ Update ready in {}", runner.layout().staging_dir().display());
                for entry in &entries {
                    println!("  {}", entry);
                }
            }
            Ok(0)
        }
        Err(e) => {
            if args.json {
                let out = serde_json::json!({
                    "ready": false,
                    "error_code": e.error_code(),
                    "error": e.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("✗ {}", e);
            }
            Ok(e.exit_code())
        }
    }
}

fn cmd_status(args: &CliArgs) -> Result<i32> {
    let (cfg, root) = load(args)?;
    let layout = cfg.layout(root);
    let status_path = layout.status_file();

    let token = StatusToken::read(&status_path)
        .with_context(|| format!("Could not read {}", status_path.display()))?;
    let marker = UpdateCompletionMarker::load(&layout.data_dir());

    if args.json {
        let out = serde_json::json!({
            "status": token.map(|t| t.as_str()).unwrap_or("missing"),
            "last_update": marker,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        match token {
            Some(StatusToken::Ok) => println!("✓ Last update: ok"),
            Some(StatusToken::Fail) => println!("✗ Last update: fail"),
            None => println!("  No update has been recorded ({} missing)", status_path.display()),
        }
        if let Some(marker) = marker {
            println!("  {} at {}", serde_json::to_string(&marker.outcome)?, marker.timestamp);
            if let Some(message) = marker.message {
                println!("  {}", message);
            }
        }
    }

    Ok(if token == Some(StatusToken::Ok) { 0 } else { 1 })
}

fn cmd_config(args: &CliArgs) -> Result<i32> {
    let (cfg, root) = load(args)?;
    println!("# effective install root: {}", root.display());
    println!("{}", toml::to_string(&cfg.to_toml_value())?);
    Ok(0)
}

fn print_help() {
    println!(
        r#"fir-updater {}

Applies a staged FIR Controller update from <install_root>/update/app.

USAGE:
  fir-updater [OPTIONS]              Apply the staged update
  fir-updater --cli <COMMAND>        Run a command without applying

OPTIONS:
  --install-root <dir>   Installation directory (default: current directory)
  --config <file>        Configuration file (default: updater.toml)
  --no-relaunch          Do not start the application after a successful update
  --json                 Print a machine-readable report on stdout

COMMANDS:
  check                  Validate the staged update without changing anything
  status                 Show the result of the last update
  config                 Show the effective configuration
  help                   Show this help

EXIT CODES:
  0  committed    1  precondition failed    2  blocked, restored    3  installation damaged"#,
        env!("CARGO_PKG_VERSION")
    );
}

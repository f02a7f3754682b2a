//! 교체된 애플리케이션 재실행

use fir_updater_lib::Launcher;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

/// 업데이터와 분리된 프로세스로 실행합니다.
#[derive(Debug, Clone)]
pub struct DetachedLauncher {
    /// 실행 전 대기 (파일 핸들 정리 여유)
    pub delay: Duration,
}

impl Default for DetachedLauncher {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(300),
        }
    }
}

impl Launcher for DetachedLauncher {
    fn launch(&self, executable: &Path, args: &[String]) -> io::Result<()> {
        tracing::info!("[Launch] Relaunching: {} {:?}", executable.display(), args);
        std::thread::sleep(self.delay);

        let mut command = Command::new(executable);
        command.args(args);
        if let Some(dir) = executable.parent() {
            command.current_dir(dir);
        }

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            // DETACHED_PROCESS | CREATE_BREAKAWAY_FROM_JOB | CREATE_NEW_PROCESS_GROUP
            command.creation_flags(0x00000008 | 0x01000000 | 0x00000200);
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
    }
}

//! 로깅 초기화
//!
//! stderr와 설치 루트의 로그 파일(`updatelog.txt`) 두 곳으로 출력합니다.
//! 로그 파일은 실행마다 새로 씁니다. 열 수 없으면 stderr만 사용합니다.
//! 인스턴스 락을 잡은 뒤에만 로그 파일을 엽니다.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// stderr 전용 구독자. 로그 파일을 열기 전 구간에서 `with_default`로 사용
pub fn console_subscriber() -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter())
        .with_target(false)
        .finish()
}

/// 콘솔 전용 로깅 (`--cli` 명령)
pub fn init_console() {
    console_subscriber().init();
}

/// 콘솔 + 로그 파일. 로그 파일이 열렸는지 반환합니다.
pub fn init_with_file(log_path: &Path) -> bool {
    let (file_layer, open_error) = match File::create(log_path) {
        Ok(file) => {
            let layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
                .with_timer(ChronoLocal::new("%H:%M:%S".to_string()))
                .boxed();
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();

    match open_error {
        Some(e) => {
            tracing::warn!("[Log] Could not open {}: {}, logging to stderr only", log_path.display(), e);
            false
        }
        None => true,
    }
}

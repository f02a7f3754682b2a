//! 호스트가 제공하는 외부 협력자
//!
//! 진행 표시, 실패 알림, 프로세스 실행은 알고리즘의 정확성에 영향을 주지 않는
//! 부수 출력입니다. 로그는 `tracing`으로 보내며 싱크는 호스트가 설치합니다.

use std::io;
use std::path::Path;

/// 0–100 진행률 수신자
pub trait ProgressSink {
    fn set_progress(&mut self, percent: u8);
}

impl<F: FnMut(u8)> ProgressSink for F {
    fn set_progress(&mut self, percent: u8) {
        self(percent)
    }
}

/// 진행률을 버리는 싱크
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_progress(&mut self, _percent: u8) {}
}

/// 사용자에게 실패를 알리는 수단 (대화상자, 콘솔 등)
pub trait FailureNotifier {
    fn notify_failure(&self, title: &str, message: &str);
}

/// 교체된 실행 파일을 분리된 프로세스로 실행
pub trait Launcher {
    fn launch(&self, executable: &Path, args: &[String]) -> io::Result<()>;
}

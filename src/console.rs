//! 콘솔 협력자: 진행 막대와 실패 알림
//!
//! 둘 다 stderr로 출력하므로 `--json` 모드의 stdout을 오염시키지 않습니다.

use fir_updater_lib::{FailureNotifier, ProgressSink};
use std::io::Write;

const BAR_WIDTH: usize = 30;

/// 한 줄 진행 막대. 값이 바뀔 때만 다시 그립니다.
pub struct ConsoleProgress<W: Write = std::io::Stderr> {
    out: W,
    last: Option<u8>,
}

impl ConsoleProgress {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn render_bar(percent: u8) -> String {
    let percent = percent.min(100) as usize;
    let filled = percent * BAR_WIDTH / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent
    )
}

impl<W: Write> ProgressSink for ConsoleProgress<W> {
    fn set_progress(&mut self, percent: u8) {
        if self.last == Some(percent) {
            return;
        }
        self.last = Some(percent);
        let line_end = if percent >= 100 { "\n" } else { "" };
        // 출력 실패는 업데이트 결과와 무관
        let _ = write!(self.out, "\r{}{}", render_bar(percent), line_end);
        let _ = self.out.flush();
    }
}

/// stderr에 `✗` 접두사로 실패를 알림
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl FailureNotifier for ConsoleNotifier {
    fn notify_failure(&self, title: &str, message: &str) {
        eprintln!();
        eprintln!("✗ {}", title);
        for line in message.lines() {
            eprintln!("  {}", line);
        }
    }
}

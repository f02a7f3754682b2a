pub mod cli;
pub mod config;
pub mod console;  // 진행 막대 / 실패 알림
pub mod launcher;
pub mod lock;
pub mod logging;

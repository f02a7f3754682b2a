//! 진행률 매핑 (0–100)
//!
//! | 구간          | 범위     |
//! |---------------|----------|
//! | 검증          | 0–10     |
//! | 1단계 (백업)  | 10–50    |
//! | 2단계 (교체)  | 50–99    |
//! | 완료          | 100      |
//!
//! 롤백 중에는 진행률을 보고하지 않으므로 값은 절대 감소하지 않습니다.

pub const START: u8 = 0;
pub const STATUS_WRITTEN: u8 = 5;
pub const VALIDATED: u8 = 10;
pub const STAGED: u8 = 50;
pub const SWAPPED: u8 = 99;
pub const FINISHED: u8 = 100;

/// `done/total`을 `[start, end]` 구간에 대응시킵니다. 곱셈을 먼저 하므로 잘림이 없습니다.
pub fn span(start: u8, end: u8, done: usize, total: usize) -> u8 {
    if total == 0 || done >= total {
        return end;
    }
    let width = (end - start) as usize;
    start + (width * done / total) as u8
}

/// 1단계 진행률
pub fn stage(done: usize, total: usize) -> u8 {
    span(VALIDATED, STAGED, done, total)
}

/// 2단계 진행률
pub fn swap(done: usize, total: usize) -> u8 {
    span(STAGED, SWAPPED, done, total)
}

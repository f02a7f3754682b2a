//! 이동 원장: 단계별로 완료된 이동을 기록하고 역순으로 되돌림
//!
//! 백업 단계와 교체 단계는 같은 모양(엔트리를 하나씩 옮기고, 실패하면 역순으로 되돌림)이므로
//! [`apply_moves`] 하나로 처리합니다.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use crate::fs::FileSystem;

/// 단일 엔트리 이동
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub name: OsString,
    pub from: PathBuf,
    pub to: PathBuf,
}

impl Move {
    /// `from_dir/name` → `to_dir/name`
    pub fn between(name: OsString, from_dir: &Path, to_dir: &Path) -> Self {
        Self {
            from: from_dir.join(&name),
            to: to_dir.join(&name),
            name,
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            name: self.name.clone(),
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }

    pub fn display_name(&self) -> String {
        self.name.to_string_lossy().into_owned()
    }
}

/// 롤백 중 실패한 이동
#[derive(Debug)]
pub struct UnwindFailure {
    /// 실패한 역방향 이동 (원래 이동을 뒤집은 것)
    pub step: Move,
    pub source: io::Error,
}

/// 정방향 이동 실패. 완료된 이동은 이미 되돌려진 상태입니다.
#[derive(Debug)]
pub struct ApplyFailure {
    pub failed: Move,
    pub source: io::Error,
    /// 이 단계에서 몇 개가 이동된 뒤 실패했는지
    pub completed: usize,
    pub unwind: Result<(), UnwindFailure>,
}

/// 현재 단계에서 성공한 이동 목록
#[derive(Debug, Default)]
pub struct MoveLedger {
    done: Vec<Move>,
}

impl MoveLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Move) {
        self.done.push(step);
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn moves(&self) -> &[Move] {
        &self.done
    }

    /// 기록된 이동을 역순으로 되돌립니다.
    ///
    /// 첫 실패에서 멈추며 그 이후로는 어떤 이동도 시도하지 않습니다.
    pub fn unwind<F: FileSystem + ?Sized>(self, fs: &F) -> Result<(), UnwindFailure> {
        for step in self.done.into_iter().rev() {
            let back = step.reversed();
            match fs.move_entry(&back.from, &back.to) {
                Ok(()) => {
                    tracing::info!("[Rollback] Restored {} -> {}", back.from.display(), back.to.display());
                }
                Err(source) => {
                    tracing::error!(
                        "[Rollback] Could not restore {} -> {}: {}",
                        back.from.display(),
                        back.to.display(),
                        source
                    );
                    return Err(UnwindFailure { step: back, source });
                }
            }
        }
        Ok(())
    }
}

/// 이동을 순서대로 적용하고, 첫 실패 시 완료된 이동을 되돌립니다.
///
/// `on_step(done, total)`은 이동이 성공할 때마다 호출됩니다.
pub fn apply_moves<F, P>(fs: &F, moves: Vec<Move>, mut on_step: P) -> Result<MoveLedger, ApplyFailure>
where
    F: FileSystem + ?Sized,
    P: FnMut(usize, usize),
{
    let total = moves.len();
    let mut ledger = MoveLedger::new();

    for step in moves {
        match fs.move_entry(&step.from, &step.to) {
            Ok(()) => {
                tracing::info!("[Move] {} -> {}", step.from.display(), step.to.display());
                ledger.record(step);
                on_step(ledger.len(), total);
            }
            Err(source) => {
                tracing::error!(
                    "[Move] Failed {} -> {}: {}",
                    step.from.display(),
                    step.to.display(),
                    source
                );
                let completed = ledger.len();
                let unwind = ledger.unwind(fs);
                return Err(ApplyFailure {
                    failed: step,
                    source,
                    completed,
                    unwind,
                });
            }
        }
    }

    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::StdFileSystem;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        std::fs::create_dir(&src).unwrap();
        std::fs::create_dir(&dst).unwrap();
        (tmp, src, dst)
    }

    #[test]
    fn applies_all_moves_in_order() {
        let (_tmp, src, dst) = setup();
        for name in ["a", "b", "c"] {
            std::fs::write(src.join(name), name).unwrap();
        }
        let moves = ["a", "b", "c"]
            .iter()
            .map(|n| Move::between(OsString::from(n), &src, &dst))
            .collect();

        let mut seen = Vec::new();
        let ledger = apply_moves(&StdFileSystem::new(0), moves, |done, total| seen.push((done, total))).unwrap();

        assert_eq!(ledger.len(), 3);
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
        assert!(dst.join("c").exists());
        assert!(!src.join("a").exists());
    }

    #[test]
    fn failure_unwinds_completed_moves() {
        let (_tmp, src, dst) = setup();
        std::fs::write(src.join("a"), "a").unwrap();
        // "b"는 존재하지 않으므로 두 번째 이동에서 실패
        let moves = vec![
            Move::between(OsString::from("a"), &src, &dst),
            Move::between(OsString::from("b"), &src, &dst),
        ];

        let failure = apply_moves(&StdFileSystem::new(0), moves, |_, _| {}).unwrap_err();
        assert_eq!(failure.failed.name, OsString::from("b"));
        assert_eq!(failure.completed, 1);
        assert!(failure.unwind.is_ok());
        assert!(src.join("a").exists());
        assert!(!dst.join("a").exists());
    }

    #[test]
    fn unwind_stops_at_first_failure() {
        let (_tmp, src, dst) = setup();
        for name in ["a", "b"] {
            std::fs::write(src.join(name), name).unwrap();
        }
        let moves = vec![
            Move::between(OsString::from("a"), &src, &dst),
            Move::between(OsString::from("b"), &src, &dst),
        ];
        let ledger = apply_moves(&StdFileSystem::new(0), moves, |_, _| {}).unwrap();

        // "b"의 원래 자리를 막아서 되돌리기를 실패시킨다
        std::fs::write(src.join("b"), "blocker").unwrap();
        let failure = ledger.unwind(&StdFileSystem::new(0)).unwrap_err();
        assert_eq!(failure.step.name, OsString::from("b"));
        // "a"는 시도조차 하지 않아야 함
        assert!(dst.join("a").exists());
        assert!(!src.join("a").exists());
    }
}

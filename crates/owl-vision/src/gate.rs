//! 전송 게이트.
//!
//! 마지막으로 전송(커밋)된 스냅샷과 새 캡처를 비교하여 전송 여부를 결정한다.
//!
//! - 강제 캡처(포커스/탐색 이벤트)와 첫 캡처는 항상 전송
//! - 변경 비율이 임계값을 **초과**할 때만 전송
//! - 디코딩 실패 시 전송 (fail-open)
//!
//! 전송 결정 시 분석 결과를 기다리지 않고 즉시 커밋한다.
//! 억제된 캡처는 커밋하지 않으므로 느린 변화도 마지막 전송본 기준으로 누적된다.

use image::RgbaImage;
use owl_core::models::snapshot::Snapshot;
use tracing::{debug, warn};

use crate::change_detector::ChangeDetector;

/// 전송 사유
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForwardReason {
    /// 포커스/탐색 이벤트로 인한 강제 캡처
    Forced,
    /// 비교 대상 없음
    FirstCapture,
    /// 변경 비율 초과
    Changed(f32),
    /// 디코딩 실패 (fail-open)
    DecodeFailed,
}

/// 게이트 결정
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Forward { reason: ForwardReason },
    Suppress { fraction: f32 },
}

impl GateDecision {
    pub fn is_forward(&self) -> bool {
        matches!(self, Self::Forward { .. })
    }
}

/// 커밋된 스냅샷과 그 비교 격자 (디코딩 실패 시 None)
struct Committed {
    snapshot: Snapshot,
    grid: Option<RgbaImage>,
}

/// 변화 감지 전송 게이트
pub struct ChangeGate {
    detector: ChangeDetector,
    threshold: f32,
    last: Option<Committed>,
}

impl ChangeGate {
    pub fn new(detector: ChangeDetector, threshold: f32) -> Self {
        Self {
            detector,
            threshold,
            last: None,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// 마지막 커밋 스냅샷
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last.as_ref().map(|c| &c.snapshot)
    }

    /// 전송 여부 결정. 전송이면 `snapshot`을 새 기준으로 커밋한다.
    pub fn evaluate(&mut self, snapshot: &Snapshot, forced: bool) -> GateDecision {
        let grid = match self.detector.decode_grid(&snapshot.image) {
            Ok(grid) => Some(grid),
            Err(e) => {
                warn!(snapshot = %snapshot.id, "캡처 디코딩 실패, 비교 없이 전송: {e}");
                None
            }
        };

        let reason = if forced {
            ForwardReason::Forced
        } else {
            match (&self.last, &grid) {
                (None, _) => ForwardReason::FirstCapture,
                (Some(Committed { grid: Some(prev), .. }), Some(curr)) => {
                    match self.detector.compare_grids(prev, curr) {
                        Ok(report) if report.fraction > self.threshold => {
                            ForwardReason::Changed(report.fraction)
                        }
                        Ok(report) => {
                            debug!(
                                fraction = report.fraction,
                                threshold = self.threshold,
                                "변화 미미, 전송 생략"
                            );
                            return GateDecision::Suppress {
                                fraction: report.fraction,
                            };
                        }
                        Err(e) => {
                            warn!("격자 비교 실패, 전송: {e}");
                            ForwardReason::DecodeFailed
                        }
                    }
                }
                _ => ForwardReason::DecodeFailed,
            }
        };

        self.last = Some(Committed {
            snapshot: snapshot.clone(),
            grid,
        });
        debug!(snapshot = %snapshot.id, ?reason, "스냅샷 커밋");

        GateDecision::Forward { reason }
    }
}

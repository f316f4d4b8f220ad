//! 이력 항목 모델.
//!
//! 전송이 끝난(성공 또는 실패) 스냅샷 1건. 대시보드/CLI 표시용.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::analysis::AnalysisResult;
use crate::models::snapshot::Snapshot;
use crate::models::surface::SurfaceId;

/// 분석 결과 또는 실패 사유
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// 분석 완료
    Analyzed { analysis: AnalysisResult },
    /// 분석 호출 실패 (진단용)
    Failed { error: String },
}

/// 이력 항목
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub snapshot_id: Uuid,
    /// 캡처 시각: 항목 정렬 키
    pub captured_at: DateTime<Utc>,
    pub surface_id: SurfaceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub title: String,
    /// 결과 기록 시각
    pub recorded_at: DateTime<Utc>,
    pub outcome: AnalysisOutcome,
}

impl HistoryEntry {
    /// 분석 성공 항목 생성
    pub fn analyzed(snapshot: &Snapshot, analysis: AnalysisResult) -> Self {
        Self::from_snapshot(snapshot, AnalysisOutcome::Analyzed { analysis })
    }

    /// 분석 실패 항목 생성
    pub fn failed(snapshot: &Snapshot, error: impl Into<String>) -> Self {
        Self::from_snapshot(
            snapshot,
            AnalysisOutcome::Failed {
                error: error.into(),
            },
        )
    }

    fn from_snapshot(snapshot: &Snapshot, outcome: AnalysisOutcome) -> Self {
        Self {
            snapshot_id: snapshot.id,
            captured_at: snapshot.captured_at,
            surface_id: snapshot.surface_id.clone(),
            url: snapshot.url.clone(),
            title: snapshot.title.clone(),
            recorded_at: Utc::now(),
            outcome,
        }
    }

    /// 분석 결과 (실패 항목이면 None)
    pub fn analysis(&self) -> Option<&AnalysisResult> {
        match &self.outcome {
            AnalysisOutcome::Analyzed { analysis } => Some(analysis),
            AnalysisOutcome::Failed { .. } => None,
        }
    }

    /// 실패 사유 (성공 항목이면 None)
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            AnalysisOutcome::Failed { error } => Some(error),
            AnalysisOutcome::Analyzed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::RiskLevel;
    use crate::models::snapshot::MIME_JPEG;
    use crate::models::surface::SurfaceInfo;

    fn snapshot() -> Snapshot {
        let surface = SurfaceInfo::new(SurfaceId::from("9"), "Game", "Chrome")
            .with_url("https://game.example/");
        Snapshot::capture(&surface, vec![1], MIME_JPEG)
    }

    #[test]
    fn analyzed_entry_keeps_capture_key() {
        let snap = snapshot();
        let entry = HistoryEntry::analyzed(
            &snap,
            AnalysisResult {
                risk_level: RiskLevel::Medium,
                ..Default::default()
            },
        );
        assert_eq!(entry.captured_at, snap.captured_at);
        assert_eq!(entry.snapshot_id, snap.id);
        assert_eq!(entry.analysis().unwrap().risk_level, RiskLevel::Medium);
        assert!(entry.error().is_none());
    }

    #[test]
    fn failed_entry_serde_tag() {
        let entry = HistoryEntry::failed(&snapshot(), "HTTP 500");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(entry.error(), Some("HTTP 500"));
        assert!(entry.analysis().is_none());
    }
}

//! 이력 저장소 포트.
//!
//! 구현: `owl-storage` crate (메모리, rusqlite)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::analysis::AnalysisResult;
use crate::models::history::HistoryEntry;
use crate::models::snapshot::Snapshot;

/// 분석 이력 저장소.
///
/// 항목은 캡처 시각 기준으로 정렬된다. 늦게 도착한 이전 캡처의 결과가
/// 더 최근 캡처의 `latest()`를 덮어쓰지 않아야 한다.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// 분석 결과 기록, 저장된 항목 반환
    async fn record_analysis(
        &self,
        snapshot: &Snapshot,
        analysis: AnalysisResult,
    ) -> Result<HistoryEntry, CoreError>;

    /// 분석 실패 기록 (진단용)
    async fn record_failure(
        &self,
        snapshot: &Snapshot,
        error: &str,
    ) -> Result<HistoryEntry, CoreError>;

    /// 최근 항목 (캡처 시각 내림차순)
    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, CoreError>;

    /// 가장 최근 캡처의 항목
    async fn latest(&self) -> Result<Option<HistoryEntry>, CoreError>;
}

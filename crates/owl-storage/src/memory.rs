//! 메모리 이력 저장소.
//!
//! 캡처 시각 오름차순으로 최근 N건만 유지한다.
//! 오프라인 실행과 테스트에서 사용한다.

use async_trait::async_trait;
use owl_core::error::CoreError;
use owl_core::models::analysis::AnalysisResult;
use owl_core::models::history::HistoryEntry;
use owl_core::models::snapshot::Snapshot;
use owl_core::ports::history::HistoryStore;
use parking_lot::RwLock;
use tracing::debug;

/// 기본 보관 건수
pub const DEFAULT_MAX_ENTRIES: usize = 20;

/// 크기 제한 메모리 이력 저장소
#[derive(Debug)]
pub struct MemoryHistoryStore {
    /// 캡처 시각 오름차순
    entries: RwLock<Vec<HistoryEntry>>,
    max_entries: usize,
}

impl MemoryHistoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::with_capacity(max_entries)),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn insert(&self, entry: HistoryEntry) -> HistoryEntry {
        let mut entries = self.entries.write();

        // 같은 스냅샷의 재기록은 교체
        entries.retain(|e| e.snapshot_id != entry.snapshot_id);

        // 같은 캡처 시각이면 나중 기록이 뒤로
        let pos = entries.partition_point(|e| e.captured_at <= entry.captured_at);
        entries.insert(pos, entry.clone());

        let overflow = entries.len().saturating_sub(self.max_entries);
        if overflow > 0 {
            entries.drain(..overflow);
            debug!(dropped = overflow, "이력 보관 한도 초과, 오래된 항목 제거");
        }
        entry
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn record_analysis(
        &self,
        snapshot: &Snapshot,
        analysis: AnalysisResult,
    ) -> Result<HistoryEntry, CoreError> {
        Ok(self.insert(HistoryEntry::analyzed(snapshot, analysis)))
    }

    async fn record_failure(
        &self,
        snapshot: &Snapshot,
        error: &str,
    ) -> Result<HistoryEntry, CoreError> {
        Ok(self.insert(HistoryEntry::failed(snapshot, error)))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, CoreError> {
        Ok(self.entries.read().iter().rev().take(limit).cloned().collect())
    }

    async fn latest(&self) -> Result<Option<HistoryEntry>, CoreError> {
        Ok(self.entries.read().last().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use owl_core::models::analysis::RiskLevel;
    use owl_core::models::surface::{SurfaceId, SurfaceInfo};

    fn snapshot_at(offset_secs: i64) -> Snapshot {
        let surface = SurfaceInfo::new(SurfaceId::from("w1"), "title", "app");
        Snapshot::captured_at(
            &surface,
            vec![1],
            "image/jpeg",
            Utc::now() + Duration::seconds(offset_secs),
        )
    }

    fn result(level: RiskLevel) -> AnalysisResult {
        AnalysisResult {
            risk_level: level,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn late_result_does_not_replace_newer_latest() {
        let store = MemoryHistoryStore::default();
        let older = snapshot_at(0);
        let newer = snapshot_at(2);

        store.record_analysis(&newer, result(RiskLevel::Low)).await.unwrap();
        store.record_analysis(&older, result(RiskLevel::High)).await.unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.snapshot_id, newer.id);

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].snapshot_id, newer.id);
        assert_eq!(recent[1].snapshot_id, older.id);
    }

    #[tokio::test]
    async fn bounded_to_max_entries() {
        let store = MemoryHistoryStore::new(3);
        let snaps: Vec<_> = (0..5).map(snapshot_at).collect();
        for s in &snaps {
            store.record_analysis(s, result(RiskLevel::Low)).await.unwrap();
        }

        assert_eq!(store.len(), 3);
        let ids: Vec<_> = store
            .recent(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.snapshot_id)
            .collect();
        assert_eq!(ids, vec![snaps[4].id, snaps[3].id, snaps[2].id]);
    }

    #[tokio::test]
    async fn late_result_older_than_window_is_dropped() {
        let store = MemoryHistoryStore::new(2);
        store.record_analysis(&snapshot_at(5), result(RiskLevel::Low)).await.unwrap();
        store.record_analysis(&snapshot_at(6), result(RiskLevel::Low)).await.unwrap();

        let stale = snapshot_at(0);
        store.record_failure(&stale, "timeout").await.unwrap();

        assert_eq!(store.len(), 2);
        let recent = store.recent(10).await.unwrap();
        assert!(recent.iter().all(|e| e.snapshot_id != stale.id));
    }

    #[tokio::test]
    async fn failure_recorded_with_error() {
        let store = MemoryHistoryStore::default();
        let snap = snapshot_at(0);
        store.record_failure(&snap, "Analysis failed").await.unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.error(), Some("Analysis failed"));
        assert!(latest.analysis().is_none());
    }

    #[tokio::test]
    async fn rerecording_same_snapshot_replaces() {
        let store = MemoryHistoryStore::default();
        let snap = snapshot_at(0);
        store.record_failure(&snap, "first try").await.unwrap();
        store.record_analysis(&snap, result(RiskLevel::Medium)).await.unwrap();

        assert_eq!(store.len(), 1);
        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.analysis().unwrap().risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn empty_store() {
        let store = MemoryHistoryStore::default();
        assert!(store.is_empty());
        assert!(store.latest().await.unwrap().is_none());
        assert!(store.recent(5).await.unwrap().is_empty());
    }
}

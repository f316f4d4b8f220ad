//! 보호자 알림 및 오프라인 전송기.
//!
//! `LogAlertNotifier`는 고위험 결과를 경고 로그로 남긴다. 같은 서피스에서
//! 연속으로 고위험이 나오면 쿨다운 동안 한 번만 알린다.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use owl_core::error::CoreError;
use owl_core::models::analysis::AnalysisResult;
use owl_core::models::history::HistoryEntry;
use owl_core::models::snapshot::Snapshot;
use owl_core::models::surface::SurfaceId;
use owl_core::ports::analysis::AnalysisForwarder;
use owl_core::ports::notifier::AlertNotifier;
use tracing::{debug, info, warn};

/// 기본 알림 쿨다운 (초)
const DEFAULT_COOLDOWN_SECS: i64 = 60;

/// 로그 기반 고위험 알림
pub struct LogAlertNotifier {
    cooldown: Duration,
    last_alert: Mutex<HashMap<SurfaceId, DateTime<Utc>>>,
}

impl LogAlertNotifier {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_alert: Mutex::new(HashMap::new()),
        }
    }

    /// 알림 여부 판정 후 발송 시각 기록.
    /// 쿨다운이 지난 기록은 함께 정리한다.
    fn should_alert(&self, surface: &SurfaceId, now: DateTime<Utc>) -> Result<bool, CoreError> {
        let mut last = self
            .last_alert
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))?;

        last.retain(|_, at| now - *at < self.cooldown);
        if last.contains_key(surface) {
            return Ok(false);
        }
        last.insert(surface.clone(), now);
        Ok(true)
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.last_alert.lock().map(|m| m.len()).unwrap_or(0)
    }
}

impl Default for LogAlertNotifier {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_COOLDOWN_SECS))
    }
}

#[async_trait]
impl AlertNotifier for LogAlertNotifier {
    async fn notify_high_risk(&self, entry: &HistoryEntry) -> Result<(), CoreError> {
        let Some(analysis) = entry.analysis() else {
            return Ok(());
        };
        if !self.should_alert(&entry.surface_id, Utc::now())? {
            debug!(surface = %entry.surface_id, "알림 쿨다운 중");
            return Ok(());
        }
        let threats: Vec<&str> = analysis
            .detected_threats
            .iter()
            .map(|t| t.threat_type.as_str())
            .collect();

        warn!(
            snapshot = %entry.snapshot_id,
            url = entry.url.as_deref().unwrap_or("-"),
            title = %entry.title,
            score = analysis.commercial_pressure_score,
            threats = ?threats,
            "고위험 화면 감지: {}",
            analysis.summary_for_parent
        );
        Ok(())
    }
}

/// 오프라인 전송기: 분석하지 않고 저위험 결과를 돌려준다
#[derive(Debug, Default)]
pub struct OfflineForwarder;

#[async_trait]
impl AnalysisForwarder for OfflineForwarder {
    async fn analyze(&self, snapshot: &Snapshot) -> Result<AnalysisResult, CoreError> {
        info!(
            snapshot = %snapshot.id,
            surface = %snapshot.surface_id,
            bytes = snapshot.image_len(),
            "오프라인 모드: 분석 생략"
        );
        Ok(AnalysisResult::default())
    }

    fn name(&self) -> &str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use owl_core::models::analysis::RiskLevel;
    use owl_core::models::surface::SurfaceInfo;

    fn snapshot(id: &str) -> Snapshot {
        let surface = SurfaceInfo::new(SurfaceId::from(id), "Shop", "Browser");
        Snapshot::capture(&surface, vec![1, 2], "image/jpeg")
    }

    #[test]
    fn cooldown_per_surface() {
        let notifier = LogAlertNotifier::new(Duration::seconds(30));
        let a = SurfaceId::from("a");
        let b = SurfaceId::from("b");
        let t0 = Utc::now();

        assert!(notifier.should_alert(&a, t0).unwrap());
        assert!(!notifier.should_alert(&a, t0 + Duration::seconds(10)).unwrap());
        assert!(notifier.should_alert(&b, t0 + Duration::seconds(10)).unwrap());
        assert!(notifier.should_alert(&a, t0 + Duration::seconds(31)).unwrap());
    }

    #[test]
    fn expired_entries_are_pruned() {
        let notifier = LogAlertNotifier::new(Duration::seconds(30));
        let t0 = Utc::now();
        for i in 0..50 {
            let id = SurfaceId::from(format!("w{i}").as_str());
            assert!(notifier.should_alert(&id, t0).unwrap());
        }
        assert_eq!(notifier.tracked(), 50);

        let late = SurfaceId::from("late");
        assert!(notifier.should_alert(&late, t0 + Duration::seconds(31)).unwrap());
        assert_eq!(notifier.tracked(), 1);
    }

    #[tokio::test]
    async fn failed_entry_does_not_consume_cooldown() {
        let notifier = LogAlertNotifier::default();
        let failed = HistoryEntry::failed(&snapshot("w3"), "timeout");
        notifier.notify_high_risk(&failed).await.unwrap();
        assert_eq!(notifier.tracked(), 0);

        let analysis = AnalysisResult {
            risk_level: RiskLevel::High,
            ..Default::default()
        };
        notifier
            .notify_high_risk(&HistoryEntry::analyzed(&snapshot("w3"), analysis))
            .await
            .unwrap();
        assert_eq!(notifier.tracked(), 1);
    }

    #[tokio::test]
    async fn notify_high_risk_entry() {
        let notifier = LogAlertNotifier::default();
        let analysis = AnalysisResult {
            risk_level: RiskLevel::High,
            ..Default::default()
        };
        let entry = HistoryEntry::analyzed(&snapshot("w1"), analysis);
        notifier.notify_high_risk(&entry).await.unwrap();
        notifier.notify_high_risk(&entry).await.unwrap();
    }

    #[tokio::test]
    async fn offline_forwarder_returns_low_risk() {
        let forwarder = OfflineForwarder;
        let result = forwarder.analyze(&snapshot("w2")).await.unwrap();
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(forwarder.name(), "offline");
    }
}

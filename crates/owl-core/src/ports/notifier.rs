//! 보호자 알림 포트.
//!
//! 구현: `owl-app` (tracing 로그 기반)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::history::HistoryEntry;

/// 고위험 결과 알림
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// `risk_level == High` 결과 수신 시 호출
    async fn notify_high_risk(&self, entry: &HistoryEntry) -> Result<(), CoreError>;
}

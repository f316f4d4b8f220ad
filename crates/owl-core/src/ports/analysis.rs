//! 분석 전송 포트.
//!
//! 구현: `owl-network` crate (클라우드 함수 / Gemini 직접 호출)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::analysis::AnalysisResult;
use crate::models::snapshot::Snapshot;

/// 스냅샷을 외부 분석기로 전송하고 위험 분류를 돌려받는다
#[async_trait]
pub trait AnalysisForwarder: Send + Sync {
    /// 스냅샷 분석 요청
    async fn analyze(&self, snapshot: &Snapshot) -> Result<AnalysisResult, CoreError>;

    /// 전송기 이름 (로그용)
    fn name(&self) -> &str;
}

//! 분석 결과 모델.
//!
//! 외부 멀티모달 AI가 반환하는 아동 안전 위험 분류.
//! 샘플러는 이 값을 해석하지 않고 이력 저장소로 넘기기만 한다.

use serde::{Deserialize, Serialize};

/// 위험 수준
///
/// 모델 출력은 대소문자가 일정하지 않아 소문자/대문자 표기도 받는다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[default]
    #[serde(alias = "low", alias = "LOW")]
    Low,
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "high", alias = "HIGH")]
    High,
}

/// 위협 분류 (디지털 안전 4대 축)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreatCategory {
    /// 보는 것 (유해 콘텐츠)
    #[serde(alias = "content", alias = "CONTENT")]
    Content,
    /// 만나는 사람 (그루밍, 괴롭힘)
    #[serde(alias = "contact", alias = "CONTACT")]
    Contact,
    /// 하는 행동 (개인정보 노출 등)
    #[serde(alias = "conduct", alias = "CONDUCT")]
    Conduct,
    /// 상업적 영향 (다크 패턴, 루트박스)
    #[serde(alias = "commercial", alias = "COMMERCIAL")]
    Commercial,
    /// 그 밖의 분류. 나머지 결과는 그대로 보존한다
    #[serde(other)]
    Other,
}

/// 감지된 위협 1건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedThreat {
    pub category: ThreatCategory,
    /// 위협 유형 (예: "Loot box", "Fake timer")
    #[serde(rename = "type", default)]
    pub threat_type: String,
    #[serde(default)]
    pub description: String,
}

/// 분석 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// 위험 수준
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// 상업적 압력 점수 (0 ~ 100): 구버전 키 `ad_pressure_score` 허용
    #[serde(default, alias = "ad_pressure_score")]
    pub commercial_pressure_score: f32,
    /// 감지된 위협 목록
    #[serde(default)]
    pub detected_threats: Vec<DetectedThreat>,
    /// 보호자용 요약
    #[serde(default)]
    pub summary_for_parent: String,
}

impl AnalysisResult {
    /// 보호자 알림이 필요한 결과인지
    pub fn is_high_risk(&self) -> bool {
        self.risk_level == RiskLevel::High
    }

    /// 점수를 0 ~ 100 범위로 보정
    pub fn normalized(mut self) -> Self {
        self.commercial_pressure_score = self.commercial_pressure_score.clamp(0.0, 100.0);
        self
    }
}

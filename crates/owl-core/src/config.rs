//! 애플리케이션 설정 구조체.
//!
//! 샘플링 주기, 변화 임계값, 신뢰 도메인, 분석 전송 대상, 이력 보관 등
//! 런타임 설정을 정의한다. [`crate::config_manager::ConfigManager`]가
//! JSON 파일로 로드/저장한다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 샘플러 설정
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// 신뢰 도메인 (캡처 제외)
    #[serde(default)]
    pub exclusion: ExclusionConfig,
    /// 분석 전송 설정
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// 분석 이력 설정
    #[serde(default)]
    pub history: HistoryConfig,
    /// 포커스 감시 설정
    #[serde(default)]
    pub focus: FocusConfig,
    /// 탐색 이벤트 브리지 설정
    #[serde(default)]
    pub navigation: NavigationConfig,
}

// ============================================================
// 샘플러 설정
// ============================================================

/// 변화 감지 샘플러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// 주기 캡처 간격 (밀리초)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// 전송 임계값: 변경 픽셀 비율이 이 값을 초과하면 전송 (0.0~1.0)
    #[serde(default = "default_change_threshold")]
    pub change_threshold: f32,
    /// 픽셀 변경 판정 채널 차이 (0~255)
    #[serde(default = "default_pixel_threshold")]
    pub pixel_threshold: u8,
    /// 비교 격자 크기 (정사각형 한 변)
    #[serde(default = "default_diff_size")]
    pub diff_size: u32,
    /// 캡처 JPEG 품질 (1~100)
    #[serde(default = "default_capture_quality")]
    pub capture_quality: u8,
    /// 캡처 최대 너비 (픽셀)
    #[serde(default = "default_max_capture_width")]
    pub max_capture_width: u32,
    /// 이벤트 큐 용량
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl SamplerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    /// 잘못된 값을 허용 범위로 보정
    pub fn sanitized(mut self) -> Self {
        self.change_threshold = if self.change_threshold.is_finite() {
            self.change_threshold.clamp(0.0, 1.0)
        } else {
            default_change_threshold()
        };
        self.capture_quality = self.capture_quality.clamp(1, 100);
        self.diff_size = self.diff_size.max(1);
        self.max_capture_width = self.max_capture_width.max(1);
        self.queue_capacity = self.queue_capacity.max(1);
        self
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            change_threshold: default_change_threshold(),
            pixel_threshold: default_pixel_threshold(),
            diff_size: default_diff_size(),
            capture_quality: default_capture_quality(),
            max_capture_width: default_max_capture_width(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

// ============================================================
// 신뢰 도메인 설정
// ============================================================

/// 보호자가 지정한 신뢰 도메인 목록. 하위 도메인까지 캡처하지 않는다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionConfig {
    #[serde(default)]
    pub trusted_domains: Vec<String>,
}

// ============================================================
// 분석 설정
// ============================================================

/// 분석 전송 대상
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisProvider {
    /// 클라우드 함수 (`analyzeImage`) 호출
    #[default]
    Cloud,
    /// Gemini API 직접 호출
    Gemini,
}

/// 분석 요청과 함께 전송되는 탐지 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// 인플루언서 마케팅
    #[serde(default = "default_true")]
    pub influencers: bool,
    /// 긴급성/희소성 압박 ("지금만", 카운트다운)
    #[serde(default = "default_true")]
    pub urgency: bool,
    /// 광고 및 구매 유도
    #[serde(default = "default_true")]
    pub ads: bool,
    /// 확률형 아이템
    #[serde(default = "default_true")]
    pub lootboxes: bool,
    /// 보호자 추가 지시
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            influencers: true,
            urgency: true,
            ads: true,
            lootboxes: true,
            custom_prompt: None,
        }
    }
}

/// 분석 전송 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub provider: AnalysisProvider,
    /// 클라우드 프로젝트 ID
    #[serde(default)]
    pub project_id: String,
    /// 클라우드 함수 리전
    #[serde(default = "default_region")]
    pub region: String,
    /// 클라우드 함수 이름
    #[serde(default = "default_function_name")]
    pub function_name: String,
    /// 엔드포인트 직접 지정 (테스트/에뮬레이터용)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// 보호자 계정 ID
    #[serde(default = "default_uid")]
    pub uid: String,
    /// Gemini API 키 (`Gemini` 제공자 전용)
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    /// Gemini 모델 이름
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub detection: DetectionSettings,
}

impl AnalysisConfig {
    /// 클라우드 함수 URL. `endpoint`가 있으면 그대로 사용.
    pub fn cloud_function_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint.trim().to_string(),
            _ => format!(
                "https://{}-{}.cloudfunctions.net/{}",
                self.region, self.project_id, self.function_name
            ),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: AnalysisProvider::default(),
            project_id: String::new(),
            region: default_region(),
            function_name: default_function_name(),
            endpoint: None,
            uid: default_uid(),
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            timeout_secs: default_timeout_secs(),
            detection: DetectionSettings::default(),
        }
    }
}

// ============================================================
// 이력/포커스 설정
// ============================================================

/// 분석 이력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// 보관 최대 항목 수
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// SQLite DB 파일 경로 (None이면 플랫폼 기본 경로)
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            db_path: None,
        }
    }
}

/// 포커스 감시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusConfig {
    /// 포커스 창 폴링 주기 (밀리초)
    #[serde(default = "default_focus_poll_ms")]
    pub poll_interval_ms: u64,
}

impl FocusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_focus_poll_ms(),
        }
    }
}

/// 탐색 이벤트 브리지 설정.
///
/// 브라우저 확장의 네이티브 메시징 호스트가 줄 단위 JSON으로
/// 서피스 URL과 페이지 로드 완료를 알려준다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// TCP 수신 주소 (예: "127.0.0.1:47631"). 없으면 비활성
    #[serde(default)]
    pub listen_addr: Option<String>,
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_true() -> bool {
    true
}
fn default_interval_ms() -> u64 {
    2000
}
fn default_change_threshold() -> f32 {
    0.05
}
fn default_pixel_threshold() -> u8 {
    25
}
fn default_diff_size() -> u32 {
    64
}
fn default_capture_quality() -> u8 {
    40
}
fn default_max_capture_width() -> u32 {
    1280
}
fn default_queue_capacity() -> usize {
    64
}
fn default_region() -> String {
    "us-central1".to_string()
}
fn default_function_name() -> String {
    "analyzeImage".to_string()
}
fn default_uid() -> String {
    "demo_parent_user".to_string()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_max_entries() -> usize {
    20
}
fn default_focus_poll_ms() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_sampler_contract() {
        let config = AppConfig::default();
        assert_eq!(config.sampler.interval_ms, 2000);
        assert!((config.sampler.change_threshold - 0.05).abs() < f32::EPSILON);
        assert_eq!(config.sampler.pixel_threshold, 25);
        assert_eq!(config.sampler.diff_size, 64);
        assert_eq!(config.history.max_entries, 20);
        assert_eq!(config.analysis.uid, "demo_parent_user");
        assert!(config.analysis.detection.lootboxes);
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.sampler.capture_quality, 40);
        assert_eq!(config.focus.poll_interval_ms, 500);
        assert!(config.navigation.listen_addr.is_none());
        assert_eq!(config.analysis.provider, AnalysisProvider::Cloud);
        assert!(config.exclusion.trusted_domains.is_empty());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let json = r#"{"sampler": {"interval_ms": 500}, "analysis": {"provider": "gemini"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.sampler.interval_ms, 500);
        assert_eq!(config.sampler.queue_capacity, 64);
        assert_eq!(config.analysis.provider, AnalysisProvider::Gemini);
        assert_eq!(config.analysis.region, "us-central1");
    }

    #[test]
    fn cloud_function_url_from_parts() {
        let config = AnalysisConfig {
            project_id: "owl-demo".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.cloud_function_url(),
            "https://us-central1-owl-demo.cloudfunctions.net/analyzeImage"
        );
    }

    #[test]
    fn cloud_function_url_endpoint_override() {
        let config = AnalysisConfig {
            endpoint: Some("http://127.0.0.1:5001/analyze".to_string()),
            ..Default::default()
        };
        assert_eq!(config.cloud_function_url(), "http://127.0.0.1:5001/analyze");
    }

    #[test]
    fn sanitized_clamps_out_of_range() {
        let config = SamplerConfig {
            change_threshold: 3.0,
            capture_quality: 0,
            diff_size: 0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(config.change_threshold, 1.0);
        assert_eq!(config.capture_quality, 1);
        assert_eq!(config.diff_size, 1);

        let nan = SamplerConfig {
            change_threshold: f32::NAN,
            ..Default::default()
        }
        .sanitized();
        assert!((nan.change_threshold - 0.05).abs() < f32::EPSILON);
    }

    #[test]
    fn custom_prompt_omitted_when_absent() {
        let json = serde_json::to_value(DetectionSettings::default()).unwrap();
        assert!(json.get("custom_prompt").is_none());
        assert_eq!(json["influencers"], true);
    }
}

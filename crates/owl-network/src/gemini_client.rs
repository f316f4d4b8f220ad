//! Gemini 직접 호출 분석 클라이언트.
//!
//! 클라우드 함수 없이 `generateContent`를 직접 호출한다.
//! 프롬프트와 스냅샷 이미지(`inline_data`)를 한 요청으로 보내고
//! 모델 텍스트 응답에서 JSON을 추출한다.

use async_trait::async_trait;
use owl_core::config::{AnalysisConfig, DetectionSettings};
use owl_core::error::CoreError;
use owl_core::models::analysis::AnalysisResult;
use owl_core::models::snapshot::Snapshot;
use owl_core::ports::analysis::AnalysisForwarder;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::http::{build_client, check_response, excerpt, map_send_error, RetryPolicy};
use crate::prompt::build_analysis_prompt;

/// Gemini API 기본 URL
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini 분석 전송기
#[derive(Debug)]
pub struct GeminiAnalysisClient {
    http_client: reqwest::Client,
    base_url: String,
    /// API 키 (메모리에만 유지)
    api_key: String,
    model: String,
    detection: DetectionSettings,
    retry: RetryPolicy,
}

impl GeminiAnalysisClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self, CoreError> {
        let api_key = config
            .gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CoreError::Config("analysis.gemini_api_key 미설정".to_string()))?
            .to_string();

        let base_url = config
            .endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| GEMINI_BASE_URL.to_string());

        debug!(base_url = %base_url, model = %config.gemini_model, "GeminiAnalysisClient 초기화");

        Ok(Self {
            http_client: build_client(config.timeout())?,
            base_url,
            api_key,
            model: config.gemini_model.clone(),
            detection: config.detection.clone(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn request_body(&self, snapshot: &Snapshot) -> Value {
        json!({
            "contents": [{
                "parts": [
                    { "text": build_analysis_prompt(&self.detection) },
                    {
                        "inline_data": {
                            "mime_type": snapshot.mime,
                            "data": snapshot.image_base64(),
                        }
                    }
                ]
            }]
        })
    }

    async fn send_once(&self, url: &str, body: &Value) -> Result<AnalysisResult, CoreError> {
        let resp = self
            .http_client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        let resp = check_response(resp).await?;
        let text = resp
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("응답 읽기 실패: {e}")))?;
        parse_generate_response(&text)
    }
}

/// `generateContent` 응답에서 분석 결과 추출
pub fn parse_generate_response(body: &str) -> Result<AnalysisResult, CoreError> {
    let response: Value = serde_json::from_str(body).map_err(|e| {
        CoreError::Analysis(format!("Gemini 응답 JSON 파싱 실패: {e} (raw: {})", excerpt(body)))
    })?;

    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("알 수 없는 오류");
        return Err(CoreError::Analysis(format!("Gemini 오류: {message}")));
    }

    // candidates[0].content.parts[0].text
    let text = response
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::Analysis("Gemini 응답에서 텍스트를 찾을 수 없음".to_string()))?;

    let json_str = extract_json(text);
    let analysis: AnalysisResult = serde_json::from_str(json_str).map_err(|e| {
        CoreError::Analysis(format!("분석 결과 파싱 실패: {e} (raw: {})", excerpt(json_str)))
    })?;
    Ok(analysis.normalized())
}

/// 마크다운 코드 블록 제거 후 JSON 객체 구간 추출
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[async_trait]
impl AnalysisForwarder for GeminiAnalysisClient {
    async fn analyze(&self, snapshot: &Snapshot) -> Result<AnalysisResult, CoreError> {
        let url = self.endpoint();
        let body = self.request_body(snapshot);
        debug!(snapshot = %snapshot.id, model = %self.model, "Gemini 분석 요청");

        let result = self.retry.execute(|| self.send_once(&url, &body)).await;
        if let Err(e) = &result {
            warn!(snapshot = %snapshot.id, "Gemini 분석 실패: {e}");
        }
        result
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use owl_core::models::analysis::{RiskLevel, ThreatCategory};
    use owl_core::models::surface::{SurfaceId, SurfaceInfo};
    use std::time::Duration;

    fn config(endpoint: Option<String>) -> AnalysisConfig {
        AnalysisConfig {
            endpoint,
            gemini_api_key: Some("test-key".to_string()),
            gemini_model: "gemini-test".to_string(),
            ..Default::default()
        }
    }

    fn candidate(text: &str) -> String {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
    }

    #[test]
    fn requires_api_key() {
        let err = GeminiAnalysisClient::new(&AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn default_endpoint() {
        let client = GeminiAnalysisClient::new(&config(None)).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn parses_fenced_json() {
        let body = candidate(
            "```json\n{\"risk_level\": \"High\", \"commercial_pressure_score\": 90, \"summary_for_parent\": \"fake timer\"}\n```",
        );
        let analysis = parse_generate_response(&body).unwrap();
        assert_eq!(analysis.risk_level, RiskLevel::High);
        assert_eq!(analysis.summary_for_parent, "fake timer");
    }

    #[test]
    fn parses_legacy_score_key() {
        let body = candidate(r#"{"ad_pressure_score": 30, "risk_level": "Low"}"#);
        let analysis = parse_generate_response(&body).unwrap();
        assert_eq!(analysis.commercial_pressure_score, 30.0);
    }

    #[test]
    fn parses_lowercase_risk_and_unknown_category() {
        let body = candidate(
            r#"{"risk_level": "high", "detected_threats": [{"category": "Privacy", "type": "Location share"}]}"#,
        );
        let analysis = parse_generate_response(&body).unwrap();
        assert_eq!(analysis.risk_level, RiskLevel::High);
        assert_eq!(analysis.detected_threats[0].category, ThreatCategory::Other);
        assert_eq!(analysis.detected_threats[0].threat_type, "Location share");
    }

    #[test]
    fn api_error_is_analysis_error() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid"}}"#;
        match parse_generate_response(body) {
            Err(CoreError::Analysis(msg)) => assert!(msg.contains("API key not valid")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_json_text_is_analysis_error() {
        let body = candidate("I cannot help with that.");
        assert!(matches!(
            parse_generate_response(&body),
            Err(CoreError::Analysis(_))
        ));
    }

    #[tokio::test]
    async fn analyze_sends_prompt_and_inline_image() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::Regex(r#""data":"AQID""#.to_string()),
                mockito::Matcher::Regex(r#""mime_type":"image/jpeg""#.to_string()),
                mockito::Matcher::Regex("Project Owl".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(candidate(r#"{"risk_level": "Medium", "commercial_pressure_score": 40}"#))
            .create_async()
            .await;

        let client = GeminiAnalysisClient::new(&config(Some(server.url())))
            .unwrap()
            .with_retry(RetryPolicy {
                max_retries: 0,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            });
        let surface = SurfaceInfo::new(SurfaceId::from(3u32), "Video", "Browser");
        let snapshot = Snapshot::capture(&surface, vec![1, 2, 3], "image/jpeg");

        let analysis = client.analyze(&snapshot).await.unwrap();
        assert_eq!(analysis.risk_level, RiskLevel::Medium);
        mock.assert_async().await;
    }
}

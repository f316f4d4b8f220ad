//! 클라우드 함수 분석 클라이언트.
//!
//! callable 함수 프로토콜로 `analyzeImage`를 호출한다.
//!
//! 요청: `POST {url}` `{"data": {"imageData", "url", "settings", "uid"}}`
//! 응답: `{"result": {...}}` 또는 `{"error": {"message", "status"}}`

use async_trait::async_trait;
use owl_core::config::{AnalysisConfig, DetectionSettings};
use owl_core::error::CoreError;
use owl_core::models::analysis::AnalysisResult;
use owl_core::models::snapshot::Snapshot;
use owl_core::ports::analysis::AnalysisForwarder;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::http::{build_client, check_response, excerpt, map_send_error, RetryPolicy};

/// 클라우드 함수 분석 전송기
#[derive(Debug)]
pub struct CloudAnalysisClient {
    http_client: reqwest::Client,
    url: String,
    uid: String,
    detection: DetectionSettings,
    retry: RetryPolicy,
}

impl CloudAnalysisClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self, CoreError> {
        if config.endpoint.is_none() && config.project_id.trim().is_empty() {
            return Err(CoreError::Config(
                "analysis.project_id 또는 analysis.endpoint 설정 필요".to_string(),
            ));
        }

        let url = config.cloud_function_url();
        debug!(url = %url, uid = %config.uid, "CloudAnalysisClient 초기화");

        Ok(Self {
            http_client: build_client(config.timeout())?,
            url,
            uid: config.uid.clone(),
            detection: config.detection.clone(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 요청 본문 구성
    fn request_body(&self, snapshot: &Snapshot) -> Value {
        json!({
            "data": {
                "imageData": snapshot.to_data_url(),
                "url": snapshot.url.as_deref().unwrap_or_default(),
                "settings": self.detection,
                "uid": self.uid,
            }
        })
    }

    async fn send_once(&self, body: &Value) -> Result<AnalysisResult, CoreError> {
        let resp = self
            .http_client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = resp.status();
        // 재시도 가능 상태는 공용 매핑 사용
        let resp = if status.as_u16() == 429 || (502..=504).contains(&status.as_u16()) {
            check_response(resp).await?
        } else {
            resp
        };

        let text = resp
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("응답 읽기 실패: {e}")))?;
        parse_callable_response(status.is_success(), &text)
    }
}

/// callable 함수 응답 파싱
///
/// 본문에 `error`가 있으면 그 메시지를, 없고 상태가 실패면 본문 일부를
/// `CoreError::Analysis`로 반환한다.
pub fn parse_callable_response(success: bool, body: &str) -> Result<AnalysisResult, CoreError> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) if success => {
            return Err(CoreError::Analysis(format!(
                "응답 JSON 파싱 실패: {e} (raw: {})",
                excerpt(body)
            )))
        }
        Err(_) => {
            return Err(CoreError::Analysis(format!(
                "분석 함수 오류: {}",
                excerpt(body)
            )))
        }
    };

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| error.as_str().map(String::from))
            .unwrap_or_else(|| error.to_string());
        return Err(CoreError::Analysis(message));
    }

    if !success {
        return Err(CoreError::Analysis(format!(
            "분석 함수 오류: {}",
            excerpt(body)
        )));
    }

    let result = value
        .get("result")
        .ok_or_else(|| CoreError::Analysis("응답에 result 없음".to_string()))?;

    let analysis: AnalysisResult = serde_json::from_value(result.clone()).map_err(|e| {
        CoreError::Analysis(format!("분석 결과 형식 오류: {e} (raw: {})", excerpt(&result.to_string())))
    })?;
    Ok(analysis.normalized())
}

#[async_trait]
impl AnalysisForwarder for CloudAnalysisClient {
    async fn analyze(&self, snapshot: &Snapshot) -> Result<AnalysisResult, CoreError> {
        let body = self.request_body(snapshot);
        debug!(snapshot = %snapshot.id, url = %self.url, "클라우드 분석 요청");

        let result = self.retry.execute(|| self.send_once(&body)).await;
        if let Err(e) = &result {
            warn!(snapshot = %snapshot.id, "클라우드 분석 실패: {e}");
        }
        result
    }

    fn name(&self) -> &str {
        "cloud-function"
    }
}

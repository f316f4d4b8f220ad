//! 공용 HTTP 처리: 클라이언트 생성, 상태 코드 매핑, 재시도.

use std::future::Future;
use std::time::Duration;

use owl_core::error::CoreError;
use tracing::warn;

/// Retry-After 헤더가 없을 때 기본 대기 (초)
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// 응답 본문 로그/에러 메시지 최대 길이
const MAX_BODY_EXCERPT: usize = 200;

/// 타임아웃 설정된 reqwest 클라이언트 생성
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, CoreError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 생성 실패: {e}")))
}

/// HTTP 상태 코드를 `CoreError`로 매핑
///
/// - 429 → `RateLimit` (Retry-After 헤더, 기본 60초)
/// - 502/503/504 → `ServiceUnavailable`
/// - 그 외 → `Analysis`
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let retry_after = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let text = resp.text().await.unwrap_or_else(|e| {
        warn!("응답 본문 읽기 실패: {e}");
        String::new()
    });
    let text = excerpt(&text);

    match status.as_u16() {
        401 | 403 => Err(CoreError::Analysis(format!("인증 실패 ({status}): {text}"))),
        404 => Err(CoreError::Analysis(format!("분석 엔드포인트 없음: {text}"))),
        429 => Err(CoreError::RateLimit {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        }),
        502..=504 => Err(CoreError::ServiceUnavailable(format!("{status}: {text}"))),
        _ => Err(CoreError::Analysis(format!("API 에러 ({status}): {text}"))),
    }
}

/// reqwest 전송 에러 매핑
pub fn map_send_error(e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        CoreError::Network(format!("요청 타임아웃: {e}"))
    } else {
        CoreError::Network(format!("요청 전송 실패: {e}"))
    }
}

pub fn excerpt(text: &str) -> String {
    text.chars().take(MAX_BODY_EXCERPT).collect()
}

/// 지수 백오프 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// 재시도 없음
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// 재시도가 포함된 요청 실행
    ///
    /// exponential backoff: 1s → 2s → 4s (최대 `max_delay`).
    /// `RateLimit`은 서버 지정 대기 시간을 따르되 `max_delay`를 넘지 않는다.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_retryable() || attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    let wait = match &e {
                        CoreError::RateLimit { retry_after_secs } => {
                            Duration::from_secs(*retry_after_secs).min(self.max_delay)
                        }
                        _ => delay,
                    };
                    warn!(
                        "요청 실패 (시도 {}/{}): {e}, {wait:?} 후 재시도",
                        attempt + 1,
                        self.max_retries + 1
                    );
                    tokio::time::sleep(wait).await;
                    delay = (delay * 2).min(self.max_delay);
                    attempt += 1;
                }
            }
        }
    }
}

//! OWL 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 이 타입을 그대로 반환하거나 `#[from] CoreError`로 래핑한다.
//! 샘플러 관점에서 치명적인 에러는 없다. 캡처/디코딩/전송 실패 모두 로그 후 계속 진행.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 캡처 실패 (서피스 없음, 권한 거부, 미지원 서피스)
    #[error("캡처 에러: {0}")]
    Capture(String),

    /// 이미지 디코딩 실패 (비교 불가)
    #[error("이미지 디코딩 에러: {0}")]
    Decode(String),

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// Rate Limit 초과 (429)
    #[error("요청 한도 초과, {retry_after_secs}초 후 재시도")]
    RateLimit {
        /// 재시도 대기 시간 (초)
        retry_after_secs: u64,
    },

    /// 서비스 일시 불가 (503)
    #[error("서비스 일시 불가: {0}")]
    ServiceUnavailable(String),

    /// 분석 함수가 에러를 반환했거나 응답을 해석할 수 없음
    #[error("분석 에러: {0}")]
    Analysis(String),

    /// 이력 저장소 에러
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 재시도하면 성공할 수 있는 에러인지 판별
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::Network(_) | CoreError::ServiceUnavailable(_) | CoreError::RateLimit { .. }
        )
    }
}

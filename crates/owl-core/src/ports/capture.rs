//! 캡처 포트.
//!
//! 구현: `owl-vision` crate (xcap + image)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::exclusion::ExclusionList;
use crate::models::surface::{SurfaceId, SurfaceInfo};

/// 서피스 캡처 제공자
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// 서피스 식별자를 URL/제목 등 주소 정보로 해석.
    ///
    /// 서피스가 사라졌으면 `CoreError::Capture`.
    async fn resolve(&self, surface: &SurfaceId) -> Result<SurfaceInfo, CoreError>;

    /// 서피스의 압축 이미지(저화질) 캡처
    async fn capture(&self, surface: &SurfaceInfo) -> Result<Vec<u8>, CoreError>;

    /// 캡처 이미지의 MIME 타입
    fn mime(&self) -> &str;
}

/// 제외 목록 제공자. 매 캡처 직전에 동기 조회
pub trait ExclusionListProvider: Send + Sync {
    fn exclusion_list(&self) -> ExclusionList;
}

/// 서피스별 현재 URL 등록처.
///
/// 창 캡처만으로는 URL을 알 수 없으므로 브라우저 연동 같은 외부 소스가 알려준다.
pub trait UrlHintSink: Send + Sync {
    /// URL 등록 (None이면 해제)
    fn set_url_hint(&self, surface: &SurfaceId, url: Option<String>);
}

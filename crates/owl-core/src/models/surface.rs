//! 서피스(모니터링 대상 창/탭) 모델.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// 서피스 식별자 (창 핸들, 탭 ID 등)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub String);

impl SurfaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SurfaceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u32> for SurfaceId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

/// 캡처 제공자가 해석한 서피스 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceInfo {
    /// 서피스 식별자
    pub id: SurfaceId,
    /// 표시 중인 URL (브라우저 탭인 경우)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 창/탭 제목
    #[serde(default)]
    pub title: String,
    /// 소유 앱 이름
    #[serde(default)]
    pub app_name: String,
}

/// 서피스 주소 분류: 제외 목록 검사 및 캡처 가능 여부 판단용
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceAddress {
    /// http/https 페이지: 호스트명 기준 제외 목록 검사
    Host(String),
    /// 브라우저 내부 페이지 또는 해석 불가 URL: 캡처하지 않음
    Internal,
    /// URL 없는 일반 데스크톱 창: 제외 목록 적용 불가, 캡처 진행
    Opaque,
}

impl SurfaceInfo {
    /// URL 없는 서피스 생성
    pub fn new(id: SurfaceId, title: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            id,
            url: None,
            title: title.into(),
            app_name: app_name.into(),
        }
    }

    /// URL 지정
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// 주소 분류
    pub fn address(&self) -> SurfaceAddress {
        let Some(raw) = self.url.as_deref() else {
            return SurfaceAddress::Opaque;
        };
        if raw.trim().is_empty() {
            return SurfaceAddress::Opaque;
        }

        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => match url.host_str() {
                Some(host) => SurfaceAddress::Host(host.trim_end_matches('.').to_lowercase()),
                None => SurfaceAddress::Internal,
            },
            // chrome://, edge://, about:, chrome-extension://, file:// 등
            _ => SurfaceAddress::Internal,
        }
    }
}

//! 창 캡처.
//!
//! xcap 기반 `CaptureProvider` 구현. 서피스는 최상위 창이며
//! `SurfaceId`는 창 ID 문자열이다. 창 자체는 URL을 모르므로
//! 브라우저 연동 등 URL을 아는 이벤트 소스가 [`UrlHintSink`]로 알려준다.

use std::collections::HashMap;

use async_trait::async_trait;
use image::DynamicImage;
use owl_core::config::SamplerConfig;
use owl_core::error::CoreError;
use owl_core::models::snapshot::MIME_JPEG;
use owl_core::models::surface::{SurfaceId, SurfaceInfo};
use owl_core::ports::capture::{CaptureProvider, UrlHintSink};
use parking_lot::RwLock;
use tracing::debug;
use xcap::Window;

use crate::encoder::compress_capture;

/// xcap 창 캡처 제공자
pub struct XcapCaptureProvider {
    quality: u8,
    max_width: u32,
    url_hints: RwLock<HashMap<SurfaceId, String>>,
}

impl XcapCaptureProvider {
    pub fn new(quality: u8, max_width: u32) -> Self {
        Self {
            quality,
            max_width,
            url_hints: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &SamplerConfig) -> Self {
        Self::new(config.capture_quality, config.max_capture_width)
    }

    /// 현재 포커스된 창 ID (없으면 None)
    pub fn focused_window() -> Result<Option<SurfaceId>, CoreError> {
        let windows =
            Window::all().map_err(|e| CoreError::Capture(format!("창 목록 조회 실패: {e}")))?;
        Ok(windows
            .iter()
            .find(|w| w.is_focused().unwrap_or(false) && !w.is_minimized().unwrap_or(false))
            .and_then(|w| w.id().ok())
            .map(SurfaceId::from))
    }

    fn find_window(surface: &SurfaceId) -> Result<Window, CoreError> {
        let windows =
            Window::all().map_err(|e| CoreError::Capture(format!("창 목록 조회 실패: {e}")))?;
        windows
            .into_iter()
            .find(|w| w.id().map(|id| id.to_string() == surface.as_str()).unwrap_or(false))
            .ok_or_else(|| CoreError::Capture(format!("창을 찾을 수 없음: {surface}")))
    }
}

impl UrlHintSink for XcapCaptureProvider {
    fn set_url_hint(&self, surface: &SurfaceId, url: Option<String>) {
        let mut hints = self.url_hints.write();
        match url {
            Some(url) => {
                hints.insert(surface.clone(), url);
            }
            None => {
                hints.remove(surface);
            }
        }
    }
}

#[async_trait]
impl CaptureProvider for XcapCaptureProvider {
    async fn resolve(&self, surface: &SurfaceId) -> Result<SurfaceInfo, CoreError> {
        let id = surface.clone();
        let (title, app_name) = tokio::task::spawn_blocking(move || {
            let window = Self::find_window(&id)?;
            Ok::<_, CoreError>((
                window.title().unwrap_or_default(),
                window.app_name().unwrap_or_default(),
            ))
        })
        .await
        .map_err(|e| CoreError::Internal(format!("캡처 태스크 실패: {e}")))??;

        let mut info = SurfaceInfo::new(surface.clone(), title, app_name);
        if let Some(url) = self.url_hints.read().get(surface) {
            info = info.with_url(url.clone());
        }
        Ok(info)
    }

    async fn capture(&self, surface: &SurfaceInfo) -> Result<Vec<u8>, CoreError> {
        let id = surface.id.clone();
        let (quality, max_width) = (self.quality, self.max_width);
        tokio::task::spawn_blocking(move || {
            let window = Self::find_window(&id)?;
            let image = window
                .capture_image()
                .map_err(|e| CoreError::Capture(format!("창 캡처 실패: {e}")))?;
            debug!("창 캡처 완료: {} {}x{}", id, image.width(), image.height());
            compress_capture(&DynamicImage::ImageRgba8(image), quality, max_width)
        })
        .await
        .map_err(|e| CoreError::Internal(format!("캡처 태스크 실패: {e}")))?
    }

    fn mime(&self) -> &str {
        MIME_JPEG
    }
}

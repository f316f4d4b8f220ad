//! 스냅샷(캡처 1회) 모델.
//!
//! 스냅샷은 캡처 시점에 한 번 생성되고 이후 변경되지 않는다.
//! 다음 캡처가 이전 스냅샷을 대체할 뿐이며, 이미지 바이트는 `Arc`로 공유되어
//! 전송 태스크에 값으로 넘겨도 복사 비용이 없다.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::surface::{SurfaceId, SurfaceInfo};

/// JPEG MIME 타입
pub const MIME_JPEG: &str = "image/jpeg";

/// 캡처 스냅샷 (불변)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// 스냅샷 ID
    pub id: Uuid,
    /// 캡처 시각: 이력 저장소의 정렬/갱신 키
    pub captured_at: DateTime<Utc>,
    /// 캡처한 서피스
    pub surface_id: SurfaceId,
    /// 캡처 당시 URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 캡처 당시 제목
    #[serde(default)]
    pub title: String,
    /// 압축 이미지 (손실 압축, 전송 크기 우선)
    #[serde(with = "image_bytes")]
    pub image: Arc<[u8]>,
    /// 이미지 MIME 타입
    pub mime: String,
}

impl Snapshot {
    /// 현재 시각으로 스냅샷 생성
    pub fn capture(surface: &SurfaceInfo, image: Vec<u8>, mime: impl Into<String>) -> Self {
        Self::captured_at(surface, image, mime, Utc::now())
    }

    /// 지정 시각으로 스냅샷 생성
    pub fn captured_at(
        surface: &SurfaceInfo,
        image: Vec<u8>,
        mime: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            captured_at,
            surface_id: surface.id.clone(),
            url: surface.url.clone(),
            title: surface.title.clone(),
            image: Arc::from(image),
            mime: mime.into(),
        }
    }

    /// 이미지 크기 (바이트)
    pub fn image_len(&self) -> usize {
        self.image.len()
    }

    /// `data:<mime>;base64,...` 형식 데이터 URL
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, B64.encode(&self.image))
    }

    /// Base64 본문만 (data URL 접두어 없음)
    pub fn image_base64(&self) -> String {
        B64.encode(&self.image)
    }
}

/// 이미지 바이트를 Base64 문자열로 직렬화
mod image_bytes {
    use base64::{engine::general_purpose::STANDARD as B64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S: Serializer>(bytes: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&B64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<[u8]>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        B64.decode(encoded.as_bytes())
            .map(Arc::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> SurfaceInfo {
        SurfaceInfo::new(SurfaceId::from("tab-1"), "Example", "Firefox")
            .with_url("https://example.com/")
    }

    #[test]
    fn capture_copies_surface_fields() {
        let snap = Snapshot::capture(&surface(), vec![1, 2, 3], MIME_JPEG);
        assert_eq!(snap.surface_id.as_str(), "tab-1");
        assert_eq!(snap.url.as_deref(), Some("https://example.com/"));
        assert_eq!(snap.title, "Example");
        assert_eq!(snap.image_len(), 3);
    }

    #[test]
    fn clones_share_image_bytes() {
        let snap = Snapshot::capture(&surface(), vec![0u8; 1024], MIME_JPEG);
        let copy = snap.clone();
        assert!(Arc::ptr_eq(&snap.image, &copy.image));
        assert_eq!(snap.id, copy.id);
    }

    #[test]
    fn data_url_format() {
        let snap = Snapshot::capture(&surface(), b"abc".to_vec(), MIME_JPEG);
        assert_eq!(snap.to_data_url(), "data:image/jpeg;base64,YWJj");
        assert_eq!(snap.image_base64(), "YWJj");
    }

    #[test]
    fn serde_keeps_image() {
        let snap = Snapshot::capture(&surface(), vec![9, 8, 7], MIME_JPEG);
        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(&*back.image, &[9, 8, 7]);
        assert_eq!(back.captured_at, snap.captured_at);
    }
}

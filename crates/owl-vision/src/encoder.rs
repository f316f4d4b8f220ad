//! 스냅샷 JPEG 인코더.
//!
//! 분석 전송용 캡처는 화질보다 전송량을 우선한다.
//! 너비 제한 후 낮은 품질의 JPEG로 압축한다.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use owl_core::error::CoreError;
use tracing::debug;

use crate::resize::fit_width;

/// 기본 캡처 품질
pub const DEFAULT_QUALITY: u8 = 40;

/// JPEG 인코딩 (RGB, 알파 제거)
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CoreError> {
    let rgb = image.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| CoreError::Internal(format!("JPEG 인코딩 실패: {e}")))?;
    Ok(out)
}

/// 캡처 압축: 최대 너비로 축소 후 JPEG
pub fn compress_capture(
    image: &DynamicImage,
    quality: u8,
    max_width: u32,
) -> Result<Vec<u8>, CoreError> {
    let fitted = fit_width(image, max_width)?;
    let encoded = encode_jpeg(&fitted, quality)?;

    debug!(
        "캡처 압축: {}x{} → {}x{}, {} bytes (품질 {})",
        image.width(),
        image.height(),
        fitted.width(),
        fitted.height(),
        encoded.len(),
        quality
    );

    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn gradient(w: u32, h: u32) -> DynamicImage {
        let mut img = RgbaImage::new(w, h);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255]);
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn jpeg_has_soi_marker_and_decodes() {
        let bytes = encode_jpeg(&gradient(120, 80), DEFAULT_QUALITY).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (120, 80));
    }

    #[test]
    fn lower_quality_is_smaller() {
        let img = gradient(320, 240);
        let low = encode_jpeg(&img, 20).unwrap();
        let high = encode_jpeg(&img, 95).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn compress_capture_limits_width() {
        let bytes = compress_capture(&gradient(1600, 900), DEFAULT_QUALITY, 800).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (800, 450));
    }
}

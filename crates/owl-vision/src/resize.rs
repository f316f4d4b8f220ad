//! 고속 리사이즈.
//!
//! fast_image_resize 기반 RGBA 리사이즈. 비교 격자 축소와
//! 캡처 이미지 너비 제한에서 공용으로 사용한다.

use fast_image_resize::{images::Image as FirImage, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, RgbaImage};
use owl_core::error::CoreError;

/// RGBA 리사이즈 (Bilinear)
///
/// 목표 크기가 원본과 같으면 복사만 한다.
pub fn resize_rgba(image: &DynamicImage, width: u32, height: u32) -> Result<RgbaImage, CoreError> {
    let (src_w, src_h) = (image.width(), image.height());
    if src_w == 0 || src_h == 0 {
        return Err(CoreError::Decode("빈 이미지".to_string()));
    }
    if width == 0 || height == 0 {
        return Err(CoreError::Internal(format!(
            "목표 이미지 크기 0: {width}x{height}"
        )));
    }

    let src_rgba = image.to_rgba8();
    if src_w == width && src_h == height {
        return Ok(src_rgba);
    }

    let src_image = FirImage::from_vec_u8(src_w, src_h, src_rgba.into_raw(), PixelType::U8x4)
        .map_err(|e| CoreError::Internal(format!("소스 이미지 생성 실패: {e}")))?;
    let mut dst_image = FirImage::new(width, height, PixelType::U8x4);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| CoreError::Internal(format!("리사이즈 실패: {e}")))?;

    RgbaImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| CoreError::Internal("결과 이미지 생성 실패".to_string()))
}

/// 너비 제한 리사이즈. 비율 유지, 확대하지 않음
pub fn fit_width(image: &DynamicImage, max_width: u32) -> Result<DynamicImage, CoreError> {
    let (w, h) = (image.width(), image.height());
    if w <= max_width || max_width == 0 {
        return Ok(image.clone());
    }
    let new_h = ((h as u64 * max_width as u64) / w as u64).max(1) as u32;
    resize_rgba(image, max_width, new_h).map(DynamicImage::ImageRgba8)
}

//! 변화 감지 (diff 엔진).
//!
//! 두 이미지를 64x64 격자로 축소한 뒤 픽셀 단위로 비교한다.
//! R, G, B 중 한 채널이라도 임계값을 넘게 달라지면 변경 픽셀로 센다.
//! 알파 채널은 비교하지 않는다.

use image::{DynamicImage, RgbaImage};
use owl_core::error::CoreError;
use tracing::trace;

use crate::resize::resize_rgba;

/// 비교 격자 한 변 크기
pub const DIFF_SIZE: u32 = 64;

/// 픽셀 변경 판정 채널 차이 (초과 시 변경)
pub const PIXEL_THRESHOLD: u8 = 25;

/// 비교 결과
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeReport {
    /// 변경 픽셀 수
    pub changed_pixels: u32,
    /// 격자 전체 픽셀 수
    pub total_pixels: u32,
    /// 변경 비율 (0.0 ~ 1.0)
    pub fraction: f32,
}

/// 격자 크기/임계값 설정 가능한 비교기
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeDetector {
    pixel_threshold: u8,
    size: u32,
}

impl ChangeDetector {
    pub fn new(pixel_threshold: u8, size: u32) -> Self {
        Self {
            pixel_threshold,
            size: size.max(1),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// 비교 격자로 축소
    pub fn downscale(&self, image: &DynamicImage) -> Result<RgbaImage, CoreError> {
        downscale(image, self.size)
    }

    /// 압축 이미지 바이트를 디코딩하여 격자로 축소
    pub fn decode_grid(&self, bytes: &[u8]) -> Result<RgbaImage, CoreError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| CoreError::Decode(format!("이미지 디코딩 실패: {e}")))?;
        self.downscale(&image)
    }

    /// 이미 축소된 두 격자 비교
    pub fn compare_grids(&self, prev: &RgbaImage, curr: &RgbaImage) -> Result<ChangeReport, CoreError> {
        if prev.dimensions() != curr.dimensions() {
            return Err(CoreError::Internal(format!(
                "격자 크기 불일치: {:?} vs {:?}",
                prev.dimensions(),
                curr.dimensions()
            )));
        }

        let threshold = self.pixel_threshold;
        let changed_pixels = prev
            .as_raw()
            .chunks_exact(4)
            .zip(curr.as_raw().chunks_exact(4))
            .filter(|(p, c)| {
                p[0].abs_diff(c[0]) > threshold
                    || p[1].abs_diff(c[1]) > threshold
                    || p[2].abs_diff(c[2]) > threshold
            })
            .count() as u32;

        let total_pixels = prev.width() * prev.height();
        let fraction = if total_pixels == 0 {
            0.0
        } else {
            changed_pixels as f32 / total_pixels as f32
        };

        trace!(changed_pixels, total_pixels, fraction, "격자 비교");

        Ok(ChangeReport {
            changed_pixels,
            total_pixels,
            fraction,
        })
    }

    /// 두 이미지 비교 (원본 해상도 무관)
    pub fn compare(&self, prev: &DynamicImage, curr: &DynamicImage) -> Result<ChangeReport, CoreError> {
        let prev_grid = self.downscale(prev)?;
        let curr_grid = self.downscale(curr)?;
        self.compare_grids(&prev_grid, &curr_grid)
    }

    /// 압축 이미지 바이트 비교. 어느 쪽이든 디코딩 실패 시 `CoreError::Decode`
    pub fn compare_encoded(&self, prev: &[u8], curr: &[u8]) -> Result<ChangeReport, CoreError> {
        let prev_grid = self.decode_grid(prev)?;
        let curr_grid = self.decode_grid(curr)?;
        self.compare_grids(&prev_grid, &curr_grid)
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(PIXEL_THRESHOLD, DIFF_SIZE)
    }
}

/// `size x size` 격자로 축소 (Bilinear). 이미 같은 크기면 그대로
pub fn downscale(image: &DynamicImage, size: u32) -> Result<RgbaImage, CoreError> {
    resize_rgba(image, size, size)
}

/// 기본 설정(64x64, 임계값 25)으로 두 이미지 비교
pub fn change_fraction(prev: &DynamicImage, curr: &DynamicImage) -> Result<ChangeReport, CoreError> {
    ChangeDetector::default().compare(prev, curr)
}

/// 기본 설정으로 압축 이미지 바이트 비교
pub fn change_fraction_encoded(prev: &[u8], curr: &[u8]) -> Result<ChangeReport, CoreError> {
    ChangeDetector::default().compare_encoded(prev, curr)
}

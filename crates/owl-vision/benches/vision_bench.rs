//! owl-vision 성능 벤치마크
//!
//! 실행: cargo bench -p owl-vision
//!
//! 벤치마크 대상:
//! - 격자 비교 (change_fraction, change_fraction_encoded)
//! - 캡처 압축 (compress_capture)

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{DynamicImage, Rgba, RgbaImage};
use owl_vision::{change_detector, encoder};
use std::hint::black_box;

fn create_test_image(width: u32, height: u32, seed: u8) -> DynamicImage {
    let mut img = RgbaImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let r = (x as u8).wrapping_add(seed).wrapping_mul(17);
        let g = (y as u8).wrapping_add(seed).wrapping_mul(31);
        let b = (x as u8).wrapping_add(y as u8).wrapping_add(seed);
        *pixel = Rgba([r, g, b, 255]);
    }
    DynamicImage::ImageRgba8(img)
}

fn bench_change_fraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("change_fraction");

    for (width, height) in [(640, 480), (1280, 720), (1920, 1080)] {
        group.throughput(Throughput::Elements((width * height) as u64));
        let prev = create_test_image(width, height, 1);
        let curr = create_test_image(width, height, 9);

        group.bench_with_input(
            BenchmarkId::new("decoded", format!("{width}x{height}")),
            &(&prev, &curr),
            |b, (prev, curr)| b.iter(|| black_box(change_detector::change_fraction(prev, curr))),
        );

        let prev_jpeg = encoder::encode_jpeg(&prev, encoder::DEFAULT_QUALITY).unwrap();
        let curr_jpeg = encoder::encode_jpeg(&curr, encoder::DEFAULT_QUALITY).unwrap();
        group.bench_with_input(
            BenchmarkId::new("encoded", format!("{width}x{height}")),
            &(&prev_jpeg, &curr_jpeg),
            |b, (prev, curr)| {
                b.iter(|| black_box(change_detector::change_fraction_encoded(prev, curr)))
            },
        );
    }

    group.finish();
}

fn bench_compress_capture(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress_capture");

    for (width, height) in [(1280, 720), (1920, 1080), (3840, 2160)] {
        group.throughput(Throughput::Elements((width * height) as u64));
        let img = create_test_image(width, height, 42);

        group.bench_with_input(
            BenchmarkId::new("q40_w1280", format!("{width}x{height}")),
            &img,
            |b, img| b.iter(|| black_box(encoder::compress_capture(img, 40, 1280))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_change_fraction, bench_compress_capture);
criterion_main!(benches);

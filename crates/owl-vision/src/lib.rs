//! # owl-vision
//!
//! 변화 감지 샘플러.
//! 포커스된 서피스를 저화질로 캡처하고 64x64 격자 비교로
//! 의미 있는 변화가 있을 때만 분석기로 전송한다.
//!
//! - [`change_detector`]: 격자 축소 + 픽셀 비교
//! - [`gate`]: 마지막 전송본 대비 전송 여부 판정
//! - [`sampler`]: 이벤트 큐, 상태 기계, 주기 타이머
//! - [`capture`]: xcap 창 캡처 어댑터

pub mod capture;
pub mod change_detector;
pub mod encoder;
pub mod exclusion;
pub mod gate;
pub mod resize;
pub mod sampler;

//! # owl-network
//!
//! 분석 전송 어댑터.
//! 샘플러가 전송을 결정한 스냅샷을 외부 분석기로 보내고
//! 위험 분류 결과([`owl_core::models::analysis::AnalysisResult`])를 돌려받는다.
//!
//! - [`cloud_client`]: callable 클라우드 함수 (`analyzeImage`)
//! - [`gemini_client`]: Gemini `generateContent` 직접 호출
//! - [`prompt`]: 분류 프롬프트 생성

pub mod cloud_client;
pub mod gemini_client;
pub mod http;
pub mod prompt;

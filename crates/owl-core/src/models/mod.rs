//! OWL 도메인 모델.
//!
//! 샘플러, 분석 전송기, 이력 저장소가 공유하는 데이터 구조체를 정의한다.
//! 외부로 나가는 모델은 `serde` Serialize/Deserialize를 구현한다.

pub mod analysis;
pub mod exclusion;
pub mod history;
pub mod snapshot;
pub mod surface;

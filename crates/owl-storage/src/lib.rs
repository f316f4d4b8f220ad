//! # owl-storage
//!
//! 분석 이력 저장소 어댑터.
//! [`HistoryStore`](owl_core::ports::history::HistoryStore) 포트를 구현한다.
//!
//! - [`sqlite::SqliteHistoryStore`]: WAL 모드 SQLite, 스냅샷 이미지까지 보관
//! - [`memory::MemoryHistoryStore`]: 프로세스 수명 동안만 유지

pub mod memory;
pub mod migration;
pub mod sqlite;

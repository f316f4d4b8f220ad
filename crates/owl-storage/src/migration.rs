//! 스키마 마이그레이션.
//!
//! 버전 기반 SQLite 스키마 관리.

use rusqlite::Connection;
use tracing::{debug, info};

/// 현재 스키마 버전
const CURRENT_VERSION: u32 = 1;

/// 스키마 마이그레이션 실행
pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = get_version(conn)?;
    info!("현재 스키마 버전: {current}, 목표: {CURRENT_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn get_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    let result: Result<u32, _> = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    );
    result.or(Ok(0))
}

/// V1: history 테이블
///
/// `captured_at_us`는 정렬 키(UTC 마이크로초), `captured_at`은 표시용 RFC3339.
fn migrate_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V1 실행: history 테이블");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS history (
            snapshot_id TEXT PRIMARY KEY,
            captured_at TEXT NOT NULL,
            captured_at_us INTEGER NOT NULL,
            surface_id TEXT NOT NULL,
            url TEXT,
            title TEXT NOT NULL DEFAULT '',
            mime TEXT NOT NULL,
            image BLOB NOT NULL,
            status TEXT NOT NULL,
            risk_level TEXT,
            analysis TEXT,
            error TEXT,
            recorded_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_history_captured ON history(captured_at_us);

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
}

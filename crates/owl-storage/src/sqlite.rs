//! SQLite 이력 저장소.
//!
//! `HistoryStore` 포트 구현. 스냅샷 메타데이터, 이미지 BLOB, 분석 결과(JSON)를
//! 한 행에 저장하고, 매 기록 후 캡처 시각 기준 최근 N건만 남긴다.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use owl_core::error::CoreError;
use owl_core::models::analysis::AnalysisResult;
use owl_core::models::history::{AnalysisOutcome, HistoryEntry};
use owl_core::models::snapshot::Snapshot;
use owl_core::models::surface::SurfaceId;
use owl_core::ports::history::HistoryStore;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::migration;

const STATUS_ANALYZED: &str = "analyzed";
const STATUS_FAILED: &str = "failed";

const SELECT_COLUMNS: &str =
    "snapshot_id, captured_at, surface_id, url, title, status, analysis, error, recorded_at";

/// SQLite 이력 저장소
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
    max_entries: usize,
}

impl SqliteHistoryStore {
    /// 파일 기반 저장소 생성
    pub fn open(path: &Path, max_entries: usize) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| CoreError::Storage(format!("SQLite 열기 실패: {e}")))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )
        .map_err(|e| CoreError::Storage(format!("PRAGMA 설정 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Storage(format!("마이그레이션 실패: {e}")))?;

        info!("이력 저장소 초기화: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            max_entries: max_entries.max(1),
        })
    }

    /// 인메모리 저장소 생성 (테스트용)
    pub fn open_in_memory(max_entries: usize) -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Storage(format!("인메모리 SQLite 생성 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Storage(format!("마이그레이션 실패: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            max_entries: max_entries.max(1),
        })
    }

    /// 저장된 스냅샷 이미지 (MIME, 바이트)
    pub fn load_image(&self, snapshot_id: &Uuid) -> Result<Option<(String, Vec<u8>)>, CoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT mime, image FROM history WHERE snapshot_id = ?1",
            params![snapshot_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| CoreError::Storage(format!("이미지 조회 실패: {e}")))
    }

    /// 저장 건수
    pub fn count(&self) -> Result<usize, CoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))
            .map_err(|e| CoreError::Storage(format!("건수 조회 실패: {e}")))?;
        Ok(count as usize)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))
    }

    fn insert(&self, snapshot: &Snapshot, entry: HistoryEntry) -> Result<HistoryEntry, CoreError> {
        let (status, risk_level, analysis, error) = match &entry.outcome {
            AnalysisOutcome::Analyzed { analysis } => (
                STATUS_ANALYZED,
                Some(format!("{:?}", analysis.risk_level)),
                Some(serde_json::to_string(analysis)?),
                None,
            ),
            AnalysisOutcome::Failed { error } => (STATUS_FAILED, None, None, Some(error.clone())),
        };

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Storage(format!("트랜잭션 시작 실패: {e}")))?;

        tx.execute(
            "INSERT OR REPLACE INTO history
                (snapshot_id, captured_at, captured_at_us, surface_id, url, title, mime, image,
                 status, risk_level, analysis, error, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                entry.snapshot_id.to_string(),
                entry.captured_at.to_rfc3339(),
                entry.captured_at.timestamp_micros(),
                entry.surface_id.as_str(),
                entry.url,
                entry.title,
                snapshot.mime,
                &snapshot.image[..],
                status,
                risk_level,
                analysis,
                error,
                entry.recorded_at.to_rfc3339(),
            ],
        )
        .map_err(|e| CoreError::Storage(format!("이력 저장 실패: {e}")))?;

        let dropped = tx
            .execute(
                "DELETE FROM history WHERE snapshot_id NOT IN (
                    SELECT snapshot_id FROM history
                    ORDER BY captured_at_us DESC, rowid DESC
                    LIMIT ?1
                )",
                params![self.max_entries as i64],
            )
            .map_err(|e| CoreError::Storage(format!("이력 정리 실패: {e}")))?;

        tx.commit()
            .map_err(|e| CoreError::Storage(format!("트랜잭션 커밋 실패: {e}")))?;

        if dropped > 0 {
            debug!(dropped, "이력 보관 한도 초과, 오래된 항목 제거");
        }
        Ok(entry)
    }

    fn query_entries(&self, limit: usize) -> Result<Vec<HistoryEntry>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {SELECT_COLUMNS} FROM history
                 ORDER BY captured_at_us DESC, rowid DESC
                 LIMIT ?1"
            ))
            .map_err(|e| CoreError::Storage(format!("쿼리 준비 실패: {e}")))?;

        let rows = stmt
            .query_map(params![limit.min(i64::MAX as usize) as i64], read_row)
            .map_err(|e| CoreError::Storage(format!("이력 조회 실패: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| CoreError::Storage(format!("행 읽기 실패: {e}")))?;
            entries.push(raw.into_entry()?);
        }
        Ok(entries)
    }
}

/// DB 행 원본 (파싱 전)
struct RawRow {
    snapshot_id: String,
    captured_at: String,
    surface_id: String,
    url: Option<String>,
    title: String,
    status: String,
    analysis: Option<String>,
    error: Option<String>,
    recorded_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        snapshot_id: row.get(0)?,
        captured_at: row.get(1)?,
        surface_id: row.get(2)?,
        url: row.get(3)?,
        title: row.get(4)?,
        status: row.get(5)?,
        analysis: row.get(6)?,
        error: row.get(7)?,
        recorded_at: row.get(8)?,
    })
}

impl RawRow {
    fn into_entry(self) -> Result<HistoryEntry, CoreError> {
        let outcome = if self.status == STATUS_ANALYZED {
            let json = self.analysis.unwrap_or_default();
            let analysis: AnalysisResult = serde_json::from_str(&json)?;
            AnalysisOutcome::Analyzed { analysis }
        } else {
            AnalysisOutcome::Failed {
                error: self.error.unwrap_or_default(),
            }
        };

        Ok(HistoryEntry {
            snapshot_id: Uuid::parse_str(&self.snapshot_id)
                .map_err(|e| CoreError::Storage(format!("스냅샷 ID 파싱 실패: {e}")))?,
            captured_at: parse_time(&self.captured_at)?,
            surface_id: SurfaceId::new(self.surface_id),
            url: self.url,
            title: self.title,
            recorded_at: parse_time(&self.recorded_at)?,
            outcome,
        })
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CoreError::Storage(format!("시각 파싱 실패: {value}: {e}")))
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn record_analysis(
        &self,
        snapshot: &Snapshot,
        analysis: AnalysisResult,
    ) -> Result<HistoryEntry, CoreError> {
        self.insert(snapshot, HistoryEntry::analyzed(snapshot, analysis))
    }

    async fn record_failure(
        &self,
        snapshot: &Snapshot,
        error: &str,
    ) -> Result<HistoryEntry, CoreError> {
        self.insert(snapshot, HistoryEntry::failed(snapshot, error))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, CoreError> {
        self.query_entries(limit)
    }

    async fn latest(&self) -> Result<Option<HistoryEntry>, CoreError> {
        Ok(self.query_entries(1)?.into_iter().next())
    }
}

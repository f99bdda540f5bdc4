//! Call record store
//!
//! Full-document overwrite on save; the pipeline is the only writer after
//! upload, so no finer-grained update paths are needed.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    AudioSource, CallFailure, CallRecord, CallStatus, HistoryEntry, PerformanceMetrics,
    PipelineStep, StepStatus,
};

/// Save call record (insert or full overwrite)
pub async fn save_call(pool: &SqlitePool, call: &CallRecord) -> Result<()> {
    // Serialize nested documents before touching the pool
    let transcript = call
        .transcript
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let analysis = call
        .analysis
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let coaching_plan = call
        .coaching_plan
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let error = call.error.as_ref().map(serde_json::to_string).transpose()?;
    let performance = serde_json::to_string(&call.performance)?;

    sqlx::query(
        r#"
        INSERT INTO calls (
            call_id, user_id, audio_path, audio_name, audio_size, audio_mime,
            status, transcript, analysis, coaching_plan, error, performance,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(call_id) DO UPDATE SET
            status = excluded.status,
            transcript = excluded.transcript,
            analysis = excluded.analysis,
            coaching_plan = excluded.coaching_plan,
            error = excluded.error,
            performance = excluded.performance,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(call.call_id.to_string())
    .bind(call.user_id.map(|u| u.to_string()))
    .bind(&call.audio.path)
    .bind(&call.audio.original_name)
    .bind(call.audio.size_bytes as i64)
    .bind(&call.audio.mime_type)
    .bind(call.status.as_str())
    .bind(transcript)
    .bind(analysis)
    .bind(coaching_plan)
    .bind(error)
    .bind(performance)
    .bind(call.created_at.to_rfc3339())
    .bind(call.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load call record by id
pub async fn load_call(pool: &SqlitePool, call_id: Uuid) -> Result<Option<CallRecord>> {
    let row = sqlx::query(
        r#"
        SELECT call_id, user_id, audio_path, audio_name, audio_size, audio_mime,
               status, transcript, analysis, coaching_plan, error, performance,
               created_at, updated_at
        FROM calls
        WHERE call_id = ?
        "#,
    )
    .bind(call_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(row_to_call).transpose()
}

/// Load call record, failing if absent
pub async fn get_call(pool: &SqlitePool, call_id: Uuid) -> Result<CallRecord> {
    load_call(pool, call_id)
        .await?
        .ok_or(Error::CallNotFound(call_id))
}

/// Append one processing history entry
///
/// Insert-only: the audit trail is never mutated or deleted.
pub async fn append_history(pool: &SqlitePool, entry: &HistoryEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO processing_history (
            call_id, step, status, message, timestamp, duration_ms, error
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.call_id.to_string())
    .bind(entry.step.as_str())
    .bind(entry.status.as_str())
    .bind(&entry.message)
    .bind(entry.timestamp.to_rfc3339())
    .bind(entry.duration_ms.map(|d| d as i64))
    .bind(&entry.error)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load processing history for a call, in append order
pub async fn load_history(pool: &SqlitePool, call_id: Uuid) -> Result<Vec<HistoryEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT call_id, step, status, message, timestamp, duration_ms, error
        FROM processing_history
        WHERE call_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(call_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let step: String = row.get("step");
            let step = PipelineStep::parse(&step)
                .ok_or_else(|| Error::Database(sqlx::Error::Decode(
                    format!("unknown pipeline step: {}", step).into(),
                )))?;
            let status: String = row.get("status");
            let status = StepStatus::parse(&status)
                .ok_or_else(|| Error::Database(sqlx::Error::Decode(
                    format!("unknown step status: {}", status).into(),
                )))?;
            let timestamp: String = row.get("timestamp");
            let timestamp = parse_timestamp(&timestamp)?;
            let call_id: String = row.get("call_id");
            let call_id = parse_uuid(&call_id)?;
            let duration_ms: Option<i64> = row.get("duration_ms");

            Ok(HistoryEntry {
                call_id,
                step,
                status,
                message: row.get("message"),
                timestamp,
                duration_ms: duration_ms.map(|d| d as u64),
                error: row.get("error"),
            })
        })
        .collect()
}

fn row_to_call(row: sqlx::sqlite::SqliteRow) -> Result<CallRecord> {
    let call_id: String = row.get("call_id");
    let call_id = parse_uuid(&call_id)?;

    let user_id: Option<String> = row.get("user_id");
    let user_id = user_id.as_deref().map(parse_uuid).transpose()?;

    let status: String = row.get("status");
    let status = CallStatus::parse(&status).ok_or_else(|| {
        Error::Database(sqlx::Error::Decode(
            format!("unknown call status: {}", status).into(),
        ))
    })?;

    let transcript: Option<String> = row.get("transcript");
    let transcript = transcript
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;

    let analysis: Option<String> = row.get("analysis");
    let analysis = analysis.as_deref().map(serde_json::from_str).transpose()?;

    let coaching_plan: Option<String> = row.get("coaching_plan");
    let coaching_plan = coaching_plan
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;

    let error: Option<String> = row.get("error");
    let error: Option<CallFailure> = error.as_deref().map(serde_json::from_str).transpose()?;

    let performance: String = row.get("performance");
    let performance: PerformanceMetrics = serde_json::from_str(&performance)?;

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    let audio_size: i64 = row.get("audio_size");

    Ok(CallRecord {
        call_id,
        user_id,
        audio: AudioSource {
            path: row.get("audio_path"),
            original_name: row.get("audio_name"),
            size_bytes: audio_size as u64,
            mime_type: row.get("audio_mime"),
        },
        status,
        transcript,
        analysis,
        coaching_plan,
        error,
        performance,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s)
        .map_err(|e| Error::Database(sqlx::Error::Decode(format!("invalid uuid: {}", e).into())))
}

fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| {
            Error::Database(sqlx::Error::Decode(
                format!("invalid timestamp: {}", e).into(),
            ))
        })
}

//! Call API handlers
//!
//! POST /calls (upload), GET /calls/{id}, GET /calls/{id}/status,
//! GET /calls/{id}/history, POST /calls/{id}/retry
//!
//! Boundary validation failures (missing file, wrong type, oversized upload)
//! are rejected synchronously here and never enter the pipeline state machine.

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{AudioSource, CallFailure, CallRecord, CallStatus, HistoryEntry};
use crate::AppState;

/// POST /calls response
#[derive(Debug, Serialize)]
pub struct UploadCallResponse {
    pub call_id: Uuid,
    pub status: CallStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// GET /calls/{id}/status response
#[derive(Debug, Serialize)]
pub struct CallStatusResponse {
    pub call_id: Uuid,
    pub status: CallStatus,
    /// Approximate completion percentage
    pub progress: u8,
    pub error: Option<CallFailure>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// POST /calls/{id}/retry response
#[derive(Debug, Serialize)]
pub struct RetryCallResponse {
    pub call_id: Uuid,
    pub status: CallStatus,
    /// Pipeline runs that have failed for this call so far
    pub previous_attempts: u32,
}

/// POST /calls
///
/// Multipart upload with an `audio` file field. Persists the file, creates
/// the call record in `uploaded` status, and launches the detached pipeline
/// run. Returns 202 Accepted; progress is observable via the status endpoint
/// and the SSE stream.
pub async fn upload_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadCallResponse>)> {
    let user_id = parse_user_header(&headers)?;

    let mut audio: Option<(String, Vec<u8>, Option<String>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some("audio") {
            let original_name = field
                .file_name()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "recording".to_string());
            let declared_mime = field.content_type().map(|m| m.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
            audio = Some((original_name, bytes.to_vec(), declared_mime));
            break;
        }
    }

    let (original_name, bytes, declared_mime) =
        audio.ok_or_else(|| ApiError::BadRequest("Missing 'audio' file field".to_string()))?;

    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded audio file is empty".to_string()));
    }
    if bytes.len() as u64 > state.config.storage.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "Upload exceeds {} byte limit",
            state.config.storage.max_upload_bytes
        )));
    }

    let mime_type = detect_audio_mime(&bytes, declared_mime.as_deref()).ok_or_else(|| {
        ApiError::BadRequest("Uploaded file is not a recognized audio format".to_string())
    })?;

    // Persist the audio under a call-unique name
    let call_id = Uuid::new_v4();
    let upload_dir = state.config.storage.upload_dir();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(crate::error::Error::Io)?;
    let stored_path = upload_dir.join(format!("{}-{}", call_id, sanitize_filename(&original_name)));
    tokio::fs::write(&stored_path, &bytes)
        .await
        .map_err(crate::error::Error::Io)?;

    let mut call = CallRecord::new(
        user_id,
        AudioSource {
            path: stored_path.to_string_lossy().into_owned(),
            original_name,
            size_bytes: bytes.len() as u64,
            mime_type,
        },
    );
    call.call_id = call_id;

    crate::db::calls::save_call(&state.db, &call).await?;

    tracing::info!(
        call_id = %call.call_id,
        size_bytes = call.audio.size_bytes,
        mime = %call.audio.mime_type,
        "Call uploaded, launching pipeline"
    );

    // Detached run; the handle is dropped here but the run is observable
    // via the record and the event stream
    let _handle = state.runner.spawn(call.call_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadCallResponse {
            call_id: call.call_id,
            status: call.status,
            created_at: call.created_at,
        }),
    ))
}

/// GET /calls/{id}
pub async fn get_call(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
) -> ApiResult<Json<CallRecord>> {
    let call = crate::db::calls::get_call(&state.db, call_id).await?;
    Ok(Json(call))
}

/// GET /calls/{id}/status
pub async fn get_call_status(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
) -> ApiResult<Json<CallStatusResponse>> {
    let call = crate::db::calls::get_call(&state.db, call_id).await?;
    Ok(Json(CallStatusResponse {
        call_id: call.call_id,
        status: call.status,
        progress: call.status.progress_percent(),
        error: call.error,
        updated_at: call.updated_at,
    }))
}

/// GET /calls/{id}/history
pub async fn get_call_history(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    // 404 for unknown calls rather than an empty list
    crate::db::calls::get_call(&state.db, call_id).await?;
    let history = crate::db::calls::load_history(&state.db, call_id).await?;
    Ok(Json(history))
}

/// POST /calls/{id}/retry
///
/// Manual retry of an errored call: re-runs all three stages from the
/// beginning against the same record. Allowed only from `error` status.
pub async fn retry_call(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<RetryCallResponse>)> {
    let mut call = crate::db::calls::get_call(&state.db, call_id).await?;

    if call.status != CallStatus::Error {
        return Err(ApiError::Conflict(format!(
            "Call {} is in status {}, only errored calls can be retried",
            call_id, call.status
        )));
    }

    let previous_attempts = call.error.as_ref().map(|e| e.retry_count + 1).unwrap_or(0);

    call.reset_for_retry();
    crate::db::calls::save_call(&state.db, &call).await?;

    tracing::info!(call_id = %call_id, previous_attempts, "Retrying call pipeline");
    let _handle = state.runner.spawn(call_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(RetryCallResponse {
            call_id,
            status: call.status,
            previous_attempts,
        }),
    ))
}

fn parse_user_header(headers: &HeaderMap) -> ApiResult<Option<Uuid>> {
    match headers.get("x-user-id") {
        None => Ok(None),
        Some(value) => {
            let s = value
                .to_str()
                .map_err(|_| ApiError::BadRequest("Invalid X-User-Id header".to_string()))?;
            Uuid::parse_str(s)
                .map(Some)
                .map_err(|_| ApiError::BadRequest("X-User-Id is not a valid UUID".to_string()))
        }
    }
}

/// Detect an audio MIME type from magic bytes, falling back to the declared
/// content type when the sniffer finds nothing
fn detect_audio_mime(bytes: &[u8], declared: Option<&str>) -> Option<String> {
    if let Some(kind) = infer::get(bytes) {
        if kind.matcher_type() == infer::MatcherType::Audio {
            return Some(kind.mime_type().to_string());
        }
        // Containers like webm/ogg sniff as video but commonly carry
        // audio-only call recordings
        if kind.matcher_type() == infer::MatcherType::Video
            && declared.is_some_and(|d| d.starts_with("audio/"))
        {
            return Some(declared.unwrap_or_default().to_string());
        }
        return None;
    }
    declared
        .filter(|d| d.starts_with("audio/"))
        .map(|d| d.to_string())
}

fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "recording".to_string()
    } else {
        cleaned
    }
}

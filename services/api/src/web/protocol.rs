//! services/api/src/web/protocol.rs
//!
//! Defines the multipart submission protocol between the course builder client
//! and the API server, and the structured outcome sent back.
//!
//! A submission carries one `course` part (JSON document, file leaves marked
//! `"pending"`), an optional `submission_id` text part, one `thumbnail` part
//! and any number of `lecture_file.<node-id>` / `activity_file.<node-id>`
//! binary parts. Order within each binary stream is preserved as received.

use axum::{
    extract::multipart::{Field, Multipart},
    http::StatusCode,
    Json,
};
use course_builder_core::wire::{COURSE_FIELD, SUBMISSION_ID_FIELD, THUMBNAIL_FIELD};
use course_builder_core::{
    CourseDocument, FailureKind, PartStream, StagedFile, Submission, SubmissionError, TaggedPart,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// The outcome of one course submission.
#[derive(Serialize, Debug, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionResponse {
    /// The course was persisted. `reference` is its durable id.
    Success { reference: Uuid, code: String },

    /// The submission was rejected as a whole; nothing was persisted.
    Failure {
        /// One of `validation`, `conflict`, `upload`, `quota_exceeded`, `internal`.
        #[schema(value_type = String)]
        kind: FailureKind,
        reason: String,
    },
}

pub type Rejection = (StatusCode, Json<SubmissionResponse>);

/// A structured failure with the HTTP status matching its kind.
pub fn failure(kind: FailureKind, reason: impl Into<String>) -> Rejection {
    let status = match kind {
        FailureKind::Validation => StatusCode::BAD_REQUEST,
        FailureKind::Conflict => StatusCode::CONFLICT,
        FailureKind::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
        FailureKind::Upload => StatusCode::BAD_GATEWAY,
        FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(SubmissionResponse::Failure {
            kind,
            reason: reason.into(),
        }),
    )
}

/// Maps a pipeline error onto its structured failure.
pub fn rejection(e: &SubmissionError) -> Rejection {
    let reason = match e {
        // Storage internals stay in the logs.
        SubmissionError::Port { .. } => "The course could not be saved. Try again later.".to_string(),
        other => other.to_string(),
    };
    failure(e.kind(), reason)
}

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

fn malformed(reason: impl Into<String>) -> Rejection {
    failure(FailureKind::Validation, reason)
}

async fn read_file(field: Field<'_>) -> Result<StagedFile, Rejection> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| malformed(format!("Failed to read file bytes: {}", e)))?;
    Ok(StagedFile {
        file_name,
        content_type,
        bytes,
    })
}

/// Reads every part of a submission. A missing `submission_id` gets a fresh
/// one, so such a request is never deduplicated against an earlier attempt.
pub async fn read_submission(multipart: &mut Multipart) -> Result<Submission, Rejection> {
    let mut submission_id = None;
    let mut document = None;
    let mut thumbnail = None;
    let mut lecture_parts = Vec::new();
    let mut activity_parts = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| malformed(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            COURSE_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| malformed(format!("Failed to read the course part: {}", e)))?;
                let parsed = serde_json::from_str::<CourseDocument>(&text)
                    .map_err(|e| malformed(format!("The course part is not a valid course: {}", e)))?;
                document = Some(parsed);
            }
            SUBMISSION_ID_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| malformed(format!("Failed to read submission_id: {}", e)))?;
                let id = Uuid::parse_str(text.trim())
                    .map_err(|_| malformed("submission_id must be a UUID"))?;
                submission_id = Some(id);
            }
            THUMBNAIL_FIELD => thumbnail = Some(read_file(field).await?),
            other => match PartStream::parse_field_name(other) {
                Some((PartStream::Lecture, node_id)) => lecture_parts.push(TaggedPart {
                    node_id,
                    file: read_file(field).await?,
                }),
                Some((PartStream::Activity, node_id)) => activity_parts.push(TaggedPart {
                    node_id,
                    file: read_file(field).await?,
                }),
                None => return Err(malformed(format!("Unexpected part '{}'", other))),
            },
        }
    }

    let document = document.ok_or_else(|| malformed("The submission has no course part"))?;
    Ok(Submission {
        submission_id: submission_id.unwrap_or_else(Uuid::new_v4),
        document,
        thumbnail,
        lecture_parts,
        activity_parts,
    })
}

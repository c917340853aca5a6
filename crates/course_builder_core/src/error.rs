//! crates/course_builder_core/src/error.rs
//!
//! Error taxonomy for authoring and submission. Every variant is scoped to a
//! single submission; none of them is fatal to the process.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{CourseCode, NodeId};
use crate::ports::PortError;
use crate::wire::PartStream;

/// Problems caught before a submission is attempted. Also re-checked
/// server-side so a hand-built payload cannot skip them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("The course needs a title.")]
    MissingTitle,
    #[error("The course needs a code.")]
    MissingCode,
    #[error("'{0}' is not a valid course code: use 4-16 letters, digits or dashes.")]
    MalformedCode(String),
    #[error("Upload a thumbnail image before continuing.")]
    MissingThumbnail,
    #[error("Add at least one chapter.")]
    NoChapters,
    #[error("Chapter '{title}' needs at least one lecture.")]
    EmptyChapter { chapter: NodeId, title: String },
    #[error("Lecture '{title}' cannot last zero minutes. Leave the duration empty instead.")]
    InvalidDuration { node: NodeId, title: String },
    #[error("A rating must be between 1 and 5 stars, not {0}.")]
    InvalidRating(u8),
    #[error("The file for '{title}' is no longer attached. Attach it again.")]
    UnresolvedFile { node: NodeId, title: String },
    #[error("Chapter {0} does not exist.")]
    UnknownChapter(NodeId),
    #[error("Item {0} does not exist.")]
    UnknownNode(NodeId),
    #[error("Item {0} appears more than once in the course.")]
    DuplicateNode(NodeId),
    #[error("Submission can only happen from the review step.")]
    NotAtReview,
    #[error("Expected {expected} {stream} part(s) but received {received}.")]
    PartCountMismatch {
        stream: PartStream,
        expected: usize,
        received: usize,
    },
    #[error("The {stream} part at position {position} belongs to {found}, expected {expected}.")]
    PartOutOfPlace {
        stream: PartStream,
        position: usize,
        expected: NodeId,
        found: NodeId,
    },
}

/// Machine-discriminable failure kind reported with every rejected submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Conflict,
    Upload,
    QuotaExceeded,
    Internal,
}

/// Server-side outcome of a rejected submission.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("A course with the code {0} already exists. Choose a different code.")]
    Conflict(CourseCode),

    #[error("Submission {0} was already accepted. Start a new submission to create another course.")]
    AlreadySubmitted(Uuid),

    #[error("Failed to store the file for {node}: {reason}")]
    Upload { node: String, reason: String },

    #[error("Trial authors can create up to {limit} courses. Upgrade your plan to create more.")]
    QuotaExceeded { limit: u32 },

    #[error("Submission {submission_id} failed: {source}")]
    Port {
        submission_id: Uuid,
        #[source]
        source: PortError,
    },
}

impl SubmissionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SubmissionError::Validation(_) => FailureKind::Validation,
            SubmissionError::Conflict(_) | SubmissionError::AlreadySubmitted(_) => {
                FailureKind::Conflict
            }
            SubmissionError::Upload { .. } => FailureKind::Upload,
            SubmissionError::QuotaExceeded { .. } => FailureKind::QuotaExceeded,
            SubmissionError::Port { .. } => FailureKind::Internal,
        }
    }
}

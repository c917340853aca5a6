//! crates/course_builder_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the external collaborators.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete database, object store and identity provider.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Author, Course, CourseCode, NewCourse};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, disk).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflicts with an existing item: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// One trial-quota charge, keyed by the submission that earned it.
/// Applying the same charge twice must count once. The store refuses the
/// charge when the author already holds `limit` of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaCharge {
    pub author_id: Uuid,
    pub submission_id: Uuid,
    pub limit: u32,
}

/// Why [`CourseStore::create`] refused to write a course.
#[derive(Debug, thiserror::Error)]
pub enum CreateCourseError {
    #[error("Course code {0} is taken")]
    CodeTaken(CourseCode),
    #[error("Submission {0} already produced a course")]
    SubmissionLanded(Uuid),
    #[error("Author already holds {limit} trial charges")]
    QuotaExhausted { limit: u32 },
    #[error(transparent)]
    Port(#[from] PortError),
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Advisory lookup used for fast-fail uniqueness checks.
    async fn find_by_code(&self, code: &CourseCode) -> PortResult<Option<Course>>;

    /// Persists the course and, when given, the quota charge as one unit.
    /// The code, the submission id and the quota limit are all enforced
    /// inside that unit; the pipeline's earlier checks are only fast-fails.
    async fn create(
        &self,
        course: NewCourse,
        charge: Option<QuotaCharge>,
    ) -> Result<Course, CreateCourseError>;

    /// Whether a course created by this submission exists.
    async fn submission_landed(&self, submission_id: Uuid) -> PortResult<bool>;

    /// Whether a persisted course stores its files under `namespace`.
    async fn namespace_landed(&self, namespace: Uuid) -> PortResult<bool>;
}

#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Number of distinct submissions charged to the author.
    async fn charged_count(&self, author_id: Uuid) -> PortResult<u32>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under the attempt-scoped `namespace` and returns its durable URL.
    /// A failed call must leave no partial object behind.
    async fn upload(
        &self,
        namespace: Uuid,
        destination_hint: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> PortResult<String>;

    /// Removes everything stored under `namespace`. Removing an absent namespace succeeds.
    async fn delete_namespace(&self, namespace: Uuid) -> PortResult<()>;

    /// Namespaces whose last write happened before `older_than`.
    async fn stale_namespaces(&self, older_than: DateTime<Utc>) -> PortResult<Vec<Uuid>>;
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<Uuid>;

    /// Returns the user id and stored password hash.
    async fn get_credentials_by_email(&self, email: &str) -> PortResult<(Uuid, String)>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live session to the acting author and their entitlement.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Author>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

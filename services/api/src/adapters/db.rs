//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `CourseStore`, `QuotaLedger` and `IdentityService` ports from the `core`
//! crate. It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_builder_core::domain::{Author, Chapter, Course, CourseCode, NewCourse, Rating, StoredObject};
use course_builder_core::ports::{
    CourseStore, CreateCourseError, IdentityService, PortError, PortResult, QuotaCharge,
    QuotaLedger,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the persistence ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Unique-constraint violations become `Conflict`, naming the constraint.
fn map_write_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.constraint().unwrap_or("unique constraint").to_string())
        }
        _ => unexpected(e),
    }
}

/// Maps a failed course insert onto the constraint it tripped.
fn map_course_write_error(e: sqlx::Error, course: &NewCourse) -> CreateCourseError {
    let constraint = match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => db.constraint(),
        _ => None,
    };
    match constraint {
        Some("courses_code_key") => CreateCourseError::CodeTaken(course.code.clone()),
        Some("courses_submission_id_key") => {
            CreateCourseError::SubmissionLanded(course.submission_id)
        }
        _ => CreateCourseError::Port(map_write_error(e)),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const COURSE_COLUMNS: &str = "id, submission_id, storage_namespace, title, code, description, thumbnail_url, \
     author_id, chapters, enrolled_learners, ratings, created_at";

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    submission_id: Uuid,
    storage_namespace: Uuid,
    title: String,
    code: String,
    description: String,
    thumbnail_url: String,
    author_id: Uuid,
    chapters: Json<Vec<Chapter<StoredObject>>>,
    enrolled_learners: Vec<Uuid>,
    ratings: Json<Vec<Rating>>,
    created_at: DateTime<Utc>,
}
impl CourseRecord {
    fn to_domain(self) -> PortResult<Course> {
        let code = CourseCode::parse(&self.code)
            .map_err(|e| PortError::Unexpected(format!("Stored course {} is invalid: {}", self.id, e)))?;
        Ok(Course {
            id: self.id,
            submission_id: self.submission_id,
            storage_namespace: self.storage_namespace,
            title: self.title,
            code,
            description: self.description,
            thumbnail_url: self.thumbnail_url,
            author_id: self.author_id,
            chapters: self.chapters.0,
            enrolled_learners: self.enrolled_learners,
            ratings: self.ratings.0,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    hashed_password: String,
}

#[derive(FromRow)]
struct AuthorRecord {
    user_id: Uuid,
    entitled: bool,
}

//=========================================================================================
// `CourseStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CourseStore for DbAdapter {
    async fn find_by_code(&self, code: &CourseCode) -> PortResult<Option<Course>> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE code = $1"
        ))
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(CourseRecord::to_domain).transpose()
    }

    async fn create(
        &self,
        course: NewCourse,
        charge: Option<QuotaCharge>,
    ) -> Result<Course, CreateCourseError> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        if let Some(charge) = charge {
            // Locking the author's row serializes their concurrent submissions,
            // so the count below cannot go stale before the charge is written.
            sqlx::query("SELECT user_id FROM users WHERE user_id = $1 FOR UPDATE")
                .bind(charge.author_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(unexpected)?;
            let used = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM quota_charges WHERE author_id = $1",
            )
            .bind(charge.author_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;
            if used >= i64::from(charge.limit) {
                return Err(CreateCourseError::QuotaExhausted {
                    limit: charge.limit,
                });
            }
        }

        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "INSERT INTO courses (id, submission_id, storage_namespace, title, code, description, \
             thumbnail_url, author_id, chapters) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {COURSE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(course.submission_id)
        .bind(course.storage_namespace)
        .bind(&course.title)
        .bind(course.code.as_str())
        .bind(&course.description)
        .bind(&course.thumbnail_url)
        .bind(course.author_id)
        .bind(Json(&course.chapters))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_course_write_error(e, &course))?;

        if let Some(charge) = charge {
            sqlx::query(
                "INSERT INTO quota_charges (submission_id, author_id) VALUES ($1, $2) \
                 ON CONFLICT (submission_id) DO NOTHING",
            )
            .bind(charge.submission_id)
            .bind(charge.author_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain()?)
    }

    async fn submission_landed(&self, submission_id: Uuid) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM courses WHERE submission_id = $1)")
            .bind(submission_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn namespace_landed(&self, namespace: Uuid) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM courses WHERE storage_namespace = $1)",
        )
        .bind(namespace)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)
    }
}

//=========================================================================================
// `QuotaLedger` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuotaLedger for DbAdapter {
    async fn charged_count(&self, author_id: Uuid) -> PortResult<u32> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quota_charges WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        u32::try_from(count).map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for DbAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) RETURNING user_id",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<(Uuid, String)> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok((record.user_id, record.hashed_password))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Author> {
        let record = sqlx::query_as::<_, AuthorRecord>(
            "SELECT u.user_id, u.entitled FROM auth_sessions s \
             JOIN users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;
        Ok(Author {
            id: record.user_id,
            entitled: record.entitled,
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

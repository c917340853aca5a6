//! crates/course_builder_core/src/memory.rs
//!
//! In-memory implementations of every port, for tests and local experiments.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Author, Course, CourseCode, NewCourse};
use crate::ports::{
    CourseStore, CreateCourseError, IdentityService, ObjectStore, PortError, PortResult,
    QuotaCharge, QuotaLedger,
};

//=========================================================================================
// Course Store + Quota Ledger
//=========================================================================================

#[derive(Default)]
struct CourseTables {
    courses: HashMap<CourseCode, Course>,
    /// submission id -> author id
    charges: HashMap<Uuid, Uuid>,
}

impl CourseTables {
    fn charged_count(&self, author_id: Uuid) -> u32 {
        self.charges.values().filter(|a| **a == author_id).count() as u32
    }
}

#[derive(Default)]
pub struct InMemoryCourseStore {
    tables: Mutex<CourseTables>,
}

impl InMemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn course_count(&self) -> usize {
        self.tables.lock().await.courses.len()
    }
}

#[async_trait]
impl CourseStore for InMemoryCourseStore {
    async fn find_by_code(&self, code: &CourseCode) -> PortResult<Option<Course>> {
        Ok(self.tables.lock().await.courses.get(code).cloned())
    }

    async fn create(
        &self,
        course: NewCourse,
        charge: Option<QuotaCharge>,
    ) -> Result<Course, CreateCourseError> {
        let mut tables = self.tables.lock().await;
        if tables.courses.contains_key(&course.code) {
            return Err(CreateCourseError::CodeTaken(course.code));
        }
        if tables
            .courses
            .values()
            .any(|c| c.submission_id == course.submission_id)
        {
            return Err(CreateCourseError::SubmissionLanded(course.submission_id));
        }
        if let Some(charge) = charge {
            if tables.charged_count(charge.author_id) >= charge.limit {
                return Err(CreateCourseError::QuotaExhausted {
                    limit: charge.limit,
                });
            }
            tables.charges.insert(charge.submission_id, charge.author_id);
        }
        let course = Course::from_new(Uuid::new_v4(), course, Utc::now());
        tables.courses.insert(course.code.clone(), course.clone());
        Ok(course)
    }

    async fn submission_landed(&self, submission_id: Uuid) -> PortResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .courses
            .values()
            .any(|c| c.submission_id == submission_id))
    }

    async fn namespace_landed(&self, namespace: Uuid) -> PortResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .courses
            .values()
            .any(|c| c.storage_namespace == namespace))
    }
}

#[async_trait]
impl QuotaLedger for InMemoryCourseStore {
    async fn charged_count(&self, author_id: Uuid) -> PortResult<u32> {
        Ok(self.tables.lock().await.charged_count(author_id))
    }
}

//=========================================================================================
// Object Store
//=========================================================================================

struct Namespace {
    objects: HashMap<String, Bytes>,
    touched_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    namespaces: Mutex<HashMap<Uuid, Namespace>>,
    /// Uploads whose destination hint contains one of these fail.
    failing_hints: Mutex<HashSet<String>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_uploads_matching(&self, fragment: impl Into<String>) {
        self.failing_hints.lock().await.insert(fragment.into());
    }

    pub async fn object_count(&self, namespace: Uuid) -> usize {
        self.namespaces
            .lock()
            .await
            .get(&namespace)
            .map_or(0, |ns| ns.objects.len())
    }

    pub async fn namespace_count(&self) -> usize {
        self.namespaces.lock().await.len()
    }

    /// Looks an object up by the URL `upload` returned for it.
    pub async fn fetch(&self, url: &str) -> Option<Bytes> {
        let (namespace, hint) = url.strip_prefix("memory://")?.split_once('/')?;
        let namespace = Uuid::parse_str(namespace).ok()?;
        self.namespaces
            .lock()
            .await
            .get(&namespace)?
            .objects
            .get(hint)
            .cloned()
    }

    pub async fn set_touched_at(&self, namespace: Uuid, at: DateTime<Utc>) {
        if let Some(ns) = self.namespaces.lock().await.get_mut(&namespace) {
            ns.touched_at = at;
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(
        &self,
        namespace: Uuid,
        destination_hint: &str,
        _content_type: &str,
        bytes: Bytes,
    ) -> PortResult<String> {
        let failing = self
            .failing_hints
            .lock()
            .await
            .iter()
            .any(|fragment| destination_hint.contains(fragment.as_str()));
        if failing {
            return Err(PortError::Unexpected(format!(
                "simulated failure storing {destination_hint}"
            )));
        }

        let mut namespaces = self.namespaces.lock().await;
        let ns = namespaces.entry(namespace).or_insert_with(|| Namespace {
            objects: HashMap::new(),
            touched_at: Utc::now(),
        });
        ns.objects.insert(destination_hint.to_string(), bytes);
        ns.touched_at = Utc::now();
        Ok(format!("memory://{namespace}/{destination_hint}"))
    }

    async fn delete_namespace(&self, namespace: Uuid) -> PortResult<()> {
        self.namespaces.lock().await.remove(&namespace);
        Ok(())
    }

    async fn stale_namespaces(&self, older_than: DateTime<Utc>) -> PortResult<Vec<Uuid>> {
        Ok(self
            .namespaces
            .lock()
            .await
            .iter()
            .filter(|(_, ns)| ns.touched_at < older_than)
            .map(|(id, _)| *id)
            .collect())
    }
}

//=========================================================================================
// Identity
//=========================================================================================

struct UserRow {
    id: Uuid,
    hashed_password: String,
    entitled: bool,
}

#[derive(Default)]
struct IdentityTables {
    users: HashMap<String, UserRow>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
}

#[derive(Default)]
pub struct InMemoryIdentity {
    tables: Mutex<IdentityTables>,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an author and opens a session for them in one go.
    pub async fn sign_in(&self, session_id: &str, entitled: bool) -> Author {
        let id = Uuid::new_v4();
        let mut tables = self.tables.lock().await;
        tables.users.insert(
            format!("{id}@example.test"),
            UserRow {
                id,
                hashed_password: String::new(),
                entitled,
            },
        );
        tables
            .sessions
            .insert(session_id.to_string(), (id, Utc::now() + chrono::Duration::days(1)));
        Author { id, entitled }
    }
}

#[async_trait]
impl IdentityService for InMemoryIdentity {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<Uuid> {
        let mut tables = self.tables.lock().await;
        if tables.users.contains_key(email) {
            return Err(PortError::Conflict(format!("email {email}")));
        }
        let id = Uuid::new_v4();
        tables.users.insert(
            email.to_string(),
            UserRow {
                id,
                hashed_password: hashed_password.to_string(),
                entitled: false,
            },
        );
        Ok(id)
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<(Uuid, String)> {
        self.tables
            .lock()
            .await
            .users
            .get(email)
            .map(|u| (u.id, u.hashed_password.clone()))
            .ok_or_else(|| PortError::NotFound(format!("User {email} not found")))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables
            .lock()
            .await
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Author> {
        let tables = self.tables.lock().await;
        let (user_id, expires_at) = tables
            .sessions
            .get(session_id)
            .copied()
            .ok_or(PortError::Unauthorized)?;
        if expires_at <= Utc::now() {
            return Err(PortError::Unauthorized);
        }
        let entitled = tables
            .users
            .values()
            .find(|u| u.id == user_id)
            .map(|u| u.entitled)
            .ok_or(PortError::Unauthorized)?;
        Ok(Author {
            id: user_id,
            entitled,
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.lock().await.sessions.remove(session_id);
        Ok(())
    }
}

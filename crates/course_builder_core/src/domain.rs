//! crates/course_builder_core/src/domain.rs
//!
//! Defines the core content tree: Course → Chapter → {Lecture | Activity}.
//!
//! The tree is generic over the handle `F` held by its file leaves. The same
//! shape is used while authoring (`F = StagedKey`), on the wire
//! (`F = PendingUpload`) and once persisted (`F = StoredObject`), so a stored
//! course can never carry a pending marker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

//=========================================================================================
// Identifiers
//=========================================================================================

/// Client-generated, opaque identifier of a chapter, lecture or activity.
/// Stable for the whole authoring session and carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for NodeId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The globally unique, human-entered course code.
///
/// Codes are trimmed and upper-cased, 4 to 16 characters long, and made of
/// ASCII letters, digits and `-`, starting with a letter or digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseCode(String);

impl CourseCode {
    pub const MIN_LEN: usize = 4;
    pub const MAX_LEN: usize = 16;

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let code = raw.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(ValidationError::MissingCode);
        }
        let well_formed = (Self::MIN_LEN..=Self::MAX_LEN).contains(&code.len())
            && code.starts_with(|c: char| c.is_ascii_alphanumeric())
            && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !well_formed {
            return Err(ValidationError::MalformedCode(raw.to_string()));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CourseCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CourseCode> for String {
    fn from(code: CourseCode) -> Self {
        code.0
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//=========================================================================================
// File Handles
//=========================================================================================

/// Wire-side marker for a file leaf whose binary travels as a separate part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingUpload {
    Pending,
}

/// A file leaf that has been written to the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub url: String,
}

//=========================================================================================
// The Content Tree
//=========================================================================================

/// What a lecture plays: an external video reference or an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LectureContent<F> {
    ReferenceLink { url: String },
    File { file: F },
}

impl<F> LectureContent<F> {
    pub fn file(&self) -> Option<&F> {
        match self {
            LectureContent::File { file } => Some(file),
            LectureContent::ReferenceLink { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lecture<F> {
    pub id: NodeId,
    pub title: String,
    /// Zero or absent means file-only content.
    pub duration_minutes: Option<u32>,
    pub order: u32,
    pub free_preview: bool,
    pub content: LectureContent<F>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity<F> {
    pub id: NodeId,
    pub title: String,
    pub order: u32,
    pub file: F,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter<F> {
    pub id: NodeId,
    pub title: String,
    pub order: u32,
    pub lectures: Vec<Lecture<F>>,
    pub activities: Vec<Activity<F>>,
}

/// Anything that lives in an ordered sibling list.
pub trait Ordered {
    fn id(&self) -> NodeId;
    fn order(&self) -> u32;
    fn set_order(&mut self, order: u32);
}

macro_rules! impl_ordered {
    ($($ty:ident),*) => {
        $(impl<F> Ordered for $ty<F> {
            fn id(&self) -> NodeId {
                self.id
            }
            fn order(&self) -> u32 {
                self.order
            }
            fn set_order(&mut self, order: u32) {
                self.order = order;
            }
        })*
    };
}

impl_ordered!(Chapter, Lecture, Activity);

impl<F> Chapter<F> {
    /// Rebuilds the chapter with every file handle converted by `f`.
    /// `f` receives the id of the node owning the handle.
    pub fn try_map_files<G, E>(
        self,
        f: &mut impl FnMut(NodeId, F) -> Result<G, E>,
    ) -> Result<Chapter<G>, E> {
        let lectures = self
            .lectures
            .into_iter()
            .map(|lecture| {
                let content = match lecture.content {
                    LectureContent::ReferenceLink { url } => LectureContent::ReferenceLink { url },
                    LectureContent::File { file } => LectureContent::File {
                        file: f(lecture.id, file)?,
                    },
                };
                Ok(Lecture {
                    id: lecture.id,
                    title: lecture.title,
                    duration_minutes: lecture.duration_minutes,
                    order: lecture.order,
                    free_preview: lecture.free_preview,
                    content,
                })
            })
            .collect::<Result<Vec<_>, E>>()?;

        let activities = self
            .activities
            .into_iter()
            .map(|activity| {
                Ok(Activity {
                    id: activity.id,
                    title: activity.title,
                    order: activity.order,
                    file: f(activity.id, activity.file)?,
                })
            })
            .collect::<Result<Vec<_>, E>>()?;

        Ok(Chapter {
            id: self.id,
            title: self.title,
            order: self.order,
            lectures,
            activities,
        })
    }
}

/// Checks the tree shape: at least one chapter, a lecture in every chapter,
/// no zero-minute lecture, and no node id used twice anywhere in the tree.
pub fn validate_chapters<F>(chapters: &[Chapter<F>]) -> Result<(), ValidationError> {
    if chapters.is_empty() {
        return Err(ValidationError::NoChapters);
    }

    let mut seen = std::collections::HashSet::new();
    for chapter in chapters {
        if chapter.lectures.is_empty() {
            return Err(ValidationError::EmptyChapter {
                chapter: chapter.id,
                title: chapter.title.clone(),
            });
        }
        if let Some(lecture) = chapter.lectures.iter().find(|l| l.duration_minutes == Some(0)) {
            return Err(ValidationError::InvalidDuration {
                node: lecture.id,
                title: lecture.title.clone(),
            });
        }
        let ids = std::iter::once(chapter.id)
            .chain(chapter.lectures.iter().map(|l| l.id))
            .chain(chapter.activities.iter().map(|a| a.id));
        for id in ids {
            if !seen.insert(id) {
                return Err(ValidationError::DuplicateNode(id));
            }
        }
    }
    Ok(())
}

//=========================================================================================
// Course Aggregate
//=========================================================================================

/// The first wizard step's sub-model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub title: String,
    pub code: String,
    /// Rich text, stored as authored.
    pub description: String,
}

/// A learner's rating of a course, always between 1 and 5 stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rating {
    learner_id: Uuid,
    stars: u8,
}

impl Rating {
    pub const MAX_STARS: u8 = 5;

    pub fn new(learner_id: Uuid, stars: u8) -> Result<Self, ValidationError> {
        if !(1..=Self::MAX_STARS).contains(&stars) {
            return Err(ValidationError::InvalidRating(stars));
        }
        Ok(Self { learner_id, stars })
    }

    pub fn learner_id(&self) -> Uuid {
        self.learner_id
    }

    pub fn stars(&self) -> u8 {
        self.stars
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            learner_id: Uuid,
            stars: u8,
        }

        let raw = Raw::deserialize(deserializer)?;
        Rating::new(raw.learner_id, raw.stars).map_err(serde::de::Error::custom)
    }
}

/// The structured part of a submission: the tree with file leaves pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDocument {
    pub title: String,
    pub code: CourseCode,
    pub description: String,
    pub chapters: Vec<Chapter<PendingUpload>>,
}

/// Represents the acting author, as supplied by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Author {
    pub id: Uuid,
    pub entitled: bool,
}

/// A fully patched course, ready for its single durable write.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub submission_id: Uuid,
    /// Object-store namespace holding this attempt's uploads.
    pub storage_namespace: Uuid,
    pub title: String,
    pub code: CourseCode,
    pub description: String,
    pub thumbnail_url: String,
    pub author_id: Uuid,
    pub chapters: Vec<Chapter<StoredObject>>,
}

/// The persisted course aggregate. The submission id and storage namespace
/// are bookkeeping for the pipeline and never leave the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    #[serde(skip)]
    pub submission_id: Uuid,
    #[serde(skip)]
    pub storage_namespace: Uuid,
    pub title: String,
    pub code: CourseCode,
    pub description: String,
    pub thumbnail_url: String,
    pub author_id: Uuid,
    pub chapters: Vec<Chapter<StoredObject>>,
    pub enrolled_learners: Vec<Uuid>,
    pub ratings: Vec<Rating>,
    pub created_at: DateTime<Utc>,
}

impl Course {
    /// Builds the persisted form of `new`, with no learners or ratings yet.
    pub fn from_new(id: Uuid, new: NewCourse, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            submission_id: new.submission_id,
            storage_namespace: new.storage_namespace,
            title: new.title,
            code: new.code,
            description: new.description,
            thumbnail_url: new.thumbnail_url,
            author_id: new.author_id,
            chapters: new.chapters,
            enrolled_learners: Vec::new(),
            ratings: Vec::new(),
            created_at,
        }
    }
}

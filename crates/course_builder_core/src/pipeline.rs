//! crates/course_builder_core/src/pipeline.rs
//!
//! The server reconstruction pipeline. It takes one [`Submission`], reunites
//! every binary part with its tree position, uploads them, patches the tree
//! with the returned URLs and persists the course in a single write.
//!
//! The submission is rejected before any upload when the quota gate, the
//! document checks, the advisory lookups or the part pairing fail. Uploads go
//! to a namespace generated here for this attempt alone, never to one named
//! by the client. Once uploads have started, any failure deletes that
//! namespace before the error is returned.

use futures::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{validate_chapters, Author, Course, NewCourse, NodeId, StoredObject};
use crate::error::{SubmissionError, ValidationError};
use crate::ports::{CourseStore, CreateCourseError, ObjectStore, PortError, QuotaLedger};
use crate::quota::QuotaGate;
use crate::staging::StagedFile;
use crate::traversal::{stream_slots, FileSlot};
use crate::wire::{PartStream, Submission, TaggedPart};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadTarget {
    Thumbnail,
    Node(NodeId),
}

impl fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadTarget::Thumbnail => f.write_str("thumbnail"),
            UploadTarget::Node(id) => write!(f, "node {id}"),
        }
    }
}

struct UploadJob {
    target: UploadTarget,
    destination_hint: String,
    file: StagedFile,
}

#[derive(Clone)]
pub struct ReconstructionPipeline {
    store: Arc<dyn CourseStore>,
    quota: Arc<dyn QuotaLedger>,
    objects: Arc<dyn ObjectStore>,
}

impl ReconstructionPipeline {
    pub fn new(
        store: Arc<dyn CourseStore>,
        quota: Arc<dyn QuotaLedger>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            store,
            quota,
            objects,
        }
    }

    pub async fn submit(
        &self,
        author: &Author,
        submission: Submission,
    ) -> Result<Course, SubmissionError> {
        let Submission {
            submission_id,
            document,
            thumbnail,
            lecture_parts,
            activity_parts,
        } = submission;
        let port = |source: PortError| SubmissionError::Port {
            submission_id,
            source,
        };
        info!(%submission_id, code = %document.code, author = %author.id, "Received course submission");

        // --- 1. Quota, before anything else touches storage ---
        let charge = QuotaGate::check(author, submission_id, self.quota.as_ref()).await?;

        // --- 2. Document checks ---
        if document.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle.into());
        }
        validate_chapters(&document.chapters)?;
        let thumbnail = thumbnail.ok_or(ValidationError::MissingThumbnail)?;

        // --- 3. Advisory uniqueness checks; the store's constraints are authoritative ---
        if self.store.find_by_code(&document.code).await.map_err(port)?.is_some() {
            return Err(SubmissionError::Conflict(document.code));
        }
        if self.store.submission_landed(submission_id).await.map_err(port)? {
            return Err(SubmissionError::AlreadySubmitted(submission_id));
        }

        // --- 4. Pair every pending node with its part ---
        let mut jobs = pair_stream(
            PartStream::Lecture,
            &stream_slots(&document.chapters, PartStream::Lecture),
            lecture_parts,
        )?;
        jobs.extend(pair_stream(
            PartStream::Activity,
            &stream_slots(&document.chapters, PartStream::Activity),
            activity_parts,
        )?);
        jobs.push(UploadJob {
            target: UploadTarget::Thumbnail,
            destination_hint: format!("thumbnail/{}", sanitize_file_name(&thumbnail.file_name)),
            file: thumbnail,
        });

        // --- 5. Upload everything; join_all is the barrier before the patch ---
        let namespace = Uuid::new_v4();
        let uploads = jobs.iter().map(|job| async move {
            let result = self
                .objects
                .upload(
                    namespace,
                    &job.destination_hint,
                    &job.file.content_type,
                    job.file.bytes.clone(),
                )
                .await;
            (job.target, result)
        });

        let mut urls = HashMap::new();
        let mut thumbnail_url = None;
        let mut failure = None;
        for (target, result) in join_all(uploads).await {
            match (target, result) {
                (UploadTarget::Thumbnail, Ok(url)) => thumbnail_url = Some(url),
                (UploadTarget::Node(node), Ok(url)) => {
                    urls.insert(node, url);
                }
                (target, Err(e)) => {
                    error!(%submission_id, %target, "Upload failed: {}", e);
                    failure.get_or_insert(SubmissionError::Upload {
                        node: target.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        if let Some(err) = failure {
            self.discard(submission_id, namespace).await;
            return Err(err);
        }
        let Some(thumbnail_url) = thumbnail_url else {
            self.discard(submission_id, namespace).await;
            return Err(SubmissionError::Upload {
                node: UploadTarget::Thumbnail.to_string(),
                reason: "the object store returned no reference".to_string(),
            });
        };
        info!(%submission_id, %namespace, files = urls.len(), "All uploads completed");

        // --- 6. Patch the tree ---
        let chapters = document
            .chapters
            .into_iter()
            .map(|chapter| {
                chapter.try_map_files(&mut |node, _pending| {
                    urls.remove(&node)
                        .map(|url| StoredObject { url })
                        .ok_or(ValidationError::UnknownNode(node))
                })
            })
            .collect::<Result<Vec<_>, _>>();
        let chapters = match chapters {
            Ok(chapters) => chapters,
            Err(e) => {
                self.discard(submission_id, namespace).await;
                return Err(e.into());
            }
        };

        // --- 7. Persist, together with the quota charge ---
        let new_course = NewCourse {
            submission_id,
            storage_namespace: namespace,
            title: document.title,
            code: document.code,
            description: document.description,
            thumbnail_url,
            author_id: author.id,
            chapters,
        };
        match self.store.create(new_course, charge).await {
            Ok(course) => {
                info!(%submission_id, course_id = %course.id, code = %course.code, "Course persisted");
                Ok(course)
            }
            Err(e) => {
                self.discard(submission_id, namespace).await;
                Err(match e {
                    CreateCourseError::CodeTaken(code) => {
                        warn!(%submission_id, %code, "Code was taken before persist");
                        SubmissionError::Conflict(code)
                    }
                    CreateCourseError::SubmissionLanded(id) => {
                        warn!(%submission_id, "Submission landed concurrently");
                        SubmissionError::AlreadySubmitted(id)
                    }
                    CreateCourseError::QuotaExhausted { limit } => {
                        warn!(%submission_id, author = %author.id, "Quota used up before persist");
                        SubmissionError::QuotaExceeded { limit }
                    }
                    CreateCourseError::Port(e) => {
                        error!(%submission_id, "Failed to persist course: {}", e);
                        port(e)
                    }
                })
            }
        }
    }

    /// Best-effort removal of everything uploaded by a failed attempt. The
    /// namespace belongs to that attempt only. Whatever survives is left to
    /// the orphan sweep.
    async fn discard(&self, submission_id: Uuid, namespace: Uuid) {
        match self.objects.delete_namespace(namespace).await {
            Ok(()) => warn!(%submission_id, %namespace, "Discarded uploads of failed submission"),
            Err(e) => warn!(%submission_id, %namespace, "Failed to discard uploads: {}", e),
        }
    }
}

/// Pairs the slots of one stream with its parts, strictly by position. The
/// tag on each part must name the node of its slot.
fn pair_stream(
    stream: PartStream,
    slots: &[FileSlot],
    parts: Vec<TaggedPart>,
) -> Result<Vec<UploadJob>, ValidationError> {
    if slots.len() != parts.len() {
        return Err(ValidationError::PartCountMismatch {
            stream,
            expected: slots.len(),
            received: parts.len(),
        });
    }

    slots
        .iter()
        .zip(parts)
        .enumerate()
        .map(|(position, (slot, part))| {
            if part.node_id != slot.node_id {
                return Err(ValidationError::PartOutOfPlace {
                    stream,
                    position,
                    expected: slot.node_id,
                    found: part.node_id,
                });
            }
            Ok(UploadJob {
                target: UploadTarget::Node(slot.node_id),
                destination_hint: format!(
                    "{}/{}/{}/{}",
                    stream.directory(),
                    slot.chapter_id,
                    slot.node_id,
                    sanitize_file_name(&part.file.file_name)
                ),
                file: part.file,
            })
        })
        .collect()
}

/// Keeps `[A-Za-z0-9._-]` and replaces everything else, including path
/// separators, with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_start_matches('.') {
        "" => "file".to_string(),
        rest => rest.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_cannot_escape_their_directory() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_file_name("week 1 notes.pdf"), "week_1_notes.pdf");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name(""), "file");
    }
}

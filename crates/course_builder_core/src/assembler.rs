//! crates/course_builder_core/src/assembler.rs
//!
//! Collapses a finished draft into a [`Submission`]: the course document with
//! every file leaf marked pending, the thumbnail, and the two binary streams
//! in traversal order.

use uuid::Uuid;

use crate::domain::{validate_chapters, CourseCode, CourseDocument, PendingUpload};
use crate::draft::CourseDraft;
use crate::error::ValidationError;
use crate::traversal::walk_files;
use crate::wire::{PartStream, Submission, TaggedPart};

/// Builds the submission payload, or fails before producing any output.
///
/// Every file leaf must resolve in the registry. A leaf whose key was
/// unstaged fails with [`ValidationError::UnresolvedFile`] naming the node.
pub fn assemble(draft: &CourseDraft, submission_id: Uuid) -> Result<Submission, ValidationError> {
    let title = draft.basic.title.trim();
    if title.is_empty() {
        return Err(ValidationError::MissingTitle);
    }
    let code = CourseCode::parse(&draft.basic.code)?;
    validate_chapters(draft.chapters())?;

    let thumbnail = draft
        .thumbnail()
        .and_then(|key| draft.registry().resolve(key))
        .cloned()
        .ok_or(ValidationError::MissingThumbnail)?;

    let mut lecture_parts = Vec::new();
    let mut activity_parts = Vec::new();
    for leaf in walk_files(draft.chapters()) {
        let file = draft
            .registry()
            .resolve(*leaf.handle)
            .ok_or_else(|| ValidationError::UnresolvedFile {
                node: leaf.slot.node_id,
                title: leaf.title.to_string(),
            })?;
        let part = TaggedPart {
            node_id: leaf.slot.node_id,
            file: file.clone(),
        };
        match leaf.slot.stream {
            PartStream::Lecture => lecture_parts.push(part),
            PartStream::Activity => activity_parts.push(part),
        }
    }

    let chapters = draft
        .chapters()
        .iter()
        .cloned()
        .map(|chapter| chapter.try_map_files(&mut |_, _| Ok::<_, ValidationError>(PendingUpload::Pending)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Submission {
        submission_id,
        document: CourseDocument {
            title: title.to_string(),
            code,
            description: draft.basic.description.clone(),
            chapters,
        },
        thumbnail: Some(thumbnail),
        lecture_parts,
        activity_parts,
    })
}

//! crates/course_builder_core/src/wire.rs
//!
//! The transport contract shared by the assembler and the reconstruction
//! pipeline: part names, stream identity and the submission payload.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::{CourseDocument, NodeId};
use crate::staging::StagedFile;

/// Multipart field holding the JSON course document.
pub const COURSE_FIELD: &str = "course";
/// Multipart field holding the client correlation id.
pub const SUBMISSION_ID_FIELD: &str = "submission_id";
/// Multipart field holding the thumbnail binary.
pub const THUMBNAIL_FIELD: &str = "thumbnail";

/// The two independent binary streams of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartStream {
    Lecture,
    Activity,
}

impl PartStream {
    fn prefix(&self) -> &'static str {
        match self {
            PartStream::Lecture => "lecture_file",
            PartStream::Activity => "activity_file",
        }
    }

    /// Directory under a submission namespace that holds this stream's files.
    pub fn directory(&self) -> &'static str {
        match self {
            PartStream::Lecture => "lectures",
            PartStream::Activity => "activities",
        }
    }

    /// Field name of a binary part: `<stream>_file.<node-id>`.
    pub fn field_name(&self, node_id: NodeId) -> String {
        format!("{}.{}", self.prefix(), node_id)
    }

    /// Splits a field name back into stream and owning node.
    pub fn parse_field_name(name: &str) -> Option<(PartStream, NodeId)> {
        let (prefix, node) = name.split_once('.')?;
        let stream = [PartStream::Lecture, PartStream::Activity]
            .into_iter()
            .find(|s| s.prefix() == prefix)?;
        let node_id = Uuid::parse_str(node).ok()?;
        Some((stream, NodeId::from(node_id)))
    }
}

impl fmt::Display for PartStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartStream::Lecture => f.write_str("lecture"),
            PartStream::Activity => f.write_str("activity"),
        }
    }
}

/// A binary part tagged with the node it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedPart {
    pub node_id: NodeId,
    pub file: StagedFile,
}

/// One multi-part submission: the structured document plus the thumbnail and
/// the two ordered binary streams.
#[derive(Debug, Clone)]
pub struct Submission {
    pub submission_id: Uuid,
    pub document: CourseDocument,
    pub thumbnail: Option<StagedFile>,
    pub lecture_parts: Vec<TaggedPart>,
    pub activity_parts: Vec<TaggedPart>,
}

impl Submission {
    pub fn parts(&self, stream: PartStream) -> &[TaggedPart] {
        match stream {
            PartStream::Lecture => &self.lecture_parts,
            PartStream::Activity => &self.activity_parts,
        }
    }

    /// Binary parts in transmission order with their field names: lecture
    /// stream first, then the activity stream.
    pub fn binary_fields(&self) -> impl Iterator<Item = (String, &StagedFile)> + '_ {
        let lectures = self
            .lecture_parts
            .iter()
            .map(|p| (PartStream::Lecture.field_name(p.node_id), &p.file));
        let activities = self
            .activity_parts
            .iter()
            .map(|p| (PartStream::Activity.field_name(p.node_id), &p.file));
        lectures.chain(activities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_carry_stream_and_node() {
        let node = NodeId::new();
        let name = PartStream::Activity.field_name(node);
        assert!(name.starts_with("activity_file."));
        assert_eq!(PartStream::parse_field_name(&name), Some((PartStream::Activity, node)));
    }

    #[test]
    fn unknown_field_names_are_rejected() {
        assert_eq!(PartStream::parse_field_name("thumbnail"), None);
        assert_eq!(PartStream::parse_field_name("video_file.1234"), None);
        assert_eq!(PartStream::parse_field_name("lecture_file.not-a-uuid"), None);
    }
}

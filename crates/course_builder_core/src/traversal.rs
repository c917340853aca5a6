//! crates/course_builder_core/src/traversal.rs
//!
//! The two-pass traversal that correlates binary parts with tree positions.
//! Both the assembler and the reconstruction pipeline walk the tree through
//! this module and nothing else.
//!
//! Pass one visits every chapter in order and, inside each, its file-typed
//! lectures in order. Pass two visits the chapters again in the same order
//! and, inside each, its activities in order. Sibling order is the ascending
//! `order` field, with list position breaking ties.

use crate::domain::{Chapter, LectureContent, NodeId, Ordered};
use crate::wire::PartStream;

/// Position of one file leaf in the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSlot {
    pub stream: PartStream,
    pub chapter_id: NodeId,
    pub node_id: NodeId,
}

/// A file leaf visited by [`walk_files`], borrowing its handle.
#[derive(Debug)]
pub struct FileLeaf<'a, F> {
    pub slot: FileSlot,
    pub title: &'a str,
    pub handle: &'a F,
}

/// Siblings sorted by their order field. The sort is stable.
pub fn in_order<T: Ordered>(items: &[T]) -> Vec<&T> {
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by_key(|item| item.order());
    sorted
}

pub fn walk_files<F>(chapters: &[Chapter<F>]) -> Vec<FileLeaf<'_, F>> {
    let chapters = in_order(chapters);
    let mut leaves = Vec::new();

    for chapter in &chapters {
        for lecture in in_order(&chapter.lectures) {
            if let LectureContent::File { file } = &lecture.content {
                leaves.push(FileLeaf {
                    slot: FileSlot {
                        stream: PartStream::Lecture,
                        chapter_id: chapter.id,
                        node_id: lecture.id,
                    },
                    title: &lecture.title,
                    handle: file,
                });
            }
        }
    }

    for chapter in &chapters {
        for activity in in_order(&chapter.activities) {
            leaves.push(FileLeaf {
                slot: FileSlot {
                    stream: PartStream::Activity,
                    chapter_id: chapter.id,
                    node_id: activity.id,
                },
                title: &activity.title,
                handle: &activity.file,
            });
        }
    }

    leaves
}

pub fn file_slots<F>(chapters: &[Chapter<F>]) -> Vec<FileSlot> {
    walk_files(chapters).into_iter().map(|leaf| leaf.slot).collect()
}

/// Slots of one stream only, in stream order.
pub fn stream_slots<F>(chapters: &[Chapter<F>], stream: PartStream) -> Vec<FileSlot> {
    file_slots(chapters)
        .into_iter()
        .filter(|slot| slot.stream == stream)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Activity, Lecture};

    fn lecture(order: u32, file: bool) -> Lecture<u32> {
        Lecture {
            id: NodeId::new(),
            title: format!("lecture {order}"),
            duration_minutes: Some(10),
            order,
            free_preview: false,
            content: if file {
                LectureContent::File { file: order }
            } else {
                LectureContent::ReferenceLink {
                    url: "https://video.example/v".to_string(),
                }
            },
        }
    }

    fn activity(order: u32) -> Activity<u32> {
        Activity {
            id: NodeId::new(),
            title: format!("activity {order}"),
            order,
            file: order,
        }
    }

    #[test]
    fn lectures_pass_precedes_activities_pass() {
        let first = Chapter {
            id: NodeId::new(),
            title: "one".to_string(),
            order: 1,
            lectures: vec![lecture(1, true), lecture(2, false)],
            activities: vec![activity(1)],
        };
        let second = Chapter {
            id: NodeId::new(),
            title: "two".to_string(),
            order: 2,
            lectures: vec![lecture(1, true)],
            activities: vec![activity(1)],
        };
        let expected = vec![
            (PartStream::Lecture, first.lectures[0].id),
            (PartStream::Lecture, second.lectures[0].id),
            (PartStream::Activity, first.activities[0].id),
            (PartStream::Activity, second.activities[0].id),
        ];

        // Vec position must not matter, only the order field.
        let chapters = vec![second, first];
        let visited: Vec<_> = file_slots(&chapters)
            .into_iter()
            .map(|s| (s.stream, s.node_id))
            .collect();
        assert_eq!(visited, expected);
    }

    #[test]
    fn siblings_follow_order_field_with_gaps() {
        let mut chapter = Chapter {
            id: NodeId::new(),
            title: "gappy".to_string(),
            order: 1,
            lectures: vec![lecture(7, true), lecture(2, true), lecture(4, true)],
            activities: Vec::new(),
        };
        chapter.lectures.swap(0, 1);
        let orders: Vec<u32> = walk_files(std::slice::from_ref(&chapter))
            .iter()
            .map(|leaf| *leaf.handle)
            .collect();
        assert_eq!(orders, vec![2, 4, 7]);
    }
}

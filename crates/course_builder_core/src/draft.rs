//! crates/course_builder_core/src/draft.rs
//!
//! The client-side course draft: the content tree being authored, plus the
//! staging registry that owns every binary the tree refers to.
//!
//! File leaves hold [`StagedKey`]s into the registry. The draft is the only
//! mutator of both collections, and every removal cascades into the registry,
//! so a key reachable from the tree always resolves unless the registry is
//! edited directly through [`CourseDraft::registry_mut`].

use crate::domain::{Activity, BasicInfo, Chapter, Lecture, LectureContent, NodeId, Ordered};
use crate::error::ValidationError;
use crate::staging::{StagedFile, StagedKey, StagingRegistry};

/// Where a new lecture's content comes from.
#[derive(Debug, Clone)]
pub enum LectureSource {
    ReferenceLink(String),
    Upload(StagedFile),
}

#[derive(Debug, Clone)]
pub struct NewLecture {
    pub title: String,
    pub duration_minutes: Option<u32>,
    pub free_preview: bool,
    pub source: LectureSource,
}

#[derive(Debug, Default)]
pub struct CourseDraft {
    pub basic: BasicInfo,
    thumbnail: Option<StagedKey>,
    chapters: Vec<Chapter<StagedKey>>,
    registry: StagingRegistry,
    /// Last order value handed out.
    last_order: u32,
}

impl CourseDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chapters(&self) -> &[Chapter<StagedKey>] {
        &self.chapters
    }

    pub fn chapter(&self, chapter_id: NodeId) -> Option<&Chapter<StagedKey>> {
        self.chapters.iter().find(|c| c.id == chapter_id)
    }

    pub fn registry(&self) -> &StagingRegistry {
        &self.registry
    }

    /// Direct access to the registry, bypassing the tree's cascades.
    pub fn registry_mut(&mut self) -> &mut StagingRegistry {
        &mut self.registry
    }

    pub fn thumbnail(&self) -> Option<StagedKey> {
        self.thumbnail
    }

    pub fn set_thumbnail(&mut self, file: StagedFile) -> StagedKey {
        if let Some(old) = self.thumbnail.take() {
            self.registry.unstage(old);
        }
        let key = self.registry.stage(file);
        self.thumbnail = Some(key);
        key
    }

    pub fn clear_thumbnail(&mut self) {
        if let Some(old) = self.thumbnail.take() {
            self.registry.unstage(old);
        }
    }

    // --- Chapters ---

    pub fn add_chapter(&mut self, title: impl Into<String>) -> NodeId {
        let id = NodeId::new();
        let order = self.next_order();
        self.chapters.push(Chapter {
            id,
            title: title.into(),
            order,
            lectures: Vec::new(),
            activities: Vec::new(),
        });
        id
    }

    /// Removes the chapter with its lectures, activities and their staged files.
    /// Siblings keep their order values.
    pub fn remove_chapter(&mut self, chapter_id: NodeId) -> Result<(), ValidationError> {
        let index = self
            .chapters
            .iter()
            .position(|c| c.id == chapter_id)
            .ok_or(ValidationError::UnknownChapter(chapter_id))?;
        let chapter = self.chapters.remove(index);

        for lecture in &chapter.lectures {
            if let Some(key) = lecture.content.file() {
                self.registry.unstage(*key);
            }
        }
        for activity in &chapter.activities {
            self.registry.unstage(activity.file);
        }
        Ok(())
    }

    pub fn rename_chapter(
        &mut self,
        chapter_id: NodeId,
        title: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.chapter_mut(chapter_id)?.title = title.into();
        Ok(())
    }

    pub fn swap_chapters(&mut self, a: NodeId, b: NodeId) -> Result<(), ValidationError> {
        swap_order(&mut self.chapters, a, b)
    }

    // --- Lectures ---

    pub fn add_lecture(
        &mut self,
        chapter_id: NodeId,
        lecture: NewLecture,
    ) -> Result<NodeId, ValidationError> {
        self.chapter_mut(chapter_id)?;
        let order = self.next_order();
        let content = match lecture.source {
            LectureSource::ReferenceLink(url) => LectureContent::ReferenceLink { url },
            LectureSource::Upload(file) => LectureContent::File {
                file: self.registry.stage(file),
            },
        };
        let id = NodeId::new();
        self.chapter_mut(chapter_id)?.lectures.push(Lecture {
            id,
            title: lecture.title,
            duration_minutes: lecture.duration_minutes.filter(|m| *m > 0),
            order,
            free_preview: lecture.free_preview,
            content,
        });
        Ok(id)
    }

    pub fn remove_lecture(
        &mut self,
        chapter_id: NodeId,
        lecture_id: NodeId,
    ) -> Result<(), ValidationError> {
        let chapter = self.chapter_mut(chapter_id)?;
        let index = chapter
            .lectures
            .iter()
            .position(|l| l.id == lecture_id)
            .ok_or(ValidationError::UnknownNode(lecture_id))?;
        let lecture = chapter.lectures.remove(index);
        if let Some(key) = lecture.content.file() {
            self.registry.unstage(*key);
        }
        Ok(())
    }

    pub fn swap_lectures(
        &mut self,
        chapter_id: NodeId,
        a: NodeId,
        b: NodeId,
    ) -> Result<(), ValidationError> {
        swap_order(&mut self.chapter_mut(chapter_id)?.lectures, a, b)
    }

    // --- Activities ---

    /// Attaches an activity to an existing chapter.
    pub fn add_activity(
        &mut self,
        chapter_id: NodeId,
        title: impl Into<String>,
        file: StagedFile,
    ) -> Result<NodeId, ValidationError> {
        self.chapter_mut(chapter_id)?;
        let order = self.next_order();
        let key = self.registry.stage(file);
        let id = NodeId::new();
        self.chapter_mut(chapter_id)?.activities.push(Activity {
            id,
            title: title.into(),
            order,
            file: key,
        });
        Ok(id)
    }

    pub fn remove_activity(
        &mut self,
        chapter_id: NodeId,
        activity_id: NodeId,
    ) -> Result<(), ValidationError> {
        let chapter = self.chapter_mut(chapter_id)?;
        let index = chapter
            .activities
            .iter()
            .position(|a| a.id == activity_id)
            .ok_or(ValidationError::UnknownNode(activity_id))?;
        let activity = chapter.activities.remove(index);
        self.registry.unstage(activity.file);
        Ok(())
    }

    pub fn swap_activities(
        &mut self,
        chapter_id: NodeId,
        a: NodeId,
        b: NodeId,
    ) -> Result<(), ValidationError> {
        swap_order(&mut self.chapter_mut(chapter_id)?.activities, a, b)
    }

    fn chapter_mut(&mut self, chapter_id: NodeId) -> Result<&mut Chapter<StagedKey>, ValidationError> {
        self.chapters
            .iter_mut()
            .find(|c| c.id == chapter_id)
            .ok_or(ValidationError::UnknownChapter(chapter_id))
    }

    /// Every order value in the draft comes from this counter, so the result
    /// is above `max(existing)` in any sibling list and a deleted value is
    /// never handed out again.
    fn next_order(&mut self) -> u32 {
        self.last_order += 1;
        self.last_order
    }
}

fn swap_order<T: Ordered>(items: &mut [T], a: NodeId, b: NodeId) -> Result<(), ValidationError> {
    let ia = items
        .iter()
        .position(|i| i.id() == a)
        .ok_or(ValidationError::UnknownNode(a))?;
    let ib = items
        .iter()
        .position(|i| i.id() == b)
        .ok_or(ValidationError::UnknownNode(b))?;
    let (oa, ob) = (items[ia].order(), items[ib].order());
    items[ia].set_order(ob);
    items[ib].set_order(oa);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf() -> StagedFile {
        StagedFile::new("slides.pdf", "application/pdf", b"%PDF".to_vec())
    }

    fn file_lecture(title: &str) -> NewLecture {
        NewLecture {
            title: title.to_string(),
            duration_minutes: None,
            free_preview: false,
            source: LectureSource::Upload(pdf()),
        }
    }

    #[test]
    fn removing_a_chapter_unstages_its_files() {
        let mut draft = CourseDraft::new();
        let chapter = draft.add_chapter("Basics");
        let lecture = draft.add_lecture(chapter, file_lecture("Intro")).unwrap();
        draft.add_activity(chapter, "Worksheet", pdf()).unwrap();
        let key = *draft.chapter(chapter).unwrap().lectures[0].content.file().unwrap();
        assert_eq!(draft.registry().len(), 2);

        draft.remove_chapter(chapter).unwrap();

        assert!(draft.registry().is_empty());
        assert!(draft.registry().resolve(key).is_none());
        assert!(draft.chapter(chapter).is_none());
        assert!(matches!(
            draft.remove_lecture(chapter, lecture),
            Err(ValidationError::UnknownChapter(_))
        ));
    }

    #[test]
    fn removing_a_lecture_after_direct_unstage_is_harmless() {
        let mut draft = CourseDraft::new();
        let chapter = draft.add_chapter("Basics");
        let lecture = draft.add_lecture(chapter, file_lecture("Intro")).unwrap();
        let key = *draft.chapter(chapter).unwrap().lectures[0].content.file().unwrap();

        draft.registry_mut().unstage(key);
        draft.remove_lecture(chapter, lecture).unwrap();

        assert!(draft.registry().is_empty());
    }

    #[test]
    fn order_values_are_never_reused() {
        let mut draft = CourseDraft::new();
        let first = draft.add_chapter("One");
        let second = draft.add_chapter("Two");
        let second_order = draft.chapter(second).unwrap().order;
        draft.remove_chapter(second).unwrap();
        let third = draft.add_chapter("Three");

        let first_order = draft.chapter(first).unwrap().order;
        let third_order = draft.chapter(third).unwrap().order;
        assert!(third_order > second_order);
        assert!(third_order > first_order);
    }

    #[test]
    fn swapping_keeps_sibling_orders_unique() {
        let mut draft = CourseDraft::new();
        let a = draft.add_chapter("A");
        let b = draft.add_chapter("B");
        let (oa, ob) = (draft.chapter(a).unwrap().order, draft.chapter(b).unwrap().order);

        draft.swap_chapters(a, b).unwrap();

        assert_eq!(draft.chapter(a).unwrap().order, ob);
        assert_eq!(draft.chapter(b).unwrap().order, oa);
    }

    #[test]
    fn activities_need_an_existing_chapter() {
        let mut draft = CourseDraft::new();
        let missing = NodeId::new();
        assert_eq!(
            draft.add_activity(missing, "Quiz", pdf()),
            Err(ValidationError::UnknownChapter(missing))
        );
        assert!(draft.registry().is_empty());
    }

    #[test]
    fn replacing_the_thumbnail_unstages_the_old_one() {
        let mut draft = CourseDraft::new();
        let old = draft.set_thumbnail(StagedFile::new("a.png", "image/png", vec![1u8]));
        let new = draft.set_thumbnail(StagedFile::new("b.png", "image/png", vec![2u8]));
        assert!(draft.registry().resolve(old).is_none());
        assert!(draft.registry().resolve(new).is_some());
        assert_eq!(draft.registry().len(), 1);
    }
}

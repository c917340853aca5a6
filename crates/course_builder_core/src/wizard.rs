//! crates/course_builder_core/src/wizard.rs
//!
//! The multi-step course builder. Steps run strictly in order; moving forward
//! requires the current step to be complete, moving back is always allowed
//! and never discards anything.

use uuid::Uuid;

use crate::assembler::assemble;
use crate::domain::{validate_chapters, CourseCode};
use crate::draft::CourseDraft;
use crate::error::ValidationError;
use crate::wire::Submission;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    BasicInfo,
    Thumbnail,
    Chapters,
    Activities,
    Review,
}

impl Step {
    pub fn following(self) -> Option<Step> {
        match self {
            Step::BasicInfo => Some(Step::Thumbnail),
            Step::Thumbnail => Some(Step::Chapters),
            Step::Chapters => Some(Step::Activities),
            Step::Activities => Some(Step::Review),
            Step::Review => None,
        }
    }

    pub fn preceding(self) -> Option<Step> {
        match self {
            Step::BasicInfo => None,
            Step::Thumbnail => Some(Step::BasicInfo),
            Step::Chapters => Some(Step::Thumbnail),
            Step::Activities => Some(Step::Chapters),
            Step::Review => Some(Step::Activities),
        }
    }

    /// Why this step cannot be left yet, if it cannot.
    pub fn incomplete_reason(self, draft: &CourseDraft) -> Option<ValidationError> {
        match self {
            Step::BasicInfo => {
                if draft.basic.title.trim().is_empty() {
                    return Some(ValidationError::MissingTitle);
                }
                CourseCode::parse(&draft.basic.code).err()
            }
            Step::Thumbnail => {
                let staged = draft
                    .thumbnail()
                    .is_some_and(|key| draft.registry().resolve(key).is_some());
                (!staged).then_some(ValidationError::MissingThumbnail)
            }
            Step::Chapters => validate_chapters(draft.chapters()).err(),
            Step::Activities => draft.chapters().iter().find_map(|chapter| {
                chapter
                    .activities
                    .iter()
                    .find(|a| draft.registry().resolve(a.file).is_none())
                    .map(|a| ValidationError::UnresolvedFile {
                        node: a.id,
                        title: a.title.clone(),
                    })
            }),
            Step::Review => None,
        }
    }

    pub fn is_complete(self, draft: &CourseDraft) -> bool {
        self.incomplete_reason(draft).is_none()
    }
}

#[derive(Debug)]
pub struct Wizard {
    step: Step,
    draft: CourseDraft,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

impl Wizard {
    pub fn new() -> Self {
        Self {
            step: Step::BasicInfo,
            draft: CourseDraft::new(),
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn draft(&self) -> &CourseDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut CourseDraft {
        &mut self.draft
    }

    pub fn is_complete(&self) -> bool {
        self.step.is_complete(&self.draft)
    }

    /// Moves to the next step, or explains why the current one is not done.
    /// Calling this on the review step leaves the wizard where it is.
    pub fn next(&mut self) -> Result<Step, ValidationError> {
        if let Some(reason) = self.step.incomplete_reason(&self.draft) {
            return Err(reason);
        }
        if let Some(step) = self.step.following() {
            self.step = step;
        }
        Ok(self.step)
    }

    pub fn back(&mut self) -> Step {
        if let Some(step) = self.step.preceding() {
            self.step = step;
        }
        self.step
    }

    /// Builds the submission payload. Only the review step may submit.
    pub fn assemble(&self, submission_id: Uuid) -> Result<Submission, ValidationError> {
        if self.step != Step::Review {
            return Err(ValidationError::NotAtReview);
        }
        assemble(&self.draft, submission_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{LectureSource, NewLecture};
    use crate::staging::StagedFile;

    fn pdf() -> StagedFile {
        StagedFile::new("notes.pdf", "application/pdf", b"%PDF".to_vec())
    }

    #[test]
    fn walks_every_step_in_order() {
        let mut wizard = Wizard::new();
        assert_eq!(wizard.next(), Err(ValidationError::MissingTitle));

        wizard.draft_mut().basic.title = "Async Rust".to_string();
        assert_eq!(wizard.next(), Err(ValidationError::MissingCode));
        wizard.draft_mut().basic.code = "ASYNC-1".to_string();
        assert_eq!(wizard.next(), Ok(Step::Thumbnail));

        assert_eq!(wizard.next(), Err(ValidationError::MissingThumbnail));
        wizard
            .draft_mut()
            .set_thumbnail(StagedFile::new("cover.png", "image/png", vec![1u8, 2, 3]));
        assert_eq!(wizard.next(), Ok(Step::Chapters));

        assert_eq!(wizard.next(), Err(ValidationError::NoChapters));
        let chapter = wizard.draft_mut().add_chapter("Futures");
        assert!(matches!(wizard.next(), Err(ValidationError::EmptyChapter { .. })));
        wizard
            .draft_mut()
            .add_lecture(
                chapter,
                NewLecture {
                    title: "Polling".to_string(),
                    duration_minutes: Some(8),
                    free_preview: true,
                    source: LectureSource::ReferenceLink("https://v.example/poll".to_string()),
                },
            )
            .unwrap();
        assert_eq!(wizard.next(), Ok(Step::Activities));

        // Activities are optional.
        assert!(wizard.is_complete());
        assert_eq!(wizard.next(), Ok(Step::Review));
        assert_eq!(wizard.next(), Ok(Step::Review));

        let submission = wizard.assemble(Uuid::new_v4()).unwrap();
        assert!(submission.lecture_parts.is_empty());
        assert!(submission.activity_parts.is_empty());
    }

    #[test]
    fn activities_step_requires_resolvable_files() {
        let mut wizard = Wizard::new();
        let chapter = wizard.draft_mut().add_chapter("Intro");
        let activity = wizard.draft_mut().add_activity(chapter, "Quiz", pdf()).unwrap();
        assert!(Step::Activities.is_complete(wizard.draft()));

        let key = wizard.draft().chapter(chapter).unwrap().activities[0].file;
        wizard.draft_mut().registry_mut().unstage(key);
        assert!(matches!(
            Step::Activities.incomplete_reason(wizard.draft()),
            Some(ValidationError::UnresolvedFile { node, .. }) if node == activity
        ));
    }

    #[test]
    fn back_never_discards_state() {
        let mut wizard = Wizard::new();
        wizard.draft_mut().basic.title = "Traits".to_string();
        wizard.draft_mut().basic.code = "TRAIT-9".to_string();
        wizard.next().unwrap();
        assert_eq!(wizard.back(), Step::BasicInfo);
        assert_eq!(wizard.back(), Step::BasicInfo);
        assert_eq!(wizard.draft().basic.title, "Traits");
        assert_eq!(wizard.next(), Ok(Step::Thumbnail));
    }

    #[test]
    fn only_review_may_assemble() {
        let wizard = Wizard::new();
        assert_eq!(
            wizard.assemble(Uuid::new_v4()).unwrap_err(),
            ValidationError::NotAtReview
        );
    }
}

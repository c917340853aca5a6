//! End-to-end submission tests: wizard → assembler → reconstruction pipeline,
//! run against the in-memory adapters.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use course_builder_core::draft::{LectureSource, NewLecture};
use course_builder_core::memory::{InMemoryCourseStore, InMemoryObjectStore};
use course_builder_core::ports::CreateCourseError;
use course_builder_core::quota::TRIAL_LIMIT;
use course_builder_core::sweep::sweep_orphans;
use course_builder_core::traversal::file_slots;
use course_builder_core::{
    Author, Course, CourseCode, CourseStore, FailureKind, LectureContent, NewCourse, ObjectStore,
    PortResult, QuotaCharge, QuotaLedger, ReconstructionPipeline, StagedFile, Submission,
    SubmissionError, ValidationError, Wizard,
};
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    store: Arc<InMemoryCourseStore>,
    objects: Arc<InMemoryObjectStore>,
    pipeline: ReconstructionPipeline,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryCourseStore::new());
    let objects = Arc::new(InMemoryObjectStore::new());
    let pipeline = ReconstructionPipeline::new(store.clone(), store.clone(), objects.clone());
    Harness {
        store,
        objects,
        pipeline,
    }
}

/// Wraps the in-memory store but misses every existing course in its
/// lookups, so duplicates are only caught when `create` runs.
struct BlindLookups(Arc<InMemoryCourseStore>);

#[async_trait]
impl CourseStore for BlindLookups {
    async fn find_by_code(&self, _code: &CourseCode) -> PortResult<Option<Course>> {
        Ok(None)
    }

    async fn create(
        &self,
        course: NewCourse,
        charge: Option<QuotaCharge>,
    ) -> Result<Course, CreateCourseError> {
        self.0.create(course, charge).await
    }

    async fn submission_landed(&self, _submission_id: Uuid) -> PortResult<bool> {
        Ok(false)
    }

    async fn namespace_landed(&self, namespace: Uuid) -> PortResult<bool> {
        self.0.namespace_landed(namespace).await
    }
}

/// A ledger that always reads zero, as a concurrent submission would see
/// it before the other one commits.
struct StaleLedger;

#[async_trait]
impl QuotaLedger for StaleLedger {
    async fn charged_count(&self, _author_id: Uuid) -> PortResult<u32> {
        Ok(0)
    }
}

fn harness_with(
    store: Arc<dyn CourseStore>,
    quota: Arc<dyn QuotaLedger>,
) -> (Arc<InMemoryObjectStore>, ReconstructionPipeline) {
    let objects = Arc::new(InMemoryObjectStore::new());
    let pipeline = ReconstructionPipeline::new(store, quota, objects.clone());
    (objects, pipeline)
}

fn trial_author() -> Author {
    Author {
        id: Uuid::new_v4(),
        entitled: false,
    }
}

/// Content of every file is its own name, so a misattributed part is visible.
fn named_file(name: &str) -> StagedFile {
    StagedFile::new(name, "application/pdf", name.as_bytes().to_vec())
}

fn upload(title: &str) -> NewLecture {
    NewLecture {
        title: title.to_string(),
        duration_minutes: None,
        free_preview: false,
        source: LectureSource::Upload(named_file(title)),
    }
}

/// Two chapters, three file lectures, one link lecture, three activities.
fn build_submission(code: &str) -> Submission {
    let mut wizard = Wizard::new();
    let draft = wizard.draft_mut();
    draft.basic.title = "Systems Programming".to_string();
    draft.basic.code = code.to_string();
    draft.basic.description = "<p>Memory, threads and I/O.</p>".to_string();
    draft.set_thumbnail(StagedFile::new("cover.png", "image/png", vec![0x89, b'P', b'N', b'G']));

    let memory = draft.add_chapter("Memory");
    let threads = draft.add_chapter("Threads");
    draft.add_lecture(threads, upload("threads-1.pdf")).unwrap();
    draft.add_lecture(memory, upload("memory-1.pdf")).unwrap();
    draft
        .add_lecture(
            memory,
            NewLecture {
                title: "Stack vs heap".to_string(),
                duration_minutes: Some(14),
                free_preview: true,
                source: LectureSource::ReferenceLink("https://video.example/stack".to_string()),
            },
        )
        .unwrap();
    draft.add_lecture(memory, upload("memory-2.pdf")).unwrap();
    draft.add_activity(threads, "threads-quiz.pdf", named_file("threads-quiz.pdf")).unwrap();
    draft.add_activity(memory, "memory-lab.pdf", named_file("memory-lab.pdf")).unwrap();
    draft.add_activity(memory, "memory-quiz.pdf", named_file("memory-quiz.pdf")).unwrap();

    while wizard.next().unwrap() != course_builder_core::Step::Review {}
    wizard.assemble(Uuid::new_v4()).unwrap()
}

#[tokio::test]
async fn every_pending_node_receives_its_own_file() {
    let h = harness();
    let submission = build_submission("SYS-101");
    let submission_id = submission.submission_id;

    let course = h.pipeline.submit(&trial_author(), submission).await.unwrap();

    assert_eq!(course.code.as_str(), "SYS-101");
    assert_eq!(course.submission_id, submission_id);
    assert_eq!(h.store.course_count().await, 1);
    assert_eq!(
        h.objects.fetch(&course.thumbnail_url).await.as_deref(),
        Some(&[0x89, b'P', b'N', b'G'][..])
    );

    let mut files = 0;
    for chapter in &course.chapters {
        for lecture in &chapter.lectures {
            match &lecture.content {
                LectureContent::File { file } => {
                    let stored = h.objects.fetch(&file.url).await.unwrap();
                    assert_eq!(stored.as_ref(), lecture.title.as_bytes());
                    files += 1;
                }
                LectureContent::ReferenceLink { url } => {
                    assert_eq!(url, "https://video.example/stack");
                }
            }
        }
        for activity in &chapter.activities {
            let stored = h.objects.fetch(&activity.file.url).await.unwrap();
            assert_eq!(stored.as_ref(), activity.title.as_bytes());
            files += 1;
        }
    }
    assert_eq!(files, 6);
    assert_ne!(course.storage_namespace, submission_id);
    assert_eq!(h.objects.object_count(course.storage_namespace).await, 7);
}

#[tokio::test]
async fn traversal_is_a_function_of_the_document() {
    let submission = build_submission("SYS-102");
    let json = serde_json::to_string(&submission.document).unwrap();
    let received: course_builder_core::CourseDocument = serde_json::from_str(&json).unwrap();

    let sent_tags: Vec<_> = submission
        .lecture_parts
        .iter()
        .chain(&submission.activity_parts)
        .map(|p| p.node_id)
        .collect();
    let recomputed: Vec<_> = file_slots(&received.chapters)
        .into_iter()
        .map(|s| s.node_id)
        .collect();
    assert_eq!(sent_tags, recomputed);
}

#[tokio::test]
async fn missing_part_persists_nothing() {
    let h = harness();
    let mut submission = build_submission("SYS-103");
    submission.activity_parts.pop();

    let err = h.pipeline.submit(&trial_author(), submission).await.unwrap_err();

    assert!(matches!(
        err,
        SubmissionError::Validation(ValidationError::PartCountMismatch {
            expected: 3,
            received: 2,
            ..
        })
    ));
    assert_eq!(err.kind(), FailureKind::Validation);
    assert_eq!(h.store.course_count().await, 0);
    assert_eq!(h.objects.namespace_count().await, 0);
}

#[tokio::test]
async fn reordered_parts_are_caught_by_their_tags() {
    let h = harness();
    let mut submission = build_submission("SYS-104");
    submission.lecture_parts.swap(0, 1);

    let err = h.pipeline.submit(&trial_author(), submission).await.unwrap_err();

    assert!(matches!(
        err,
        SubmissionError::Validation(ValidationError::PartOutOfPlace { position: 0, .. })
    ));
    assert_eq!(h.store.course_count().await, 0);
}

#[tokio::test]
async fn missing_thumbnail_is_rejected_before_upload() {
    let h = harness();
    let mut submission = build_submission("SYS-105");
    submission.thumbnail = None;

    let err = h.pipeline.submit(&trial_author(), submission).await.unwrap_err();

    assert!(matches!(
        err,
        SubmissionError::Validation(ValidationError::MissingThumbnail)
    ));
    assert_eq!(h.objects.namespace_count().await, 0);
}

#[tokio::test]
async fn duplicate_code_is_a_conflict() {
    let h = harness();
    let author = trial_author();
    h.pipeline.submit(&author, build_submission("DUP-1")).await.unwrap();

    let err = h
        .pipeline
        .submit(&author, build_submission("dup-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::Conflict(ref code) if code.as_str() == "DUP-1"));
    assert_eq!(err.kind(), FailureKind::Conflict);
    assert_eq!(h.store.course_count().await, 1);
    // The rejected attempt did not consume quota.
    for code in ["DUP-2", "DUP-3"] {
        h.pipeline.submit(&author, build_submission(code)).await.unwrap();
    }
}

#[tokio::test]
async fn fourth_trial_course_is_rejected() {
    let h = harness();
    let author = trial_author();
    for code in ["TRIAL-1", "TRIAL-2", "TRIAL-3"] {
        h.pipeline.submit(&author, build_submission(code)).await.unwrap();
    }
    assert_eq!(h.store.charged_count(author.id).await.unwrap(), TRIAL_LIMIT);

    let err = h
        .pipeline
        .submit(&author, build_submission("TRIAL-4"))
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::QuotaExceeded { limit: 3 }));
    assert!(err.to_string().contains("Upgrade"));
    assert_eq!(h.store.charged_count(author.id).await.unwrap(), 3);
    assert_eq!(h.store.course_count().await, 3);
    assert_eq!(h.objects.namespace_count().await, 3);
}

#[tokio::test]
async fn entitled_authors_are_neither_limited_nor_charged() {
    let h = harness();
    let author = Author {
        id: Uuid::new_v4(),
        entitled: true,
    };
    for n in 1..=4 {
        h.pipeline
            .submit(&author, build_submission(&format!("PRO-{n}")))
            .await
            .unwrap();
    }
    assert_eq!(h.store.charged_count(author.id).await.unwrap(), 0);
    assert_eq!(h.store.course_count().await, 4);
}

#[tokio::test]
async fn failed_upload_aborts_and_cleans_up() {
    let h = harness();
    h.objects.fail_uploads_matching("memory-lab").await;
    let author = trial_author();
    let submission = build_submission("FAIL-1");

    let err = h.pipeline.submit(&author, submission).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Upload);
    assert_eq!(h.store.course_count().await, 0);
    assert_eq!(h.objects.namespace_count().await, 0);
    assert_eq!(h.store.charged_count(author.id).await.unwrap(), 0);
}

#[tokio::test]
async fn sweep_removes_only_orphaned_namespaces() {
    let h = harness();
    let landed = h
        .pipeline
        .submit(&trial_author(), build_submission("KEEP-1"))
        .await
        .unwrap();

    let orphan = Uuid::new_v4();
    h.objects
        .upload(orphan, "thumbnail/cover.png", "image/png", vec![1u8].into())
        .await
        .unwrap();
    let fresh_orphan = Uuid::new_v4();
    h.objects
        .upload(fresh_orphan, "thumbnail/cover.png", "image/png", vec![2u8].into())
        .await
        .unwrap();

    let long_ago = Utc::now() - Duration::days(3);
    h.objects.set_touched_at(orphan, long_ago).await;
    h.objects.set_touched_at(landed.storage_namespace, long_ago).await;

    let cutoff = Utc::now() - Duration::days(1);
    let removed = sweep_orphans(h.objects.as_ref(), h.store.as_ref(), cutoff)
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert_eq!(h.objects.object_count(orphan).await, 0);
    assert_eq!(h.objects.object_count(fresh_orphan).await, 1);
    assert_eq!(h.objects.object_count(landed.storage_namespace).await, 7);
}

#[tokio::test]
async fn reused_submission_id_leaves_the_landed_course_intact() {
    let h = harness();
    let first = build_submission("VICTIM-1");
    let reused_id = first.submission_id;
    let landed = h.pipeline.submit(&trial_author(), first).await.unwrap();

    h.objects.fail_uploads_matching("memory-lab").await;
    let mut second = build_submission("OTHER-1");
    second.submission_id = reused_id;
    let err = h.pipeline.submit(&trial_author(), second).await.unwrap_err();

    assert!(matches!(err, SubmissionError::AlreadySubmitted(id) if id == reused_id));
    assert_eq!(err.kind(), FailureKind::Conflict);
    assert_eq!(h.store.course_count().await, 1);
    assert_eq!(h.objects.object_count(landed.storage_namespace).await, 7);
    assert_eq!(
        h.objects.fetch(&landed.thumbnail_url).await.as_deref(),
        Some(&[0x89, b'P', b'N', b'G'][..])
    );
}

#[tokio::test]
async fn store_constraint_catches_a_code_the_lookup_missed() {
    let store = Arc::new(InMemoryCourseStore::new());
    let (objects, pipeline) = harness_with(Arc::new(BlindLookups(store.clone())), store.clone());
    let author = trial_author();
    let landed = pipeline.submit(&author, build_submission("RACE-1")).await.unwrap();

    let err = pipeline
        .submit(&author, build_submission("RACE-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::Conflict(ref code) if code.as_str() == "RACE-1"));
    assert_eq!(store.course_count().await, 1);
    assert_eq!(store.charged_count(author.id).await.unwrap(), 1);
    // Only the landed course's namespace survives.
    assert_eq!(objects.namespace_count().await, 1);
    assert_eq!(objects.object_count(landed.storage_namespace).await, 7);
}

#[tokio::test]
async fn store_constraint_catches_a_reused_submission_id() {
    let store = Arc::new(InMemoryCourseStore::new());
    let (objects, pipeline) = harness_with(Arc::new(BlindLookups(store.clone())), store.clone());
    let first = build_submission("ONCE-1");
    let reused_id = first.submission_id;
    let landed = pipeline.submit(&trial_author(), first).await.unwrap();

    let mut second = build_submission("ONCE-2");
    second.submission_id = reused_id;
    let err = pipeline.submit(&trial_author(), second).await.unwrap_err();

    assert!(matches!(err, SubmissionError::AlreadySubmitted(id) if id == reused_id));
    assert_eq!(store.course_count().await, 1);
    assert_eq!(objects.namespace_count().await, 1);
    assert_eq!(objects.object_count(landed.storage_namespace).await, 7);
}

#[tokio::test]
async fn store_rechecks_the_trial_limit_on_persist() {
    let store = Arc::new(InMemoryCourseStore::new());
    let (objects, pipeline) = harness_with(store.clone(), Arc::new(StaleLedger));
    let author = trial_author();
    for code in ["LATE-1", "LATE-2", "LATE-3"] {
        pipeline.submit(&author, build_submission(code)).await.unwrap();
    }

    let err = pipeline
        .submit(&author, build_submission("LATE-4"))
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::QuotaExceeded { limit: 3 }));
    assert_eq!(store.charged_count(author.id).await.unwrap(), TRIAL_LIMIT);
    assert_eq!(store.course_count().await, 3);
    assert_eq!(objects.namespace_count().await, 3);
}

pub mod assembler;
pub mod domain;
pub mod draft;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod ports;
pub mod quota;
pub mod staging;
pub mod sweep;
pub mod traversal;
pub mod wire;
pub mod wizard;

pub use domain::{
    Activity, Author, BasicInfo, Chapter, Course, CourseCode, CourseDocument, Lecture,
    LectureContent, NewCourse, NodeId, PendingUpload, Rating, StoredObject,
};
pub use error::{FailureKind, SubmissionError, ValidationError};
pub use pipeline::ReconstructionPipeline;
pub use ports::{
    CourseStore, CreateCourseError, IdentityService, ObjectStore, PortError, PortResult,
    QuotaCharge, QuotaLedger,
};
pub use staging::{StagedFile, StagedKey, StagingRegistry};
pub use wire::{PartStream, Submission, TaggedPart};
pub use wizard::{Step, Wizard};

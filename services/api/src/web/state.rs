//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use course_builder_core::ports::{CourseStore, IdentityService, ObjectStore, QuotaLedger};
use course_builder_core::ReconstructionPipeline;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentityService>,
    pub courses: Arc<dyn CourseStore>,
    pub quota: Arc<dyn QuotaLedger>,
    pub pipeline: ReconstructionPipeline,
}

impl AppState {
    /// Wires the reconstruction pipeline over the given adapters.
    pub fn new(
        config: Arc<Config>,
        identity: Arc<dyn IdentityService>,
        courses: Arc<dyn CourseStore>,
        quota: Arc<dyn QuotaLedger>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let pipeline = ReconstructionPipeline::new(courses.clone(), quota.clone(), objects);
        Self {
            config,
            identity,
            courses,
            quota,
            pipeline,
        }
    }
}

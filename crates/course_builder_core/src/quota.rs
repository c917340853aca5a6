//! crates/course_builder_core/src/quota.rs
//!
//! The trial quota gate. Entitled authors may always create courses; everyone
//! else may create up to [`TRIAL_LIMIT`].

use uuid::Uuid;

use crate::domain::Author;
use crate::error::SubmissionError;
use crate::ports::{QuotaCharge, QuotaLedger};

pub const TRIAL_LIMIT: u32 = 3;

pub struct QuotaGate;

impl QuotaGate {
    /// Decides whether `author` may submit another course.
    ///
    /// On success returns the charge to apply together with the persist, or
    /// `None` for entitled authors, who are never charged. Nothing is
    /// recorded here, so a submission rejected later costs no quota. The
    /// count read here can be stale; the store re-checks it on persist.
    pub async fn check(
        author: &Author,
        submission_id: Uuid,
        ledger: &dyn QuotaLedger,
    ) -> Result<Option<QuotaCharge>, SubmissionError> {
        if author.entitled {
            return Ok(None);
        }

        let used = ledger
            .charged_count(author.id)
            .await
            .map_err(|source| SubmissionError::Port { submission_id, source })?;
        if used >= TRIAL_LIMIT {
            return Err(SubmissionError::QuotaExceeded { limit: TRIAL_LIMIT });
        }

        Ok(Some(QuotaCharge {
            author_id: author.id,
            submission_id,
            limit: TRIAL_LIMIT,
        }))
    }
}

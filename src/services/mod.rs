pub(crate) mod access_codes;
pub(crate) mod answer_ledger;
pub(crate) mod attempt_control;
pub(crate) mod attempt_state;
pub(crate) mod attempt_timing;
pub(crate) mod eligibility;
pub(crate) mod errors;
pub(crate) mod grading_reconcile;
pub(crate) mod materializer;
pub(crate) mod proctoring;
pub(crate) mod scoring;

pub(crate) use errors::AttemptError;

use crate::db::types::UserRole;

/// The authenticated caller of a service operation.
#[derive(Debug, Clone)]
pub(crate) struct Actor {
    pub(crate) id: String,
    pub(crate) role: UserRole,
}

impl Actor {
    pub(crate) fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub(crate) fn is_staff(&self) -> bool {
        self.role != UserRole::Candidate
    }
}

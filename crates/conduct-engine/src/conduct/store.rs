use chrono::{DateTime, Utc};
use thiserror::Error;

use super::domain::{
    ClassificationState, ClassificationTransition, Sanction, SanctionId, SubjectId, SubjectProfile,
};

/// Persistence boundary for the engine. The service layer only talks to this
/// trait; deployments bring their own backend.
pub trait ConductStore: Send + Sync {
    fn get_subject(&self, id: &SubjectId) -> Result<Option<SubjectProfile>, StoreError>;

    /// Subjects the classification applies to, in roster order.
    fn list_eligible(&self) -> Result<Vec<SubjectId>, StoreError>;

    fn get_sanction(&self, id: &SanctionId) -> Result<Option<Sanction>, StoreError>;

    fn insert_sanction(&self, sanction: Sanction) -> Result<(), StoreError>;

    fn update_sanction(&self, sanction: Sanction) -> Result<(), StoreError>;

    fn remove_sanction(&self, id: &SanctionId) -> Result<Option<Sanction>, StoreError>;

    fn list_sanctions(&self, subject: &SubjectId) -> Result<Vec<Sanction>, StoreError>;

    fn get_state(&self, subject: &SubjectId) -> Result<Option<ClassificationState>, StoreError>;

    fn put_state(&self, state: ClassificationState) -> Result<(), StoreError>;

    fn list_states(&self) -> Result<Vec<ClassificationState>, StoreError>;

    fn append_transition(&self, transition: ClassificationTransition) -> Result<(), StoreError>;

    fn list_transitions(
        &self,
        subject: &SubjectId,
    ) -> Result<Vec<ClassificationTransition>, StoreError>;

    fn list_transitions_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ClassificationTransition>, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

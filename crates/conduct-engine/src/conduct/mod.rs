//! Disciplinary conduct classification for enlisted personnel.
//!
//! Sanction bookkeeping, the window rule table, per-subject reclassification,
//! the scheduled recomputation worker, and the HTTP surface exposing them.

pub mod bulletin;
pub mod classifier;
pub mod clock;
pub mod conversion;
pub mod domain;
mod locks;
pub mod report;
pub mod router;
pub mod rules;
pub mod service;
pub mod store;
pub mod worker;

#[cfg(test)]
mod tests;

pub use bulletin::{import_ledger, import_ledger_from_path, BulletinImportError, BulletinLedger};
pub use classifier::{ClassificationOutcome, ConductClassifier, EvaluationDetail};
pub use clock::{Clock, SystemClock};
pub use conversion::{ConversionScale, DayTotals};
pub use domain::{
    AccumulatedSanctions, ClassificationState, ClassificationTransition, ConductTier, Rank,
    Sanction, SanctionId, SanctionKind, SubjectId, SubjectProfile, ValidationError,
};
pub use report::{
    AttentionEntry, ClassificationStateView, ConductDashboard, MonthlyTrendPoint, TierCount,
};
pub use router::{
    conduct_router, EngineState, ReclassifyRequest, RegisterSanctionRequest, SimulateRequest,
};
pub use rules::{ClassificationRule, EquivalenceUnit, RuleTable, RuleTableError, ThresholdMode};
pub use service::{
    ConductService, ConductServiceError, RecomputeSummary, SanctionAmendment, SimulationOutcome,
};
pub use store::{ConductStore, StoreError};
pub use worker::{RecomputeWorker, WorkerError, WorkerStatus};

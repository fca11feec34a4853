//! Disciplinary conduct engine.
//!
//! Derives a categorical conduct tier for each enlisted subject from their
//! punitive sanction history, using sliding lookback windows and cross-kind
//! day equivalences. Tiers improve automatically as sanctions age out of
//! their windows; every change lands in an append-only audit log.

pub mod conduct;
pub mod config;
pub mod error;
pub mod telemetry;

pub use conduct::{
    conduct_router, import_ledger, import_ledger_from_path, AccumulatedSanctions,
    BulletinImportError, BulletinLedger, ClassificationOutcome, ClassificationState,
    ClassificationStateView, ClassificationTransition, Clock, ConductClassifier, ConductDashboard,
    ConductService, ConductServiceError, ConductStore, ConductTier, ConversionScale, EngineState,
    Rank, RecomputeSummary, RecomputeWorker, RuleTable, RuleTableError, Sanction, SanctionId,
    SanctionKind, StoreError, SubjectId, SubjectProfile, SystemClock, ValidationError, WorkerError,
    WorkerStatus,
};
pub use error::AppError;

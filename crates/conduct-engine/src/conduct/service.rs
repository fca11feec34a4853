use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Duration, Months, Utc};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::classifier::{ClassificationOutcome, ConductClassifier};
use super::clock::{Clock, SystemClock};
use super::domain::{
    next_sanction_id, next_transition_id, ClassificationState, ClassificationTransition,
    ConductTier, Sanction, SanctionId, SanctionKind, SubjectId, SubjectProfile, ValidationError,
};
use super::locks::SubjectLocks;
use super::report::{
    days_until, monthly_trend, AttentionEntry, ConductDashboard, TierCount, TREND_MONTHS,
};
use super::rules::{RuleTable, RuleTableError};
use super::store::{ConductStore, StoreError};

/// Orchestrates sanction bookkeeping and keeps every subject's stored
/// classification consistent with their sanction history.
///
/// Mutations for one subject serialize on a per-subject lock; the sequence
/// write-sanction, classify, persist-state never interleaves for the same
/// subject. The clock is injected so decay boundaries can be pinned in tests.
pub struct ConductService<S, C = SystemClock> {
    store: Arc<S>,
    clock: C,
    classifier: ConductClassifier,
    locks: SubjectLocks,
}

impl<S: ConductStore> ConductService<S> {
    pub fn new(store: Arc<S>, table: RuleTable) -> Result<Self, RuleTableError> {
        Self::with_clock(store, table, SystemClock)
    }
}

impl<S: ConductStore, C: Clock> ConductService<S, C> {
    pub fn with_clock(store: Arc<S>, table: RuleTable, clock: C) -> Result<Self, RuleTableError> {
        Ok(Self {
            store,
            clock,
            classifier: ConductClassifier::new(table)?,
            locks: SubjectLocks::default(),
        })
    }

    pub(crate) fn current_time(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Records a sanction against an enlisted subject and reclassifies them
    /// in the same locked section.
    pub fn register_sanction(
        &self,
        subject_id: &SubjectId,
        kind: SanctionKind,
        duration_days: u32,
        reason: impl Into<String>,
        source_case_ref: Option<String>,
    ) -> Result<Sanction, ConductServiceError> {
        if duration_days == 0 {
            return Err(ValidationError::NonPositiveDuration { days: duration_days }.into());
        }
        let subject = self.require_eligible(subject_id)?;

        let cell = self.locks.cell(subject_id);
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        let applied_at = self.clock.now();
        let sanction = Sanction {
            id: next_sanction_id(),
            subject_id: subject_id.clone(),
            kind,
            duration_days,
            applied_at,
            terminates_at: applied_at + Duration::days(i64::from(duration_days)),
            reason: reason.into(),
            source_case_ref,
        };
        self.store.insert_sanction(sanction.clone())?;
        info!(
            subject = %subject_id,
            sanction = %sanction.id,
            kind = %kind,
            days = duration_days,
            "sanction registered"
        );

        self.reclassify_locked(&subject, "new sanction applied", true)?;
        Ok(sanction)
    }

    /// Corrects a stored sanction's duration or application date, then
    /// reclassifies its subject.
    pub fn amend_sanction(
        &self,
        sanction_id: &SanctionId,
        amendment: SanctionAmendment,
    ) -> Result<Sanction, ConductServiceError> {
        if let Some(days) = amendment.duration_days {
            if days == 0 {
                return Err(ValidationError::NonPositiveDuration { days }.into());
            }
        }
        let existing = self
            .store
            .get_sanction(sanction_id)?
            .ok_or_else(|| ConductServiceError::SanctionNotFound(sanction_id.clone()))?;
        let subject = self.require_eligible(&existing.subject_id)?;

        let cell = self.locks.cell(&existing.subject_id);
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        // Re-read under the lock; the record may have changed since the
        // unlocked fetch above.
        let mut updated = self
            .store
            .get_sanction(sanction_id)?
            .ok_or_else(|| ConductServiceError::SanctionNotFound(sanction_id.clone()))?;
        if let Some(days) = amendment.duration_days {
            updated.duration_days = days;
        }
        if let Some(applied_at) = amendment.applied_at {
            updated.applied_at = applied_at;
        }
        updated.terminates_at = updated.applied_at + Duration::days(i64::from(updated.duration_days));
        self.store.update_sanction(updated.clone())?;
        info!(subject = %subject.id, sanction = %sanction_id, "sanction amended");

        self.reclassify_locked(&subject, "sanction amended", true)?;
        Ok(updated)
    }

    /// Expunges a sanction and reclassifies its subject. Returns the removed
    /// record for the caller's audit trail.
    pub fn remove_sanction(&self, sanction_id: &SanctionId) -> Result<Sanction, ConductServiceError> {
        let existing = self
            .store
            .get_sanction(sanction_id)?
            .ok_or_else(|| ConductServiceError::SanctionNotFound(sanction_id.clone()))?;
        let subject = self.require_eligible(&existing.subject_id)?;

        let cell = self.locks.cell(&existing.subject_id);
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        let removed = self
            .store
            .remove_sanction(sanction_id)?
            .ok_or_else(|| ConductServiceError::SanctionNotFound(sanction_id.clone()))?;
        info!(subject = %subject.id, sanction = %sanction_id, "sanction removed");

        self.reclassify_locked(&subject, "sanction removed", true)?;
        Ok(removed)
    }

    /// Re-evaluates one subject on demand. `trigger` prefixes the audit
    /// reason when the tier changes; interactive callers pass
    /// `automatic = false`.
    pub fn reclassify(
        &self,
        subject_id: &SubjectId,
        trigger: &str,
        automatic: bool,
    ) -> Result<ClassificationState, ConductServiceError> {
        let subject = self.require_eligible(subject_id)?;

        let cell = self.locks.cell(subject_id);
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        self.reclassify_locked(&subject, trigger, automatic)
            .map(|report| report.state)
    }

    /// Answers what a hypothetical sanction would do to a subject's tier.
    /// Nothing is persisted.
    pub fn simulate(
        &self,
        subject_id: &SubjectId,
        kind: SanctionKind,
        duration_days: u32,
    ) -> Result<SimulationOutcome, ConductServiceError> {
        if duration_days == 0 {
            return Err(ValidationError::NonPositiveDuration { days: duration_days }.into());
        }
        let subject = self.require_eligible(subject_id)?;

        let now = self.clock.now();
        let sanctions = self.store.list_sanctions(subject_id)?;
        let before = self.classifier.classify(&subject.id, &sanctions, now);

        let mut with_hypothetical = sanctions;
        with_hypothetical.push(Sanction {
            id: SanctionId("simulation".to_string()),
            subject_id: subject_id.clone(),
            kind,
            duration_days,
            applied_at: now,
            terminates_at: now + Duration::days(i64::from(duration_days)),
            reason: "simulation".to_string(),
            source_case_ref: None,
        });
        let after = self.classifier.classify(&subject.id, &with_hypothetical, now);

        let would_change = before.tier != after.tier;
        Ok(SimulationOutcome {
            subject_id: subject_id.clone(),
            before,
            after,
            would_change,
        })
    }

    /// Stored classification for a subject, or `None` when they have never
    /// been evaluated. Officers are rejected rather than silently absent.
    pub fn get_current_classification(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Option<ClassificationState>, ConductServiceError> {
        let Some(subject) = self.store.get_subject(subject_id)? else {
            return Ok(None);
        };
        if !subject.rank.is_enlisted() {
            return Err(ValidationError::IneligibleSubject {
                subject: subject_id.clone(),
                rank: subject.rank,
            }
            .into());
        }
        Ok(self.store.get_state(subject_id)?)
    }

    /// Audit history for a subject, most recent first.
    pub fn list_transitions(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<ClassificationTransition>, ConductServiceError> {
        let mut transitions = self.store.list_transitions(subject_id)?;
        transitions.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(transitions)
    }

    /// Re-evaluates every eligible subject, in parallel. A subject whose
    /// evaluation fails is counted and logged; it never aborts the batch.
    pub fn recompute_all(&self) -> Result<RecomputeSummary, ConductServiceError> {
        let subjects = self.store.list_eligible()?;
        let results: Vec<Result<bool, ConductServiceError>> = subjects
            .par_iter()
            .map(|subject| self.recompute_one(subject))
            .collect();

        let mut summary = RecomputeSummary {
            evaluated: subjects.len(),
            updated: 0,
            errors: 0,
        };
        for (subject, result) in subjects.iter().zip(&results) {
            match result {
                Ok(true) => summary.updated += 1,
                Ok(false) => {}
                Err(error) => {
                    summary.errors += 1;
                    warn!(subject = %subject, %error, "recomputation failed for subject");
                }
            }
        }
        info!(
            evaluated = summary.evaluated,
            updated = summary.updated,
            errors = summary.errors,
            "recomputation batch finished"
        );
        Ok(summary)
    }

    /// Roster-wide snapshot for the oversight dashboard.
    pub fn dashboard(&self) -> Result<ConductDashboard, ConductServiceError> {
        let now = self.clock.now();
        let eligible = self.store.list_eligible()?;
        let states = self.store.list_states()?;

        let distribution = ConductTier::ordered()
            .into_iter()
            .map(|tier| TierCount {
                tier,
                label: tier.label().to_string(),
                count: states
                    .iter()
                    .filter(|state| state.current_tier == tier)
                    .count(),
            })
            .collect();

        let mut attention = Vec::new();
        for state in &states {
            if state.current_tier.improves_on(ConductTier::Insufficient) {
                continue;
            }
            let name = self
                .store
                .get_subject(&state.subject_id)?
                .map(|profile| profile.name)
                .unwrap_or_else(|| state.subject_id.to_string());
            attention.push(AttentionEntry {
                subject_id: state.subject_id.clone(),
                name,
                tier: state.current_tier,
                arrest_equivalent: state.accumulated.arrest_equivalent,
                days_to_improvement: state
                    .next_possible_improvement_at
                    .map(|instant| days_until(now, instant)),
            });
        }
        attention.sort_by(|a, b| {
            b.tier
                .severity_rank()
                .cmp(&a.tier.severity_rank())
                .then_with(|| b.arrest_equivalent.total_cmp(&a.arrest_equivalent))
        });

        let since = now
            .checked_sub_months(Months::new(TREND_MONTHS))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let transitions = self.store.list_transitions_since(since)?;
        let monthly_trend = monthly_trend(&transitions, now);

        Ok(ConductDashboard {
            total_subjects: eligible.len(),
            distribution,
            attention,
            monthly_trend,
        })
    }

    fn recompute_one(&self, subject_id: &SubjectId) -> Result<bool, ConductServiceError> {
        let subject = self.require_eligible(subject_id)?;

        let cell = self.locks.cell(subject_id);
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        self.reclassify_locked(&subject, "scheduled recomputation", true)
            .map(|report| report.changed)
    }

    /// Core read-classify-write sequence. Callers must hold the subject's
    /// lock; this method never takes it itself.
    fn reclassify_locked(
        &self,
        subject: &SubjectProfile,
        trigger: &str,
        automatic: bool,
    ) -> Result<ReclassifyReport, ConductServiceError> {
        let now = self.clock.now();
        let sanctions = self.store.list_sanctions(&subject.id)?;
        let outcome = self.classifier.classify(&subject.id, &sanctions, now);

        // A never-evaluated subject is presumed at the baseline tier, so a
        // first evaluation that lands there records no transition.
        let prior_tier = self
            .store
            .get_state(&subject.id)?
            .map(|state| state.current_tier)
            .unwrap_or(self.classifier.table().baseline);
        let changed = prior_tier != outcome.tier;
        if changed {
            self.store.append_transition(ClassificationTransition {
                id: next_transition_id(),
                subject_id: subject.id.clone(),
                from_tier: prior_tier,
                to_tier: outcome.tier,
                occurred_at: now,
                reason: format!("{trigger}: {}", outcome.rationale),
                automatic,
            })?;
            info!(
                subject = %subject.id,
                from = %prior_tier,
                to = %outcome.tier,
                automatic,
                "conduct tier changed"
            );
        }

        let state = ClassificationState {
            subject_id: subject.id.clone(),
            current_tier: outcome.tier,
            last_evaluated_at: now,
            next_possible_improvement_at: outcome.next_improvement_at,
            accumulated: outcome.accumulated,
        };
        self.store.put_state(state.clone())?;
        Ok(ReclassifyReport { state, changed })
    }

    fn require_eligible(&self, subject_id: &SubjectId) -> Result<SubjectProfile, ConductServiceError> {
        let subject = self
            .store
            .get_subject(subject_id)?
            .ok_or_else(|| ConductServiceError::SubjectNotFound(subject_id.clone()))?;
        if !subject.rank.is_enlisted() {
            return Err(ValidationError::IneligibleSubject {
                subject: subject_id.clone(),
                rank: subject.rank,
            }
            .into());
        }
        Ok(subject)
    }
}

/// Partial update for a stored sanction. Absent fields keep their value.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
pub struct SanctionAmendment {
    pub duration_days: Option<u32>,
    pub applied_at: Option<DateTime<Utc>>,
}

/// What a dry-run evaluation reported before and after the hypothetical
/// sanction.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutcome {
    pub subject_id: SubjectId,
    pub before: ClassificationOutcome,
    pub after: ClassificationOutcome,
    pub would_change: bool,
}

/// Tally of one full-roster recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecomputeSummary {
    pub evaluated: usize,
    pub updated: usize,
    pub errors: usize,
}

pub(crate) struct ReclassifyReport {
    pub(crate) state: ClassificationState,
    pub(crate) changed: bool,
}

#[derive(Debug, Error)]
pub enum ConductServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("subject {0} not found")]
    SubjectNotFound(SubjectId),
    #[error("sanction {0} not found")]
    SanctionNotFound(SanctionId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use conduct_engine::{
    BulletinLedger, ClassificationState, ClassificationTransition, ConductStore, Sanction,
    SanctionId, StoreError, SubjectId, SubjectProfile,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local conduct store. Roster order is preserved so listings and
/// batch runs walk subjects the way the bulletin enrolled them.
#[derive(Default)]
pub(crate) struct InMemoryConductStore {
    subjects: Mutex<Vec<SubjectProfile>>,
    sanctions: Mutex<HashMap<SanctionId, Sanction>>,
    states: Mutex<HashMap<SubjectId, ClassificationState>>,
    transitions: Mutex<Vec<ClassificationTransition>>,
}

impl InMemoryConductStore {
    pub(crate) fn insert_subject(&self, profile: SubjectProfile) -> Result<(), StoreError> {
        let mut guard = self.subjects.lock().expect("subject mutex poisoned");
        if guard.iter().any(|existing| existing.id == profile.id) {
            return Err(StoreError::Conflict);
        }
        guard.push(profile);
        Ok(())
    }

    pub(crate) fn roster(&self) -> Vec<SubjectProfile> {
        self.subjects.lock().expect("subject mutex poisoned").clone()
    }
}

impl ConductStore for InMemoryConductStore {
    fn get_subject(&self, id: &SubjectId) -> Result<Option<SubjectProfile>, StoreError> {
        let guard = self.subjects.lock().expect("subject mutex poisoned");
        Ok(guard.iter().find(|subject| &subject.id == id).cloned())
    }

    fn list_eligible(&self) -> Result<Vec<SubjectId>, StoreError> {
        let guard = self.subjects.lock().expect("subject mutex poisoned");
        Ok(guard
            .iter()
            .filter(|subject| subject.rank.is_enlisted())
            .map(|subject| subject.id.clone())
            .collect())
    }

    fn get_sanction(&self, id: &SanctionId) -> Result<Option<Sanction>, StoreError> {
        let guard = self.sanctions.lock().expect("sanction mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn insert_sanction(&self, sanction: Sanction) -> Result<(), StoreError> {
        let mut guard = self.sanctions.lock().expect("sanction mutex poisoned");
        if guard.contains_key(&sanction.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(sanction.id.clone(), sanction);
        Ok(())
    }

    fn update_sanction(&self, sanction: Sanction) -> Result<(), StoreError> {
        let mut guard = self.sanctions.lock().expect("sanction mutex poisoned");
        if !guard.contains_key(&sanction.id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(sanction.id.clone(), sanction);
        Ok(())
    }

    fn remove_sanction(&self, id: &SanctionId) -> Result<Option<Sanction>, StoreError> {
        let mut guard = self.sanctions.lock().expect("sanction mutex poisoned");
        Ok(guard.remove(id))
    }

    fn list_sanctions(&self, subject: &SubjectId) -> Result<Vec<Sanction>, StoreError> {
        let guard = self.sanctions.lock().expect("sanction mutex poisoned");
        let mut sanctions: Vec<Sanction> = guard
            .values()
            .filter(|sanction| &sanction.subject_id == subject)
            .cloned()
            .collect();
        sanctions.sort_by_key(|sanction| sanction.applied_at);
        Ok(sanctions)
    }

    fn get_state(&self, subject: &SubjectId) -> Result<Option<ClassificationState>, StoreError> {
        let guard = self.states.lock().expect("state mutex poisoned");
        Ok(guard.get(subject).cloned())
    }

    fn put_state(&self, state: ClassificationState) -> Result<(), StoreError> {
        let mut guard = self.states.lock().expect("state mutex poisoned");
        guard.insert(state.subject_id.clone(), state);
        Ok(())
    }

    fn list_states(&self) -> Result<Vec<ClassificationState>, StoreError> {
        let guard = self.states.lock().expect("state mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn append_transition(&self, transition: ClassificationTransition) -> Result<(), StoreError> {
        let mut guard = self.transitions.lock().expect("transition mutex poisoned");
        guard.push(transition);
        Ok(())
    }

    fn list_transitions(
        &self,
        subject: &SubjectId,
    ) -> Result<Vec<ClassificationTransition>, StoreError> {
        let guard = self.transitions.lock().expect("transition mutex poisoned");
        Ok(guard
            .iter()
            .filter(|transition| &transition.subject_id == subject)
            .cloned()
            .collect())
    }

    fn list_transitions_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ClassificationTransition>, StoreError> {
        let guard = self.transitions.lock().expect("transition mutex poisoned");
        Ok(guard
            .iter()
            .filter(|transition| transition.occurred_at >= since)
            .cloned()
            .collect())
    }
}

/// Loads an imported bulletin into the store. Returns the number of subjects
/// and sanctions seeded.
pub(crate) fn seed_ledger(
    store: &InMemoryConductStore,
    ledger: BulletinLedger,
) -> Result<(usize, usize), StoreError> {
    let subjects = ledger.subjects.len();
    let sanctions = ledger.sanctions.len();
    for profile in ledger.subjects {
        store.insert_subject(profile)?;
    }
    for sanction in ledger.sanctions {
        store.insert_sanction(sanction)?;
    }
    Ok((subjects, sanctions))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::conduct::clock::Clock;
use crate::conduct::domain::{
    ClassificationState, ClassificationTransition, Rank, Sanction, SanctionId, SanctionKind,
    SubjectId, SubjectProfile,
};
use crate::conduct::router::{conduct_router, EngineState};
use crate::conduct::rules::RuleTable;
use crate::conduct::service::ConductService;
use crate::conduct::store::{ConductStore, StoreError};
use crate::conduct::worker::RecomputeWorker;

/// Noon UTC, so month arithmetic never straddles a day boundary.
pub(super) fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("valid date")
}

/// The evaluation instant every fixture is anchored to.
pub(super) fn anchor() -> DateTime<Utc> {
    date(2025, 6, 15)
}

#[derive(Clone)]
pub(super) struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub(super) fn at(instant: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(instant)),
        }
    }

    pub(super) fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().expect("clock mutex poisoned") = instant;
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard = *guard + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) fn enlisted_subject(suffix: &str) -> SubjectProfile {
    SubjectProfile {
        id: SubjectId(format!("MIL-{suffix}")),
        name: format!("Soldier {suffix}"),
        rank: Rank::Private,
    }
}

pub(super) fn sergeant_subject(suffix: &str) -> SubjectProfile {
    SubjectProfile {
        id: SubjectId(format!("MIL-{suffix}")),
        name: format!("Sergeant {suffix}"),
        rank: Rank::ThirdSergeant,
    }
}

pub(super) fn officer_subject() -> SubjectProfile {
    SubjectProfile {
        id: SubjectId("MIL-CAPT".to_string()),
        name: "Captain Almeida".to_string(),
        rank: Rank::Captain,
    }
}

pub(super) fn sanction(
    id: &str,
    subject: &SubjectId,
    kind: SanctionKind,
    days: u32,
    applied_at: DateTime<Utc>,
) -> Sanction {
    Sanction {
        id: SanctionId(id.to_string()),
        subject_id: subject.clone(),
        kind,
        duration_days: days,
        applied_at,
        terminates_at: applied_at + Duration::days(i64::from(days)),
        reason: "disciplinary infraction".to_string(),
        source_case_ref: None,
    }
}

pub(super) fn service_with(
    store: Arc<MemoryConductStore>,
    clock: FixedClock,
) -> ConductService<MemoryConductStore, FixedClock> {
    ConductService::with_clock(store, RuleTable::default(), clock)
        .expect("default rule table validates")
}

/// One enlisted subject, fixed clock at the anchor instant.
pub(super) fn build_service() -> (
    Arc<ConductService<MemoryConductStore, FixedClock>>,
    Arc<MemoryConductStore>,
    FixedClock,
) {
    let store = Arc::new(MemoryConductStore::with_subjects(&[enlisted_subject(
        "0001",
    )]));
    let clock = FixedClock::at(anchor());
    let service = Arc::new(service_with(store.clone(), clock.clone()));
    (service, store, clock)
}

pub(super) fn engine_router(
    service: Arc<ConductService<MemoryConductStore, FixedClock>>,
) -> axum::Router {
    let worker = Arc::new(RecomputeWorker::new(Arc::clone(&service)));
    conduct_router(EngineState { service, worker })
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default)]
pub(super) struct MemoryConductStore {
    subjects: Mutex<Vec<SubjectProfile>>,
    sanctions: Mutex<HashMap<SanctionId, Sanction>>,
    states: Mutex<HashMap<SubjectId, ClassificationState>>,
    transitions: Mutex<Vec<ClassificationTransition>>,
}

impl MemoryConductStore {
    pub(super) fn with_subjects(subjects: &[SubjectProfile]) -> Self {
        let store = Self::default();
        store
            .subjects
            .lock()
            .expect("subject mutex poisoned")
            .extend_from_slice(subjects);
        store
    }

    pub(super) fn seed_sanction(&self, sanction: Sanction) {
        self.sanctions
            .lock()
            .expect("sanction mutex poisoned")
            .insert(sanction.id.clone(), sanction);
    }

    pub(super) fn seed_transition(&self, transition: ClassificationTransition) {
        self.transitions
            .lock()
            .expect("transition mutex poisoned")
            .push(transition);
    }

    pub(super) fn transition_count(&self) -> usize {
        self.transitions
            .lock()
            .expect("transition mutex poisoned")
            .len()
    }
}

impl ConductStore for MemoryConductStore {
    fn get_subject(&self, id: &SubjectId) -> Result<Option<SubjectProfile>, StoreError> {
        let guard = self.subjects.lock().expect("subject mutex poisoned");
        Ok(guard.iter().find(|profile| &profile.id == id).cloned())
    }

    fn list_eligible(&self) -> Result<Vec<SubjectId>, StoreError> {
        let guard = self.subjects.lock().expect("subject mutex poisoned");
        Ok(guard
            .iter()
            .filter(|profile| profile.rank.is_enlisted())
            .map(|profile| profile.id.clone())
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
        self.transitions
            .lock()
            .expect("transition mutex poisoned")
            .push(transition);
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

/// Every call fails, as if the backend were offline.
pub(super) struct UnavailableStore;

impl UnavailableStore {
    fn offline<T>() -> Result<T, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }
}

impl ConductStore for UnavailableStore {
    fn get_subject(&self, _id: &SubjectId) -> Result<Option<SubjectProfile>, StoreError> {
        Self::offline()
    }

    fn list_eligible(&self) -> Result<Vec<SubjectId>, StoreError> {
        Self::offline()
    }

    fn get_sanction(&self, _id: &SanctionId) -> Result<Option<Sanction>, StoreError> {
        Self::offline()
    }

    fn insert_sanction(&self, _sanction: Sanction) -> Result<(), StoreError> {
        Self::offline()
    }

    fn update_sanction(&self, _sanction: Sanction) -> Result<(), StoreError> {
        Self::offline()
    }

    fn remove_sanction(&self, _id: &SanctionId) -> Result<Option<Sanction>, StoreError> {
        Self::offline()
    }

    fn list_sanctions(&self, _subject: &SubjectId) -> Result<Vec<Sanction>, StoreError> {
        Self::offline()
    }

    fn get_state(&self, _subject: &SubjectId) -> Result<Option<ClassificationState>, StoreError> {
        Self::offline()
    }

    fn put_state(&self, _state: ClassificationState) -> Result<(), StoreError> {
        Self::offline()
    }

    fn list_states(&self) -> Result<Vec<ClassificationState>, StoreError> {
        Self::offline()
    }

    fn append_transition(&self, _transition: ClassificationTransition) -> Result<(), StoreError> {
        Self::offline()
    }

    fn list_transitions(
        &self,
        _subject: &SubjectId,
    ) -> Result<Vec<ClassificationTransition>, StoreError> {
        Self::offline()
    }

    fn list_transitions_since(
        &self,
        _since: DateTime<Utc>,
    ) -> Result<Vec<ClassificationTransition>, StoreError> {
        Self::offline()
    }
}

/// Healthy store except that one subject's sanction index is unreachable.
pub(super) struct FlakyStore {
    pub(super) inner: MemoryConductStore,
    pub(super) failing: SubjectId,
}

impl ConductStore for FlakyStore {
    fn get_subject(&self, id: &SubjectId) -> Result<Option<SubjectProfile>, StoreError> {
        self.inner.get_subject(id)
    }

    fn list_eligible(&self) -> Result<Vec<SubjectId>, StoreError> {
        self.inner.list_eligible()
    }

    fn get_sanction(&self, id: &SanctionId) -> Result<Option<Sanction>, StoreError> {
        self.inner.get_sanction(id)
    }

    fn insert_sanction(&self, sanction: Sanction) -> Result<(), StoreError> {
        self.inner.insert_sanction(sanction)
    }

    fn update_sanction(&self, sanction: Sanction) -> Result<(), StoreError> {
        self.inner.update_sanction(sanction)
    }

    fn remove_sanction(&self, id: &SanctionId) -> Result<Option<Sanction>, StoreError> {
        self.inner.remove_sanction(id)
    }

    fn list_sanctions(&self, subject: &SubjectId) -> Result<Vec<Sanction>, StoreError> {
        if subject == &self.failing {
            return Err(StoreError::Unavailable("sanction index offline".to_string()));
        }
        self.inner.list_sanctions(subject)
    }

    fn get_state(&self, subject: &SubjectId) -> Result<Option<ClassificationState>, StoreError> {
        self.inner.get_state(subject)
    }

    fn put_state(&self, state: ClassificationState) -> Result<(), StoreError> {
        self.inner.put_state(state)
    }

    fn list_states(&self) -> Result<Vec<ClassificationState>, StoreError> {
        self.inner.list_states()
    }

    fn append_transition(&self, transition: ClassificationTransition) -> Result<(), StoreError> {
        self.inner.append_transition(transition)
    }

    fn list_transitions(
        &self,
        subject: &SubjectId,
    ) -> Result<Vec<ClassificationTransition>, StoreError> {
        self.inner.list_transitions(subject)
    }

    fn list_transitions_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ClassificationTransition>, StoreError> {
        self.inner.list_transitions_since(since)
    }
}

/// Blocks inside `list_eligible` until the test releases it, to hold a
/// recomputation batch in flight.
pub(super) struct GateStore {
    inner: MemoryConductStore,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl GateStore {
    pub(super) fn new(
        inner: MemoryConductStore,
        entered: Sender<()>,
        release: Receiver<()>,
    ) -> Self {
        Self {
            inner,
            entered: Mutex::new(entered),
            release: Mutex::new(release),
        }
    }
}

impl ConductStore for GateStore {
    fn get_subject(&self, id: &SubjectId) -> Result<Option<SubjectProfile>, StoreError> {
        self.inner.get_subject(id)
    }

    fn list_eligible(&self) -> Result<Vec<SubjectId>, StoreError> {
        self.entered
            .lock()
            .expect("gate mutex poisoned")
            .send(())
            .ok();
        self.release
            .lock()
            .expect("gate mutex poisoned")
            .recv()
            .ok();
        self.inner.list_eligible()
    }

    fn get_sanction(&self, id: &SanctionId) -> Result<Option<Sanction>, StoreError> {
        self.inner.get_sanction(id)
    }

    fn insert_sanction(&self, sanction: Sanction) -> Result<(), StoreError> {
        self.inner.insert_sanction(sanction)
    }

    fn update_sanction(&self, sanction: Sanction) -> Result<(), StoreError> {
        self.inner.update_sanction(sanction)
    }

    fn remove_sanction(&self, id: &SanctionId) -> Result<Option<Sanction>, StoreError> {
        self.inner.remove_sanction(id)
    }

    fn list_sanctions(&self, subject: &SubjectId) -> Result<Vec<Sanction>, StoreError> {
        self.inner.list_sanctions(subject)
    }

    fn get_state(&self, subject: &SubjectId) -> Result<Option<ClassificationState>, StoreError> {
        self.inner.get_state(subject)
    }

    fn put_state(&self, state: ClassificationState) -> Result<(), StoreError> {
        self.inner.put_state(state)
    }

    fn list_states(&self) -> Result<Vec<ClassificationState>, StoreError> {
        self.inner.list_states()
    }

    fn append_transition(&self, transition: ClassificationTransition) -> Result<(), StoreError> {
        self.inner.append_transition(transition)
    }

    fn list_transitions(
        &self,
        subject: &SubjectId,
    ) -> Result<Vec<ClassificationTransition>, StoreError> {
        self.inner.list_transitions(subject)
    }

    fn list_transitions_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ClassificationTransition>, StoreError> {
        self.inner.list_transitions_since(since)
    }
}

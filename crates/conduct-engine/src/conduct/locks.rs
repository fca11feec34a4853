use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use super::domain::SubjectId;

/// One mutex per subject. Every mutation of a subject's record set (register,
/// amend, remove, scheduled recomputations) serializes on its cell so the
/// read-classify-write sequence never interleaves for the same subject while
/// distinct subjects proceed in parallel.
#[derive(Default)]
pub(crate) struct SubjectLocks {
    cells: DashMap<SubjectId, Arc<Mutex<()>>>,
}

impl SubjectLocks {
    pub(crate) fn cell(&self, subject: &SubjectId) -> Arc<Mutex<()>> {
        self.cells
            .entry(subject.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

//! Keyed collection of custody schedules.
//!
//! Persistence lives outside the engine; [`ScheduleStore`] is the seam a
//! host implements over its own backend. [`InMemoryScheduleStore`] keeps
//! insertion order and is what tests and the CLI use.

use crate::schedule::{CustodySchedule, ScheduleId};

/// Get-all / insert / replace / delete-by-id over schedule records.
///
/// No transactional guarantees are assumed. Callers serialize access.
pub trait ScheduleStore {
    fn all(&self) -> Vec<CustodySchedule>;

    fn get(&self, id: &ScheduleId) -> Option<CustodySchedule>;

    fn insert(&mut self, schedule: CustodySchedule);

    /// Replace the record with the same id. Returns `false` if none existed.
    fn replace(&mut self, schedule: CustodySchedule) -> bool;

    /// Remove by id. Returns `false` if none existed.
    fn remove(&mut self, id: &ScheduleId) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryScheduleStore {
    schedules: Vec<CustodySchedule>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}

impl From<Vec<CustodySchedule>> for InMemoryScheduleStore {
    fn from(schedules: Vec<CustodySchedule>) -> Self {
        Self { schedules }
    }
}

impl ScheduleStore for InMemoryScheduleStore {
    fn all(&self) -> Vec<CustodySchedule> {
        self.schedules.clone()
    }

    fn get(&self, id: &ScheduleId) -> Option<CustodySchedule> {
        self.schedules.iter().find(|s| &s.id == id).cloned()
    }

    fn insert(&mut self, schedule: CustodySchedule) {
        self.schedules.push(schedule);
    }

    fn replace(&mut self, schedule: CustodySchedule) -> bool {
        match self.schedules.iter_mut().find(|s| s.id == schedule.id) {
            Some(slot) => {
                *slot = schedule;
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, id: &ScheduleId) -> bool {
        let before = self.schedules.len();
        self.schedules.retain(|s| &s.id != id);
        self.schedules.len() != before
    }
}

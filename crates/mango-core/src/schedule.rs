//! Reactor execution order.
//!
//! Reactors run once per step in ascending [`Specificity`]. Insertion is a
//! stable ordered insert, so reactors with equal keys keep the order in which
//! they were scheduled.

use serde::{Deserialize, Serialize};

use crate::id::ReactorId;

pub const SPECIFICITY_DEPTH: usize = 4;

/// Fixed-depth composite priority key, compared lexicographically.
/// Not required to be unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Specificity(pub [u16; SPECIFICITY_DEPTH]);

impl Specificity {
    /// A key that only sets the most significant level.
    pub fn top(level: u16) -> Self {
        let mut key = [0; SPECIFICITY_DEPTH];
        key[0] = level;
        Self(key)
    }
}

impl From<[u16; SPECIFICITY_DEPTH]> for Specificity {
    fn from(key: [u16; SPECIFICITY_DEPTH]) -> Self {
        Self(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub reactor: ReactorId,
    pub specificity: Specificity,
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    entries: Vec<ScheduleEntry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert after every entry whose key is less than or equal to `specificity`.
    pub fn schedule(&mut self, reactor: ReactorId, specificity: Specificity) {
        let at = self
            .entries
            .partition_point(|entry| entry.specificity <= specificity);
        self.entries.insert(
            at,
            ScheduleEntry {
                reactor,
                specificity,
            },
        );
    }

    pub fn schedule_all(&mut self, plan: impl IntoIterator<Item = (ReactorId, Specificity)>) {
        for (reactor, specificity) in plan {
            self.schedule(reactor, specificity);
        }
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Reactor ids in execution order.
    pub fn order(&self) -> Vec<ReactorId> {
        self.entries.iter().map(|entry| entry.reactor).collect()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

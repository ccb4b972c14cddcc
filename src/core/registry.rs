//! # Job registry: the two-phase pending/active container.
//!
//! Jobs that pass load validation are staged in the *pending* table; a
//! start request promotes everything pending into the *active* table in one
//! bulk move. The split lets administrators stage a batch of loads and boot
//! them against a consistent snapshot.
//!
//! ## Rules
//! - A label lives in at most one of the two tables at any time.
//! - Promotion is all-or-nothing; a label collision at promotion means the
//!   load-time duplicate check was bypassed and is a programming error.
//! - Eviction only touches the active table; pending jobs are dropped
//!   wholesale when shutdown begins.

use std::collections::HashMap;

use crate::jobs::{Job, Label};

/// Owns every loaded job, split by lifecycle phase.
pub(crate) struct Registry {
    pending: HashMap<Label, Job>,
    active: HashMap<Label, Job>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            active: HashMap::new(),
        }
    }

    /// True when the label is present in either table.
    pub fn contains(&self, label: &Label) -> bool {
        self.active.contains_key(label) || self.pending.contains_key(label)
    }

    /// True when the label is present in the active table.
    pub fn job_exists(&self, label: &Label) -> bool {
        self.active.contains_key(label)
    }

    /// Stages a validated job. The caller has already rejected duplicates.
    pub fn insert_pending(&mut self, job: Job) {
        let label = job.label().clone();
        self.pending.insert(label, job);
    }

    pub fn active(&self, label: &Label) -> Option<&Job> {
        self.active.get(label)
    }

    pub fn active_mut(&mut self, label: &Label) -> Option<&mut Job> {
        self.active.get_mut(label)
    }

    pub fn active_iter(&self) -> impl Iterator<Item = &Job> {
        self.active.values()
    }

    pub fn active_iter_mut(&mut self) -> impl Iterator<Item = &mut Job> {
        self.active.values_mut()
    }

    pub fn active_is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn pending_is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Sorted labels of staged jobs.
    pub fn pending_labels(&self) -> Vec<Label> {
        let mut labels: Vec<Label> = self.pending.keys().cloned().collect();
        labels.sort_unstable();
        labels
    }

    /// Sorted labels of active jobs.
    pub fn active_labels(&self) -> Vec<Label> {
        let mut labels: Vec<Label> = self.active.keys().cloned().collect();
        labels.sort_unstable();
        labels
    }

    /// Moves every pending job into the active table and returns the
    /// promoted labels.
    ///
    /// Panics when a label is already active; the load-time duplicate check
    /// makes that unreachable.
    pub fn promote_all(&mut self) -> Vec<Label> {
        let mut promoted = Vec::with_capacity(self.pending.len());
        for (label, job) in self.pending.drain() {
            assert!(
                !self.active.contains_key(&label),
                "job {label} is already active at promotion"
            );
            self.active.insert(label.clone(), job);
            promoted.push(label);
        }
        promoted
    }

    /// Drops every staged job, returning how many were discarded.
    pub fn discard_pending(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Removes an active job.
    pub fn evict(&mut self, label: &Label) -> Option<Job> {
        self.active.remove(label)
    }

    /// Removes and returns every active job.
    pub fn drain_active(&mut self) -> Vec<Job> {
        self.active.drain().map(|(_, job)| job).collect()
    }
}

//! In-memory registry of running job processes.
//!
//! A single mutex guards the map. Every operation is a short map mutation
//! or copy; the lock is never held across process I/O, so a poisoned lock
//! can only mean a panic inside a map operation and the data is still
//! consistent. Poisoning is therefore ignored.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use operator_core::types::JobUid;

use crate::handle::ProcessHandle;

/// Job UID → process handle. The entry *is* the liveness record.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    entries: Mutex<HashMap<JobUid, ProcessHandle>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<JobUid, ProcessHandle>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `handle` under its job UID.
    ///
    /// If the UID is already registered nothing is inserted and the
    /// existing handle is returned.
    pub fn register(&self, handle: ProcessHandle) -> Option<ProcessHandle> {
        let mut entries = self.entries();
        if let Some(existing) = entries.get(handle.job_uid()) {
            return Some(existing.clone());
        }
        entries.insert(handle.job_uid().to_string(), handle);
        None
    }

    /// Atomically remove and return the entry for `job_uid`.
    pub fn unregister(&self, job_uid: &str) -> Option<ProcessHandle> {
        self.entries().remove(job_uid)
    }

    /// Remove the entry for `job_uid` only if it is still `handle`.
    ///
    /// Returns `true` if this call removed it.
    pub fn unregister_if(&self, job_uid: &str, handle: &ProcessHandle) -> bool {
        let mut entries = self.entries();
        match entries.get(job_uid) {
            Some(current) if current.same_process(handle) => {
                entries.remove(job_uid);
                true
            }
            _ => false,
        }
    }

    pub fn lookup(&self, job_uid: &str) -> Option<ProcessHandle> {
        self.entries().get(job_uid).cloned()
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> HashMap<JobUid, ProcessHandle> {
        self.entries().clone()
    }

    /// Point-in-time copy of the registered job UIDs.
    pub fn job_uids(&self) -> Vec<JobUid> {
        self.entries().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

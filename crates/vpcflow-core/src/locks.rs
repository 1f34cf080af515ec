//! Exclusive access to a stack for the duration of a lifecycle operation

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Stack-name keyed locks.
///
/// Acquisition never waits: a second operation on a stack that is already
/// being worked on is rejected so the caller can report a conflict.
#[derive(Clone, Default)]
pub struct StackLocks {
    stacks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Held while a stack operation is in flight; released on drop
pub struct StackGuard {
    _guard: OwnedMutexGuard<()>,
}

impl StackLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, region: &str, stack_name: &str) -> Option<StackGuard> {
        let lock = self
            .stacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(format!("{region}/{stack_name}"))
            .or_default()
            .clone();
        lock.try_lock_owned().ok().map(|guard| StackGuard { _guard: guard })
    }
}

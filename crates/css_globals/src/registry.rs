//! Process-wide instance ids.
//!
//! Every live binding stamps its id into the scan markers it writes, so two
//! bindings on one page never hide a sheet from each other. Ids increase
//! monotonically and are never handed out twice.

use core::fmt::{self, Display, Formatter};
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identifier of one binding instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub u64);

impl Display for InstanceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out instance ids and tracks which are live.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    next: u64,
    live: BTreeSet<InstanceId>,
}

impl InstanceRegistry {
    pub const fn new() -> Self {
        Self {
            next: 0,
            live: BTreeSet::new(),
        }
    }

    pub fn acquire(&mut self) -> InstanceId {
        self.next = self.next.saturating_add(1);
        let id = InstanceId(self.next);
        self.live.insert(id);
        id
    }

    /// Returns whether `id` was live.
    pub fn release(&mut self, id: InstanceId) -> bool {
        self.live.remove(&id)
    }

    pub fn is_live(&self, id: InstanceId) -> bool {
        self.live.contains(&id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

static REGISTRY: Lazy<Mutex<InstanceRegistry>> = Lazy::new(|| Mutex::new(InstanceRegistry::new()));

fn registry() -> MutexGuard<'static, InstanceRegistry> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fresh id from the global registry.
pub fn acquire_instance_id() -> InstanceId {
    registry().acquire()
}

pub fn release_instance_id(id: InstanceId) -> bool {
    registry().release(id)
}

pub fn is_instance_live(id: InstanceId) -> bool {
    registry().is_live(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_never_reused() {
        let mut registry = InstanceRegistry::new();
        let first = registry.acquire();
        assert!(registry.release(first));
        assert!(!registry.release(first));
        let second = registry.acquire();
        assert!(second > first);
        assert!(registry.is_live(second));
        assert!(!registry.is_live(first));
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn global_registry_tracks_liveness() {
        let id = acquire_instance_id();
        assert!(is_instance_live(id));
        assert!(release_instance_id(id));
        assert!(!is_instance_live(id));
    }
}

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

use uuid::Uuid;

/// Users with a checkout commit currently running in this process.
#[derive(Debug, Default)]
pub struct InFlightCheckouts {
    users: Mutex<HashSet<Uuid>>,
}

impl InFlightCheckouts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` if the user already has a commit in flight.
    pub fn try_acquire(self: &Arc<Self>, user_id: Uuid) -> Option<InFlightGuard> {
        if !self.lock().insert(user_id) {
            return None;
        }

        Some(InFlightGuard {
            registry: Arc::clone(self),
            user_id,
        })
    }

    pub fn is_in_flight(&self, user_id: Uuid) -> bool {
        self.lock().contains(&user_id)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        // The set stays consistent even if a holder panicked.
        self.users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases the user's slot on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: Arc<InFlightCheckouts>,
    user_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_for_same_user_is_refused() {
        let registry = Arc::new(InFlightCheckouts::new());
        let user_id = Uuid::new_v4();

        let guard = registry.try_acquire(user_id);
        assert!(guard.is_some());
        assert!(registry.try_acquire(user_id).is_none());
        assert!(registry.try_acquire(Uuid::new_v4()).is_some());

        drop(guard);
        assert!(!registry.is_in_flight(user_id));
        assert!(registry.try_acquire(user_id).is_some());
    }
}

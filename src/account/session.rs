use std::sync::{Arc, Mutex, PoisonError};

/// The process-wide notion of "who is currently authenticated": an optional
/// user id, set only by a successful registration or login and cleared by
/// logout or account deletion. At most one logical session exists per
/// process.
#[derive(Debug, Clone, Default)]
pub struct Session {
    current: Arc<Mutex<Option<i64>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<i64> {
        // The guarded value is Copy, so a poisoned lock still holds a
        // usable state and can be recovered rather than panicking.
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, user_id: i64) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(user_id);
    }

    pub fn clear(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

//! Conversation sessions
//!
//! One `Session` per user id, held in a process-wide `SessionStore`. Each user has
//! their own async slot lock, so messages from one user are handled strictly in
//! order while other users proceed independently.

use crate::tracking::{Credentials, Device};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Protocol step, without the data each step carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    None,
    AwaitingUsername,
    AwaitingPassword,
    AwaitingResetEmail,
    AwaitingDeviceSelection,
    AwaitingMenuChoice,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::None => "none",
            SessionState::AwaitingUsername => "awaiting_username",
            SessionState::AwaitingPassword => "awaiting_password",
            SessionState::AwaitingResetEmail => "awaiting_reset_email",
            SessionState::AwaitingDeviceSelection => "awaiting_device_selection",
            SessionState::AwaitingMenuChoice => "awaiting_menu_choice",
        };
        f.write_str(name)
    }
}

/// Live conversation. Each variant carries exactly the data valid in that step.
#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    AwaitingUsername,
    AwaitingPassword {
        username: String,
    },
    AwaitingResetEmail,
    AwaitingDeviceSelection {
        credentials: Credentials,
        devices: Vec<Device>,
    },
    AwaitingMenuChoice {
        credentials: Credentials,
        device: Device,
    },
}

impl Session {
    pub fn state(&self) -> SessionState {
        match self {
            Session::AwaitingUsername => SessionState::AwaitingUsername,
            Session::AwaitingPassword { .. } => SessionState::AwaitingPassword,
            Session::AwaitingResetEmail => SessionState::AwaitingResetEmail,
            Session::AwaitingDeviceSelection { .. } => SessionState::AwaitingDeviceSelection,
            Session::AwaitingMenuChoice { .. } => SessionState::AwaitingMenuChoice,
        }
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            Session::AwaitingDeviceSelection { credentials, .. }
            | Session::AwaitingMenuChoice { credentials, .. } => Some(credentials),
            _ => None,
        }
    }

    /// Devices offered for selection
    pub fn devices(&self) -> Option<&[Device]> {
        match self {
            Session::AwaitingDeviceSelection { devices, .. } => Some(devices),
            _ => None,
        }
    }

    pub fn selected_device(&self) -> Option<&Device> {
        match self {
            Session::AwaitingMenuChoice { device, .. } => Some(device),
            _ => None,
        }
    }
}

type Slot = Arc<AsyncMutex<Option<Session>>>;

/// Process-wide registry of live sessions
#[derive(Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<String, Slot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        // The map is only touched in short non-panicking sections
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take exclusive hold of a user's session until the guard is dropped
    pub async fn lock(&self, user_id: &str) -> SessionGuard<'_> {
        let slot = self
            .slots()
            .entry(user_id.to_string())
            .or_default()
            .clone();
        let guard = slot.clone().lock_owned().await;

        SessionGuard {
            store: self,
            user_id: user_id.to_string(),
            slot,
            guard,
        }
    }

    /// Copy of a user's session, waiting for any in-flight message to finish
    pub async fn snapshot(&self, user_id: &str) -> Option<Session> {
        let slot = self.slots().get(user_id).cloned()?;
        let session = slot.lock().await.clone();
        if session.is_none() {
            // A guard that ended this session while we held the slot left it behind
            self.prune(user_id, &slot, 1, || {
                slot.try_lock().map(|s| s.is_none()).unwrap_or(false)
            });
        }
        session
    }

    pub async fn state(&self, user_id: &str) -> SessionState {
        self.snapshot(user_id)
            .await
            .map(|s| s.state())
            .unwrap_or(SessionState::None)
    }

    pub async fn contains(&self, user_id: &str) -> bool {
        self.snapshot(user_id).await.is_some()
    }

    /// Drop an empty slot once nobody but the map and `held` callers refer to it.
    /// Handles are only cloned under the map lock, so the count cannot grow here.
    fn prune(&self, user_id: &str, slot: &Slot, held: usize, is_empty: impl FnOnce() -> bool) {
        let mut slots = self.slots();
        if Arc::strong_count(slot) != held + 1 || !is_empty() {
            return;
        }
        if let Some(existing) = slots.get(user_id) {
            if Arc::ptr_eq(existing, slot) {
                slots.remove(user_id);
            }
        }
    }

    /// Number of users with a slot, live or being processed
    pub fn tracked_users(&self) -> usize {
        self.slots().len()
    }
}

/// Exclusive access to one user's session
pub struct SessionGuard<'a> {
    store: &'a SessionStore,
    user_id: String,
    slot: Slot,
    guard: OwnedMutexGuard<Option<Session>>,
}

impl SessionGuard<'_> {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn get(&self) -> Option<&Session> {
        (*self.guard).as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.get().map(Session::state).unwrap_or(SessionState::None)
    }

    pub fn set(&mut self, session: Session) {
        *self.guard = Some(session);
    }

    /// Terminal transition: the session is removed
    pub fn end(&mut self) {
        *self.guard = None;
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.guard.is_some() {
            return;
        }

        // Our handle plus the one inside the lock guard
        self.store.prune(&self.user_id, &self.slot, 2, || true);
    }
}

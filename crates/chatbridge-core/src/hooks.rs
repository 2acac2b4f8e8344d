// ── Connection hooks ──
//
// Typed subscriber lists, one per event category. Each subscriber is a
// single-method trait; plain closures implement them through blanket impls.
// Dispatch runs subscribers in registration order and turns a failing or
// panicking subscriber into `CoreError::Hook`, which stops the connection.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use thiserror::Error;

use crate::error::CoreError;
use crate::model::{Member, Message, PresenceChange, Room, RoomMap};

/// Failure reported by a hook subscriber.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type HookResult = Result<(), HookError>;

/// Called once per successful startup with the fully populated room set.
pub trait ConnectedHook: Send + Sync {
    fn on_connected(&self, rooms: &mut RoomMap) -> HookResult;
}

/// Called for every failure that sends the connection into recovery.
/// `will_retry` is `false` when auto-reconnect is disabled.
pub trait ErrorHook: Send + Sync {
    fn on_error(&self, error: &CoreError, will_retry: bool) -> HookResult;
}

pub trait MessageHook: Send + Sync {
    fn on_message(&self, room: &Room, message: &Message) -> HookResult;
}

pub trait JoinHook: Send + Sync {
    fn on_join(&self, room: &Room, member: &Member, change: PresenceChange) -> HookResult;
}

pub trait LeaveHook: Send + Sync {
    fn on_leave(&self, room: &Room, member: &Member, change: PresenceChange) -> HookResult;
}

impl<F> ConnectedHook for F
where
    F: Fn(&mut RoomMap) -> HookResult + Send + Sync,
{
    fn on_connected(&self, rooms: &mut RoomMap) -> HookResult {
        self(rooms)
    }
}

impl<F> ErrorHook for F
where
    F: Fn(&CoreError, bool) -> HookResult + Send + Sync,
{
    fn on_error(&self, error: &CoreError, will_retry: bool) -> HookResult {
        self(error, will_retry)
    }
}

impl<F> MessageHook for F
where
    F: Fn(&Room, &Message) -> HookResult + Send + Sync,
{
    fn on_message(&self, room: &Room, message: &Message) -> HookResult {
        self(room, message)
    }
}

impl<F> JoinHook for F
where
    F: Fn(&Room, &Member, PresenceChange) -> HookResult + Send + Sync,
{
    fn on_join(&self, room: &Room, member: &Member, change: PresenceChange) -> HookResult {
        self(room, member, change)
    }
}

impl<F> LeaveHook for F
where
    F: Fn(&Room, &Member, PresenceChange) -> HookResult + Send + Sync,
{
    fn on_leave(&self, room: &Room, member: &Member, change: PresenceChange) -> HookResult {
        self(room, member, change)
    }
}

/// All subscribers of one connection.
#[derive(Clone, Default)]
pub struct Hooks {
    connected: Vec<Arc<dyn ConnectedHook>>,
    error: Vec<Arc<dyn ErrorHook>>,
    message: Vec<Arc<dyn MessageHook>>,
    join: Vec<Arc<dyn JoinHook>>,
    leave: Vec<Arc<dyn LeaveHook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ─────────────────────────────────────────────

    pub fn on_connected(mut self, hook: impl ConnectedHook + 'static) -> Self {
        self.connected.push(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl ErrorHook + 'static) -> Self {
        self.error.push(Arc::new(hook));
        self
    }

    pub fn on_message(mut self, hook: impl MessageHook + 'static) -> Self {
        self.message.push(Arc::new(hook));
        self
    }

    pub fn on_join(mut self, hook: impl JoinHook + 'static) -> Self {
        self.join.push(Arc::new(hook));
        self
    }

    pub fn on_leave(mut self, hook: impl LeaveHook + 'static) -> Self {
        self.leave.push(Arc::new(hook));
        self
    }

    // ── Dispatch ─────────────────────────────────────────────────

    pub(crate) fn connected(&self, rooms: &mut RoomMap) -> Result<(), CoreError> {
        for hook in &self.connected {
            guard("connected", || hook.on_connected(rooms))?;
        }
        Ok(())
    }

    pub(crate) fn error(&self, error: &CoreError, will_retry: bool) -> Result<(), CoreError> {
        for hook in &self.error {
            guard("error", || hook.on_error(error, will_retry))?;
        }
        Ok(())
    }

    pub(crate) fn message(&self, room: &Room, message: &Message) -> Result<(), CoreError> {
        for hook in &self.message {
            guard("message", || hook.on_message(room, message))?;
        }
        Ok(())
    }

    pub(crate) fn join(
        &self,
        room: &Room,
        member: &Member,
        change: PresenceChange,
    ) -> Result<(), CoreError> {
        for hook in &self.join {
            guard("join", || hook.on_join(room, member, change))?;
        }
        Ok(())
    }

    pub(crate) fn leave(
        &self,
        room: &Room,
        member: &Member,
        change: PresenceChange,
    ) -> Result<(), CoreError> {
        for hook in &self.leave {
            guard("leave", || hook.on_leave(room, member, change))?;
        }
        Ok(())
    }
}

/// Run one subscriber, converting both errors and panics into `CoreError::Hook`.
fn guard(hook: &'static str, f: impl FnOnce() -> HookResult) -> Result<(), CoreError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(CoreError::Hook {
            hook,
            message: e.to_string(),
        }),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panicked".into());
            Err(CoreError::Hook { hook, message })
        }
    }
}

// ── Backend connection ──
//
// Full lifecycle of one backend login: session creation, room discovery,
// subscription, the long-poll observe loop, recovery after failures, and
// hook dispatch. The connection runs on its own task; everything else talks
// to it through a cloneable `ConnectionHandle`.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chatbridge_api::BackendClient;
use chatbridge_api::models::{EventEntry, PresenceStatus};

use crate::config::{BackendConfig, Credentials};
use crate::error::CoreError;
use crate::hooks::Hooks;
use crate::model::{Member, Message, Room, RoomMap, Session};

// ── ConnectionStatus ─────────────────────────────────────────────

/// Lifecycle phase, observable by consumers through a watch channel.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
pub enum ConnectionStatus {
    Disconnected,
    SessionEstablishing,
    RoomSyncing,
    Subscribing,
    Observing,
    ErrorRecovering { attempt: u32 },
}

// ── BackendState ─────────────────────────────────────────────────

/// State shared between the connection task and its handles.
///
/// Guarded by one async mutex: the connection mutates it and runs hooks
/// while holding the lock, handles read it for lookups.
#[derive(Debug, Default)]
pub struct BackendState {
    session: Option<Session>,
    room_ids: Vec<String>,
    rooms: RoomMap,
}

impl BackendState {
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Subscribed room ids, in discovery order.
    pub fn room_ids(&self) -> &[String] {
        &self.room_ids
    }

    pub fn rooms(&self) -> &RoomMap {
        &self.rooms
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    /// Every room `username` is a member of, with the member entry.
    pub fn memberships<'a>(
        &'a self,
        username: &'a str,
    ) -> impl Iterator<Item = (&'a Room, &'a Member)> + 'a {
        self.rooms
            .values()
            .filter_map(move |room| room.members.get(username).map(|member| (room, member)))
    }

    fn clear(&mut self) {
        self.session = None;
        self.room_ids.clear();
        self.rooms.clear();
    }
}

type SharedState = Arc<Mutex<BackendState>>;

// ── Connection ───────────────────────────────────────────────────

/// One backend login and its event stream.
///
/// Not cloneable: it is moved onto the task that calls [`run`](Self::run).
/// Use [`handle`](Self::handle) for everything done from other tasks.
pub struct Connection {
    client: BackendClient,
    config: BackendConfig,
    credentials: Credentials,
    hooks: Hooks,
    state: SharedState,
    status: watch::Sender<ConnectionStatus>,
    cancel: CancellationToken,
    counter: Option<u64>,
}

impl Connection {
    /// Create a connection. Does NOT contact the backend -- call
    /// [`run`](Self::run) on a dedicated task.
    pub fn new(
        config: BackendConfig,
        credentials: Credentials,
        hooks: Hooks,
        cancel: CancellationToken,
    ) -> Result<Self, CoreError> {
        let client = BackendClient::new(
            config.api_url.clone(),
            config.observe_url.clone(),
            &config.transport(),
        )?
        .with_app_key(config.api_key.clone());
        Ok(Self::with_client(client, config, credentials, hooks, cancel))
    }

    /// Create a connection around an existing API client.
    pub fn with_client(
        client: BackendClient,
        config: BackendConfig,
        credentials: Credentials,
        hooks: Hooks,
        cancel: CancellationToken,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            client,
            config,
            credentials,
            hooks,
            state: Arc::new(Mutex::new(BackendState::default())),
            status,
            cancel,
            counter: None,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            client: self.client.clone(),
            state: Arc::clone(&self.state),
            status: self.status.subscribe(),
            cancel: self.cancel.clone(),
        }
    }

    /// The long-poll cursor, if subscribed.
    pub fn counter(&self) -> Option<u64> {
        self.counter
    }

    // ── Run loop ─────────────────────────────────────────────────

    /// Connect and observe until cancelled.
    ///
    /// Transient failures call the error hooks, destroy the session, sleep
    /// the retry interval, and start over from session creation. Rejected
    /// credentials and failing hooks end the run with an error, as does any
    /// failure when auto-reconnect is disabled. Cancellation ends it with
    /// `Ok(())`.
    pub async fn run(&mut self) -> Result<(), CoreError> {
        let cancel = self.cancel.clone();
        let mut attempt: u32 = 0;

        let result = loop {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => break Ok(()),
                outcome = self.cycle() => outcome,
            };

            let err = match outcome {
                Ok(()) => break Ok(()),
                Err(err) => err,
            };

            if err.is_fatal() {
                error!(error = %err, "backend connection failed permanently");
                break Err(err);
            }

            attempt += 1;
            let will_retry = self.config.auto_reconnect;
            warn!(error = %err, attempt, will_retry, "backend cycle failed");
            self.set_status(ConnectionStatus::ErrorRecovering { attempt });

            if let Err(hook_err) = self.hooks.error(&err, will_retry) {
                break Err(hook_err);
            }
            self.destroy_session().await;

            if !will_retry {
                break Err(err);
            }

            info!(
                delay_ms = u64::try_from(self.config.retry_interval.as_millis()).unwrap_or(u64::MAX),
                attempt,
                "waiting before reconnect"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => break Ok(()),
                () = tokio::time::sleep(self.config.retry_interval) => {}
            }
        };

        self.destroy_session().await;
        self.set_status(ConnectionStatus::Disconnected);
        debug!("backend connection stopped");
        result
    }

    /// One startup sequence followed by the observe loop.
    async fn cycle(&mut self) -> Result<(), CoreError> {
        self.set_status(ConnectionStatus::SessionEstablishing);
        self.create_session().await?;

        self.set_status(ConnectionStatus::RoomSyncing);
        let room_ids = self.list_rooms().await?;
        self.fetch_rooms(&room_ids).await?;

        self.set_status(ConnectionStatus::Subscribing);
        if !room_ids.is_empty() {
            self.subscribe(&room_ids, true).await?;
        }

        if self.config.backlog_depth > self.config.backlog_window {
            for room_id in &room_ids {
                self.extend_backlog(room_id, self.config.backlog_depth)
                    .await?;
            }
        }

        {
            let mut state = self.state.lock().await;
            self.hooks.connected(&mut state.rooms)?;
        }
        info!(rooms = room_ids.len(), "backend connection established");
        self.set_status(ConnectionStatus::Observing);

        if room_ids.is_empty() {
            // Nothing to observe; idle until torn down.
            self.cancel.cancelled().await;
            return Ok(());
        }

        loop {
            self.observe().await?;
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        debug!(%status, "connection status");
        self.status.send_replace(status);
    }

    async fn session_token(&self) -> Result<String, CoreError> {
        self.state
            .lock()
            .await
            .session
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(CoreError::NoSession)
    }

    // ── Session ──────────────────────────────────────────────────

    /// `session/create`. Replaces any previous session and clears rooms.
    pub async fn create_session(&mut self) -> Result<(), CoreError> {
        self.destroy_session().await;

        let info = self
            .client
            .create_session(&self.credentials.account, &self.credentials.secret)
            .await?;
        let session = Session::from(info);
        debug!(nickname = %session.nickname, public_id = %session.public_id, "session created");

        let mut state = self.state.lock().await;
        state.clear();
        state.session = Some(session);
        self.counter = None;
        Ok(())
    }

    /// `session/destroy`, best effort. Failures are logged and swallowed;
    /// local session state is cleared either way.
    pub async fn destroy_session(&mut self) {
        let session = {
            let mut state = self.state.lock().await;
            let session = state.session.take();
            state.clear();
            session
        };
        self.counter = None;

        let Some(session) = session else { return };
        if let Err(e) = self.client.destroy_session(&session.token).await {
            warn!(error = %e, "session destroy failed (ignored)");
        }
    }

    // ── Rooms ────────────────────────────────────────────────────

    /// `user/get_rooms`: the room ids, in discovery order.
    pub async fn list_rooms(&mut self) -> Result<Vec<String>, CoreError> {
        let token = self.session_token().await?;
        let room_ids = self.client.get_rooms(&token).await?;
        debug!(count = room_ids.len(), "rooms listed");
        Ok(room_ids)
    }

    /// `room/show`: build room snapshots and store them in `room_ids` order.
    pub async fn fetch_rooms(&mut self, room_ids: &[String]) -> Result<(), CoreError> {
        if room_ids.is_empty() {
            return Ok(());
        }
        let token = self.session_token().await?;
        let infos = self.client.show_rooms(&token, room_ids).await?;

        let mut state = self.state.lock().await;
        let public_id = state
            .session
            .as_ref()
            .map(|s| s.public_id.clone())
            .ok_or(CoreError::NoSession)?;

        let mut fetched: RoomMap = infos
            .into_iter()
            .map(|info| {
                let room = Room::from_info(info, &public_id);
                (room.id.clone(), room)
            })
            .collect();

        state.rooms.clear();
        for id in room_ids {
            match fetched.shift_remove(id) {
                Some(room) => {
                    state.rooms.insert(id.clone(), room);
                }
                None => warn!(room = %id, "room missing from room/show response"),
            }
        }
        Ok(())
    }

    /// `room/get_archives`: grow a room's backlog towards `target_depth`,
    /// anchored at the oldest held message. Rooms without an initial
    /// backlog are left alone.
    pub async fn extend_backlog(&mut self, room_id: &str, target_depth: usize) -> Result<(), CoreError> {
        let (token, public_id, anchor, missing) = {
            let state = self.state.lock().await;
            let session = state.session.as_ref().ok_or(CoreError::NoSession)?;
            let room = state.rooms.get(room_id).ok_or_else(|| CoreError::UnknownRoom {
                room: room_id.to_owned(),
            })?;
            let Some(anchor) = room.oldest_message_id() else {
                debug!(room = room_id, "no initial backlog, not extending");
                return Ok(());
            };
            let missing = target_depth.saturating_sub(room.backlog.len());
            if missing == 0 {
                return Ok(());
            }
            (
                session.token.clone(),
                session.public_id.clone(),
                anchor.to_owned(),
                missing,
            )
        };

        let older: Vec<Message> = self
            .client
            .get_archives(&token, room_id, &anchor, missing)
            .await?
            .into_iter()
            .map(|payload| Message::new(payload, &public_id))
            .collect();
        debug!(room = room_id, fetched = older.len(), "backlog extended");

        let mut state = self.state.lock().await;
        if let Some(room) = state.rooms.get_mut(room_id) {
            room.prepend_backlog(older);
        }
        Ok(())
    }

    /// `room/subscribe`. The returned counter replaces the current one.
    pub async fn subscribe(&mut self, room_ids: &[String], reset: bool) -> Result<(), CoreError> {
        let token = self.session_token().await?;
        let counter = self.client.subscribe(&token, room_ids, reset).await?;
        debug!(counter, reset, "subscribed");
        self.counter = Some(counter);
        self.state.lock().await.room_ids = room_ids.to_vec();
        Ok(())
    }

    // ── Events ───────────────────────────────────────────────────

    /// One `event/observe` round trip.
    ///
    /// Stores the counter the response carries, then applies and dispatches
    /// each event. A folded timeout leaves the counter untouched.
    pub async fn observe(&mut self) -> Result<(), CoreError> {
        let token = self.session_token().await?;
        let response = self.client.observe(&token, self.counter).await?;

        if response.counter.is_some() {
            self.counter = response.counter;
        }
        if response.events.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        let public_id = state
            .session
            .as_ref()
            .map(|s| s.public_id.clone())
            .unwrap_or_default();
        for event in response.events {
            apply_event(&self.hooks, &mut state.rooms, &public_id, event)?;
        }
        Ok(())
    }
}

/// Apply one observed event to the room set and call the matching hook.
/// Events for rooms we are not subscribed to are dropped.
fn apply_event(
    hooks: &Hooks,
    rooms: &mut RoomMap,
    public_id: &str,
    event: EventEntry,
) -> Result<(), CoreError> {
    if let Some(payload) = event.message {
        let Some(room) = payload.room.as_deref().and_then(|id| rooms.get(id)) else {
            debug!(room = ?payload.room, "dropping message for unsubscribed room");
            return Ok(());
        };
        let message = Message::new(payload, public_id);
        return hooks.message(room, &message);
    }

    let Some(presence) = event.presence else {
        debug!("ignoring event without message or presence");
        return Ok(());
    };
    let Some(room) = rooms.get_mut(&presence.room) else {
        debug!(room = %presence.room, "dropping presence for unsubscribed room");
        return Ok(());
    };

    match presence.status {
        PresenceStatus::Online => {
            let change = room.member_online(&presence);
            let room = &*room;
            if let Some(member) = room.members.get(&presence.username) {
                hooks.join(room, member, change)?;
            }
        }
        PresenceStatus::Offline => {
            if let Some(change) = room.member_offline(&presence.username) {
                let room = &*room;
                if let Some(member) = room.members.get(&presence.username) {
                    hooks.leave(room, member, change)?;
                }
            }
        }
        PresenceStatus::Unknown => {
            debug!(username = %presence.username, "ignoring unknown presence status");
        }
    }
    Ok(())
}

// ── ConnectionHandle ─────────────────────────────────────────────

/// Cheaply cloneable access to a running [`Connection`].
#[derive(Clone)]
pub struct ConnectionHandle {
    client: BackendClient,
    state: SharedState,
    status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// Post `text` to `room_id` as the connection's session.
    pub async fn say(&self, room_id: &str, text: &str) -> Result<(), CoreError> {
        let (token, nickname) = {
            let state = self.state.lock().await;
            let session = state.session.as_ref().ok_or(CoreError::NoSession)?;
            (session.token.clone(), session.nickname.clone())
        };
        self.client.say(&token, room_id, &nickname, text).await?;
        Ok(())
    }

    /// `session/set_presence` for the live session.
    pub async fn set_presence(&self, presence: &str) -> Result<(), CoreError> {
        let (token, nickname) = {
            let state = self.state.lock().await;
            let session = state.session.as_ref().ok_or(CoreError::NoSession)?;
            (session.token.clone(), session.nickname.clone())
        };
        self.client.set_presence(&token, presence, &nickname).await?;
        Ok(())
    }

    /// `room/unsubscribe`, then forget the rooms locally so their events
    /// are dropped.
    pub async fn unsubscribe(&self, room_ids: &[String]) -> Result<(), CoreError> {
        let token = {
            let state = self.state.lock().await;
            state
                .session
                .as_ref()
                .map(|s| s.token.clone())
                .ok_or(CoreError::NoSession)?
        };
        self.client.unsubscribe(&token, room_ids).await?;

        let mut state = self.state.lock().await;
        state.room_ids.retain(|id| !room_ids.contains(id));
        state.rooms.retain(|id, _| !room_ids.contains(id));
        Ok(())
    }

    /// Lock the shared state for reading.
    pub async fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().await
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Stop the connection task. It destroys its session on the way out.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

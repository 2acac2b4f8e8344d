// ── Per-client session ──
//
// One IRC client: a read loop answering commands, a writer task owning the
// socket's write half, and, once USER arrives, a backend connection task
// whose hooks render events into the same outbound queue.
//
// Lifecycle: AwaitingCredentials -> Active -> terminated. Closing the client
// cancels the session token, which stops the backend task (it destroys its
// session on the way out) and the writer. A fatal backend error sends one
// ERROR line and cancels the same token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use secrecy::SecretString;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, trace, warn};

use chatbridge_core::hooks::{ConnectedHook, ErrorHook, JoinHook, LeaveHook, MessageHook};
use chatbridge_core::{
    Connection, ConnectionHandle, CoreError, Credentials, HookResult, Hooks, Member, Message,
    PresenceChange, Room, RoomMap,
};

use crate::command::{Command, Features};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::outbound::{self, Outbound};
use crate::reply::{Replies, Verb};

/// Longest inbound line kept, terminator included. Longer lines are
/// discarded up to their newline.
const MAX_LINE_BYTES: u64 = 4096;

// ── ClientSession ────────────────────────────────────────────────

/// Serves one accepted client stream until it disconnects, quits, or the
/// backend fails fatally.
pub struct ClientSession {
    config: Arc<GatewayConfig>,
    cancel: CancellationToken,
}

impl ClientSession {
    /// `cancel` ends the session from outside (process shutdown).
    pub fn new(config: Arc<GatewayConfig>, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub async fn run<S>(self, stream: S) -> Result<(), GatewayError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (out, rx) = Outbound::channel();
        let writer = tokio::spawn(
            outbound::write_lines(write_half, rx, self.cancel.clone()).instrument(Span::current()),
        );

        let mut controller = Controller::new(self.config, out, self.cancel.clone());
        let result = controller.read_loop(BufReader::new(read_half)).await;
        controller.shutdown().await;

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "client socket write failed"),
            Err(e) => warn!(error = %e, "writer task panicked"),
        }
        debug!("client session ended");

        match result {
            Err(GatewayError::Closed(_)) => Ok(()),
            other => other,
        }
    }
}

// ── Controller ───────────────────────────────────────────────────

enum Phase {
    AwaitingCredentials {
        account: Option<String>,
        secret: Option<SecretString>,
    },
    Active(Active),
}

struct Active {
    replies: Arc<Replies>,
    handle: ConnectionHandle,
    closer: Closer,
    worker: JoinHandle<()>,
}

struct Controller {
    config: Arc<GatewayConfig>,
    out: Outbound,
    cancel: CancellationToken,
    phase: Phase,
}

impl Controller {
    fn new(config: Arc<GatewayConfig>, out: Outbound, cancel: CancellationToken) -> Self {
        Self {
            config,
            out,
            cancel,
            phase: Phase::AwaitingCredentials {
                account: None,
                secret: None,
            },
        }
    }

    async fn read_loop<R>(&mut self, mut reader: R) -> Result<(), GatewayError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            let inbound = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(()),
                inbound = read_line(&mut reader, &mut buf) => inbound?,
            };
            let line = match inbound {
                Inbound::Line(line) => line,
                Inbound::TooLong => {
                    debug!(limit = MAX_LINE_BYTES, "discarding overlong line");
                    continue;
                }
                Inbound::Eof => {
                    info!("client disconnected");
                    return Ok(());
                }
            };

            // Only the verb: PASS lines carry the secret.
            let verb = line.split_whitespace().next().unwrap_or_default();
            trace!(verb, "received");

            match Command::parse(&line) {
                Some(command) => self.dispatch(command).await?,
                None => debug!(verb, "ignoring unsupported line"),
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<(), GatewayError> {
        match command {
            Command::Pass(secret) => self.on_pass(secret),
            Command::Nick(nick) => self.on_nick(nick),
            Command::User { realname } => self.on_user(&realname)?,
            Command::Privmsg { target, text } => self.on_privmsg(&target, &text).await?,
            Command::Whois(nick) => self.on_whois(&nick).await?,
            Command::Ping(argument) => self.out.send(self.replies().pong(&argument))?,
            Command::Quit => self.on_quit()?,
        }
        Ok(())
    }

    /// Replies for the current nickname; `*` before NICK.
    fn replies(&self) -> Arc<Replies> {
        match &self.phase {
            Phase::Active(active) => Arc::clone(&active.replies),
            Phase::AwaitingCredentials { account, .. } => Arc::new(Replies::new(
                &self.config.server_name,
                &self.config.host,
                account.as_deref().unwrap_or("*"),
            )),
        }
    }

    // ── Registration ─────────────────────────────────────────────

    fn on_pass(&mut self, value: String) {
        match &mut self.phase {
            Phase::AwaitingCredentials { secret, .. } => *secret = Some(SecretString::from(value)),
            Phase::Active(_) => debug!("ignoring PASS after registration"),
        }
    }

    fn on_nick(&mut self, nick: String) {
        match &mut self.phase {
            Phase::AwaitingCredentials { account, .. } => *account = Some(nick),
            Phase::Active(_) => debug!("ignoring NICK after registration"),
        }
    }

    /// Activation: start a backend connection with the stored credentials.
    fn on_user(&mut self, realname: &str) -> Result<(), GatewayError> {
        let (account, secret) = match &self.phase {
            Phase::Active(active) => {
                self.out.send(active.replies.already_registered())?;
                return Ok(());
            }
            Phase::AwaitingCredentials {
                account: Some(account),
                secret: Some(secret),
            } => (account.clone(), secret.clone()),
            Phase::AwaitingCredentials { .. } => {
                debug!("USER before PASS and NICK");
                self.out.send(self.replies().password_mismatch())?;
                return Ok(());
            }
        };

        let features = Features::from_realname(realname);
        info!(%account, ?features, "client registered, connecting to backend");

        let replies = Arc::new(Replies::new(
            &self.config.server_name,
            &self.config.host,
            account.as_str(),
        ));
        let closer = Closer::new(self.out.clone(), Arc::clone(&replies), self.cancel.clone());
        let bridge = IrcBridge::new(self.out.clone(), Arc::clone(&replies), closer.clone(), features);
        let hooks = Hooks::new()
            .on_connected(bridge.clone())
            .on_error(bridge.clone())
            .on_message(bridge.clone())
            .on_join(bridge.clone())
            .on_leave(bridge);

        let credentials = Credentials::new(account, secret);
        let mut connection = match Connection::new(
            self.config.backend.clone(),
            credentials,
            hooks,
            self.cancel.child_token(),
        ) {
            Ok(connection) => connection,
            Err(err) => {
                error!(error = %err, "cannot create backend connection");
                closer.close(&err.to_string());
                return Ok(());
            }
        };

        let handle = connection.handle();
        let worker_closer = closer.clone();
        let worker = tokio::spawn(
            async move {
                match connection.run().await {
                    Ok(()) => debug!("backend connection finished"),
                    Err(err) => {
                        error!(error = %err, "backend connection failed");
                        worker_closer.close(&err.to_string());
                    }
                }
            }
            .instrument(Span::current()),
        );

        self.phase = Phase::Active(Active {
            replies,
            handle,
            closer,
            worker,
        });
        Ok(())
    }

    // ── Commands ─────────────────────────────────────────────────

    async fn on_privmsg(&mut self, room: &str, text: &str) -> Result<(), GatewayError> {
        let Phase::Active(active) = &self.phase else {
            self.out.send(self.replies().not_registered("PRIVMSG"))?;
            return Ok(());
        };
        if let Err(err) = active.handle.say(room, text).await {
            warn!(room, error = %err, "say failed");
        }
        Ok(())
    }

    async fn on_whois(&mut self, nick: &str) -> Result<(), GatewayError> {
        let Phase::Active(active) = &self.phase else {
            self.out.send(self.replies().not_registered("WHOIS"))?;
            return Ok(());
        };
        let lines = {
            let state = active.handle.state().await;
            let memberships: Vec<(&Room, &Member)> = state.memberships(nick).collect();
            active.replies.whois(nick, &memberships)
        };
        self.out.send_all(lines)?;
        Ok(())
    }

    fn on_quit(&mut self) -> Result<(), GatewayError> {
        info!("client quit");
        match &self.phase {
            Phase::Active(active) => active.closer.close("Client quit"),
            Phase::AwaitingCredentials { .. } => {
                self.out.send(self.replies().closing("Client quit"))?;
                self.cancel.cancel();
            }
        }
        Ok(())
    }

    /// Stop everything and wait for the backend task to tear down.
    async fn shutdown(self) {
        self.cancel.cancel();
        if let Phase::Active(active) = self.phase {
            if let Err(e) = active.worker.await {
                warn!(error = %e, "backend task panicked");
            }
        }
    }
}

// ── Line reading ─────────────────────────────────────────────────

enum Inbound {
    Line(String),
    TooLong,
    Eof,
}

/// Read one line of at most [`MAX_LINE_BYTES`]. Bytes that are not UTF-8
/// are replaced rather than rejected.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Inbound>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut limited = (&mut *reader).take(MAX_LINE_BYTES);
    if limited.read_until(b'\n', buf).await? == 0 {
        return Ok(Inbound::Eof);
    }
    if buf.last() == Some(&b'\n') || limited.limit() > 0 {
        return Ok(Inbound::Line(String::from_utf8_lossy(buf).into_owned()));
    }

    // Over the limit: drop the rest of this line.
    loop {
        buf.clear();
        let mut limited = (&mut *reader).take(MAX_LINE_BYTES);
        if limited.read_until(b'\n', buf).await? == 0 || buf.last() == Some(&b'\n') {
            return Ok(Inbound::TooLong);
        }
    }
}

// ── Closing ──────────────────────────────────────────────────────

/// Sends the single ERROR line and cancels the session. Later calls are
/// no-ops, so the error hook and the worker's exit path can both use it.
#[derive(Clone)]
struct Closer {
    out: Outbound,
    replies: Arc<Replies>,
    cancel: CancellationToken,
    closed: Arc<AtomicBool>,
}

impl Closer {
    fn new(out: Outbound, replies: Arc<Replies>, cancel: CancellationToken) -> Self {
        Self {
            out,
            replies,
            cancel,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn close(&self, reason: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.out.send(self.replies.closing(reason)).is_err() {
            debug!("client gone before closing line");
        }
        self.cancel.cancel();
    }
}

// ── Hook bridge ──────────────────────────────────────────────────

/// Renders backend connection events as IRC lines for one client.
#[derive(Clone)]
struct IrcBridge {
    out: Outbound,
    replies: Arc<Replies>,
    closer: Closer,
    features: Features,
    welcomed: Arc<AtomicBool>,
}

impl IrcBridge {
    fn new(out: Outbound, replies: Arc<Replies>, closer: Closer, features: Features) -> Self {
        Self {
            out,
            replies,
            closer,
            features,
            welcomed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn presence(&self, verb: Verb, room: &Room, member: &Member, change: PresenceChange) -> HookResult {
        debug!(room = %room.id, username = %member.username, %verb, ?change, "presence");
        if self.features.presence && change.changed && member.username != self.replies.nick() {
            self.out.send(self.replies.presence(verb, &room.id, member))?;
        }
        Ok(())
    }
}

impl ConnectedHook for IrcBridge {
    fn on_connected(&self, rooms: &mut RoomMap) -> HookResult {
        info!(rooms = rooms.len(), "connected to backend");
        if !self.welcomed.swap(true, Ordering::SeqCst) {
            self.out.send_all(self.replies.welcome())?;
        }

        for room in rooms.values_mut() {
            self.out.send_all(self.replies.room_block(room))?;
            let backlog = room.take_backlog();
            if self.features.backlog {
                for message in &backlog {
                    self.out
                        .send_all(self.replies.message(&room.id, message, self.features.time))?;
                }
            }
        }
        Ok(())
    }
}

impl ErrorHook for IrcBridge {
    fn on_error(&self, error: &CoreError, will_retry: bool) -> HookResult {
        if will_retry {
            warn!(error = %error, "backend error, reconnecting");
        } else {
            self.closer.close(&error.to_string());
        }
        Ok(())
    }
}

impl MessageHook for IrcBridge {
    fn on_message(&self, room: &Room, message: &Message) -> HookResult {
        if message.is_mine() {
            trace!(room = %room.id, id = %message.id, "skipping own message");
            return Ok(());
        }
        self.out.send_all(self.replies.message(&room.id, message, false))?;
        Ok(())
    }
}

impl JoinHook for IrcBridge {
    fn on_join(&self, room: &Room, member: &Member, change: PresenceChange) -> HookResult {
        self.presence(Verb::Join, room, member, change)
    }
}

impl LeaveHook for IrcBridge {
    fn on_leave(&self, room: &Room, member: &Member, change: PresenceChange) -> HookResult {
        self.presence(Verb::Part, room, member, change)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chatbridge_core::MessageType;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    fn bridge(features: Features) -> (IrcBridge, UnboundedReceiver<String>, CancellationToken) {
        let (out, rx) = Outbound::channel();
        let replies = Arc::new(Replies::new("lingr", "lingr.com", "alice"));
        let cancel = CancellationToken::new();
        let closer = Closer::new(out.clone(), Arc::clone(&replies), cancel.clone());
        (IrcBridge::new(out, replies, closer, features), rx, cancel)
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn message(id: &str, kind: &str, public_session_id: &str) -> Message {
        Message::new(
            serde_json::from_value(serde_json::json!({
                "id": id,
                "type": kind,
                "speaker_id": "bob",
                "public_session_id": public_session_id,
                "text": format!("text {id}"),
                "timestamp": "2011-02-15T07:52:17Z"
            }))
            .unwrap(),
            "pub-alice",
        )
    }

    fn room(id: &str) -> Room {
        let member = Member {
            username: "bob".into(),
            display_name: "Bob".into(),
            icon_url: None,
            is_owner: true,
            is_present: true,
        };
        Room {
            id: id.into(),
            display_name: id.to_uppercase(),
            blurb: None,
            is_public: false,
            backlog: vec![message(&format!("{id}-1"), "user", "pub-bob")],
            members: [("bob".to_string(), member)].into_iter().collect(),
        }
    }

    #[test]
    fn connected_renders_rooms_and_drains_backlog() {
        let (bridge, mut rx, _) = bridge(Features::from_realname("backlog"));
        let mut rooms: RoomMap = [("r1".to_string(), room("r1")), ("r2".to_string(), room("r2"))]
            .into_iter()
            .collect();

        bridge.on_connected(&mut rooms).unwrap();

        assert_eq!(
            drain(&mut rx),
            [
                ":lingr 001 alice :Welcome to Lingr!",
                ":lingr 376 alice :End of MOTD.",
                ":alice!alice@lingr.com JOIN #r1",
                ":lingr 332 alice #r1 :R1",
                ":lingr 353 alice = #r1 :@bob",
                ":lingr 366 alice #r1 :End of NAMES list.",
                ":bob!bob@lingr.com PRIVMSG #r1 :text r1-1",
                ":alice!alice@lingr.com JOIN #r2",
                ":lingr 332 alice #r2 :R2",
                ":lingr 353 alice = #r2 :@bob",
                ":lingr 366 alice #r2 :End of NAMES list.",
                ":bob!bob@lingr.com PRIVMSG #r2 :text r2-1",
            ]
        );
        assert!(rooms.values().all(|room| room.backlog.is_empty()));
    }

    #[test]
    fn reconnect_rebroadcasts_rooms_without_welcome() {
        let (bridge, mut rx, _) = bridge(Features::default());
        let mut rooms: RoomMap = [("r1".to_string(), room("r1"))].into_iter().collect();

        bridge.on_connected(&mut rooms).unwrap();
        assert_eq!(drain(&mut rx).len(), 6);

        bridge.on_connected(&mut rooms).unwrap();
        let again = drain(&mut rx);
        assert_eq!(again.len(), 4);
        assert_eq!(again[0], ":alice!alice@lingr.com JOIN #r1");
    }

    #[test]
    fn own_messages_are_suppressed_and_bots_are_notices() {
        let (bridge, mut rx, _) = bridge(Features::default());
        let room = room("r1");

        bridge.on_message(&room, &message("m1", "user", "pub-alice")).unwrap();
        bridge.on_message(&room, &message("m2", "bot", "pub-bot")).unwrap();

        assert_eq!(drain(&mut rx), [":bob!bob@lingr.com NOTICE #r1 :text m2"]);
        assert_eq!(message("m2", "bot", "pub-bot").kind, MessageType::Bot);
    }

    #[test]
    fn presence_lines_need_feature_and_transition() {
        let changed = PresenceChange {
            first_seen: true,
            changed: true,
        };
        let unchanged = PresenceChange {
            first_seen: false,
            changed: false,
        };
        let room = room("r1");
        let bob = &room.members["bob"];

        let (quiet, mut rx, _) = bridge(Features::default());
        quiet.on_join(&room, bob, changed).unwrap();
        assert!(drain(&mut rx).is_empty());

        let (loud, mut rx, _) = bridge(Features::from_realname("presence"));
        loud.on_join(&room, bob, changed).unwrap();
        loud.on_join(&room, bob, unchanged).unwrap();
        loud.on_leave(&room, bob, changed).unwrap();
        assert_eq!(
            drain(&mut rx),
            [
                ":bob!bob@lingr.com JOIN #r1",
                ":bob!bob@lingr.com PART #r1",
            ]
        );
    }

    #[test]
    fn final_error_closes_once() {
        let (bridge, mut rx, cancel) = bridge(Features::default());

        bridge.on_error(&CoreError::NoSession, true).unwrap();
        assert!(drain(&mut rx).is_empty());
        assert!(!cancel.is_cancelled());

        bridge.on_error(&CoreError::NoSession, false).unwrap();
        bridge.closer.close("again");
        assert_eq!(
            drain(&mut rx),
            [r#"ERROR :Closing Link: alice!alice@lingr.com ("No backend session")"#]
        );
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn hooks_fail_once_the_client_is_gone() {
        let (bridge, rx, _) = bridge(Features::default());
        drop(rx);
        let mut rooms: RoomMap = [("r1".to_string(), room("r1"))].into_iter().collect();
        assert!(bridge.on_connected(&mut rooms).is_err());
    }
}

// Room endpoints
//
// user/get_rooms, room/show, room/get_archives, room/subscribe,
// room/unsubscribe, room/say. Multi-room parameters are comma-joined.

use tracing::debug;

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::{Archive, MessagePayload, RoomInfo, RoomList, RoomShow, Subscription};

impl BackendClient {
    /// List the ids of the rooms the session's user belongs to.
    ///
    /// `GET user/get_rooms`
    pub async fn get_rooms(&self, session: &str) -> Result<Vec<String>, Error> {
        debug!("listing rooms");
        let list: RoomList = self.get("user/get_rooms", &[("session", session)]).await?;
        Ok(list.rooms)
    }

    /// Fetch room details, roster, and the default backlog window.
    ///
    /// `GET room/show?room=a,b,c`
    pub async fn show_rooms(&self, session: &str, room_ids: &[String]) -> Result<Vec<RoomInfo>, Error> {
        let rooms = room_ids.join(",");
        debug!(%rooms, "showing rooms");
        let show: RoomShow = self
            .get("room/show", &[("session", session), ("room", &rooms)])
            .await?;
        Ok(show.rooms.into_iter().map(|entry| entry.into_inner()).collect())
    }

    /// Fetch up to `limit` messages older than message `before`.
    ///
    /// `GET room/get_archives`
    pub async fn get_archives(
        &self,
        session: &str,
        room: &str,
        before: &str,
        limit: usize,
    ) -> Result<Vec<MessagePayload>, Error> {
        debug!(room, before, limit, "fetching archives");
        let limit = limit.to_string();
        let archive: Archive = self
            .get(
                "room/get_archives",
                &[
                    ("session", session),
                    ("room", room),
                    ("before", before),
                    ("limit", &limit),
                ],
            )
            .await?;
        Ok(archive
            .messages
            .into_iter()
            .map(|entry| entry.into_inner())
            .collect())
    }

    /// Subscribe the session to room events and return the event counter.
    ///
    /// `POST room/subscribe`. With `reset` the backend starts a fresh
    /// event stream rather than resuming the previous position.
    pub async fn subscribe(&self, session: &str, room_ids: &[String], reset: bool) -> Result<u64, Error> {
        let rooms = room_ids.join(",");
        debug!(%rooms, reset, "subscribing");
        let subscription: Subscription = self
            .post(
                "room/subscribe",
                &[
                    ("session", session),
                    ("room", &rooms),
                    ("reset", if reset { "true" } else { "false" }),
                ],
            )
            .await?;
        Ok(subscription.counter)
    }

    /// `POST room/unsubscribe`
    pub async fn unsubscribe(&self, session: &str, room_ids: &[String]) -> Result<(), Error> {
        let rooms = room_ids.join(",");
        debug!(%rooms, "unsubscribing");
        self.post_unit("room/unsubscribe", &[("session", session), ("room", &rooms)])
            .await
    }

    /// Post a message to a room.
    ///
    /// `POST room/say`
    pub async fn say(&self, session: &str, room: &str, nickname: &str, text: &str) -> Result<(), Error> {
        debug!(room, "saying");
        self.post_unit(
            "room/say",
            &[
                ("session", session),
                ("room", room),
                ("nickname", nickname),
                ("text", text),
            ],
        )
        .await
    }
}

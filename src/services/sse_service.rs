use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dao::room_store::RoomChange,
    dto::{
        room::RoomSnapshot,
        sse::{
            ROOM_CLOSED, ROOM_UPDATED, ROOM_VIEW, RoomClosedEvent, SESSION_EVICTED, ServerEvent,
            SessionEvictedEvent,
        },
    },
    services::room_client::RoomSubscription,
    session::view::RoomView,
};

/// Translate one room change into the event sent to the client.
///
/// The boolean tells whether the stream must end after this event.
pub fn room_event(
    room_id: &str,
    change: &RoomChange,
    username: Option<&str>,
) -> serde_json::Result<(ServerEvent, bool)> {
    match (change, username) {
        (RoomChange::Updated(room), None) => Ok((
            ServerEvent::json(ROOM_UPDATED.to_string(), &RoomSnapshot::from(room))?,
            false,
        )),
        (RoomChange::Removed, None) => Ok((
            ServerEvent::json(
                ROOM_CLOSED.to_string(),
                &RoomClosedEvent {
                    room_id: room_id.to_string(),
                },
            )?,
            true,
        )),
        (change, Some(username)) => match RoomView::from_change(change, username) {
            Ok(view) => Ok((ServerEvent::json(ROOM_VIEW.to_string(), &view)?, false)),
            Err(eviction) => Ok((
                ServerEvent::json(
                    SESSION_EVICTED.to_string(),
                    &SessionEvictedEvent::from(eviction),
                )?,
                true,
            )),
        },
    }
}

/// Convert a room subscription into an SSE response, forwarding changes until the
/// client disconnects or the room goes away.
pub fn to_sse_stream(
    mut subscription: RoomSubscription,
    username: Option<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let room_id = subscription.room_id().to_string();
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                change = subscription.next() => {
                    let Some(change) = change else { break };
                    let (payload, last) = match room_event(&room_id, &change, username.as_deref()) {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            warn!(room_id = %room_id, error = %err, "failed to encode room event");
                            continue;
                        }
                    };

                    let mut event = Event::default().data(payload.data);
                    if let Some(name) = payload.event {
                        debug!(room_id = %room_id, event = %name, "forwarding room event");
                        event = event.event(name);
                    }

                    if tx.send(Ok(event)).await.is_err() || last {
                        break;
                    }
                }
            }
        }

        subscription.cancel();
        info!(room_id = %room_id, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

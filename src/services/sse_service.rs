use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{dto::sse::StreamPayload, state::hub::Subscription};

/// Frames buffered between the forwarder task and the HTTP response.
const FORWARD_BUFFER: usize = 1;

/// Convert a hub subscription into an SSE response, forwarding frames and
/// unsubscribing once the client disconnects.
pub fn to_sse_stream<T: StreamPayload>(
    mut subscription: Subscription<T>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(FORWARD_BUFFER);
    let subscriber = subscription.id();

    // The hub queue absorbs bursts while the client is slow; this task only relays.
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                frame = subscription.recv() => {
                    let Some(frame) = frame else { break };
                    let event = match T::event(&frame) {
                        Ok(event) => event,
                        Err(err) => {
                            warn!(%subscriber, error = %err, "failed to serialize frame");
                            continue;
                        }
                    };

                    let mut sse_event = Event::default()
                        .id(frame.version.to_string())
                        .data(event.data);
                    if let Some(name) = event.event {
                        sse_event = sse_event.event(name);
                    }

                    if tx.send(Ok(sse_event)).await.is_err() {
                        break;
                    }
                }
            }
        }

        info!(
            stream = T::EVENT,
            %subscriber,
            reason = ?subscription.close_reason(),
            "SSE stream disconnected"
        );
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

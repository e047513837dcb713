use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        command::CommandRejected,
        sse::{ServerEvent, StreamPayload},
    },
    error::ServiceError,
    services::command_service,
    state::{
        SharedState,
        hub::{CloseReason, Subscription},
    },
};

/// Handle a monitoring WebSocket: push every snapshot, ignore inbound text.
pub async fn handle_monitor_socket(state: SharedState, socket: WebSocket) {
    let subscription = state.monitor_hub().subscribe();
    info!(subscriber = %subscription.id(), "monitor websocket connected");
    pump(socket, subscription, None).await;
}

/// Handle a game WebSocket: push every tick and accept player commands.
pub async fn handle_game_socket(state: SharedState, socket: WebSocket) {
    let subscription = state.game_hub().subscribe();
    info!(subscriber = %subscription.id(), "game websocket connected");
    pump(socket, subscription, Some(state)).await;
}

/// Forward hub frames to the socket until either side goes away.
///
/// When `commands` is set, inbound text frames are parsed as player commands and
/// rejections are answered on this socket only.
async fn pump<T: StreamPayload>(
    socket: WebSocket,
    mut subscription: Subscription<T>,
    commands: Option<SharedState>,
) {
    let subscriber = subscription.id();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = subscription.recv() => {
                let Some(frame) = frame else {
                    let close = close_frame(subscription.close_reason());
                    info!(%subscriber, code = close.code, "closing websocket subscriber");
                    let _ = sender.send(Message::Close(Some(close))).await;
                    break;
                };
                match T::event(&frame) {
                    Ok(event) => {
                        if send_event(&mut sender, event).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(%subscriber, error = %err, "failed to serialize frame"),
                }
            }
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let Some(state) = commands.as_ref() else {
                        debug!(%subscriber, "ignoring inbound text on push-only socket");
                        continue;
                    };
                    if let Err(err) = command_service::submit_json(state, text.as_str()).await {
                        if reply_rejection(&mut sender, err).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if sender.send(Message::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let _ = sender.send(Message::Close(frame)).await;
                    break;
                }
                Some(Ok(Message::Binary(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Err(err)) => {
                    warn!(%subscriber, error = %err, "websocket error");
                    break;
                }
                None => break,
            }
        }
    }

    info!(%subscriber, "websocket disconnected");
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: ServerEvent,
) -> Result<(), axum::Error> {
    sender.send(Message::Text(event.data.into())).await
}

async fn reply_rejection(
    sender: &mut SplitSink<WebSocket, Message>,
    err: ServiceError,
) -> Result<(), axum::Error> {
    let message = match err {
        ServiceError::InvalidInput(message) => message,
        other => other.to_string(),
    };
    let rejected = CommandRejected {
        kind: "error".into(),
        message,
    };
    match serde_json::to_string(&rejected) {
        Ok(payload) => sender.send(Message::Text(payload.into())).await,
        Err(err) => {
            warn!(error = %err, "failed to serialize command rejection");
            Ok(())
        }
    }
}

fn close_frame(reason: Option<CloseReason>) -> CloseFrame {
    match reason {
        Some(CloseReason::Lagging) => CloseFrame {
            code: close_code::AGAIN,
            reason: "subscriber too slow".into(),
        },
        Some(CloseReason::HubClosed) => CloseFrame {
            code: close_code::AWAY,
            reason: "server shutting down".into(),
        },
        Some(CloseReason::Unsubscribed) | None => CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lagging_subscribers_are_told_to_retry() {
        assert_eq!(close_frame(Some(CloseReason::Lagging)).code, close_code::AGAIN);
        assert_eq!(close_frame(Some(CloseReason::HubClosed)).code, close_code::AWAY);
        assert_eq!(close_frame(None).code, close_code::NORMAL);
    }
}

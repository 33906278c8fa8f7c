use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{debug, info, warn};
use uuid::Uuid;

use duo_types::Table;
use duo_types::api::Claims;
use duo_types::events::{FeedCommand, FeedEvent};

use crate::dispatcher::ChangeFeed;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket may take to send its Subscribe command.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve one push channel: wait for a Subscribe naming a table and couple,
/// check the session token against that couple, then forward matching row
/// changes until either side goes away.
pub async fn handle_connection(socket: WebSocket, feed: ChangeFeed, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    let (table, couple_id) = match wait_for_subscribe(&mut receiver, &jwt_secret).await {
        Ok(scope) => scope,
        Err(reason) => {
            warn!("Feed subscription refused: {}", reason);
            let _ = send_event(&mut sender, &FeedEvent::Error { message: reason }).await;
            return;
        }
    };

    // Start listening before confirming so nothing published after the
    // confirmation can be missed.
    let mut watch = feed.watch(table, couple_id);

    if send_event(&mut sender, &FeedEvent::Subscribed { table, couple_id })
        .await
        .is_err()
    {
        return;
    }

    info!("Feed subscribed to {} for couple {}", table, couple_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                change = watch.next() => {
                    let Some(change) = change else { break };
                    if send_event(&mut sender, &FeedEvent::Change(change)).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping feed connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                Message::Text(text) => {
                    let preview: String = text.as_str().chars().take(200).collect();
                    debug!("Ignoring feed command after subscribe: {}", preview);
                }
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("Feed for {} of couple {} closed", table, couple_id);
}

async fn wait_for_subscribe(
    receiver: &mut SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Result<(Table, Uuid), String> {
    let first_command = tokio::time::timeout(SUBSCRIBE_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                return serde_json::from_str::<FeedCommand>(text.as_str())
                    .map_err(|e| format!("bad command: {}", e));
            }
        }
        Err("socket closed before subscribing".to_string())
    })
    .await
    .map_err(|_| "timed out waiting for subscribe".to_string())??;

    let FeedCommand::Subscribe {
        table,
        couple_id,
        token,
    } = first_command;

    let claims = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| format!("invalid session token: {}", e))?
    .claims;

    if claims.sub != couple_id {
        return Err(format!("session token does not cover couple {}", couple_id));
    }

    Ok((table, couple_id))
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &FeedEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).map_err(axum::Error::new)?;
    sender.send(Message::Text(text.into())).await
}

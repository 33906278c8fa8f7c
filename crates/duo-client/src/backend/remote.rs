use std::sync::RwLock;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use uuid::Uuid;

use duo_types::Table;
use duo_types::api::{ClaimPartnerRequest, CodeResponse, CoupleSession, CreateCoupleRequest, ErrorBody};
use duo_types::events::{FeedCommand, FeedEvent};
use duo_types::models::Couple;

use super::{Backend, SUBSCRIPTION_BUFFER, Subscription};
use crate::error::BackendError;

const API_KEY_HEADER: &str = "apikey";

/// Talks to a `duo` server. Every couple lookup that succeeds hands back a
/// session token; row calls and feed subscriptions carry the latest one.
pub struct RemoteBackend {
    http: Client,
    base_url: String,
    anon_key: String,
    token: RwLock<Option<String>>,
}

impl RemoteBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, BackendError> {
        let http = Client::builder()
            .build()
            .map_err(|e| BackendError::Transport(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn feed_url(&self) -> String {
        format!(
            "{}/realtime",
            self.base_url.replace("http://", "ws://").replace("https://", "wss://")
        )
    }

    fn session_token(&self) -> Result<String, BackendError> {
        self.token
            .read()
            .ok()
            .and_then(|token| token.clone())
            .ok_or(BackendError::Unauthorized)
    }

    fn remember(&self, session: CoupleSession) -> Couple {
        if let Ok(mut token) = self.token.write() {
            *token = Some(session.token);
        }
        session.couple
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(API_KEY_HEADER, &self.anon_key)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, BackendError> {
        let token = self.session_token()?;
        Ok(self
            .request(builder)
            .header("Authorization", format!("Bearer {}", token)))
    }

    fn rows_url(&self, couple_id: Uuid, table: Table) -> String {
        self.url(&format!("/couples/{}/{}", couple_id, table))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);

        Err(match status {
            StatusCode::NOT_FOUND => BackendError::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized,
            s if s.is_client_error() => BackendError::Rejected(reason),
            s => BackendError::Internal(format!("{}: {}", s, reason)),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, BackendError> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Internal(format!("bad response body: {}", e)))
    }

    /// A 404 from a lookup means "no such couple", not a failure.
    async fn lookup(&self, builder: RequestBuilder) -> Result<Option<Couple>, BackendError> {
        match self.send_json::<CoupleSession>(builder).await {
            Ok(session) => Ok(Some(self.remember(session))),
            Err(BackendError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    async fn generate_code(&self) -> Result<String, BackendError> {
        let resp: CodeResponse = self
            .send_json(self.request(self.http.post(self.url("/rpc/generate_couple_code"))))
            .await?;
        Ok(resp.code)
    }

    async fn create_couple(&self, request: &CreateCoupleRequest) -> Result<Couple, BackendError> {
        let session: CoupleSession = self
            .send_json(self.request(self.http.post(self.url("/couples"))).json(request))
            .await?;
        info!("Created couple {}", session.couple.id);
        Ok(self.remember(session))
    }

    async fn find_couple_by_code(&self, code: &str) -> Result<Option<Couple>, BackendError> {
        let builder = self
            .request(self.http.get(self.url("/couples/lookup")))
            .query(&[("code", code)]);
        self.lookup(builder).await
    }

    async fn find_couple(&self, id: Uuid, code: &str) -> Result<Option<Couple>, BackendError> {
        let builder = self
            .request(self.http.get(self.url(&format!("/couples/{}", id))))
            .query(&[("code", code)]);
        self.lookup(builder).await
    }

    async fn claim_partner_slot(&self, couple_id: Uuid, partner_name: &str) -> Result<Couple, BackendError> {
        let body = ClaimPartnerRequest {
            partner_name: partner_name.to_string(),
        };
        let builder = self.authorized(self.http.post(self.url(&format!("/couples/{}/partner", couple_id))))?;
        self.send_json(builder.json(&body)).await
    }

    async fn list(&self, table: Table, couple_id: Uuid, limit: Option<u32>) -> Result<Vec<Value>, BackendError> {
        let mut builder = self.authorized(self.http.get(self.rows_url(couple_id, table)))?;
        if let Some(limit) = limit {
            builder = builder.query(&[("limit", limit)]);
        }
        self.send_json(builder).await
    }

    async fn insert(&self, table: Table, couple_id: Uuid, row: Value) -> Result<Value, BackendError> {
        let builder = self.authorized(self.http.post(self.rows_url(couple_id, table)))?;
        self.send_json(builder.json(&row)).await
    }

    async fn update(&self, table: Table, couple_id: Uuid, row_id: Uuid, patch: Value) -> Result<Value, BackendError> {
        let url = format!("{}/{}", self.rows_url(couple_id, table), row_id);
        let builder = self.authorized(self.http.patch(url))?;
        self.send_json(builder.json(&patch)).await
    }

    async fn delete(&self, table: Table, couple_id: Uuid, row_id: Uuid) -> Result<(), BackendError> {
        let url = format!("{}/{}", self.rows_url(couple_id, table), row_id);
        self.send(self.authorized(self.http.delete(url))?).await?;
        Ok(())
    }

    async fn subscribe(&self, table: Table, couple_id: Uuid) -> Result<Subscription, BackendError> {
        let token = self.session_token()?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.feed_url())
            .await
            .map_err(|e| BackendError::Transport(format!("feed connect failed: {}", e)))?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let command = serde_json::to_string(&FeedCommand::Subscribe {
            table,
            couple_id,
            token,
        })
        .map_err(|e| BackendError::Internal(e.to_string()))?;
        ws_tx
            .send(WsMessage::Text(command.into()))
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        // The server confirms before forwarding anything, so once this loop
        // exits no later change can slip past.
        loop {
            match ws_rx.next().await {
                Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<FeedEvent>(text.as_str()) {
                    Ok(FeedEvent::Subscribed { .. }) => break,
                    Ok(FeedEvent::Error { message }) => return Err(BackendError::Rejected(message)),
                    Ok(FeedEvent::Change(_)) => continue,
                    Err(e) => return Err(BackendError::Internal(format!("bad feed event: {}", e))),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    return Err(BackendError::Transport("feed closed before confirming".into()));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(BackendError::Transport(e.to_string())),
            }
        }
        debug!("Feed confirmed {} for couple {}", table, couple_id);

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let pump = tokio::spawn(async move {
            // Pongs to the server's heartbeat go out through the shared
            // stream while reading, so the sink only needs to stay alive.
            let _ws_tx = ws_tx;
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => match serde_json::from_str::<FeedEvent>(text.as_str()) {
                        Ok(FeedEvent::Change(change)) => {
                            if tx.send(change).await.is_err() {
                                break;
                            }
                        }
                        Ok(FeedEvent::Error { message }) => {
                            warn!("Feed error for {}: {}", table, message);
                            break;
                        }
                        Ok(FeedEvent::Subscribed { .. }) => {}
                        Err(e) => warn!("Ignoring bad feed event: {}", e),
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Feed for {} dropped: {}", table, e);
                        break;
                    }
                }
            }
            debug!("Feed for {} of couple {} closed", table, couple_id);
        });

        Ok(Subscription::new(table, couple_id, rx, pump))
    }

    fn end_session(&self) {
        if let Ok(mut token) = self.token.write() {
            *token = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_url_swaps_scheme() {
        let backend = RemoteBackend::new("http://localhost:3000/", "k").unwrap();
        assert_eq!(backend.feed_url(), "ws://localhost:3000/realtime");

        let backend = RemoteBackend::new("https://duo.example.com", "k").unwrap();
        assert_eq!(backend.feed_url(), "wss://duo.example.com/realtime");
    }

    #[test]
    fn row_calls_need_a_session() {
        let backend = RemoteBackend::new("http://localhost:3000", "k").unwrap();
        assert!(matches!(backend.session_token(), Err(BackendError::Unauthorized)));
        backend.end_session();
        assert!(matches!(backend.session_token(), Err(BackendError::Unauthorized)));
    }
}

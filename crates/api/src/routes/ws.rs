use std::collections::HashMap;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use docshelf_core::auth::Principal;
use docshelf_core::events::{HubEvent, Topic};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::middleware::auth::session_principal;
use crate::state::AppState;

/// Buffered events per session between the topic forwarders and the socket.
const SESSION_BUFFER: usize = 64;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

#[derive(Debug, Default, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Subscribe {
        #[serde(rename = "keyId")]
        key_id: Uuid,
    },
    Unsubscribe {
        #[serde(rename = "keyId")]
        key_id: Uuid,
    },
}

/// Browsers cannot set headers on a WebSocket handshake, so the session
/// token travels in the query string. It is checked before upgrading.
async fn upgrade(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<WsQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(token) = query.token.filter(|t| !t.trim().is_empty()) else {
        return ApiError::Unauthorized("Authentication required".into()).into_response();
    };
    let principal = match session_principal(&state, token.trim()) {
        Ok(principal) => principal,
        Err(e) => return e.into_response(),
    };
    match ws {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_socket(socket, state, principal))
            .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

struct Session {
    state: AppState,
    principal: Principal,
    events: mpsc::Sender<HubEvent>,
    forwarders: HashMap<Topic, JoinHandle<()>>,
}

impl Session {
    fn subscribe(&mut self, topic: Topic) {
        if self.forwarders.contains_key(&topic) {
            return;
        }
        let rx = self.state.shelf().bus().subscribe(topic);
        let handle = tokio::spawn(forward(rx, self.events.clone()));
        self.forwarders.insert(topic, handle);
    }

    fn unsubscribe(&mut self, topic: Topic) {
        if let Some(handle) = self.forwarders.remove(&topic) {
            handle.abort();
        }
        self.state.shelf().bus().prune();
    }

    async fn handle(&mut self, text: &str) {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(user_id = %self.principal.user_id, error = %e, "ignoring client message");
                return;
            }
        };
        match message {
            ClientMessage::Subscribe { key_id } => {
                // Only the key's owner may watch it.
                match self.state.shelf().get_api_key(&self.principal, key_id).await {
                    Ok(_) => {
                        self.subscribe(Topic::ApiKey(key_id));
                        tracing::debug!(user_id = %self.principal.user_id, api_key_id = %key_id, "subscribed");
                    }
                    Err(e) => {
                        tracing::debug!(user_id = %self.principal.user_id, api_key_id = %key_id, error = %e, "subscription refused");
                    }
                }
            }
            ClientMessage::Unsubscribe { key_id } => self.unsubscribe(Topic::ApiKey(key_id)),
        }
    }

    fn close(self) {
        for (_, handle) in self.forwarders {
            handle.abort();
        }
        self.state.shelf().bus().prune();
    }
}

/// Pump one topic into the session queue. A lagging receiver is told to
/// reload instead of getting the missed events.
async fn forward(mut rx: broadcast::Receiver<HubEvent>, events: mpsc::Sender<HubEvent>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "subscriber lagged");
                HubEvent::Reconnect
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &HubEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode hub event");
            return true;
        }
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

async fn handle_socket(mut socket: WebSocket, state: AppState, principal: Principal) {
    let user_id = principal.user_id;
    tracing::info!(%user_id, "websocket client connected");

    if !send_event(&mut socket, &HubEvent::Welcome).await {
        return;
    }

    let (events, mut queue) = mpsc::channel(SESSION_BUFFER);
    let mut session = Session {
        state,
        principal,
        events,
        forwarders: HashMap::new(),
    };
    session.subscribe(Topic::Owner(user_id));

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => session.handle(text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(%user_id, error = %e, "websocket receive failed");
                    break;
                }
            },
            Some(event) = queue.recv() => {
                if !send_event(&mut socket, &event).await {
                    break;
                }
            }
        }
    }

    session.close();
    tracing::info!(%user_id, "websocket client disconnected");
}

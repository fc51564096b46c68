//! WebSocket upgrade handler.
//!
//! The credential is checked before the upgrade; a rejected client never
//! reaches the hub. The upgraded socket is adapted to the hub's
//! transport-neutral [`Frame`] stream and sink, and never buffers a
//! message larger than [`transport_limit`] allows.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use futures::{SinkExt, StreamExt, future};
use serde::Deserialize;
use tracing::{debug, info};

use chathub_core::error::AppError;
use chathub_core::types::UserId;
use chathub_realtime::{ChatHub, Frame};

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// JWT, for clients that cannot set headers on the upgrade.
    pub token: Option<String>,
}

/// GET /ws: authenticated WebSocket upgrade.
///
/// Accepts `Authorization: Bearer <jwt>` or `?token=<jwt>`.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<WsQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let token = bearer
        .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string())
        .or(query.token);

    let auth = match token {
        Some(token) => state.authenticator.authenticate(&token),
        None => Err(AppError::authentication("Missing credential")),
    };
    let auth = match auth {
        Ok(auth) => auth,
        Err(e) => {
            debug!(error = %e, "WebSocket upgrade refused");
            return ApiError::from(e).into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    info!(
        user_id = %auth.user_id,
        expires_at = %auth.expires_at,
        "WebSocket upgrade accepted"
    );
    let limit = transport_limit(state.hub.config().max_frame_bytes);
    let hub = state.hub.clone();
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| serve_socket(hub, auth.user_id, socket))
}

/// Largest message the transport will assemble.
///
/// Text up to `max_frame_bytes` is dispatched; text up to twice that is
/// read and answered with `FRAME_TOO_LARGE`; anything larger fails the
/// read and closes the connection.
fn transport_limit(max_frame_bytes: usize) -> usize {
    max_frame_bytes.saturating_mul(2)
}

async fn serve_socket(hub: ChatHub, user_id: UserId, socket: WebSocket) {
    let (sink, stream) = socket.split();
    let sink = sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(to_message(frame))));
    let stream = stream.map(|message| message.map(from_message));

    let reason = hub.serve(user_id, sink, stream).await;
    debug!(user_id = %user_id, reason = %reason, "WebSocket session ended");
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.to_string().into()),
        Frame::Binary(data) => Message::Binary(data),
        Frame::Ping => Message::Ping(Default::default()),
        Frame::Pong => Message::Pong(Default::default()),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(Arc::from(text.as_str())),
        Message::Binary(data) => Frame::Binary(data),
        Message::Ping(_) => Frame::Ping,
        Message::Pong(_) => Frame::Pong,
        Message::Close(_) => Frame::Close,
    }
}

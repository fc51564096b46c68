//! HTTP surface tests: the authenticated upgrade, live sessions over a real
//! socket, and the health/metrics endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

use chathub_api::{AppState, build_app};
use chathub_auth::JwtEncoder;
use chathub_core::config::AppConfig;
use chathub_core::types::UserId;
use chathub_database::MemoryRelationshipDirectory;
use chathub_realtime::ChatHub;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    state: AppState,
    directory: Arc<MemoryRelationshipDirectory>,
    encoder: JwtEncoder,
}

fn test_server() -> TestServer {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = "ws-test-secret".to_string();
    config.relationships.provider = "memory".to_string();
    config.realtime.broadcast_presence = false;
    config.realtime.max_frame_bytes = 1024;

    let directory = Arc::new(MemoryRelationshipDirectory::new());
    let hub = ChatHub::new(config.realtime.clone(), directory.clone());
    let encoder = JwtEncoder::new(&config.auth);

    TestServer {
        state: AppState::new(Arc::new(config), hub),
        directory,
        encoder,
    }
}

impl TestServer {
    fn token(&self, user: UserId) -> String {
        self.encoder.generate_token(user).unwrap()
    }

    async fn listen(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_app(self.state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://{addr}/ws")
    }
}

async fn connect_with_query(url: &str, token: &str) -> Client {
    let (client, _) = connect_async(format!("{url}?token={token}")).await.unwrap();
    client
}

/// Next JSON text message, skipping transport control frames.
async fn next_json(client: &mut Client) -> serde_json::Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send_json(client: &mut Client, value: serde_json::Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upgrade_with_query_token_receives_greeting() {
    let server = test_server();
    let url = server.listen().await;

    let mut client = connect_with_query(&url, &server.token(UserId(7))).await;
    let greeting = next_json(&mut client).await;

    assert_eq!(greeting["type"], "connected");
    assert_eq!(greeting["user_id"], 7);
    assert!(server.state.hub.registry.is_online(&UserId(7)));
}

#[tokio::test]
async fn test_upgrade_with_bearer_header() {
    let server = test_server();
    let url = server.listen().await;

    let mut request = url.as_str().into_client_request().unwrap();
    let bearer = format!("Bearer {}", server.token(UserId(3)));
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, bearer.parse().unwrap());

    let (mut client, _) = connect_async(request).await.unwrap();
    assert_eq!(next_json(&mut client).await["type"], "connected");
}

#[tokio::test]
async fn test_direct_message_between_users() {
    let server = test_server();
    let url = server.listen().await;

    let mut alice = connect_with_query(&url, &server.token(UserId(1))).await;
    let mut bob = connect_with_query(&url, &server.token(UserId(2))).await;
    next_json(&mut alice).await;
    next_json(&mut bob).await;

    send_json(
        &mut alice,
        serde_json::json!({"type": "direct", "to": 2, "payload": {"text": "hi bob"}}),
    )
    .await;

    let received = next_json(&mut bob).await;
    assert_eq!(received["type"], "message");
    assert_eq!(received["kind"], "direct");
    assert_eq!(received["from"], 1);
    assert_eq!(received["payload"]["text"], "hi bob");
}

#[tokio::test]
async fn test_blocked_direct_message_never_arrives() {
    let server = test_server();
    server.directory.block(UserId(2), UserId(1));
    let url = server.listen().await;

    let mut alice = connect_with_query(&url, &server.token(UserId(1))).await;
    let mut bob = connect_with_query(&url, &server.token(UserId(2))).await;
    let mut carol = connect_with_query(&url, &server.token(UserId(3))).await;
    for client in [&mut alice, &mut bob, &mut carol] {
        next_json(client).await;
    }

    send_json(
        &mut alice,
        serde_json::json!({"type": "direct", "to": 2, "payload": "blocked"}),
    )
    .await;
    // Alice's frames are handled in order, so the pong means the direct
    // message has already been routed.
    send_json(&mut alice, serde_json::json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut alice).await["type"], "pong");

    send_json(
        &mut carol,
        serde_json::json!({"type": "direct", "to": 2, "payload": "from carol"}),
    )
    .await;

    let received = next_json(&mut bob).await;
    assert_eq!(received["from"], 3);
    assert_eq!(received["payload"], "from carol");
}

#[tokio::test]
async fn test_invalid_frame_gets_error_and_session_survives() {
    let server = test_server();
    let url = server.listen().await;

    let mut client = connect_with_query(&url, &server.token(UserId(5))).await;
    next_json(&mut client).await;

    client
        .send(Message::Text("not json".into()))
        .await
        .unwrap();
    let error = next_json(&mut client).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "INVALID_FRAME");

    send_json(&mut client, serde_json::json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut client).await["type"], "pong");
}

#[tokio::test]
async fn test_frame_over_limit_is_rejected_and_session_survives() {
    let server = test_server();
    let url = server.listen().await;

    let mut client = connect_with_query(&url, &server.token(UserId(5))).await;
    next_json(&mut client).await;

    let padding = "x".repeat(1500);
    send_json(
        &mut client,
        serde_json::json!({"type": "broadcast", "payload": padding}),
    )
    .await;
    let error = next_json(&mut client).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "FRAME_TOO_LARGE");

    send_json(&mut client, serde_json::json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut client).await["type"], "pong");
}

#[tokio::test]
async fn test_frame_far_over_limit_closes_connection() {
    let server = test_server();
    let url = server.listen().await;

    let mut client = connect_with_query(&url, &server.token(UserId(5))).await;
    next_json(&mut client).await;

    let padding = "x".repeat(16 * 1024);
    send_json(
        &mut client,
        serde_json::json!({"type": "broadcast", "payload": padding}),
    )
    .await;

    // Nothing but the close may follow.
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("connection stayed open");
        match next {
            Some(Ok(Message::Text(text))) => panic!("unexpected reply {text}"),
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => {}
        }
    }

    for _ in 0..50 {
        if server.state.hub.connection_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.state.hub.connection_count(), 0);
}

#[tokio::test]
async fn test_upgrade_without_credential_is_unauthorized() {
    let server = test_server();
    let app = build_app(server.state.clone());

    let response = app
        .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_upgrade_with_bad_token_is_unauthorized() {
    let server = test_server();
    let app = build_app(server.state.clone());

    let response = app
        .oneshot(
            Request::get("/ws?token=not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(server.state.hub.connection_count(), 0);
}

#[tokio::test]
async fn test_health_endpoints() {
    let server = test_server();
    let app = build_app(server.state.clone());

    let response = app
        .clone()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::get("/api/health/detailed")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["relationship_store"], "connected");
    assert_eq!(json["data"]["ws_connections"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_hub_counters() {
    let server = test_server();
    let (_handle, _queue) = server.state.hub.connect(UserId(9));
    let app = build_app(server.state.clone());

    let response = app
        .oneshot(Request::get("/api/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["connections_opened"], 1);
    assert_eq!(json["data"]["connections_active"], 1);
    assert_eq!(json["data"]["online_users"], 1);
}

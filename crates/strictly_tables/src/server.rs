//! WebSocket front door.
//!
//! Each text frame is one [`Request`]; each outbound frame is a
//! [`Response`] or a push event. The adapter holds no session logic.

use crate::config::AppConfig;
use crate::connection::{ChannelConnection, Outbound, SharedConnection};
use crate::dispatcher::{Dispatcher, Request, Response};
use crate::error::SessionError;
use axum::body::Body;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::Request as HttpRequest;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tracing::{debug, info, instrument, warn};

/// Builds the router serving `GET /ws`.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(dispatcher)
        .layer(ServiceBuilder::new().map_request(|req: HttpRequest<Body>| {
            debug!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }))
}

/// Binds the configured address and serves until the process stops.
#[instrument(skip_all, fields(host = %config.server().host(), port = config.server().port()))]
pub async fn serve(config: &AppConfig, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server().host(), config.server().port());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Table host listening on ws://{}/ws", addr);

    axum::serve(listener, router(dispatcher)).await?;
    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(dispatcher): State<Arc<Dispatcher>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, dispatcher))
}

fn encode(frame: &Outbound) -> Option<Result<String, serde_json::Error>> {
    match frame {
        Outbound::Event(event) => Some(serde_json::to_string(event)),
        Outbound::Response(response) => Some(serde_json::to_string(response)),
        Outbound::Close => None,
    }
}

/// Decodes one inbound frame; malformed frames become a validation error.
fn decode(text: &str) -> Result<Request, Response> {
    serde_json::from_str(text).map_err(|e| {
        Response::err(
            None,
            &SessionError::validation(format!("Malformed request: {}", e)),
        )
    })
}

async fn handle_socket(socket: WebSocket, dispatcher: Arc<Dispatcher>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let channel = Arc::new(ChannelConnection::new(tx));
    let connection: SharedConnection = channel.clone();
    let conn_id = connection.id();
    info!(conn_id, "Connection opened");

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match encode(&frame) {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    warn!(conn_id, error = %e, "Failed to encode frame");
                    continue;
                }
                None => break,
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                debug!(conn_id, "Socket closed while writing");
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let response = match decode(text.as_str()) {
                    Ok(request) => dispatcher.handle(&connection, request).await,
                    Err(rejection) => dispatcher.reject_malformed(conn_id, rejection),
                };
                if !channel.reply(response) {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(conn_id, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    dispatcher.disconnect(conn_id);
    connection.close();
    if let Err(e) = writer.await {
        warn!(conn_id, error = %e, "Writer task ended abnormally");
    }
    info!(conn_id, "Connection closed");
}

//! WebSocket connection lifecycle: recv loop and request dispatch.

use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use tokio::sync::oneshot;

use loom::engine::EngineServices;

use crate::request::{ClientRequest, ErrorResponse, PongResponse, ServerResponse};
use crate::response::send_json;
use crate::run::handle_run;

pub(crate) async fn handle_socket(
    mut socket: WebSocket,
    services: Arc<EngineServices>,
    shutdown_tx: Option<oneshot::Sender<()>>,
) {
    while let Some(res) = socket.recv().await {
        let msg = match res {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("read error (client closed?): {}", e);
                let _ = socket.close().await;
                break;
            }
        };
        let text = match &msg {
            Message::Text(t) => t.clone(),
            Message::Binary(b) => String::from_utf8_lossy(b).into_owned(),
            Message::Close(_) => break,
            _ => continue,
        };

        if let Err(e) = handle_request(&text, &mut socket, services.clone()).await {
            tracing::warn!("handle_request error: {}", e);
            let _ = socket.close().await;
            break;
        }
    }
    if let Some(tx) = shutdown_tx {
        let _ = tx.send(());
    }
}

async fn handle_request(
    text: &str,
    socket: &mut WebSocket,
    services: Arc<EngineServices>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let req: ClientRequest = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            let resp = ServerResponse::Error(ErrorResponse {
                id: None,
                error: format!("parse error: {}", e),
            });
            return send_json(socket, &resp).await;
        }
    };

    match req {
        ClientRequest::Run(r) => {
            handle_run(r, socket, services).await;
            Ok(())
        }
        ClientRequest::Ping(r) => send_json(socket, &ServerResponse::Pong(PongResponse { id: r.id })).await,
    }
}

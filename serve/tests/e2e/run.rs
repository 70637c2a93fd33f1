//! Runs a turn against the demo assistant (backed by `MockConnector`, which
//! echoes the last user message) and checks the wire event sequence ends in
//! `stream_end` with a non-empty reply.

use super::common;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[tokio::test]
async fn e2e_run_echoes_mock_connector() {
    common::load_dotenv();
    let (url, server_handle) = common::spawn_server_once().await;

    let (ws, _) = connect_async(&url).await.unwrap();
    let (mut write, mut read) = ws.split();

    write
        .send(Message::Text(
            serde_json::json!({
                "type": "run",
                "id": "run-1",
                "assistant_id": "default",
                "chat_id": null,
                "message": "hello, world!",
            })
            .to_string(),
        ))
        .await
        .unwrap();

    let frames = common::recv_until_stream_end(&mut read, Duration::from_secs(10)).await;
    assert!(!frames.is_empty());
    assert!(frames.iter().any(|f| f.contains("\"type\":\"stream_start\"")));
    let last = frames.last().unwrap();
    assert!(last.contains("\"type\":\"stream_end\""));
    assert!(last.contains("\"status\":\"completed\""));

    drop(write);
    drop(read);
    let _ = tokio::time::timeout(Duration::from_secs(5), server_handle).await;
}

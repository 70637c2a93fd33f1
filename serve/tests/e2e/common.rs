//! Shared helpers for e2e tests. Received frames are logged with `[e2e] received: ...`.
//! Run tests with `--nocapture` to see them.

use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// Loads .env from the current directory (or project root when run via `cargo test`).
pub fn load_dotenv() {
    let _ = dotenv::dotenv();
}

/// Bind to a random port and spawn the demo server in once mode. Returns (ws_url, server_handle).
pub async fn spawn_server_once() -> (
    String,
    tokio::task::JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("ws://{}", addr);
    let server_handle = tokio::spawn(serve::run_serve_on_listener(listener, true));
    (url, server_handle)
}

/// Reads one WebSocket text frame within `read_timeout`, logging it.
pub async fn recv_text<R>(read: &mut R, read_timeout: Duration) -> String
where
    R: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let opt = timeout(read_timeout, read.next())
        .await
        .expect("timeout waiting for message");
    let msg = opt.expect("stream ended").expect("ws error");
    let text = msg.to_text().expect("non-text frame").to_string();
    eprintln!("[e2e] received: {}", text);
    text
}

fn frame_type(text: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()?
        .get("type")?
        .as_str()
        .map(str::to_string)
}

/// Reads text frames until one decodes to `{"type": "stream_end", ...}`, returning every
/// frame seen in order, including the terminal one.
pub async fn recv_until_stream_end<R>(read: &mut R, read_timeout: Duration) -> Vec<String>
where
    R: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let mut frames = Vec::new();
    loop {
        let text = recv_text(read, read_timeout).await;
        let is_end = frame_type(&text).as_deref() == Some("stream_end");
        frames.push(text);
        if is_end {
            return frames;
        }
    }
}

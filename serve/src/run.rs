//! Drives one `Run` request: builds a [`StreamRequest`], forwards every wire
//! event the turn emits over the socket, and logs (but does not forward) the
//! final `Response`/`EngineError` once the turn completes — the client
//! already has everything it needs from the `stream_end` event.

use std::sync::Arc;

use axum::extract::ws::WebSocket;
use loom::engine::{EngineServices, InterruptController, Message, StackRegistry, StreamRequest,
    StreamWriter, TraceRecorder, TurnContext, TurnResources};
use uuid::Uuid;

use crate::request::RunRequest;

pub(crate) async fn handle_run(req: RunRequest, socket: &mut WebSocket, services: Arc<EngineServices>) {
    let session_id = format!("run-{}", Uuid::new_v4());
    let (writer, mut events) = StreamWriter::channel(&session_id);
    let resources = TurnResources {
        stack: Arc::new(StackRegistry::new()),
        interrupt: Arc::new(InterruptController::new()),
        trace: Arc::new(TraceRecorder::new()),
        writer,
    };
    let ctx = TurnContext {
        context_id: req.id.clone(),
        chat_id: req.chat_id.clone(),
        request_id: session_id.clone(),
        trace_id: session_id.clone(),
        authorized: true,
        skip_history: req.chat_id.is_none(),
    };
    let request = StreamRequest {
        assistant_id: req.assistant_id.clone(),
        input_messages: vec![Message::user(req.message.as_str())],
        options_override: None,
        parent_frame_id: None,
        referer: None,
    };

    let turn_handle = tokio::spawn(async move {
        loom::stream(services.as_ref(), &resources, &ctx, request).await
    });

    while let Some(event) = events.recv().await {
        if socket
            .send(axum::extract::ws::Message::Text(event.to_string()))
            .await
            .is_err()
        {
            turn_handle.abort();
            return;
        }
    }

    match turn_handle.await {
        Ok(Ok(response)) => {
            tracing::debug!(run_id = %session_id, reply_len = response.content.len(), "run completed");
        }
        Ok(Err(err)) => {
            tracing::warn!(run_id = %session_id, error = ?err, "run failed");
        }
        Err(join_err) => {
            tracing::warn!(run_id = %session_id, error = %join_err, "run task panicked");
        }
    }
}

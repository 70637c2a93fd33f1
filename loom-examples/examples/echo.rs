//! Runs a single turn against the demo assistant (an in-memory chat store,
//! one `"default"` assistant backed by `MockConnector`) and prints the reply.
//!
//! `cargo run -p loom-examples --example echo`

use std::sync::Arc;

use loom::engine::{InterruptController, Message, StackRegistry, StreamRequest, StreamWriter,
    TraceRecorder, TurnContext, TurnResources};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let services = serve::demo::build_demo_services();
    let (writer, mut events) = StreamWriter::channel("echo-example");
    let resources = TurnResources {
        stack: Arc::new(StackRegistry::new()),
        interrupt: Arc::new(InterruptController::new()),
        trace: Arc::new(TraceRecorder::new()),
        writer,
    };
    let ctx = TurnContext {
        context_id: "echo-example".to_string(),
        chat_id: None,
        request_id: "echo-example".to_string(),
        trace_id: "echo-example".to_string(),
        authorized: true,
        skip_history: true,
    };
    let request = StreamRequest {
        assistant_id: "default".to_string(),
        input_messages: vec![Message::user("hello, world!")],
        options_override: None,
        parent_frame_id: None,
        referer: None,
    };

    tokio::spawn(async move { while events.recv().await.is_some() {} });

    let response = loom::stream(&services, &resources, &ctx, request).await?;
    println!("{}", response.content);
    Ok(())
}

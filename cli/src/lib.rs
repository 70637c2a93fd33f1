//! Shared plumbing for the `loom` CLI binary: run one turn of the engine
//! in-process, printing stream events and the final reply to stdout.

use std::sync::Arc;

use loom::engine::{
    EngineError, EngineServices, InterruptController, Message, Response, StackRegistry,
    StreamRequest, StreamWriter, TraceRecorder, TurnContext, TurnResources,
};

/// Options for a single turn.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub assistant_id: String,
    pub chat_id: Option<String>,
    pub message: String,
    /// When true, print each wire event as a JSON line to stderr as it arrives.
    pub verbose: bool,
}

/// Runs one turn against `services`, printing wire events (when
/// `opts.verbose`) and returning the final [`Response`].
pub async fn run_once(
    services: &Arc<EngineServices>,
    opts: RunOptions,
) -> Result<Response, EngineError> {
    let session_id = format!("cli-{}", uuid::Uuid::new_v4());
    let (writer, mut events) = StreamWriter::channel(&session_id);
    let resources = TurnResources {
        stack: Arc::new(StackRegistry::new()),
        interrupt: Arc::new(InterruptController::new()),
        trace: Arc::new(TraceRecorder::new()),
        writer,
    };
    let ctx = TurnContext {
        context_id: session_id.clone(),
        chat_id: opts.chat_id.clone(),
        request_id: session_id.clone(),
        trace_id: session_id.clone(),
        authorized: true,
        skip_history: opts.chat_id.is_none(),
    };
    let request = StreamRequest {
        assistant_id: opts.assistant_id,
        input_messages: vec![Message::user(opts.message.as_str())],
        options_override: None,
        parent_frame_id: None,
        referer: None,
    };

    let verbose = opts.verbose;
    let services = services.clone();
    let turn_handle = tokio::spawn(async move {
        loom::stream(services.as_ref(), &resources, &ctx, request).await
    });

    if verbose {
        while let Some(event) = events.recv().await {
            eprintln!("{}", event);
        }
    } else {
        // Drain silently so the channel doesn't back up while the turn runs.
        while events.recv().await.is_some() {}
    }

    turn_handle.await.unwrap_or_else(|join_err| {
        Err(EngineError::HookError(format!("run task panicked: {join_err}")))
    })
}

/// Truncates `s` to at most `max` chars. When truncated, appends `...`
/// (total length = max). 0 means no truncation. UTF-8 safe.
pub fn truncate_message(s: &str, max: usize) -> String {
    const SUFFIX: &str = "...";
    if max == 0 {
        return s.to_string();
    }
    let suffix_len = 3;
    if max <= suffix_len {
        return s.chars().take(max).collect();
    }
    let content_max = max - suffix_len;
    if s.chars().count() <= max {
        return s.to_string();
    }
    format!(
        "{}{}",
        s.chars().take(content_max).collect::<String>(),
        SUFFIX
    )
}

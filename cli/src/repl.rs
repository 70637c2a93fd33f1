//! Interactive REPL loop: read stdin, run one turn, print the reply, repeat
//! until EOF or `quit`/`exit`.

use std::io::Write;
use std::sync::Arc;

use loom::engine::EngineServices;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use cli::{run_once, truncate_message, RunOptions};

fn is_quit_command(line: &str) -> bool {
    matches!(line.trim(), "quit" | "exit" | "/quit" | "/exit")
}

/// Runs the REPL loop against a fixed chat id (generated once, or the one
/// the caller supplied) so each turn sees the prior conversation's history.
pub async fn run_repl_loop(
    services: &Arc<EngineServices>,
    assistant_id: &str,
    chat_id: Option<String>,
    verbose: bool,
    max_reply_len: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let chat_id = chat_id.unwrap_or_else(|| format!("repl-{}", Uuid::new_v4()));
    let mut reader = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = match reader.next_line().await? {
            None => break,
            Some(s) if s.trim().is_empty() => continue,
            Some(s) if is_quit_command(&s) => break,
            Some(s) => s,
        };

        match run_once(
            services,
            RunOptions {
                assistant_id: assistant_id.to_string(),
                chat_id: Some(chat_id.clone()),
                message: line,
                verbose,
            },
        )
        .await
        {
            Ok(response) => println!("{}", truncate_message(&response.content, max_reply_len)),
            Err(e) => eprintln!("error: {}", e),
        }
    }
    Ok(())
}

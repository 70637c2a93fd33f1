//! Loom CLI binary: run one turn of the engine from the command line, or
//! serve it over a local WebSocket.

mod log_format;
mod repl;

use clap::{Parser, Subcommand};
use cli::{run_once, truncate_message, RunOptions};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_WS_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_ASSISTANT_ID: &str = "default";

#[derive(Parser, Debug)]
#[command(name = "loom")]
#[command(about = "Loom — run one turn of the engine, or serve it over a local WebSocket")]
struct Args {
    #[command(subcommand)]
    cmd: Option<Command>,

    /// User message (or pass as the first positional argument)
    #[arg(short, long, value_name = "TEXT")]
    message: Option<String>,

    /// Positional args: user message when -m/--message is not used
    #[arg(trailing_var_arg = true)]
    rest: Vec<String>,

    /// Assistant id to run (default: "default", the demo echo assistant)
    #[arg(short, long, value_name = "ID", default_value = DEFAULT_ASSISTANT_ID)]
    assistant_id: String,

    /// Chat id for conversation continuity. Omit for a one-off turn with no history.
    #[arg(long, value_name = "ID")]
    chat_id: Option<String>,

    /// Interactive REPL: after output, prompt for input and continue the conversation
    #[arg(short, long)]
    interactive: bool,

    /// Print each wire event as JSON to stderr as it arrives
    #[arg(short, long)]
    verbose: bool,

    /// Max length of the printed reply. 0 means no truncation.
    #[arg(long, value_name = "N", default_value_t = 0)]
    max_reply_len: usize,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Run the WebSocket server (ws://127.0.0.1:8080 by default)
    Serve {
        /// Listen address
        #[arg(long, value_name = "ADDR", default_value = DEFAULT_WS_ADDR)]
        addr: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(log_format::TextWithSpanIds::new())
                .with_filter(filter),
        )
        .try_init();
}

fn resolve_message(args: &Args) -> Option<String> {
    args.message
        .clone()
        .or_else(|| (!args.rest.is_empty()).then(|| args.rest.join(" ")))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let args = Args::parse();

    match args.cmd {
        Some(Command::Serve { addr }) => {
            serve::run_serve(Some(&addr), false).await?;
            return Ok(());
        }
        None => {}
    }

    let services = serve::demo::build_demo_services();

    if args.interactive {
        repl::run_repl_loop(&services, &args.assistant_id, args.chat_id.clone(), args.verbose, args.max_reply_len)
            .await?;
        return Ok(());
    }

    let message = resolve_message(&args).ok_or("no message given; pass -m/--message, a positional argument, or -i for the REPL")?;
    let response = run_once(
        &services,
        RunOptions {
            assistant_id: args.assistant_id,
            chat_id: args.chat_id,
            message,
            verbose: args.verbose,
        },
    )
    .await?;
    println!("{}", truncate_message(&response.content, args.max_reply_len));
    Ok(())
}

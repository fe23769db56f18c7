use std::time::Duration;

use clap::Parser;
use frames::{AckMode, Frame};
use stomp_notify::config::{DEFAULT_DESTINATION, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SUBSCRIPTION_ID};
use stomp_notify::{CancellationToken, ClientError, ConnectionParams, StompClient, Subscription};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("client task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("failed to render notification: {0}")]
    Render(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "stomp-notify", about = "Subscribe to STOMP notifications over websocket and print them")]
struct Cli {
    #[arg(long, env = "STOMP_NOTIFY_TOKEN", hide_env_values = true)]
    token: String,

    #[arg(long, env = "STOMP_NOTIFY_HOST", default_value = DEFAULT_HOST)]
    host: String,

    #[arg(long, env = "STOMP_NOTIFY_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = DEFAULT_DESTINATION)]
    destination: String,

    #[arg(long, default_value = DEFAULT_SUBSCRIPTION_ID)]
    subscription_id: String,

    #[arg(long, default_value_t = AckMode::Auto)]
    ack: AckMode,

    #[arg(long, help = "Stop after this many notifications")]
    max_messages: Option<usize>,

    #[arg(long, help = "Stop when no notification arrives for this many seconds")]
    idle_timeout_secs: Option<u64>,

    #[arg(long, default_value_t = false, help = "Print each notification as one JSON line")]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = StompClient::new(ConnectionParams::new(cli.token, cli.host, cli.port)).with_subscription(
        Subscription {
            destination: cli.destination,
            id: cli.subscription_id,
            ack: cli.ack,
        },
    );
    let queue = client.notifications();
    let idle = cli.idle_timeout_secs.map(Duration::from_secs);

    let cancel = CancellationToken::new();
    let mut session = tokio::spawn({
        let cancel = cancel.clone();
        async move { client.start_with_cancel(cancel).await }
    });

    let mut printed = 0_usize;
    let mut finished = None;
    loop {
        if cli.max_messages.is_some_and(|limit| printed >= limit) {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, closing session");
                break;
            }
            result = &mut session => {
                finished = Some(result);
                break;
            }
            next = queue.get(idle) => {
                let Some(frame) = next else {
                    info!(idle_secs = cli.idle_timeout_secs, "no notifications before idle timeout");
                    break;
                };
                print_notification(&frame, cli.json)?;
                printed = printed.saturating_add(1);
            }
        }
    }

    cancel.cancel();
    let result = match finished {
        Some(result) => result,
        None => session.await,
    };

    // Frames that arrived between the last print and shutdown.
    while cli.max_messages.is_none_or(|limit| printed < limit) {
        let Some(frame) = queue.try_get() else { break };
        print_notification(&frame, cli.json)?;
        printed = printed.saturating_add(1);
    }

    let summary = result??;
    if summary.dropped > 0 {
        warn!(dropped = summary.dropped, "some frames could not be decoded");
    }
    info!(printed, enqueued = summary.enqueued, state = ?summary.state, "done");
    Ok(())
}

fn print_notification(frame: &Frame, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string(frame)?);
    } else {
        let destination = frame.header("destination").unwrap_or("-");
        println!("{} {destination} {}", frame.command, frame.body);
    }
    Ok(())
}

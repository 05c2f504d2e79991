//! Portcullis Commander
//!
//! Performs the knock sequence against a target host, opens the command
//! session, and drives it interactively or with a single one-shot command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portcullis_core::config::{self, DaemonConfig};
use portcullis_protocol::CommandMessage;

mod knock;
mod session;

use session::CommandClient;

#[derive(Parser)]
#[command(name = "portcullis")]
#[command(about = "Portcullis commander - knock and drive a command session")]
#[command(version)]
struct Args {
    /// Target host
    #[arg(default_value = "localhost")]
    host: String,

    /// Daemon config file to take the sequence and command port from
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Knock sequence ports in order (overrides config)
    #[arg(short, long, value_delimiter = ',')]
    sequence: Option<Vec<u16>>,

    /// Command port (overrides config)
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Delay between knocks in milliseconds
    #[arg(long, default_value_t = 500)]
    knock_delay_ms: u64,

    /// Skip the knock sequence (address already authorized)
    #[arg(long)]
    skip_knock: bool,

    /// Run one prompt line (e.g. "shell uname -a") and disconnect
    #[arg(short, long)]
    exec: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Flag > config file > built-in defaults, field by field
    let file_config: DaemonConfig = match &args.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => DaemonConfig::default(),
    };

    let sequence = args.sequence.unwrap_or(file_config.knock_sequence);
    let port = args.port.unwrap_or(file_config.command_port);

    if args.skip_knock {
        tracing::debug!("Skipping knock sequence");
    } else {
        knock::perform_sequence(
            &args.host,
            &sequence,
            Duration::from_millis(args.knock_delay_ms),
        )
        .await;

        // Give the daemon time to process the final knock
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    let (mut client, welcome) = CommandClient::connect(&args.host, port)
        .await
        .context("Failed to open command session")?;
    println!("{}", welcome);

    match args.exec {
        Some(line) => {
            let message = session::parse_input(&line)
                .map_err(|usage| anyhow::anyhow!("{}", usage))?;

            let disconnecting = message.is_disconnect();
            let response = client.request(message).await?;
            session::print_response(&response);

            if !disconnecting {
                let response = client.request(CommandMessage::new("disconnect")).await?;
                session::print_response(&response);
            }
        }
        None => session::interactive(client).await?,
    }

    Ok(())
}

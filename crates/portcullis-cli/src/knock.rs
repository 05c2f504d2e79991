//! Knock sequence client
//!
//! Each knock is a bare TCP connect followed by an immediate close; the
//! handshake is the whole signal. A failed knock is reported but never
//! fatal: the daemon side may legitimately refuse nothing and accept
//! everything, and only the recorded order matters.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

const KNOCK_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Knock every port of the sequence in order, pausing between knocks
pub async fn perform_sequence(host: &str, sequence: &[u16], delay: Duration) {
    println!("Knocking {} with sequence {:?}", host, sequence);

    for &port in sequence {
        match timeout(KNOCK_CONNECT_TIMEOUT, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                println!("  knocked port {}", port);
            }
            Ok(Err(e)) => {
                tracing::warn!("Knock on port {} failed: {}", port, e);
                println!("  knock on port {} failed ({})", port, e);
            }
            Err(_) => {
                tracing::warn!("Knock on port {} timed out", port);
                println!("  knock on port {} timed out", port);
            }
        }

        tokio::time::sleep(delay).await;
    }

    println!("Knock sequence complete");
}

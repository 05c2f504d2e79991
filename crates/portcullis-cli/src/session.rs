//! Command session client
//!
//! Speaks the newline-delimited JSON protocol against an admitted command
//! connection and translates a small prompt grammar into command messages.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use portcullis_protocol::{CommandMessage, LineCodec, ResponseMessage};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for one command session
pub struct CommandClient {
    framed: Framed<TcpStream, LineCodec>,
}

impl CommandClient {
    /// Connect to the command port and consume the welcome frame.
    ///
    /// An unauthorized peer sees the connection close without a byte; that
    /// surfaces here as "closed before welcome".
    pub async fn connect(host: &str, port: u16) -> Result<(Self, String)> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
            .await
            .context("Connection attempt timed out")?
            .with_context(|| format!("Failed to connect to {}:{}", host, port))?;

        let mut framed = Framed::new(stream, LineCodec::new());

        let line = framed
            .next()
            .await
            .ok_or_else(|| anyhow!("Connection closed before welcome (knock not accepted?)"))??;

        match serde_json::from_str::<ResponseMessage>(&line)? {
            ResponseMessage::Welcome { message } => Ok((Self { framed }, message)),
            other => bail!("Expected welcome frame, got {:?}", other),
        }
    }

    /// Send one command and wait for the daemon's frame
    pub async fn request(&mut self, message: CommandMessage) -> Result<ResponseMessage> {
        self.framed.send(message).await?;

        let line = self
            .framed
            .next()
            .await
            .ok_or_else(|| anyhow!("Connection closed while waiting for a response"))??;

        Ok(serde_json::from_str(&line)?)
    }
}

/// Translate one prompt line into a command message.
///
/// Grammar: `ping`, `sysinfo`, `shell <cmd>`, `read <path>`,
/// `write <path> <content>`, `ls [path]`, `disconnect` (aliases `exit`,
/// `quit`).
pub fn parse_input(line: &str) -> Result<CommandMessage, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb {
        "ping" => Ok(CommandMessage::new("ping")),
        "sysinfo" => Ok(CommandMessage::new("sysinfo")),
        "disconnect" | "exit" | "quit" => Ok(CommandMessage::new("disconnect")),
        "shell" => {
            if rest.is_empty() {
                Err("usage: shell <command>".to_string())
            } else {
                Ok(CommandMessage::new("shell").param("command", rest))
            }
        }
        "read" => {
            if rest.is_empty() {
                Err("usage: read <path>".to_string())
            } else {
                Ok(CommandMessage::new("read_file").param("path", rest))
            }
        }
        "write" => match rest.split_once(char::is_whitespace) {
            Some((path, content)) if !content.trim().is_empty() => {
                Ok(CommandMessage::new("write_file")
                    .param("path", path)
                    .param("content", content.trim()))
            }
            _ => Err("usage: write <path> <content>".to_string()),
        },
        "ls" => {
            let path = if rest.is_empty() { "." } else { rest };
            Ok(CommandMessage::new("list_dir").param("path", path))
        }
        other => Err(format!(
            "Unknown command '{}'. Available: ping, sysinfo, shell, read, write, ls, disconnect",
            other
        )),
    }
}

/// Print one daemon frame for the prompt
pub fn print_response(frame: &ResponseMessage) {
    match frame {
        ResponseMessage::Welcome { message } => println!("{}", message),
        ResponseMessage::Error { message } => println!("error: {}", message),
        ResponseMessage::Response { command, result } => {
            if !result.success {
                println!(
                    "{} failed: {}",
                    command,
                    result.error.as_deref().unwrap_or("unknown error")
                );
                return;
            }

            // Shell output reads better raw than as JSON
            if command == "shell" {
                if let Some(stdout) = result.fields.get("stdout").and_then(|v| v.as_str()) {
                    print!("{}", stdout);
                }
                if let Some(stderr) = result.fields.get("stderr").and_then(|v| v.as_str()) {
                    if !stderr.is_empty() {
                        eprint!("{}", stderr);
                    }
                }
                return;
            }

            match serde_json::to_string_pretty(&result.fields) {
                Ok(rendered) => println!("{}", rendered),
                Err(_) => println!("{:?}", result.fields),
            }
        }
    }
}

/// Run the interactive prompt until disconnect or EOF
pub async fn interactive(mut client: CommandClient) -> Result<()> {
    println!("Enter commands ('disconnect' to quit, 'help' for the grammar)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"cmd> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            // EOF on stdin: leave the session politely
            let _ = client.request(CommandMessage::new("disconnect")).await;
            break;
        };

        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if line == "help" {
            println!("ping | sysinfo | shell <cmd> | read <path> | write <path> <content> | ls [path] | disconnect");
            continue;
        }

        let message = match parse_input(&line) {
            Ok(message) => message,
            Err(usage) => {
                println!("{}", usage);
                continue;
            }
        };

        let disconnecting = message.is_disconnect();
        let response = client.request(message).await?;
        print_response(&response);

        if disconnecting {
            break;
        }
    }

    println!("Disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_verbs_parse() {
        assert_eq!(parse_input("ping").unwrap().kind, "ping");
        assert_eq!(parse_input("sysinfo").unwrap().kind, "sysinfo");
        assert_eq!(parse_input("disconnect").unwrap().kind, "disconnect");
        assert_eq!(parse_input("exit").unwrap().kind, "disconnect");
    }

    #[test]
    fn shell_keeps_the_rest_of_the_line() {
        let message = parse_input("shell echo hello | wc -c").unwrap();
        assert_eq!(message.kind, "shell");
        assert_eq!(
            message.params.get("command").and_then(|v| v.as_str()),
            Some("echo hello | wc -c")
        );
    }

    #[test]
    fn write_splits_path_from_content() {
        let message = parse_input("write /tmp/a.txt hello there").unwrap();
        assert_eq!(message.kind, "write_file");
        assert_eq!(
            message.params.get("path").and_then(|v| v.as_str()),
            Some("/tmp/a.txt")
        );
        assert_eq!(
            message.params.get("content").and_then(|v| v.as_str()),
            Some("hello there")
        );
    }

    #[test]
    fn ls_defaults_to_the_current_directory() {
        let message = parse_input("ls").unwrap();
        assert_eq!(
            message.params.get("path").and_then(|v| v.as_str()),
            Some(".")
        );
    }

    #[test]
    fn missing_arguments_report_usage() {
        assert!(parse_input("shell").is_err());
        assert!(parse_input("read").is_err());
        assert!(parse_input("write /tmp/a.txt").is_err());
    }

    #[test]
    fn unknown_verbs_are_rejected() {
        assert!(parse_input("frobnicate").is_err());
    }
}

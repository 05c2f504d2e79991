//! Command executor
//!
//! Stateless mapping from a decoded command message to an execution result.
//! Every capability catches its own failures and reports them in the result
//! envelope; nothing here can take the session down.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::process::Command;
use tokio::time::timeout;

use portcullis_protocol::{CommandMessage, ExecutionResult};

/// Capability implementations invoked by command sessions
pub struct CommandExecutor {
    /// Upper bound on one shell execution
    shell_timeout: Duration,
}

#[derive(Deserialize)]
struct ShellParams {
    command: String,
}

#[derive(Deserialize)]
struct ReadFileParams {
    path: PathBuf,
}

#[derive(Deserialize)]
struct WriteFileParams {
    path: PathBuf,
    content: String,
}

#[derive(Deserialize)]
struct ListDirParams {
    path: PathBuf,
}

impl CommandExecutor {
    /// Create an executor with the given shell timeout
    pub fn new(shell_timeout: Duration) -> Self {
        Self { shell_timeout }
    }

    /// Execute one command message
    pub async fn execute(&self, message: &CommandMessage) -> ExecutionResult {
        match message.kind.as_str() {
            "shell" => self.shell(&message.params).await,
            "read_file" => Self::read_file(&message.params).await,
            "write_file" => Self::write_file(&message.params).await,
            "list_dir" => Self::list_dir(&message.params).await,
            "sysinfo" => Self::sysinfo(),
            "ping" => ExecutionResult::ok().field("message", "pong"),
            other => ExecutionResult::failure(format!("Unknown command type: {}", other)),
        }
    }

    async fn shell(&self, params: &Map<String, Value>) -> ExecutionResult {
        let ShellParams { command } = match decode_params(params) {
            Ok(p) => p,
            Err(e) => return ExecutionResult::failure(e),
        };

        #[cfg(target_os = "windows")]
        let mut cmd = Command::new("cmd");
        #[cfg(target_os = "windows")]
        cmd.arg("/C").arg(&command);

        #[cfg(not(target_os = "windows"))]
        let mut cmd = Command::new("sh");
        #[cfg(not(target_os = "windows"))]
        cmd.arg("-c").arg(&command);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match timeout(self.shell_timeout, cmd.output()).await {
            Err(_) => ExecutionResult::failure(format!(
                "Command timed out after {} seconds",
                self.shell_timeout.as_secs()
            )),
            Ok(Err(e)) => ExecutionResult::failure(format!("Failed to execute command: {}", e)),
            Ok(Ok(output)) => ExecutionResult::ok()
                .field("stdout", String::from_utf8_lossy(&output.stdout).into_owned())
                .field("stderr", String::from_utf8_lossy(&output.stderr).into_owned())
                .field("returncode", output.status.code().unwrap_or(-1)),
        }
    }

    async fn read_file(params: &Map<String, Value>) -> ExecutionResult {
        let ReadFileParams { path } = match decode_params(params) {
            Ok(p) => p,
            Err(e) => return ExecutionResult::failure(e),
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let size = content.len();
                ExecutionResult::ok()
                    .field("content", content)
                    .field("size", size)
            }
            Err(e) => {
                ExecutionResult::failure(format!("Failed to read {}: {}", path.display(), e))
            }
        }
    }

    async fn write_file(params: &Map<String, Value>) -> ExecutionResult {
        let WriteFileParams { path, content } = match decode_params(params) {
            Ok(p) => p,
            Err(e) => return ExecutionResult::failure(e),
        };

        match tokio::fs::write(&path, content.as_bytes()).await {
            Ok(()) => ExecutionResult::ok().field("bytes_written", content.len()),
            Err(e) => {
                ExecutionResult::failure(format!("Failed to write {}: {}", path.display(), e))
            }
        }
    }

    async fn list_dir(params: &Map<String, Value>) -> ExecutionResult {
        let ListDirParams { path } = match decode_params(params) {
            Ok(p) => p,
            Err(e) => return ExecutionResult::failure(e),
        };

        match collect_entries(&path).await {
            Ok(entries) => {
                let count = entries.len();
                ExecutionResult::ok()
                    .field("entries", Value::Array(entries))
                    .field("count", count)
            }
            Err(e) => {
                ExecutionResult::failure(format!("Failed to list {}: {}", path.display(), e))
            }
        }
    }

    fn sysinfo() -> ExecutionResult {
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();

        ExecutionResult::ok()
            .field("hostname", hostname)
            .field("os", std::env::consts::OS)
            .field("arch", std::env::consts::ARCH)
            .field(
                "platform",
                sysinfo::System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            )
            .field("os_version", sysinfo::System::os_version().unwrap_or_default())
            .field(
                "kernel_version",
                sysinfo::System::kernel_version().unwrap_or_default(),
            )
    }
}

/// Deserialize the params map into a typed capability parameter struct
fn decode_params<T: DeserializeOwned>(params: &Map<String, Value>) -> Result<T, String> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| format!("Invalid parameters: {}", e))
}

async fn collect_entries(path: &Path) -> std::io::Result<Vec<Value>> {
    let mut dir = tokio::fs::read_dir(path).await?;
    let mut entries = Vec::new();

    while let Some(entry) = dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        entries.push(json!({
            "name": entry.file_name().to_string_lossy(),
            "is_directory": metadata.is_dir(),
            "size": metadata.len(),
        }));
    }

    // Stable ordering for callers and tests
    entries.sort_by(|a, b| {
        let a = a["name"].as_str().unwrap_or_default().to_owned();
        let b = b["name"].as_str().unwrap_or_default().to_owned();
        a.cmp(&b)
    });

    Ok(entries)
}

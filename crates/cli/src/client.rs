use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[cfg(unix)]
use tokio::net::UnixStream;
#[cfg(unix)]
use tokio::time::timeout;

pub const DAEMON_NOT_RUNNING_EXIT_CODE: i32 = 10;

const SOCKET_RELATIVE_PATH: &str = ".anggar/daemon.sock";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug)]
pub struct DaemonUnavailable {
    socket_path: PathBuf,
    source: io::Error,
}

impl DaemonUnavailable {
    fn new(socket_path: PathBuf, source: io::Error) -> Self {
        Self {
            socket_path,
            source,
        }
    }

    pub fn exit_code(&self) -> i32 {
        DAEMON_NOT_RUNNING_EXIT_CODE
    }
}

impl fmt::Display for DaemonUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "daemon is not running (socket `{}`); use exit code {}",
            self.socket_path.display(),
            self.exit_code()
        )
    }
}

impl std::error::Error for DaemonUnavailable {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<R> {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: Value,
    result: Option<R>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

/// Newline-delimited JSON-RPC client for the anggard socket.
///
/// Pricing passes can run assistant requests server-side, so the
/// default timeout is generous.
#[derive(Debug)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
    next_request_id: AtomicU64,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new(default_socket_path())
    }
}

impl DaemonClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            next_request_id: AtomicU64::new(1),
        }
    }

    #[allow(dead_code)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize + Clone,
        R: DeserializeOwned,
    {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);

        match self.call_once(id, method, params.clone()).await {
            Ok(response) => Ok(response),
            Err(first_error) => {
                // Retry once for transient socket drops / daemon restarts.
                self.call_once(id, method, params)
                    .await
                    .map_err(|second_error| {
                        second_error.context(format!(
                            "json-rpc call failed after retry; first error: {first_error:#}"
                        ))
                    })
            }
        }
    }

    async fn call_once<P, R>(&self, id: u64, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        #[cfg(unix)]
        {
            let request = JsonRpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            };
            let mut payload =
                serde_json::to_vec(&request).context("failed to serialize json-rpc request")?;
            payload.push(b'\n');

            let stream = timeout(self.timeout, UnixStream::connect(&self.socket_path))
                .await
                .context("timed out connecting to daemon socket")?
                .map_err(|err| {
                    if is_daemon_unavailable_kind(err.kind()) {
                        anyhow!(DaemonUnavailable::new(self.socket_path.clone(), err))
                    } else {
                        anyhow!(err)
                    }
                })
                .with_context(|| {
                    format!(
                        "failed to connect to daemon socket `{}`",
                        self.socket_path.display()
                    )
                })?;

            let (read_half, mut write_half) = stream.into_split();
            timeout(self.timeout, write_half.write_all(&payload))
                .await
                .context("timed out writing json-rpc request")?
                .context("failed writing json-rpc request to daemon socket")?;
            timeout(self.timeout, write_half.flush())
                .await
                .context("timed out flushing json-rpc request")?
                .context("failed flushing json-rpc request to daemon socket")?;

            let mut reader = BufReader::new(read_half);
            let mut response_line = Vec::new();
            timeout(self.timeout, reader.read_until(b'\n', &mut response_line))
                .await
                .context("timed out waiting for json-rpc response")?
                .context("failed reading json-rpc response from daemon socket")?;

            if response_line.is_empty() {
                anyhow::bail!("daemon returned an empty json-rpc response");
            }

            let response: JsonRpcResponse<R> = serde_json::from_slice(&response_line)
                .context("failed to decode daemon json-rpc response")?;

            if let Some(error) = response.error {
                let reason = error
                    .data
                    .as_ref()
                    .and_then(|data| data.get("reason"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                anyhow::bail!(
                    "daemon json-rpc error {}: {}",
                    error.code,
                    reason.unwrap_or(error.message)
                );
            }

            return response
                .result
                .context("daemon json-rpc response missing `result` field");
        }

        #[cfg(not(unix))]
        {
            let _ = id;
            let _ = method;
            let _ = params;
            anyhow::bail!("the anggar daemon requires unix domain sockets")
        }
    }
}

pub fn daemon_unavailable_exit_code(error: &anyhow::Error) -> Option<i32> {
    error
        .downcast_ref::<DaemonUnavailable>()
        .map(DaemonUnavailable::exit_code)
}

fn default_socket_path() -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(SOCKET_RELATIVE_PATH)
}

fn is_daemon_unavailable_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}

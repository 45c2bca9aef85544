//! JSON-RPC session (C2): request/response correlation, notification
//! dispatch, and per-call timeouts atop the framed transport.
//!
//! A [`Session`] owns exactly one reader task, which is the sole consumer of
//! the inbound byte stream; callers only ever interact with it through the
//! pending-response map. Writes go through a single async mutex so framing
//! never interleaves, matching the single-writer-task discipline in the
//! concurrency model.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::RpcError;
use crate::transport::{MessageReader, MessageWriter};

/// Default baseline timeout for requests that don't specify their own
/// (`documentSymbol` and `references` use a longer one, see [`crate::lsp::client`]).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// A server-originated notification, forwarded for logging and for test
/// observability.
#[derive(Debug, Clone)]
pub struct Notification {
    /// The notification's JSON-RPC method name.
    pub method: String,
    /// Its parameters, verbatim.
    pub params: Value,
    /// Severity derived from LSP's `MessageType` for `window/logMessage` and
    /// `window/showMessage`; `None` for anything else.
    pub level: Option<NotificationLevel>,
}

/// Severity level for `window/logMessage`/`window/showMessage`, matching
/// LSP's `MessageType` (1=error .. 4=log).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// `MessageType::Error` (1).
    Error,
    /// `MessageType::Warning` (2).
    Warning,
    /// `MessageType::Info` or `MessageType::Log` (3 or 4).
    Info,
}

impl NotificationLevel {
    fn from_message_type(ty: i64) -> Self {
        match ty {
            1 => NotificationLevel::Error,
            2 => NotificationLevel::Warning,
            _ => NotificationLevel::Info,
        }
    }
}

type PendingMap = Arc<StdMutex<HashMap<i64, oneshot::Sender<Result<Value, RpcError>>>>>;

/// A live JSON-RPC session over a framed transport.
pub struct Session<W> {
    pending: PendingMap,
    writer: Arc<AsyncMutex<MessageWriter<W>>>,
    next_id: AtomicI64,
    reader_task: JoinHandle<()>,
    stopped: AtomicBool,
}

impl<W> Session<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Spawns the reader task and returns the session plus a channel of
    /// server-originated notifications (including `window/logMessage` /
    /// `window/showMessage`, already classified by [`NotificationLevel`]).
    pub fn spawn<R>(reader: MessageReader<R>, writer: MessageWriter<W>) -> (Self, mpsc::UnboundedReceiver<Notification>)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let pending: PendingMap = Arc::new(StdMutex::new(HashMap::new()));
        let writer = Arc::new(AsyncMutex::new(writer));
        let (notif_tx, notif_rx) = mpsc::unbounded_channel();

        let reader_pending = Arc::clone(&pending);
        let reader_writer = Arc::clone(&writer);
        let reader_task = tokio::spawn(Self::reader_loop(reader, reader_pending, reader_writer, notif_tx));

        (
            Self {
                pending,
                writer,
                next_id: AtomicI64::new(1),
                reader_task,
                stopped: AtomicBool::new(false),
            },
            notif_rx,
        )
    }

    async fn reader_loop<R>(
        mut reader: MessageReader<R>,
        pending: PendingMap,
        writer: Arc<AsyncMutex<MessageWriter<W>>>,
        notif_tx: mpsc::UnboundedSender<Notification>,
    ) where
        R: AsyncBufRead + Unpin,
    {
        loop {
            let message = match reader.read_message().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    Self::fail_all(&pending, RpcError::Transport("connection closed".to_string()));
                    return;
                }
                Err(e) => {
                    Self::fail_all(&pending, RpcError::Transport(e.to_string()));
                    return;
                }
            };

            let id = message.get("id").and_then(Value::as_i64);
            let method = message.get("method").and_then(Value::as_str);

            match (id, method) {
                (Some(id), None) => {
                    // Response to one of our requests.
                    let slot = pending.lock().unwrap().remove(&id);
                    let Some(slot) = slot else {
                        // Timeout already fired for this id; discard silently.
                        continue;
                    };
                    if let Some(error) = message.get("error") {
                        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
                        let msg = error
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string();
                        let _ = slot.send(Err(RpcError::Protocol { code, message: msg }));
                    } else {
                        let result = message.get("result").cloned().unwrap_or(Value::Null);
                        let _ = slot.send(Ok(result));
                    }
                }
                (Some(id), Some(method)) => {
                    // Server-initiated request.
                    if method == "window/workDoneProgress/create" {
                        let reply = json!({"jsonrpc": "2.0", "id": id, "result": null});
                        let mut w = writer.lock().await;
                        let _ = w.write_message(&reply).await;
                    }
                    // Other server-initiated requests are silently ignored;
                    // the servers this pipeline targets tolerate unanswered
                    // requests of kinds it does not use.
                }
                (None, Some(method)) => {
                    let level = if method == "window/logMessage" || method == "window/showMessage" {
                        let params = message.get("params");
                        let ty = params.and_then(|p| p.get("type")).and_then(Value::as_i64).unwrap_or(4);
                        Some(NotificationLevel::from_message_type(ty))
                    } else {
                        None
                    };
                    log_notification(method, level);
                    let _ = notif_tx.send(Notification {
                        method: method.to_string(),
                        params: message.get("params").cloned().unwrap_or(Value::Null),
                        level,
                    });
                }
                (None, None) => {
                    tracing::debug!(?message, "ignoring malformed JSON-RPC message with neither id nor method");
                }
            }
        }
    }

    fn fail_all(pending: &PendingMap, err: RpcError) {
        let mut map = pending.lock().unwrap();
        for (_, slot) in map.drain() {
            let _ = slot.send(Err(err.clone()));
        }
    }

    /// Sends a request and awaits its response until `timeout` elapses.
    ///
    /// On timeout, the pending slot is removed so a late arrival for this id
    /// is silently discarded by the reader loop.
    ///
    /// # Errors
    /// Returns [`RpcError::Timeout`], [`RpcError::Cancelled`] (session shut
    /// down while waiting), or [`RpcError::Protocol`]/[`RpcError::Transport`]
    /// as reported by the server or the transport.
    pub async fn request(&self, method: &str, params: Value, timeout: Duration) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);

        let envelope = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        {
            let mut w = self.writer.lock().await;
            if let Err(e) = w.write_message(&envelope).await {
                self.pending.lock().unwrap().remove(&id);
                return Err(RpcError::Transport(e.to_string()));
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::Cancelled),
            Err(_) => {
                self.pending.lock().unwrap().remove(&id);
                Err(RpcError::Timeout)
            }
        }
    }

    /// Sends a fire-and-forget notification; no response is expected.
    ///
    /// # Errors
    /// Propagates transport write failures as [`RpcError::Transport`].
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), RpcError> {
        let envelope = json!({"jsonrpc": "2.0", "method": method, "params": params});
        let mut w = self.writer.lock().await;
        w.write_message(&envelope).await.map_err(|e| RpcError::Transport(e.to_string()))
    }

    /// Shuts the session down: stops the reader loop, fails every pending
    /// call with [`RpcError::Cancelled`], and closes the write side.
    /// Idempotent — the second call is a no-op.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            tracing::debug!("session already stopped");
            return;
        }
        self.reader_task.abort();
        Self::fail_all(&self.pending, RpcError::Cancelled);
        let mut w = self.writer.lock().await;
        let _ = w.shutdown().await;
    }
}

fn log_notification(method: &str, level: Option<NotificationLevel>) {
    match level {
        Some(NotificationLevel::Error) => tracing::error!(method, "language server message"),
        Some(NotificationLevel::Warning) => tracing::warn!(method, "language server message"),
        Some(NotificationLevel::Info) => tracing::info!(method, "language server message"),
        None => tracing::debug!(method, "language server notification"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MessageReader as Reader;
    use serde_json::json;
    use tokio::io::{BufReader, DuplexStream, duplex};

    /// Spawns a fake server task driven by `handler`, which reads one
    /// request at a time from its half of the duplex pipe and decides how
    /// (and whether) to respond.
    fn fake_peer() -> (Session<DuplexStream>, DuplexStream) {
        let (client_io, server_io) = duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        let reader = Reader::new(BufReader::new(client_read));
        let writer = MessageWriter::new(client_write);
        let (session, _notifs) = Session::spawn(reader, writer);
        (session, server_io)
    }

    #[tokio::test]
    async fn request_round_trips_through_fake_peer() {
        let (session, server_io) = fake_peer();
        let (server_read, server_write) = tokio::io::split(server_io);
        let mut server_reader = Reader::new(BufReader::new(server_read));
        let mut server_writer = MessageWriter::new(server_write);

        let server = tokio::spawn(async move {
            let req = server_reader.read_message().await.unwrap().unwrap();
            let id = req["id"].clone();
            let reply = json!({"jsonrpc": "2.0", "id": id, "result": {"ok": true}});
            server_writer.write_message(&reply).await.unwrap();
        });

        let result = session
            .request("textDocument/documentSymbol", json!({}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result, json!({"ok": true}));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn timeout_discards_late_arrival() {
        let (session, server_io) = fake_peer();
        let (server_read, server_write) = tokio::io::split(server_io);
        let mut server_reader = Reader::new(BufReader::new(server_read));
        let mut server_writer = MessageWriter::new(server_write);

        let server = tokio::spawn(async move {
            let req = server_reader.read_message().await.unwrap().unwrap();
            let id = req["id"].clone();
            // Respond only after the client's timeout has certainly fired.
            tokio::time::sleep(Duration::from_millis(200)).await;
            let reply = json!({"jsonrpc": "2.0", "id": id, "result": {"late": true}});
            let _ = server_writer.write_message(&reply).await;
        });

        let result = session
            .request("textDocument/references", json!({}), Duration::from_millis(20))
            .await;
        assert_eq!(result, Err(RpcError::Timeout));

        // Give the late response time to arrive and be discarded; a second,
        // unrelated request on the same session must still work.
        tokio::time::sleep(Duration::from_millis(300)).await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_error_response_becomes_protocol_error() {
        let (session, server_io) = fake_peer();
        let (server_read, server_write) = tokio::io::split(server_io);
        let mut server_reader = Reader::new(BufReader::new(server_read));
        let mut server_writer = MessageWriter::new(server_write);

        tokio::spawn(async move {
            let req = server_reader.read_message().await.unwrap().unwrap();
            let id = req["id"].clone();
            let reply = json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "method not found"}});
            server_writer.write_message(&reply).await.unwrap();
        });

        let err = session
            .request("bogus/method", json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RpcError::Protocol {
                code: -32601,
                message: "method not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_and_is_idempotent() {
        let (session, _server_io) = fake_peer();
        let session = Arc::new(session);
        let pending = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.request("x", json!({}), Duration::from_secs(30)).await })
        };

        // Give the request time to register before shutting down.
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.shutdown().await;
        session.shutdown().await; // idempotent, no panic

        let result = pending.await.unwrap();
        assert_eq!(result, Err(RpcError::Cancelled));
    }

    #[tokio::test]
    async fn log_message_notification_is_classified_and_forwarded() {
        let (client_io, server_io) = duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        let reader = Reader::new(BufReader::new(client_read));
        let writer = MessageWriter::new(client_write);
        let (_session, mut notifs) = Session::spawn(reader, writer);

        let (_server_read, server_write) = tokio::io::split(server_io);
        let mut server_writer = MessageWriter::new(server_write);
        let msg = json!({
            "jsonrpc": "2.0",
            "method": "window/logMessage",
            "params": {"type": 1, "message": "boom"}
        });
        server_writer.write_message(&msg).await.unwrap();

        let notification = notifs.recv().await.unwrap();
        assert_eq!(notification.method, "window/logMessage");
        assert_eq!(notification.level, Some(NotificationLevel::Error));
    }
}

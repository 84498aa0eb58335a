//! stdio transport for the MCP server.
//!
//! This module implements the stdio transport as specified by MCP:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stdin: receives messages from the client
//! - stdout: sends messages to the client
//! - stderr: may be used for logging (not MCP messages)
//!
//! # Task Model
//!
//! Three cooperating tasks run concurrently under one scheduler, connected
//! by two bounded queues:
//!
//! ```text
//! input ──▶ reader ──lines──▶ handler ──responses──▶ writer ──▶ output
//! ```
//!
//! The handler is strictly serial, so responses are written in the order
//! requests were handled. EOF on the input closes `lines`, draining the
//! handler, which closes `responses`, draining the writer. A shutdown
//! signal interrupts all three at their next suspension point; each then
//! returns cleanly. Partially written output on shutdown is acceptable.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::mcp::protocol::{
    parse_message, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse,
};

/// Depth of the `lines` and `responses` queues.
const QUEUE_DEPTH: usize = 32;

/// A response on its way out: success or error envelope.
pub type Outgoing = Result<JsonRpcResponse, JsonRpcError>;

/// Handles parsed JSON-RPC traffic.
///
/// Requests produce exactly one response; notifications produce none.
#[async_trait]
pub trait RequestHandler: Send {
    /// Handles a request, returning the success or error envelope.
    async fn handle_request(&mut self, request: JsonRpcRequest) -> Outgoing;

    /// Observes a notification. No response is ever emitted for one.
    fn handle_notification(&mut self, notification: &JsonRpcNotification);
}

/// A line-framed JSON-RPC transport over any byte streams.
///
/// Production wires tokio's stdin/stdout; tests use in-memory buffers.
pub struct StdioTransport<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a transport over the given input and output streams.
    pub fn new(input: R, output: W) -> Self {
        Self {
            reader: BufReader::new(input),
            writer: output,
        }
    }

    /// Runs the transport until EOF or shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error when reading the input or writing the output fails.
    /// A line that fails JSON parsing is answered on the wire and is not an
    /// error here.
    pub async fn run<H: RequestHandler>(
        self,
        handler: &mut H,
        shutdown: watch::Receiver<bool>,
    ) -> io::Result<()> {
        let (lines_tx, lines_rx) = mpsc::channel::<String>(QUEUE_DEPTH);
        let (responses_tx, responses_rx) = mpsc::channel::<Outgoing>(QUEUE_DEPTH);

        tokio::try_join!(
            read_lines(self.reader, lines_tx, shutdown.clone()),
            handle_lines(handler, lines_rx, responses_tx, shutdown.clone()),
            write_responses(self.writer, responses_rx, shutdown),
        )?;

        Ok(())
    }
}

/// Reader task: splits the input into lines and feeds the `lines` queue.
///
/// Returns on EOF (dropping the queue sender) or shutdown.
async fn read_lines<R: AsyncRead + Unpin>(
    mut reader: BufReader<R>,
    lines: mpsc::Sender<String>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    loop {
        let mut line = String::new();
        let read = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            result = reader.read_line(&mut line) => result?,
        };

        if read == 0 {
            debug!("input closed");
            return Ok(());
        }

        // Frames are terminated by \n or a bare \r, so a physical line may
        // hold more than one frame.
        for frame in line.split(['\n', '\r']) {
            if frame.trim().is_empty() {
                continue;
            }

            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                sent = lines.send(frame.to_string()) => {
                    if sent.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Handler task: parses each line and dispatches it, strictly serially.
///
/// Notifications produce no queue entry; unparseable lines produce the
/// Parse-error response with a null ID.
async fn handle_lines<H: RequestHandler>(
    handler: &mut H,
    mut lines: mpsc::Receiver<String>,
    responses: mpsc::Sender<Outgoing>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    loop {
        let line = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            received = lines.recv() => match received {
                Some(line) => line,
                None => return Ok(()),
            },
        };

        let outgoing = match parse_message(&line) {
            Ok(IncomingMessage::Request(request)) => handler.handle_request(request).await,
            Ok(IncomingMessage::Notification(notification)) => {
                handler.handle_notification(&notification);
                continue;
            }
            Err(error) => Err(error),
        };

        tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            sent = responses.send(outgoing) => {
                if sent.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

/// Writer task: serialises responses and flushes each one fully before
/// starting the next.
async fn write_responses<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut responses: mpsc::Receiver<Outgoing>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    loop {
        let outgoing = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            received = responses.recv() => match received {
                Some(outgoing) => outgoing,
                None => return Ok(()),
            },
        };

        let json = match &outgoing {
            Ok(response) => serde_json::to_string(response),
            Err(error) => serde_json::to_string(error),
        }
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // MCP spec: messages must not contain embedded newlines
        debug_assert!(
            !json.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            written = async {
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await
            } => written?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::RequestId;

    /// Echoes the request method back as the result.
    struct EchoHandler {
        notifications: Vec<String>,
    }

    impl EchoHandler {
        fn new() -> Self {
            Self {
                notifications: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl RequestHandler for EchoHandler {
        async fn handle_request(&mut self, request: JsonRpcRequest) -> Outgoing {
            Ok(JsonRpcResponse::success(
                request.id,
                serde_json::json!({"method": request.method}),
            ))
        }

        fn handle_notification(&mut self, notification: &JsonRpcNotification) {
            self.notifications.push(notification.method.clone());
        }
    }

    async fn run_transport(input: &str, handler: &mut EchoHandler) -> String {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut output = std::io::Cursor::new(Vec::new());

        let transport = StdioTransport::new(input.as_bytes(), &mut output);
        transport.run(handler, shutdown_rx).await.unwrap();

        String::from_utf8(output.into_inner()).unwrap()
    }

    #[tokio::test]
    async fn responses_preserve_request_order() {
        let input = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"a\"}\n\
                     {\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"b\"}\n\
                     {\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"c\"}\n";
        let mut handler = EchoHandler::new();
        let output = run_transport(input, &mut handler).await;

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"id\":1"));
        assert!(lines[1].contains("\"id\":2"));
        assert!(lines[2].contains("\"id\":3"));
    }

    #[tokio::test]
    async fn notifications_produce_no_output() {
        let input = "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n";
        let mut handler = EchoHandler::new();
        let output = run_transport(input, &mut handler).await;

        assert!(output.is_empty());
        assert_eq!(handler.notifications, vec!["notifications/initialized"]);
    }

    #[tokio::test]
    async fn malformed_line_answers_parse_error() {
        let input = "{\"jsonrpc\":\"2.0\" method:invalid}\n";
        let mut handler = EchoHandler::new();
        let output = run_transport(input, &mut handler).await;

        assert!(output.contains("\"code\":-32700"));
        assert!(output.contains("\"id\":null"));
    }

    #[tokio::test]
    async fn bad_line_does_not_stop_the_transport() {
        let input = "not json\n{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"after\"}\n";
        let mut handler = EchoHandler::new();
        let output = run_transport(input, &mut handler).await;

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("-32700"));
        assert!(lines[1].contains("\"id\":7"));
    }

    #[tokio::test]
    async fn empty_lines_are_skipped() {
        let input = "\n\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"x\"}\n\n";
        let mut handler = EchoHandler::new();
        let output = run_transport(input, &mut handler).await;

        assert_eq!(output.lines().count(), 1);
    }

    #[tokio::test]
    async fn carriage_return_terminates_a_frame() {
        let input = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"x\"}\r\
                     {\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"y\"}\n";
        let mut handler = EchoHandler::new();
        let output = run_transport(input, &mut handler).await;

        assert_eq!(output.lines().count(), 2);
    }

    #[tokio::test]
    async fn large_lines_are_accepted() {
        // A single frame over 1 MiB.
        let padding = "x".repeat(1_200_000);
        let input = format!(
            "{{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"big\",\"params\":{{\"pad\":\"{padding}\"}}}}\n"
        );
        let mut handler = EchoHandler::new();
        let output = run_transport(&input, &mut handler).await;

        assert!(output.contains("\"id\":1"));
    }

    #[tokio::test]
    async fn eof_drains_and_returns() {
        let mut handler = EchoHandler::new();
        let output = run_transport("", &mut handler).await;
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn shutdown_interrupts_idle_transport() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handler = EchoHandler::new();
        let mut output = std::io::Cursor::new(Vec::new());

        // An input stream that never produces data or EOF.
        let (_unused_writer, pending_input) = tokio::io::duplex(64);
        let transport = StdioTransport::new(pending_input, &mut output);

        let run = transport.run(&mut handler, shutdown_rx);
        tokio::pin!(run);

        // The transport stays pending until the signal fires.
        tokio::select! {
            _ = &mut run => panic!("transport returned without shutdown"),
            () = tokio::task::yield_now() => {}
        }

        shutdown_tx.send(true).unwrap();
        run.await.unwrap();
    }

    #[test]
    fn serialise_response_no_newlines() {
        let response = JsonRpcResponse::success(
            RequestId::Number(1),
            serde_json::json!({
                "message": "hello world",
                "nested": {"key": "value"}
            }),
        );

        let json = serde_json::to_string(&response).unwrap();
        assert!(
            !json.contains('\n'),
            "Serialised JSON should not contain newlines"
        );
    }
}

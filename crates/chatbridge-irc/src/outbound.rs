// ── Outbound line queue ──
//
// Every writer (the read loop answering commands, hooks on the backend
// task) pushes complete lines into one unbounded channel. A single task
// drains it into the socket, so lines never interleave.

use std::io;

use chatbridge_core::HookError;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// The receiving writer task is gone; the client socket is closed.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("client connection closed")]
pub struct Closed;

impl From<Closed> for HookError {
    fn from(closed: Closed) -> Self {
        HookError::new(closed.to_string())
    }
}

/// Cloneable sender of outbound lines.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<String>,
}

impl Outbound {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue one line, without terminator.
    pub fn send(&self, line: impl Into<String>) -> Result<(), Closed> {
        self.tx.send(line.into()).map_err(|_| Closed)
    }

    pub fn send_all(&self, lines: impl IntoIterator<Item = String>) -> Result<(), Closed> {
        lines.into_iter().try_for_each(|line| self.send(line))
    }
}

/// Drain `rx` into `writer`, terminating each line with `\r\n`.
///
/// Runs until every sender is dropped or `cancel` fires. On cancellation
/// the lines already queued are still written, then the writer is shut
/// down so the peer sees EOF.
pub async fn write_lines<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            line = rx.recv() => match line {
                Some(line) => write_line(&mut writer, &line).await?,
                None => break,
            },
            () = cancel.cancelled() => {
                while let Ok(line) = rx.try_recv() {
                    write_line(&mut writer, &line).await?;
                }
                break;
            }
        }
    }

    debug!("closing client socket");
    writer.flush().await?;
    writer.shutdown().await
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> io::Result<()> {
    trace!(line, "sending");
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn queued_lines_are_flushed_before_close() {
        let (client, server) = tokio::io::duplex(1024);
        let (out, rx) = Outbound::channel();
        let cancel = CancellationToken::new();

        out.send("one").unwrap();
        out.send_all(["two".to_string(), "three".to_string()]).unwrap();
        cancel.cancel();

        write_lines(server, rx, cancel).await.unwrap();

        let mut received = String::new();
        let mut client = client;
        client.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "one\r\ntwo\r\nthree\r\n");
    }

    #[tokio::test]
    async fn send_after_writer_exit_reports_closed() {
        let (out, rx) = Outbound::channel();
        drop(rx);
        assert!(out.send("late").is_err());
    }
}

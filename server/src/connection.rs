//! One message connection
//!
//! Each line received is one chat message; each reply is written back
//! followed by an empty line. Messages on a connection are handled in order,
//! connections run independently of each other.

use crate::bot::Bot;
use anyhow::Result;
use smarthome_shared::{AgentLedger, CancelSignal, LightRegistry};
use std::sync::Arc;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::warn;

/// Longest accepted message, newline excluded
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Reply sent before closing a connection whose message exceeds the limit
pub const MESSAGE_TOO_LONG: &str = "ERROR: Message too long";

enum Incoming {
    Message(String),
    TooLong,
    Closed,
}

/// Read one line of at most [`MAX_MESSAGE_SIZE`] bytes
async fn read_message<R>(reader: &mut R) -> std::io::Result<Incoming>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(MAX_MESSAGE_SIZE as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;

    if read == 0 {
        return Ok(Incoming::Closed);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > MAX_MESSAGE_SIZE {
        return Ok(Incoming::TooLong);
    }

    Ok(Incoming::Message(String::from_utf8_lossy(&buf).into_owned()))
}

/// Serve chat messages until the peer disconnects or shutdown is requested
pub async fn serve<S, L>(stream: S, bot: Arc<Bot<L>>, cancel: CancelSignal) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    L: AgentLedger + LightRegistry,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    loop {
        // Shutdown wins over messages already buffered
        let incoming = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            incoming = read_message(&mut reader) => incoming?,
        };

        let reply = match incoming {
            Incoming::Message(text) => bot.reply(&text).await,
            Incoming::TooLong => {
                warn!("Dropping connection: message over {} bytes", MAX_MESSAGE_SIZE);
                writer.write_all(MESSAGE_TOO_LONG.as_bytes()).await?;
                writer.write_all(b"\n\n").await?;
                break;
            }
            Incoming::Closed => break,
        };

        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n\n").await?;
        writer.flush().await?;
    }

    writer.shutdown().await?;
    Ok(())
}

use std::io::ErrorKind;
use std::sync::Arc;

use log::{debug, error, info, trace, warn};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;

use super::session_registry::SessionGuard;
use crate::error_handling::types::NetworkError;
use crate::storage::DurableStore;
use crate::validation::validate;

/// First line every client receives.
pub const WELCOME_LINE: &str =
    "Welcome to the timezone server, send reports as <city>,UTC<+/-offset>,<yyyy-M-d H:mm:ss> or exit to leave";

/// Reply to every accepted report, even when a sink failed to persist it.
pub const ACCEPTED_LINE: &str = "Timezone report saved";

/// Line that ends a session. Matched exactly and case-sensitively; gets no reply.
pub const EXIT_TOKEN: &str = "exit";

/// Longest line a client may send, terminator excluded. Anything longer ends the
/// session as a transport failure.
pub const MAX_LINE_BYTES: usize = 4096;

/// How a session reached CLOSED.
#[derive(Debug)]
pub enum SessionEnd {
    /// Client sent the exit token.
    Exit,
    /// Client closed its side of the connection.
    PeerClosed,
    /// Reading or writing the connection failed.
    Failed(NetworkError),
}

/// Server side of one client connection.
///
/// Lines are handled strictly one at a time: validated, persisted, answered and
/// audited before the next line is read. A rejected line never closes the session;
/// only the exit token, end of stream or a transport error does.
pub struct Session<S = TcpStream> {
    guard: SessionGuard,
    stream: S,
    store: Arc<DurableStore>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(guard: SessionGuard, stream: S, store: Arc<DurableStore>) -> Self {
        Self {
            guard,
            stream,
            store,
        }
    }

    pub fn id(&self) -> u64 {
        self.guard.id()
    }

    /// Runs the session to completion and reports how it ended.
    ///
    /// The registry slot held by this session is released before the connection is
    /// shut down, whatever the exit path.
    pub async fn run(self) -> SessionEnd {
        let Session {
            guard,
            stream,
            store,
        } = self;
        let id = guard.id();
        let remote_addr = guard.remote_addr();

        info!("[#{}] client connected from {}", id, remote_addr);
        record_event(&store, &format!("Client #{} connected from {}", id, remote_addr)).await;

        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);

        let end = match serve(id, &mut reader, &mut writer, &store).await {
            Ok(end) => end,
            Err(e) => SessionEnd::Failed(e),
        };

        drop(guard);
        if let Err(e) = writer.shutdown().await {
            debug!("[#{}] shutdown after close: {}", id, e);
        }

        let message = match &end {
            SessionEnd::Exit => {
                info!("[#{}] client sent exit", id);
                format!("Client #{} ({}) disconnected", id, remote_addr)
            }
            SessionEnd::PeerClosed => {
                info!("[#{}] client closed the connection", id);
                format!("Client #{} ({}) disconnected", id, remote_addr)
            }
            SessionEnd::Failed(e) => {
                warn!("[#{}] connection error: {}", id, e);
                format!("Client #{} ({}) disconnected abnormally: {}", id, remote_addr, e)
            }
        };
        record_event(&store, &message).await;

        end
    }
}

async fn serve<R, W>(
    id: u64,
    reader: &mut R,
    writer: &mut W,
    store: &DurableStore,
) -> Result<SessionEnd, NetworkError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    write_line(writer, WELCOME_LINE).await?;

    let mut buf = Vec::new();
    loop {
        let line = match read_bounded_line(reader, &mut buf).await? {
            Some(line) => line,
            None => return Ok(SessionEnd::PeerClosed),
        };
        trace!("[#{}] received {:?}", id, line);

        if line == EXIT_TOKEN {
            return Ok(SessionEnd::Exit);
        }

        let reply = process_line(id, &line, store).await;
        write_line(writer, reply).await?;
    }
}

/// Validates and persists one report line, returning the reply for the client.
async fn process_line(id: u64, line: &str, store: &DurableStore) -> &'static str {
    let report = match validate(line) {
        Ok(report) => report,
        Err(reason) => {
            debug!("[#{}] rejected {:?}: {:?}", id, line, reason);
            let kind = if reason.is_validation_error() {
                "invalid report"
            } else {
                "protocol error"
            };
            record_event(
                store,
                &format!("Client #{} rejected {:?} ({}): {}", id, line, kind, reason),
            )
            .await;
            return reason.message();
        }
    };

    // both sinks are attempted, each failure is independent
    let mut failed = Vec::new();
    if let Err(e) = store.append_record(&report).await {
        error!("[#{}] record file append failed: {}", id, e);
        failed.push("file");
    }
    if let Err(e) = store.insert_record(&report).await {
        error!("[#{}] structured store insert failed: {}", id, e);
        failed.push("database");
    }

    let message = if failed.is_empty() {
        format!("Client #{} stored report: {}", id, report)
    } else {
        format!(
            "Client #{} accepted report: {} ({} sink failed)",
            id,
            report,
            failed.join(" and ")
        )
    };
    record_event(store, &message).await;

    ACCEPTED_LINE
}

/// Reads one line of at most [`MAX_LINE_BYTES`], stripping a trailing `\n` or `\r\n`.
///
/// A final line without terminator is still returned. Over-long and non-UTF-8 lines
/// fail with `InvalidData`.
async fn read_bounded_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    // room for the longest line plus "\r\n"
    let limit = (MAX_LINE_BYTES + 2) as u64;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    if buf.len() > MAX_LINE_BYTES {
        return Err(std::io::Error::new(
            ErrorKind::InvalidData,
            format!("line longer than {} bytes", MAX_LINE_BYTES),
        ));
    }

    String::from_utf8(std::mem::take(buf))
        .map(Some)
        .map_err(|_| std::io::Error::new(ErrorKind::InvalidData, "stream did not contain valid UTF-8"))
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<(), NetworkError> {
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    writer.write_all(buf.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

async fn record_event(store: &DurableStore, message: &str) {
    if let Err(e) = store.append_log(message).await {
        error!("Audit log append failed: {}", e);
    }
}

use std::sync::Arc;

use log::{debug, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::session_management::SessionRegistry;
use crate::storage::DurableStore;

pub const PROMPT: &str =
    "Commands: 1 = file records, 2 = database records, 3 = active clients, 4 = audit log, quit = stop server";

/// One operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    ListFileRecords,
    ListDatabaseRecords,
    ActiveClients,
    ShowAuditLog,
    Quit,
}

impl ConsoleCommand {
    /// Anything that is not a known command yields `None` and is ignored.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(ConsoleCommand::ListFileRecords),
            "2" => Some(ConsoleCommand::ListDatabaseRecords),
            "3" => Some(ConsoleCommand::ActiveClients),
            "4" => Some(ConsoleCommand::ShowAuditLog),
            "quit" => Some(ConsoleCommand::Quit),
            _ => None,
        }
    }
}

/// Why the console loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// Operator asked to stop the server.
    Quit,
    /// Console input reached end of stream; the server keeps running.
    InputClosed,
}

/// Operator loop over a local input stream.
///
/// Only reads from the registry and the store, so it neither waits on nor holds up
/// client sessions beyond the per-sink locks a read takes.
pub struct AdminConsole {
    registry: Arc<SessionRegistry>,
    store: Arc<DurableStore>,
}

impl AdminConsole {
    pub fn new(registry: Arc<SessionRegistry>, store: Arc<DurableStore>) -> Self {
        Self { registry, store }
    }

    pub async fn run<R, W>(&self, mut input: R, output: &mut W) -> std::io::Result<ConsoleExit>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();

        loop {
            write_lines(output, &[PROMPT.to_string()]).await?;

            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                info!("Console input closed, admin console stopped");
                return Ok(ConsoleExit::InputClosed);
            }
            // invalid UTF-8 never matches a command
            let line = String::from_utf8_lossy(&buf);

            match ConsoleCommand::parse(&line) {
                Some(ConsoleCommand::Quit) => {
                    info!("Quit requested from console");
                    return Ok(ConsoleExit::Quit);
                }
                Some(command) => {
                    let text = self.execute(command).await;
                    write_lines(output, &text).await?;
                }
                None => debug!("Ignoring console input {:?}", line),
            }
        }
    }

    /// Renders the output of one command. Read failures become a single diagnostic line.
    pub async fn execute(&self, command: ConsoleCommand) -> Vec<String> {
        match command {
            ConsoleCommand::ListFileRecords => match self.store.read_records().await {
                Ok(records) => with_header("Records from file:", records),
                Err(e) => vec![format!("Unable to read record file: {}", e)],
            },
            ConsoleCommand::ListDatabaseRecords => match self.store.list_rows().await {
                Ok(rows) => with_header(
                    "Records from database:",
                    rows.into_iter()
                        .map(|r| format!("City: {}, Timezone: {}, time: {}", r.city, r.timezone, r.time))
                        .collect(),
                ),
                Err(e) => vec![format!("Unable to read database: {}", e)],
            },
            ConsoleCommand::ActiveClients => {
                vec![format!("Active clients: {}", self.registry.active_count())]
            }
            ConsoleCommand::ShowAuditLog => match self.store.read_log().await {
                Ok(entries) => with_header("Audit log:", entries),
                Err(e) => vec![format!("Unable to read audit log: {}", e)],
            },
            ConsoleCommand::Quit => Vec::new(),
        }
    }
}

fn with_header(header: &str, body: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(header.to_string());
    if body.is_empty() {
        out.push("(empty)".to_string());
    }
    out.extend(body);
    out
}

async fn write_lines<W: AsyncWrite + Unpin>(output: &mut W, lines: &[String]) -> std::io::Result<()> {
    let mut buf = String::new();
    for line in lines {
        buf.push_str(line);
        buf.push('\n');
    }
    output.write_all(buf.as_bytes()).await?;
    output.flush().await
}

use log::{debug, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::session_management::session::EXIT_TOKEN;

pub const INPUT_PROMPT: &str =
    "Enter a timezone report as <city>,UTC<+/-offset>,<yyyy-M-d H:mm:ss> (exit to quit):";
pub const SHAPE_HINT: &str = "A report needs exactly three comma-separated fields, try again";

/// Interactive loop of the terminal client.
///
/// Prints the server's welcome line, then forwards console lines one at a time and
/// prints the single reply to each. Lines without three comma-separated fields are
/// refused locally and never sent. `exit` (or console end of input) sends the exit
/// token and returns.
pub async fn run_client<S, I, O>(server: S, console: I, out: &mut O) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(server);
    let mut replies = BufReader::new(reader).lines();
    let mut input = console.lines();

    match replies.next_line().await? {
        Some(welcome) => print_line(out, &format!("Server: {}", welcome)).await?,
        None => {
            print_line(out, "Server closed the connection").await?;
            return Ok(());
        }
    }

    loop {
        print_line(out, INPUT_PROMPT).await?;

        let line = match input.next_line().await? {
            Some(line) => line,
            None => EXIT_TOKEN.to_string(),
        };

        if line == EXIT_TOKEN {
            info!("Leaving session");
            writer.write_all(format!("{}\n", EXIT_TOKEN).as_bytes()).await?;
            writer.flush().await?;
            return Ok(());
        }

        if line.split(',').count() != 3 {
            debug!("Not sending {:?}", line);
            print_line(out, SHAPE_HINT).await?;
            continue;
        }

        writer.write_all(format!("{}\n", line).as_bytes()).await?;
        writer.flush().await?;

        match replies.next_line().await? {
            Some(reply) => print_line(out, &format!("Server: {}", reply)).await?,
            None => {
                print_line(out, "Server closed the connection").await?;
                return Ok(());
            }
        }
    }
}

async fn print_line<O: AsyncWrite + Unpin>(out: &mut O, line: &str) -> std::io::Result<()> {
    out.write_all(format!("{}\n", line).as_bytes()).await?;
    out.flush().await
}

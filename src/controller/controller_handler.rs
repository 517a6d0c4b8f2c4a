use log::{error, info};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};

use crate::admin_console::{AdminConsole, ConsoleExit};
use crate::configuration::Config;
use crate::error_handling::types::*;
use crate::network::NetworkListener;
use crate::session_management::SessionRegistry;
use crate::storage::DurableStore;

/// Wires the sinks, the registry, the listener and the operator console together.
pub struct Controller {
    pub config: Config,
    registry: Arc<SessionRegistry>,
    store: Arc<DurableStore>,
}

impl Controller {
    /// Opens the sinks named in `config`. Failing to reach the structured store is fatal.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("[+] Opening storage sinks");
        let store = DurableStore::open(&config.record_file, &config.database_url, &config.audit_log)
            .await
            .map_err(|e| {
                error!("[!] Unable to open storage: {}", e);
                ControllerError::StorageError(e)
            })?;

        Ok(Self {
            config,
            registry: SessionRegistry::new(),
            store: Arc::new(store),
        })
    }

    /// Binds the listener, then serves clients while the console runs on stdin.
    ///
    /// Returns once the operator types `quit`. Sessions still open at that point are
    /// not told anything; the caller is expected to end the process.
    pub async fn run(&self) -> Result<(), ControllerError> {
        let addr = self.config.listen_addr()?;
        let listener =
            NetworkListener::bind(addr, Arc::clone(&self.registry), Arc::clone(&self.store)).await?;
        let local = listener.local_addr()?;

        info!("[+] Server started on {}", local);
        if let Err(e) = self.store.append_log(&format!("Server started on {}", local)).await {
            error!("Audit log append failed: {}", e);
        }

        tokio::spawn(listener.start_listening());

        self.serve_console(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await;
        Ok(())
    }

    /// Runs the operator console and returns only on `quit`.
    ///
    /// Console end of input or a console I/O failure stops the console alone; sessions
    /// and the listener keep running until the process is killed.
    async fn serve_console<R, W>(&self, input: R, mut output: W)
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let console = AdminConsole::new(Arc::clone(&self.registry), Arc::clone(&self.store));
        match console.run(input, &mut output).await {
            Ok(ConsoleExit::Quit) => return,
            Ok(ConsoleExit::InputClosed) => info!("No operator attached, serving until killed"),
            Err(e) => error!("[!] Admin console failed: {}, serving until killed", e),
        }
        std::future::pending::<()>().await;
    }
}

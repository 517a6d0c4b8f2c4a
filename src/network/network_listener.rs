//! # Network Listener Module
//!
//! Accepts client connections on a single TCP endpoint and hands each one to its own
//! [`Session`] task.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │ Incoming        │───▶│ NetworkListener  │───▶│ Session task    │
//! │ Connections     │    │                  │    │ (one per client)│
//! └─────────────────┘    │ - id allocation  │    └────────┬────────┘
//!                        │ - accept retry   │             │
//!                        └──────────────────┘             ▼
//!                                                 ┌─────────────────┐
//!                                                 │ DurableStore    │
//!                                                 └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tzserver::network::network_listener::NetworkListener;
//! use tzserver::session_management::SessionRegistry;
//! use tzserver::storage::DurableStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(
//!     DurableStore::open("client_data.txt", "sqlite://timezone.db?mode=rwc", "server.log").await?,
//! );
//! let listener =
//!     NetworkListener::bind("0.0.0.0:8080".parse()?, SessionRegistry::new(), store).await?;
//! listener.start_listening().await;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::net::TcpListener;

use crate::error_handling::types::NetworkError;
use crate::session_management::{Session, SessionRegistry};
use crate::storage::DurableStore;

/// Pause after a failed accept so descriptor exhaustion does not spin the loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A bound listening socket plus what every spawned session needs.
pub struct NetworkListener {
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    store: Arc<DurableStore>,
}

impl NetworkListener {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] if the address is in use, not local, or
    /// needs privileges the process does not have. Callers treat this as fatal.
    pub async fn bind(
        addr: SocketAddr,
        registry: Arc<SessionRegistry>,
        store: Arc<DurableStore>,
    ) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!("[!] Unable to bind {}: {}", addr, e);
            NetworkError::BindFailed(addr, e)
        })?;

        Ok(Self {
            listener,
            registry,
            store,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.listener.local_addr().map_err(NetworkError::Transport)
    }

    /// Accepts connections forever, spawning one session task per client.
    ///
    /// A failed accept is logged and retried after a short pause; it never stops the
    /// loop or affects sessions already running.
    pub async fn start_listening(self) {
        if let Ok(addr) = self.local_addr() {
            info!("Listening for clients on {}", addr);
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, remote_addr)) => {
                    let guard = self.registry.open_session(remote_addr);
                    let session = Session::new(guard, stream, Arc::clone(&self.store));
                    info!(
                        "Accepted {} as session #{} ({} active)",
                        remote_addr,
                        session.id(),
                        self.registry.active_count()
                    );
                    tokio::spawn(session.run());
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }
}

//! End-to-end scenarios over real loopback sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::network::NetworkListener;
use crate::session_management::session::{ACCEPTED_LINE, WELCOME_LINE};
use crate::session_management::SessionRegistry;
use crate::storage::DurableStore;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct TestServer {
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    store: Arc<DurableStore>,
    _dir: TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("tz.db").display());
        let store = Arc::new(
            DurableStore::open(
                dir.path().join("client_data.txt"),
                &url,
                dir.path().join("server.log"),
            )
            .await
            .unwrap(),
        );
        let registry = SessionRegistry::new();

        let listener = NetworkListener::bind(
            "127.0.0.1:0".parse().unwrap(),
            Arc::clone(&registry),
            Arc::clone(&store),
        )
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(listener.start_listening());

        Self {
            addr,
            registry,
            store,
            _dir: dir,
        }
    }

    async fn wait_for_active(&self, expected: usize) {
        let start = tokio::time::Instant::now();
        while self.registry.active_count() != expected {
            assert!(
                start.elapsed() < WAIT_TIMEOUT,
                "active count stuck at {}, expected {}",
                self.registry.active_count(),
                expected
            );
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_log_entries(&self, expected: usize) -> Vec<String> {
        let start = tokio::time::Instant::now();
        loop {
            let entries = self.store.read_log().await.unwrap_or_default();
            if entries.len() >= expected {
                return entries;
            }
            assert!(start.elapsed() < WAIT_TIMEOUT, "audit log stuck at {:?}", entries);
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

struct TestClient {
    lines: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        let mut client = Self {
            lines: BufReader::new(reader).lines(),
            writer,
        };
        assert_eq!(client.recv().await.as_deref(), Some(WELCOME_LINE));
        client
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT_TIMEOUT, self.lines.next_line())
            .await
            .expect("reply timed out")
            .unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_report_round_trip_over_tcp() {
    let server = TestServer::spawn().await;
    let mut client = TestClient::connect(server.addr).await;

    client.send("Tokyo,UTC+9,2024-5-1 7:30:00").await;
    assert_eq!(client.recv().await.as_deref(), Some(ACCEPTED_LINE));

    assert_eq!(
        server.store.read_records().await.unwrap(),
        vec!["Tokyo,UTC+9,2024-05-01 07:30:00".to_string()]
    );
    let rows = server.store.list_rows().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        (rows[0].city.as_str(), rows[0].timezone.as_str(), rows[0].time.as_str()),
        ("Tokyo", "UTC+9", "2024-05-01 07:30:00")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_field_line_is_rejected() {
    let server = TestServer::spawn().await;
    let mut client = TestClient::connect(server.addr).await;

    client.send("Tokyo,UTC+9").await;
    let reply = client.recv().await.unwrap();
    assert!(reply.starts_with("Malformed"), "{}", reply);

    // the session survives a rejection
    client.send("Tokyo,UTC+9,2024-5-1 7:30:00").await;
    assert_eq!(client.recv().await.as_deref(), Some(ACCEPTED_LINE));
    assert_eq!(server.store.read_records().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exit_closes_and_decrements_once() {
    let server = TestServer::spawn().await;
    let mut staying = TestClient::connect(server.addr).await;
    let mut leaving = TestClient::connect(server.addr).await;
    server.wait_for_active(2).await;

    leaving.send("exit").await;
    assert_eq!(leaving.recv().await, None);
    server.wait_for_active(1).await;

    staying.send("Lima,UTC-5,2024-5-1 17:30:00").await;
    assert_eq!(staying.recv().await.as_deref(), Some(ACCEPTED_LINE));
    assert_eq!(server.registry.active_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abrupt_disconnect_is_logged() {
    let server = TestServer::spawn().await;
    let client = TestClient::connect(server.addr).await;
    server.wait_for_active(1).await;

    drop(client);
    server.wait_for_active(0).await;

    let entries = server.wait_for_log_entries(2).await;
    assert!(entries[1].contains("disconnected"), "{:?}", entries);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_each_store_one_report() {
    const CLIENTS: usize = 24;
    let server = TestServer::spawn().await;

    let mut handles = Vec::new();
    for i in 0..CLIENTS {
        let addr = server.addr;
        handles.push(tokio::spawn(async move {
            let mut client = TestClient::connect(addr).await;
            client
                .send(&format!("City {},UTC+{},2024-1-1 0:00:{:02}", i, i % 13, i))
                .await;
            assert_eq!(client.recv().await.as_deref(), Some(ACCEPTED_LINE));
            client.send("exit").await;
            assert_eq!(client.recv().await, None);
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    server.wait_for_active(0).await;

    let records = server.store.read_records().await.unwrap();
    assert_eq!(records.len(), CLIENTS);
    for i in 0..CLIENTS {
        assert!(records.iter().any(|r| r.starts_with(&format!("City {},", i))));
    }
    assert_eq!(server.store.list_rows().await.unwrap().len(), CLIENTS);
}

// `quit` on the console ends the process with sessions still open; nothing notifies
// them. Dropping the server's runtime is the in-process stand-in for that exit.
#[tokio::test]
async fn test_shutdown_is_abrupt_for_open_sessions() {
    let (addr_tx, addr_rx) = tokio::sync::oneshot::channel();
    let (quit_tx, quit_rx) = tokio::sync::oneshot::channel::<()>();

    let server_thread = std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let server = TestServer::spawn().await;
            let _ = addr_tx.send(server.addr);
            let _ = quit_rx.await;
        });
        // every session task is dropped mid-read
        drop(rt);
    });

    let addr = addr_rx.await.unwrap();
    let mut client = TestClient::connect(addr).await;

    quit_tx.send(()).unwrap();
    tokio::task::spawn_blocking(move || server_thread.join())
        .await
        .unwrap()
        .unwrap();

    // no farewell line, just end of stream or a reset
    let next = tokio::time::timeout(WAIT_TIMEOUT, client.lines.next_line())
        .await
        .expect("connection left open after shutdown");
    assert!(matches!(next, Ok(None) | Err(_)), "{:?}", next);
    assert!(TcpStream::connect(addr).await.is_err());
}

//! Session loop bridging the feed to one downstream consumer.
//!
//! The loop is a perpetual three-state machine:
//!
//! ```text
//! WaitingForClient ──accept──▶ Streaming ──write failure──▶ Draining
//!        ▲                                                     │
//!        └──────────────────── flush, close ◀──────────────────┘
//! ```
//!
//! While streaming, each poll tick converts and writes every record to the
//! consumer in the order the provider returned them, then records identity
//! data in the reference store. A failed poll backs off and retries without
//! leaving the streaming state; only a broken consumer connection (or
//! shutdown) drains the session. Everything runs on one logical task, so the
//! store needs no locking and records are never reordered.

use crate::client::FeedError;
use crate::sbs;
use crate::server::Listener;
use crate::store::ReferenceStore;
use crate::types::AircraftRecord;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("accept failed: {0}")]
    Accept(#[from] io::Error),
}

/// Source of aircraft snapshots, polled once per tick.
///
/// Seam between the session loop and the HTTP client so the state machine
/// can be driven by a scripted feed in tests.
pub trait FeedSource {
    fn poll(&self) -> impl Future<Output = Result<Vec<AircraftRecord>, FeedError>> + Send;
}

impl FeedSource for crate::client::FeedClient {
    fn poll(&self) -> impl Future<Output = Result<Vec<AircraftRecord>, FeedError>> + Send {
        self.fetch()
    }
}

/// Why a streaming session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The consumer closed or aborted the connection.
    ConsumerDisconnect,
    /// The process-wide shutdown signal fired.
    Shutdown,
}

/// Counters for the session loop.
#[derive(Debug, Default)]
pub struct SessionStats {
    pub sessions: AtomicU64,
    pub polls: AtomicU64,
    pub poll_errors: AtomicU64,
    pub records_sent: AtomicU64,
    pub flushes: AtomicU64,
    pub flush_errors: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sessions: self.sessions.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            records_sent: self.records_sent.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_errors: self.flush_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub sessions: u64,
    pub polls: u64,
    pub poll_errors: u64,
    pub records_sent: u64,
    pub flushes: u64,
    pub flush_errors: u64,
}

/// Configuration for the session loop.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause after a successful poll tick.
    pub poll_interval: Duration,
    /// Pause after a failed poll before retrying.
    pub retry_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(4),
            retry_interval: Duration::from_secs(10),
        }
    }
}

/// The bridge: owns the feed source and the reference store, and drives the
/// accept → stream → drain cycle.
pub struct Bridge<S> {
    feed: S,
    store: ReferenceStore,
    config: SessionConfig,
    stats: Arc<SessionStats>,
}

impl<S: FeedSource> Bridge<S> {
    pub fn new(feed: S, store: ReferenceStore, config: SessionConfig) -> Self {
        Self {
            feed,
            store,
            config,
            stats: Arc::new(SessionStats::new()),
        }
    }

    /// Get a handle to the session counters.
    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    /// Run the bridge until the shutdown signal fires.
    ///
    /// The reference store is flushed at the end of every session and once
    /// more before returning, so shutdown never loses more than the current
    /// session's observations.
    pub async fn run(
        &mut self,
        listener: Listener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SessionError> {
        loop {
            tracing::info!("Waiting for consumer on {}", listener.local_addr());

            let stream = tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    tracing::info!("Consumer connected from {}", peer);
                    stream
                }
                _ = shutdown.changed() => break,
            };

            self.stats.sessions.fetch_add(1, Ordering::Relaxed);
            let end = self.stream_to(stream, &mut shutdown).await;
            self.drain();

            match end {
                SessionEnd::ConsumerDisconnect => {
                    tracing::info!("Consumer closed the connection, reconnect to continue");
                }
                SessionEnd::Shutdown => break,
            }
        }

        // Shutdown drains too; flush is idempotent if a session just did.
        self.drain();
        Ok(())
    }

    /// Streaming state: poll, convert, write, observe, sleep; repeat.
    async fn stream_to(
        &mut self,
        mut stream: TcpStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        loop {
            let outcome = tokio::select! {
                outcome = self.feed.poll() => outcome,
                _ = shutdown.changed() => return SessionEnd::Shutdown,
            };

            let pause = match outcome {
                Ok(records) => {
                    self.stats.polls.fetch_add(1, Ordering::Relaxed);
                    match self.forward(&records, &mut stream).await {
                        Ok(()) => {
                            tracing::debug!("Forwarded {} aircraft", records.len());
                            self.config.poll_interval
                        }
                        Err(e) => {
                            tracing::info!("Consumer write failed: {}", e);
                            return SessionEnd::ConsumerDisconnect;
                        }
                    }
                }
                Err(e) => {
                    self.stats.poll_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Feed poll failed, retrying: {}", e);
                    self.config.retry_interval
                }
            };

            tokio::select! {
                _ = sleep(pause) => {}
                _ = shutdown.changed() => return SessionEnd::Shutdown,
            }
        }
    }

    /// Write one poll tick's records in received order, observing each for
    /// the reference tables after its line is accepted by the socket.
    async fn forward(
        &mut self,
        records: &[AircraftRecord],
        stream: &mut TcpStream,
    ) -> io::Result<()> {
        for record in records {
            let line = sbs::convert(record);
            stream.write_all(line.as_bytes()).await?;
            self.stats.records_sent.fetch_add(1, Ordering::Relaxed);
            self.store.observe(record.hex(), record.reg(), record.airframe());
        }
        stream.flush().await
    }

    /// Draining state: persist the reference tables.
    ///
    /// A failed flush is logged and retried at the next drain; it never
    /// tears down the loop.
    fn drain(&mut self) {
        match self.store.flush() {
            Ok(()) => {
                self.stats.flushes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.flush_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Reference store flush failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ReferenceStore, REGISTRATION_FILE};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream as ClientStream;
    use tokio::time::timeout;

    /// Scripted feed: pops one outcome per poll, then keeps reporting the
    /// default batch once the script is exhausted.
    struct ScriptedFeed {
        script: Mutex<VecDeque<Result<Vec<AircraftRecord>, FeedError>>>,
        default_batch: Vec<AircraftRecord>,
    }

    impl ScriptedFeed {
        fn new(script: Vec<Result<Vec<AircraftRecord>, FeedError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                default_batch: Vec::new(),
            }
        }

        fn with_default(mut self, batch: Vec<AircraftRecord>) -> Self {
            self.default_batch = batch;
            self
        }
    }

    impl FeedSource for ScriptedFeed {
        fn poll(&self) -> impl Future<Output = Result<Vec<AircraftRecord>, FeedError>> + Send {
            let outcome = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(self.default_batch.clone()));
            async move { outcome }
        }
    }

    fn record(hex: &str, reg: &str) -> AircraftRecord {
        AircraftRecord {
            id: Some("7".to_string()),
            hex_ident: Some(hex.to_string()),
            registration: Some(reg.to_string()),
            ..Default::default()
        }
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            poll_interval: Duration::from_millis(10),
            retry_interval: Duration::from_millis(10),
        }
    }

    fn status_error() -> FeedError {
        FeedError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
        }
    }

    async fn read_line(stream: &mut ClientStream) -> String {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            stream.read_exact(&mut byte).await.unwrap();
            line.push(byte[0]);
            if byte[0] == b'\n' {
                return String::from_utf8(line).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_streams_records_to_consumer() {
        let dir = tempfile::tempdir().unwrap();
        let feed = ScriptedFeed::new(vec![Ok(vec![record("A1B2C3", "ZK-XYZ")])]);
        let store = ReferenceStore::load(dir.path()).unwrap();
        let mut bridge = Bridge::new(feed, store, fast_config());

        let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { bridge.run(listener, shutdown_rx).await });

        let mut consumer = ClientStream::connect(addr).await.unwrap();
        let line = read_line(&mut consumer).await;
        assert_eq!(line, "MSG,3,7,7,A1B2C3,7,,,,,,,,,,,,,0,0,0,0\n");

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // Shutdown drained: the observed pairing reached disk.
        let contents = std::fs::read_to_string(dir.path().join(REGISTRATION_FILE)).unwrap();
        assert_eq!(contents, "A1B2C3\tZK-XYZ\n");
    }

    #[tokio::test]
    async fn test_poll_failures_stay_streaming() {
        let dir = tempfile::tempdir().unwrap();
        // Two consecutive failures, then a good batch: the session must
        // survive both and still deliver the batch.
        let feed = ScriptedFeed::new(vec![
            Err(status_error()),
            Err(status_error()),
            Ok(vec![record("C81D50", "ZK-NZE")]),
        ]);
        let store = ReferenceStore::load(dir.path()).unwrap();
        let mut bridge = Bridge::new(feed, store, fast_config());
        let stats = bridge.stats();

        let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { bridge.run(listener, shutdown_rx).await });

        let mut consumer = ClientStream::connect(addr).await.unwrap();
        let line = timeout(Duration::from_secs(5), read_line(&mut consumer))
            .await
            .unwrap();
        assert!(line.contains("C81D50"));
        assert_eq!(stats.snapshot().poll_errors, 2);

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_drains_and_reaccepts() {
        let dir = tempfile::tempdir().unwrap();
        // After the scripted batch, every tick keeps writing one line so a
        // dropped consumer surfaces as a write error within a few ticks.
        let feed = ScriptedFeed::new(vec![Ok(vec![record("A1B2C3", "ZK-XYZ")])])
            .with_default(vec![record("A1B2C3", "ZK-XYZ")]);
        let store = ReferenceStore::load(dir.path()).unwrap();
        let mut bridge = Bridge::new(feed, store, fast_config());
        let stats = bridge.stats();

        let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { bridge.run(listener, shutdown_rx).await });

        let mut consumer = ClientStream::connect(addr).await.unwrap();
        let line = read_line(&mut consumer).await;
        assert!(line.starts_with("MSG,3,"));
        drop(consumer);

        // The session must flush exactly once and return to accepting.
        let drained = async {
            while stats.snapshot().flushes < 1 {
                sleep(Duration::from_millis(10)).await;
            }
        };
        timeout(Duration::from_secs(5), drained).await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join(REGISTRATION_FILE)).unwrap();
        assert_eq!(contents, "A1B2C3\tZK-XYZ\n");

        // A second consumer is served without a process restart.
        let mut second = timeout(Duration::from_secs(5), ClientStream::connect(addr))
            .await
            .unwrap()
            .unwrap();
        let line = timeout(Duration::from_secs(5), read_line(&mut second))
            .await
            .unwrap();
        assert!(line.starts_with("MSG,3,"));
        assert_eq!(stats.snapshot().sessions, 2);
        assert_eq!(stats.snapshot().flushes, 1);
        drop(second);

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let feed = ScriptedFeed::new(Vec::new());
        let store = ReferenceStore::load(dir.path()).unwrap();
        let mut bridge = Bridge::new(feed, store, fast_config());
        let stats = bridge.stats();

        let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { bridge.run(listener, shutdown_rx).await });

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.snapshot().flushes, 1);
    }
}

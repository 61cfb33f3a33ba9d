use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use wabridge_config::ServerConfig;
use wabridge_server::{AppState, Lifecycle, LifecyclePhase, ServerError};
use wabridge_session::{
    EventSender, SessionClient, SessionError, SessionFactory, SessionManager, SessionPhase,
    SessionResult, SessionStore,
};

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    destroyed: AtomicUsize,
}

struct StubClient {
    counters: Arc<Counters>,
    fail_initialize: bool,
}

#[async_trait]
impl SessionClient for StubClient {
    async fn initialize(&self) -> SessionResult<()> {
        if self.fail_initialize {
            Err(SessionError::remote("Failed to launch the browser process"))
        } else {
            Ok(())
        }
    }

    async fn send_message(&self, _chat_id: &str, _body: &str) -> SessionResult<()> {
        Ok(())
    }

    async fn destroy(&self) -> SessionResult<()> {
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct StubFactory {
    counters: Arc<Counters>,
    fail_initialize: bool,
}

impl SessionFactory for StubFactory {
    fn create(&self, _events: EventSender) -> SessionResult<Arc<dyn SessionClient>> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StubClient {
            counters: Arc::clone(&self.counters),
            fail_initialize: self.fail_initialize,
        }))
    }
}

struct Running {
    addr: SocketAddr,
    store: Arc<SessionStore>,
    counters: Arc<Counters>,
    phase: watch::Receiver<LifecyclePhase>,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<Result<(), ServerError>>,
}

async fn launch(startup_delay: Duration, fail_initialize: bool) -> Running {
    let counters = Arc::new(Counters::default());
    let factory = Arc::new(StubFactory {
        counters: Arc::clone(&counters),
        fail_initialize,
    });
    let store = Arc::new(SessionStore::new());
    let session = Arc::new(SessionManager::new(Arc::clone(&store), factory));

    let server_config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors: true,
    };
    let lifecycle = Lifecycle::new(AppState::new(session), server_config, startup_delay);
    let bound = lifecycle.bind().await.unwrap();
    let addr = bound.local_addr();
    let phase = bound.subscribe();
    assert_eq!(*phase.borrow(), LifecyclePhase::ListenerUp);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(bound.run(shutdown.clone()));

    Running {
        addr,
        store,
        counters,
        phase,
        shutdown,
        handle,
    }
}

async fn health(addr: SocketAddr) -> (u16, String) {
    let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_health_while_start_is_pending() {
    let running = launch(Duration::from_secs(60), false).await;

    assert_eq!(health(running.addr).await, (200, "OK".to_string()));
    assert_eq!(running.counters.created.load(Ordering::SeqCst), 0);

    // shutdown cancels the pending start; nothing was constructed, nothing destroyed
    running.shutdown.cancel();
    running.handle.await.unwrap().unwrap();
    assert_eq!(running.counters.created.load(Ordering::SeqCst), 0);
    assert_eq!(running.counters.destroyed.load(Ordering::SeqCst), 0);
    assert_eq!(*running.phase.borrow(), LifecyclePhase::ListenerDown);
}

#[tokio::test]
async fn test_health_after_failed_start() {
    let running = launch(Duration::ZERO, true).await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while running.store.phase() != SessionPhase::Failed {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(health(running.addr).await, (200, "OK".to_string()));

    let status: serde_json::Value = reqwest::get(format!("http://{}/status", running.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["connected"], false);

    running.shutdown.cancel();
    running.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_destroys_constructed_client() {
    let mut running = launch(Duration::ZERO, false).await;

    tokio::time::timeout(Duration::from_secs(5), running.phase.wait_for(|p| {
        *p == LifecyclePhase::SessionActive
    }))
    .await
    .unwrap()
    .unwrap();
    assert_eq!(running.counters.created.load(Ordering::SeqCst), 1);

    running.shutdown.cancel();
    running.handle.await.unwrap().unwrap();

    assert_eq!(running.counters.destroyed.load(Ordering::SeqCst), 1);
    assert!(!running.store.is_connected());
    assert!(reqwest::get(format!("http://{}/health", running.addr))
        .await
        .is_err());
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let session = Arc::new(SessionManager::new(
        Arc::new(SessionStore::new()),
        Arc::new(StubFactory {
            counters: Arc::new(Counters::default()),
            fail_initialize: false,
        }),
    ));
    let lifecycle = Lifecycle::new(
        AppState::new(session),
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
            cors: false,
        },
        Duration::ZERO,
    );

    assert!(matches!(
        lifecycle.bind().await,
        Err(ServerError::Bind { .. })
    ));
}

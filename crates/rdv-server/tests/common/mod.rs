//! Shared fixtures for rdv-server integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::{CertificateDer, ServerName};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;

use rdv_core::config::{BackoffConfig, ListenerConfig};
use rdv_core::error::MultiplexerError;
use rdv_core::traits::{Multiplexer, WindowHandle};
use rdv_core::types::{PaneTarget, SessionName, WindowId};
use rdv_server::server::{load_tls_identity, RendezvousServer};
use rdv_server::session::BridgeCommand;
use rdv_server::ServerState;

/// Program name rendered into bridge launch commands
pub const BRIDGE_PROGRAM: &str = "rdv";

/// Multiplexer fake that records every call
#[derive(Default)]
pub struct RecordingMultiplexer {
    existing: Mutex<HashSet<String>>,
    has_session_calls: AtomicUsize,
    new_session_calls: AtomicUsize,
    windows: Mutex<Vec<(SessionName, WindowId)>>,
    execs: Mutex<Vec<(PaneTarget, String)>>,
    launches: Mutex<Option<mpsc::UnboundedSender<PathBuf>>>,
    pub fail_has_session: AtomicBool,
    pub fail_new_session: AtomicBool,
    pub fail_new_window: AtomicBool,
    pub fail_exec: AtomicBool,
}

fn injected(command: &str) -> MultiplexerError {
    MultiplexerError::CommandFailed {
        command: command.to_string(),
        status: Some(1),
        stderr: "injected failure".to_string(),
    }
}

impl RecordingMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `name` already exists, as if left by an earlier listener
    pub fn with_existing(self, name: &str) -> Self {
        self.existing.lock().unwrap().insert(name.to_string());
        self
    }

    /// Receive the socket path of every bridge launch command
    pub fn launches(&self) -> mpsc::UnboundedReceiver<PathBuf> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.launches.lock().unwrap() = Some(tx);
        rx
    }

    pub fn has_session_calls(&self) -> usize {
        self.has_session_calls.load(Ordering::SeqCst)
    }

    pub fn new_session_calls(&self) -> usize {
        self.new_session_calls.load(Ordering::SeqCst)
    }

    pub fn windows(&self) -> Vec<(SessionName, WindowId)> {
        self.windows.lock().unwrap().clone()
    }

    pub fn execs(&self) -> Vec<(PaneTarget, String)> {
        self.execs.lock().unwrap().clone()
    }
}

/// Socket path argument of a rendered bridge command
pub fn socket_arg(command: &str) -> Option<PathBuf> {
    let words = shell_words::split(command).ok()?;
    let mut words = words.into_iter();
    words.find(|w| w == "--socket")?;
    words.next().map(PathBuf::from)
}

#[async_trait]
impl Multiplexer for RecordingMultiplexer {
    async fn has_session(&self, name: &SessionName) -> Result<bool, MultiplexerError> {
        self.has_session_calls.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to pile up
        tokio::time::sleep(Duration::from_millis(20)).await;

        if self.fail_has_session.load(Ordering::SeqCst) {
            return Err(injected("has-session"));
        }
        Ok(self.existing.lock().unwrap().contains(name.as_str()))
    }

    async fn new_session(&self, name: &SessionName) -> Result<(), MultiplexerError> {
        self.new_session_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_new_session.load(Ordering::SeqCst) {
            return Err(injected("new-session"));
        }
        self.existing.lock().unwrap().insert(name.to_string());
        Ok(())
    }

    async fn new_window(
        &self,
        session: &SessionName,
        window: &WindowId,
    ) -> Result<WindowHandle, MultiplexerError> {
        tokio::task::yield_now().await;
        let index = {
            let mut windows = self.windows.lock().unwrap();
            windows.push((session.clone(), window.clone()));
            windows.len()
        };

        if self.fail_new_window.load(Ordering::SeqCst) {
            return Err(injected("new-window"));
        }
        Ok(WindowHandle {
            id: window.clone(),
            pane: PaneTarget::new(format!("%{}", index)),
        })
    }

    async fn exec(&self, pane: &PaneTarget, command: &str) -> Result<(), MultiplexerError> {
        self.execs
            .lock()
            .unwrap()
            .push((pane.clone(), command.to_string()));

        if self.fail_exec.load(Ordering::SeqCst) {
            return Err(injected("send-keys"));
        }
        if let Some(path) = socket_arg(command) {
            if let Some(tx) = self.launches.lock().unwrap().as_ref() {
                let _ = tx.send(path);
            }
        }
        Ok(())
    }
}

/// Retry policy short enough for tests
pub fn fast_dial(max_attempts: u32) -> BackoffConfig {
    BackoffConfig {
        initial: Duration::from_millis(10),
        max: Duration::from_millis(50),
        multiplier: 2.0,
        jitter: 0.0,
        max_attempts,
    }
}

/// Listener configuration rooted in `dir`
pub fn test_config(dir: &TempDir) -> ListenerConfig {
    let state_dir = dir.path().join("state");
    std::fs::create_dir_all(&state_dir).unwrap();

    ListenerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        keys_dir: dir.path().join("certs"),
        state_dir,
        dial: fast_dial(50),
        ..ListenerConfig::default()
    }
}

/// Write a self-signed `localhost` key pair into `keys_dir`
pub fn write_test_certificate(keys_dir: &std::path::Path) -> CertificateDer<'static> {
    std::fs::create_dir_all(keys_dir).unwrap();
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    std::fs::write(keys_dir.join("server.pem"), generated.cert.pem()).unwrap();
    std::fs::write(keys_dir.join("server.key"), generated.key_pair.serialize_pem()).unwrap();
    generated.cert.der().clone()
}

/// TLS connector trusting only `cert`
pub fn test_connector(cert: CertificateDer<'static>) -> TlsConnector {
    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert).unwrap();
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// A running listener on a loopback port
pub struct TestListener {
    pub addr: SocketAddr,
    pub mux: Arc<RecordingMultiplexer>,
    pub state: Arc<ServerState>,
    pub connector: TlsConnector,
    pub cancel: CancellationToken,
    _dir: TempDir,
}

impl TestListener {
    pub async fn start(mux: Arc<RecordingMultiplexer>) -> Self {
        Self::start_with(mux, |_| {}).await
    }

    pub async fn start_with(
        mux: Arc<RecordingMultiplexer>,
        configure: impl FnOnce(&mut ListenerConfig),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        configure(&mut config);

        let cert = write_test_certificate(&config.keys_dir);
        let identity = load_tls_identity(&config.cert_path(), &config.key_path()).unwrap();

        let state = Arc::new(ServerState::new(
            config,
            mux.clone(),
            BridgeCommand::new(BRIDGE_PROGRAM, false),
        ));
        let cancel = CancellationToken::new();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = RendezvousServer::new(identity.acceptor(), Arc::clone(&state), cancel.clone());
        tokio::spawn(async move { server.serve(listener).await });

        Self {
            addr,
            mux,
            state,
            connector: test_connector(cert),
            cancel,
            _dir: dir,
        }
    }

    /// Open a TLS connection as an agent would
    pub async fn connect(&self) -> TlsStream<TcpStream> {
        let tcp = TcpStream::connect(self.addr).await.unwrap();
        let name = ServerName::try_from("localhost").unwrap();
        self.connector.connect(name, tcp).await.unwrap()
    }

    /// Root of the rendezvous sockets
    pub fn state_dir(&self) -> PathBuf {
        std::fs::canonicalize(&self.state.config.state_dir).unwrap()
    }
}

impl Drop for TestListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Wait for the listener to drop `stream` without sending anything
pub async fn assert_closed_silently(stream: &mut TlsStream<TcpStream>) {
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("listener kept the connection open");
    match read {
        Ok(n) => assert_eq!(n, 0, "listener sent {:?}", &buf[..n]),
        // Closed without close_notify
        Err(_) => {}
    }
}

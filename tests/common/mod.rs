//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use url::Url;

use repo_routing::config::{RoutingConfig, TimeoutConfig};
use repo_routing::discovery::HttpTransport;
use repo_routing::events::EventBus;
use repo_routing::prefix::MAGIC;
use repo_routing::repository::{Repository, RepositoryRegistry};
use repo_routing::storage::{ContentStore, MemoryContentStore};
use repo_routing::Manager;

/// Canned response of a mock upstream.
#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// A mock HTTP upstream answering from a path → response table.
///
/// Lookup tries the full request target (path and query) first, then the
/// path alone; anything else is a 404.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    pub async fn start(routes: Vec<(&str, MockResponse)>) -> Self {
        let routes: Arc<HashMap<String, MockResponse>> =
            Arc::new(routes.into_iter().map(|(p, r)| (p.to_string(), r)).collect());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let seen = requests.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((mut socket, _)) => {
                        let routes = routes.clone();
                        let seen = seen.clone();
                        tokio::spawn(async move {
                            let Some(target) = read_request_target(&mut socket).await else {
                                return;
                            };
                            seen.lock().unwrap().push(target.clone());
                            let path = target.split('?').next().unwrap_or("/").to_string();
                            let response = routes
                                .get(&target)
                                .or_else(|| routes.get(&path))
                                .cloned()
                                .unwrap_or_else(|| MockResponse::status(404));

                            let mut head = format!(
                                "HTTP/1.1 {} Mock\r\nContent-Length: {}\r\nConnection: close\r\n",
                                response.status,
                                response.body.len()
                            );
                            for (name, value) in &response.headers {
                                head.push_str(&format!("{}: {}\r\n", name, value));
                            }
                            head.push_str("\r\n");
                            let _ = socket.write_all(head.as_bytes()).await;
                            let _ = socket.write_all(&response.body).await;
                            let _ = socket.shutdown().await;
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).unwrap()
    }

    /// Request targets received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request_target(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next()?;
    request_line.split_whitespace().nth(1).map(str::to_string)
}

/// A URL nothing listens on.
pub fn refused_url() -> Url {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

pub fn prefix_file(entries: &[&str]) -> String {
    let mut body = format!("{}\n# served by a mock upstream\n", MAGIC);
    for entry in entries {
        body.push_str(entry);
        body.push('\n');
    }
    body
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

pub fn http_date(time: chrono::DateTime<chrono::Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn memory_store(files: &[&str]) -> Arc<dyn ContentStore> {
    let mut store = MemoryContentStore::new();
    for file in files {
        store = store.with_file(file, b"content");
    }
    Arc::new(store)
}

pub fn registry() -> Arc<RepositoryRegistry> {
    Arc::new(RepositoryRegistry::new(Arc::new(EventBus::new())))
}

/// Manager over `registry`, not started.
pub fn manager_for(registry: Arc<RepositoryRegistry>) -> Manager {
    let timeouts = TimeoutConfig {
        connect_secs: 2,
        request_secs: 5,
    };
    let transport = HttpTransport::new(&timeouts).unwrap();
    Manager::new(RoutingConfig::default(), registry, transport, Handle::current())
}

/// Register `repositories`, then start a manager over them.
pub fn start_manager(repositories: Vec<Repository>) -> Manager {
    let registry = registry();
    for repository in repositories {
        registry.add(repository);
    }
    let manager = manager_for(registry);
    manager.startup();
    manager
}

pub async fn settle(manager: &Manager) {
    assert!(
        manager.wait_for_quiescence(Duration::from_secs(10)).await,
        "update jobs did not finish, still running: {:?}",
        manager.running_jobs()
    );
}

pub fn sorted(mut entries: Vec<String>) -> Vec<String> {
    entries.sort();
    entries
}

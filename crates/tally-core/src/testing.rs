//! In-process HTTP stub standing in for the tracking API in tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the stub does with one connection.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// Write these bytes, stop writing, then wait for the client to hang up.
    Raw(String),
    /// Read the request and never answer.
    Hang,
}

/// `200 OK` with the given body.
pub(crate) fn ok_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

/// Serves `replies` in order, one per connection; the last one repeats.
pub(crate) struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub(crate) async fn start(replies: Vec<Reply>) -> Self {
        assert!(!replies.is_empty(), "stub needs at least one reply");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicUsize::new(0));

        let recorded = Arc::clone(&requests);
        let hung_up = Arc::clone(&closed);
        let handle = tokio::spawn(async move {
            let mut served = 0usize;
            while let Ok((mut stream, _)) = listener.accept().await {
                let reply = replies[served.min(replies.len() - 1)].clone();
                served += 1;
                let recorded = Arc::clone(&recorded);
                let hung_up = Arc::clone(&hung_up);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    loop {
                        let n = stream.read_buf(&mut buf).await.unwrap_or(0);
                        if n == 0 || buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    recorded
                        .lock()
                        .unwrap()
                        .push(String::from_utf8_lossy(&buf).into_owned());
                    match reply {
                        Reply::Raw(raw) => {
                            let _ = stream.write_all(raw.as_bytes()).await;
                            let _ = stream.shutdown().await;
                            // anything the client still sends is discarded
                            let mut sink = [0u8; 1024];
                            let drained = tokio::time::timeout(Duration::from_secs(5), async {
                                while stream.read(&mut sink).await.unwrap_or(0) > 0 {}
                            })
                            .await;
                            if drained.is_ok() {
                                hung_up.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                        Reply::Hang => tokio::time::sleep(Duration::from_secs(3600)).await,
                    }
                });
            }
        });

        Self {
            addr,
            requests,
            closed,
            handle,
        }
    }

    /// `127.0.0.1:<port>`, usable as the configured API host.
    pub(crate) fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Raw request heads received so far, in arrival order.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Resolves once the client has closed at least `n` connections.
    pub(crate) async fn wait_for_closed(&self, n: usize) {
        while self.closed.load(Ordering::SeqCst) < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// An address nothing listens on: bind an ephemeral port, then release it.
pub(crate) async fn unreachable_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    addr.to_string()
}

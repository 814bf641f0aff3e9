//! Shared test utilities for the magnify test suite.
//!
//! Provides a scripted HTTP stub standing in for the enhancement provider.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let stub = StubProvider::start(vec![
//!     StubRoute::new("/v1", 404, b""),
//!     StubRoute::new("/v1/upscale", 200, b"enhanced"),
//! ]);
//! // point a ProviderClient at stub.url("/v1") ...
//! assert_eq!(stub.paths(), vec!["/v1", "/v1/upscale"]);
//! ```

use std::io::{Read as _, Write as _};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// =========================================================================
// Stub provider
// =========================================================================

/// Canned response for one request path.
#[derive(Debug, Clone)]
pub struct StubRoute {
    pub path: String,
    pub status: u16,
    pub body: Vec<u8>,
    /// Pause after reading the request, before answering.
    pub delay: Duration,
}

impl StubRoute {
    pub fn new(path: &str, status: u16, body: &[u8]) -> Self {
        Self {
            path: path.to_string(),
            status,
            body: body.to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request the stub received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub api_key: Option<String>,
    pub body: Vec<u8>,
}

/// Minimal HTTP/1.1 server answering from a fixed route table.
/// Unknown paths get a 404. Stops when dropped.
pub struct StubProvider {
    port: u16,
    hits: Arc<Mutex<Vec<RecordedRequest>>>,
    _stop: std::sync::mpsc::Sender<()>,
}

impl StubProvider {
    pub fn start(routes: Vec<StubRoute>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let routes = Arc::new(routes);

        let server_hits = Arc::clone(&hits);
        thread::spawn(move || {
            listener.set_nonblocking(true).unwrap();
            loop {
                // Sender dropped → stop serving
                if let Err(std::sync::mpsc::TryRecvError::Disconnected) = rx.try_recv() {
                    break;
                }
                match listener.accept() {
                    Ok((stream, _)) => {
                        let routes = Arc::clone(&routes);
                        let hits = Arc::clone(&server_hits);
                        thread::spawn(move || serve_request(stream, &routes, &hits));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            port,
            hits,
            _stop: tx,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    pub fn hits(&self) -> Vec<RecordedRequest> {
        self.hits.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.hits().into_iter().map(|h| h.path).collect()
    }
}

/// URL on a port nothing listens on, for connection-refused tests.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/v1")
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn header_value(head: &str, name: &str) -> Option<String> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}

/// Read one full request: headers, then a Content-Length or chunked body.
fn read_request(stream: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut data = Vec::new();
    let mut buf = [0u8; 8192];
    let header_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&data[..header_end]).to_string();

    let content_length = header_value(&head, "content-length").and_then(|v| v.parse().ok());
    let chunked = header_value(&head, "transfer-encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));
    loop {
        let body = &data[header_end..];
        let complete = match content_length {
            Some(len) => body.len() >= len,
            None if chunked => body.ends_with(b"0\r\n\r\n"),
            None => true,
        };
        if complete {
            break;
        }
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    Some((head, data[header_end..].to_vec()))
}

fn serve_request(
    mut stream: TcpStream,
    routes: &[StubRoute],
    hits: &Mutex<Vec<RecordedRequest>>,
) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let Some((head, body)) = read_request(&mut stream) else {
        return;
    };
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();

    hits.lock().unwrap().push(RecordedRequest {
        path: path.clone(),
        api_key: header_value(&head, "x-api-key"),
        body,
    });

    let (status, body, delay) = routes
        .iter()
        .find(|r| r.path == path)
        .map_or((404, b"no route".to_vec(), Duration::ZERO), |r| {
            (r.status, r.body.clone(), r.delay)
        });
    if !delay.is_zero() {
        thread::sleep(delay);
    }

    let header = format!(
        "HTTP/1.1 {} Stub\r\n\
         Content-Type: application/octet-stream\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

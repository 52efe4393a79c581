//! Blocking HTTP transport: one `ureq` Agent for connection reuse, plus an in-memory
//! transport for offline use. Responses own their body reader, so dropping a response
//! closes the connection on every exit path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::time::Duration;

use serde::de::DeserializeOwned;

/// Only connection setup is bounded; a body that keeps arriving is never cut off.
const CONNECT_TIMEOUT_MS: u64 = 30_000;
const MAX_IDLE_CONNECTIONS: usize = 4;
const USER_AGENT: &str = concat!("mip/", env!("CARGO_PKG_VERSION"));

/// A GET response: status code plus a readable body stream.
pub struct HttpResponse {
    status: u16,
    body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.body
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, String> {
        serde_json::from_reader(self.body).map_err(|e| e.to_string())
    }
}

/// Anything that can answer a GET. Transport errors (DNS, TLS, reset) are `Err`;
/// any HTTP status, including 4xx/5xx, is an `Ok` response.
pub trait HttpTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, String>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        (**self).get(url)
    }
}

/// HTTP client over a single Agent (connection reuse across files of one install).
pub struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::with_connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
    }

    pub fn with_connect_timeout(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .max_idle_connections(MAX_IDLE_CONNECTIONS)
            .user_agent(USER_AGENT)
            .build();
        Self { agent }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for HttpClient {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        match self.agent.get(url).call() {
            Ok(resp) => {
                let status = resp.status();
                Ok(HttpResponse::new(status, resp.into_reader()))
            }
            Err(ureq::Error::Status(code, resp)) => Ok(HttpResponse::new(code, resp.into_reader())),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Serves fixed bodies from memory and records every requested URL.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct MemoryTransport {
    routes: HashMap<String, (u16, Vec<u8>)>,
    requests: RefCell<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 at `url`.
    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.insert(url, 200, body);
        self
    }

    pub fn insert(&mut self, url: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.routes.insert(url.to_string(), (status, body.into()));
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn was_requested(&self, url: &str) -> bool {
        self.requests.borrow().iter().any(|u| u == url)
    }

    pub fn clear_requests(&self) {
        self.requests.borrow_mut().clear();
    }
}

impl HttpTransport for MemoryTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        self.requests.borrow_mut().push(url.to_string());
        match self.routes.get(url) {
            Some((status, body)) => Ok(HttpResponse::new(*status, Cursor::new(body.clone()))),
            None => Ok(HttpResponse::new(404, Cursor::new(Vec::new()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    /// Serve one response whose body trickles out a byte at a time.
    fn slow_server(body: &'static [u8], delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).unwrap();
            for byte in body {
                thread::sleep(delay);
                stream.write_all(&[*byte]).unwrap();
                stream.flush().unwrap();
            }
        });
        format!("http://{}/slow.py", addr)
    }

    #[test]
    fn test_slow_body_outlives_connect_timeout() {
        let body: &'static [u8] = b"print('slow link!')\n";
        let url = slow_server(body, Duration::from_millis(100));
        let client = HttpClient::with_connect_timeout(Duration::from_millis(500));
        let dir = tempfile::tempdir().unwrap();
        let dest = format!("{}/slow.py", dir.path().display());

        let n = crate::download::download_file(&client, &url, &dest, 4).unwrap();
        assert_eq!(n, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[test]
    fn test_memory_transport_routes_and_log() {
        let mut transport = MemoryTransport::new().with("https://x/a", "hello");
        transport.insert("https://x/b", 500, "oops");

        let resp = transport.get("https://x/a").unwrap();
        assert!(resp.is_ok());
        let mut body = String::new();
        resp.into_reader().read_to_string(&mut body).unwrap();
        assert_eq!(body, "hello");

        assert_eq!(transport.get("https://x/b").unwrap().status(), 500);
        assert_eq!(transport.get("https://x/missing").unwrap().status(), 404);
        assert_eq!(
            transport.requests(),
            vec!["https://x/a", "https://x/b", "https://x/missing"]
        );
    }

    #[test]
    fn test_response_json() {
        let resp = HttpResponse::new(200, Cursor::new(br#"{"a": [1, 2]}"#.to_vec()));
        let v: serde_json::Value = resp.json().unwrap();
        assert_eq!(v["a"][1], 2);

        let bad = HttpResponse::new(200, Cursor::new(b"not json".to_vec()));
        assert!(bad.json::<serde_json::Value>().is_err());
    }
}

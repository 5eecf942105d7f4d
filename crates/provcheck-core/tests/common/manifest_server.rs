//! Minimal HTTP/1.1 server that answers canned responses per path for integration tests.
//!
//! Each route is keyed by the request path without its query string. Unknown
//! paths get 404. Every request is recorded so tests can assert on method,
//! target and body.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// What the server does for one route.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond with `status` and `body` after `delay`.
    Respond {
        status: u16,
        body: Vec<u8>,
        delay: Duration,
    },
    /// Read the request, then close the connection without answering.
    Hangup,
}

impl Reply {
    pub fn json(body: impl Into<String>) -> Self {
        Reply::bytes(200, body.into().into_bytes())
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Reply::bytes(status, body.into().into_bytes())
    }

    /// Arbitrary body bytes, not necessarily UTF-8.
    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        Reply::Respond {
            status,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(self, by: Duration) -> Self {
        match self {
            Reply::Respond { status, body, .. } => Reply::Respond {
                status,
                body,
                delay: by,
            },
            Reply::Hangup => Reply::Hangup,
        }
    }
}

/// A manifest body in the server's format.
pub fn manifest_json(hash: &str) -> String {
    format!(
        r#"{{"type":"file","algorithm":"sha256","hash":"{}","producedAt":"2024-05-01T10:00:00Z","uploader":"ci"}}"#,
        hash
    )
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub target: String,
    pub body: Vec<u8>,
}

pub struct ManifestServer {
    base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl ManifestServer {
    /// Base URL without trailing slash, e.g. "http://127.0.0.1:12345".
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, target: &str) -> String {
        format!("{}{}", self.base_url, target)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// Starts a server in a background thread. The server runs until the process exits.
pub fn start(routes: Vec<(&str, Reply)>) -> ManifestServer {
    let routes: Arc<HashMap<String, Reply>> = Arc::new(
        routes
            .into_iter()
            .map(|(path, reply)| (path.to_string(), reply))
            .collect(),
    );
    let requests = Arc::new(Mutex::new(Vec::new()));
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    {
        let requests = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                let requests = Arc::clone(&requests);
                thread::spawn(move || handle(stream, &routes, &requests));
            }
        });
    }
    ManifestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        requests,
    }
}

/// A URL on a port nothing listens on.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

fn handle(
    mut stream: TcpStream,
    routes: &HashMap<String, Reply>,
    requests: &Mutex<Vec<Recorded>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let recorded = match read_request(&mut stream) {
        Some(r) => r,
        None => return,
    };
    let path = recorded
        .target
        .split('?')
        .next()
        .unwrap_or("")
        .to_string();
    requests.lock().unwrap().push(recorded);

    match routes.get(&path) {
        Some(Reply::Hangup) => {}
        Some(Reply::Respond {
            status,
            body,
            delay,
        }) => {
            if !delay.is_zero() {
                thread::sleep(*delay);
            }
            write_response(&mut stream, *status, body);
        }
        None => write_response(&mut stream, 404, b""),
    }
}

fn write_response(stream: &mut TcpStream, status: u16, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// Reads the request line, headers, and a Content-Length body.
fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };
    let head = std::str::from_utf8(&buf[..header_end]).ok()?.to_string();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let target = first.next()?.to_string();

    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some(Recorded {
        method,
        target,
        body,
    })
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

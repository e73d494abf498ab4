//! Purpose: Loopback HTTP/1.1 stub server shared by integration tests.
//! Exports: `StubServer`, `StubResponse`, `RecordedRequest`.
//! Role: Serves canned responses and records what the client sent.
//! Invariants: Binds 127.0.0.1 on an ephemeral port; one response per connection.
//! Invariants: Waits on recorded requests are bounded.
#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

pub const V1_HEADER: (&str, &str) = ("X-NSQ-Content-Type", "nsq; version=1.0");

#[derive(Clone, Debug)]
pub struct StubResponse {
    status: u16,
    reason: &'static str,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl StubResponse {
    pub fn ok(body: &str) -> Self {
        Self::status(200, "OK", body)
    }

    /// A 200 that negotiated the raw v1 format.
    pub fn v1(body: &str) -> Self {
        Self::ok(body).with_header(V1_HEADER.0, V1_HEADER.1)
    }

    pub fn status(status: u16, reason: &'static str, body: &str) -> Self {
        Self {
            status,
            reason,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn write_to(&self, stream: &mut TcpStream) -> std::io::Result<()> {
        stream.write_all(self.head().as_bytes())?;
        stream.write_all(&self.body)?;
        stream.flush()
    }

    fn write_trickled(
        &self,
        stream: &mut TcpStream,
        chunk: usize,
        interval: Duration,
    ) -> std::io::Result<()> {
        stream.write_all(self.head().as_bytes())?;
        stream.flush()?;
        for piece in self.body.chunks(chunk) {
            thread::sleep(interval);
            stream.write_all(piece)?;
            stream.flush()?;
        }
        Ok(())
    }

    fn head(&self) -> String {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Connection: close\r\n\r\n");
        head
    }
}

#[derive(Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub struct StubServer {
    base_url: String,
    requests: mpsc::Receiver<RecordedRequest>,
}

impl StubServer {
    /// Answers every connection with `response`.
    pub fn serve(response: StubResponse) -> TestResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else {
                    continue;
                };
                let Ok(request) = read_request(&mut stream) else {
                    continue;
                };
                let _ = tx.send(request);
                let _ = response.write_to(&mut stream);
            }
        });
        Ok(Self {
            base_url,
            requests: rx,
        })
    }

    /// Accepts connections but never writes a byte; each is held open for `hold`.
    pub fn silent(hold: Duration) -> TestResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let (_tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    continue;
                };
                thread::spawn(move || {
                    thread::sleep(hold);
                    drop(stream);
                });
            }
        });
        Ok(Self {
            base_url,
            requests: rx,
        })
    }

    /// Sends the head at once, then `body` in `chunk`-byte pieces spaced by `interval`.
    pub fn trickle(response: StubResponse, chunk: usize, interval: Duration) -> TestResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else {
                    continue;
                };
                let Ok(request) = read_request(&mut stream) else {
                    continue;
                };
                let _ = tx.send(request);
                let response = response.clone();
                thread::spawn(move || {
                    let _ = response.write_trickled(&mut stream, chunk.max(1), interval);
                });
            }
        });
        Ok(Self {
            base_url,
            requests: rx,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `host:port` without a scheme.
    pub fn address(&self) -> &str {
        self.base_url.trim_start_matches("http://")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn next_request(&self) -> TestResult<RecordedRequest> {
        Ok(self.requests.recv_timeout(Duration::from_secs(5))?)
    }
}

/// Returns a loopback URL whose port has no listener.
pub fn refused_url(path: &str) -> TestResult<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}{path}"))
}

fn read_request(stream: &mut TcpStream) -> std::io::Result<RecordedRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    Ok(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

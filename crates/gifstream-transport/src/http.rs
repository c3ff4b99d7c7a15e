use std::collections::BTreeMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Result, TransportError};
use crate::traits::{ChunkSink, Completion, Progress, TransferId, TransferOutcome, TransportEngine};

/// Scheme handled by [`HttpTransport`].
pub const HTTP_SCHEME: &str = "http://";

/// Upper bound on the response head before the transfer is failed.
const MAX_HEAD_LEN: usize = 16 * 1024;

/// Longest nap taken by an idle step.
const IDLE_NAP: Duration = Duration::from_millis(5);

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout for each connect attempt and for sending the request.
    pub connect_timeout: Duration,
    /// Bytes read from each socket per step.
    pub read_chunk: usize,
    /// Value of the `User-Agent` request header.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_chunk: 8192,
            user_agent: format!("gifstream/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_chunk(mut self, read_chunk: usize) -> Self {
        self.read_chunk = read_chunk.max(1);
        self
    }
}

/// A parsed `http://host[:port]/path[?query]` source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTarget {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl HttpTarget {
    /// Parse a plain-HTTP URL. Userinfo and fragments are dropped; the query
    /// string stays on the request path.
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: String| TransportError::InvalidSource {
            source_id: source.to_string(),
            reason,
        };

        let url = Url::parse(source).map_err(|err| invalid(err.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("missing host".into()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port".into()))?;
        let path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };

        Ok(Self {
            host: host.to_string(),
            port,
            path,
        })
    }

    fn authority(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    fn request(&self, user_agent: &str) -> String {
        format!(
            "GET {} HTTP/1.0\r\nHost: {}\r\nUser-Agent: {}\r\nAccept: */*\r\nConnection: close\r\n\r\n",
            self.path,
            self.authority(),
            user_agent
        )
    }
}

enum Phase {
    /// Resolve, connect and request run on a helper thread.
    Connecting(Receiver<Result<TcpStream>>),
    Head(BytesMut),
    Body,
}

struct Connection {
    stream: Option<TcpStream>,
    phase: Phase,
    sink: Arc<dyn ChunkSink>,
    target: HttpTarget,
}

enum Step {
    Delivered(usize),
    Blocked,
    Done(TransferOutcome),
}

/// Minimal HTTP/1.0 client over non-blocking TCP.
///
/// Submit only starts a helper thread that resolves the host, connects and
/// sends the request; the engine's own steps never block on the network.
/// Response bytes are read without blocking on every step. The body is everything after the
/// response head, ending when the server closes the connection.
pub struct HttpTransport {
    config: HttpConfig,
    connections: BTreeMap<TransferId, Connection>,
    next_id: u64,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            config,
            connections: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn step(conn: &mut Connection, buf: &mut [u8]) -> Step {
        let connected = match &conn.phase {
            Phase::Connecting(rx) => Some(rx.try_recv()),
            _ => None,
        };
        match connected {
            Some(Ok(Ok(stream))) => {
                trace!(host = %conn.target.host, "connected");
                conn.stream = Some(stream);
                conn.phase = Phase::Head(BytesMut::new());
            }
            Some(Ok(Err(err))) => {
                return Step::Done(TransferOutcome::Failed(err.to_string()));
            }
            Some(Err(TryRecvError::Empty)) => return Step::Blocked,
            Some(Err(TryRecvError::Disconnected)) => {
                return Step::Done(TransferOutcome::Failed("connect thread exited".into()));
            }
            None => {}
        }

        let Some(stream) = conn.stream.as_mut() else {
            return Step::Blocked;
        };
        let n = match stream.read(buf) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Step::Blocked,
            Err(err) if err.kind() == ErrorKind::Interrupted => return Step::Blocked,
            Err(err) => return Step::Done(TransferOutcome::Failed(err.to_string())),
        };

        match &mut conn.phase {
            Phase::Connecting(_) => Step::Blocked,
            Phase::Body => {
                if n == 0 {
                    return Step::Done(TransferOutcome::Finished);
                }
                conn.sink.deliver(Bytes::copy_from_slice(&buf[..n]));
                Step::Delivered(n)
            }
            Phase::Head(head) => {
                if n == 0 {
                    return Step::Done(TransferOutcome::Failed(
                        "connection closed before response head".into(),
                    ));
                }
                head.extend_from_slice(&buf[..n]);
                let Some(end) = find_head_end(head) else {
                    if head.len() > MAX_HEAD_LEN {
                        return Step::Done(TransferOutcome::Failed(
                            "response head too large".into(),
                        ));
                    }
                    return Step::Delivered(0);
                };

                if let Err(reason) = check_status(&head[..end]) {
                    return Step::Done(TransferOutcome::Failed(reason));
                }
                trace!(host = %conn.target.host, "response head accepted");

                head.advance(end + 4);
                let body = head.split().freeze();
                conn.phase = Phase::Body;
                let delivered = body.len();
                if delivered > 0 {
                    conn.sink.deliver(body);
                }
                Step::Delivered(delivered)
            }
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(HttpConfig::default())
    }
}

/// Resolve, connect and send the request. Runs on the helper thread.
fn open_stream(target: &HttpTarget, timeout: Duration, request: &str) -> Result<TcpStream> {
    let addr = format!("{}:{}", target.host, target.port);
    let connect_err = |source: std::io::Error| TransportError::Connect {
        addr: addr.clone(),
        source,
    };

    let addrs: Vec<SocketAddr> = addr.to_socket_addrs().map_err(connect_err)?.collect();
    let mut last_err = std::io::Error::new(ErrorKind::NotFound, "host resolved to no addresses");
    for resolved in addrs {
        match TcpStream::connect_timeout(&resolved, timeout) {
            Ok(mut stream) => {
                stream.set_write_timeout(Some(timeout))?;
                stream.write_all(request.as_bytes())?;
                stream.set_nonblocking(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = err,
        }
    }
    Err(connect_err(last_err))
}

fn find_head_end(head: &[u8]) -> Option<usize> {
    head.windows(4).position(|w| w == b"\r\n\r\n")
}

fn check_status(head: &[u8]) -> std::result::Result<(), String> {
    let text = String::from_utf8_lossy(head);
    let status_line = text.lines().next().unwrap_or_default();
    let mut parts = status_line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(format!("malformed status line '{status_line}'"));
    }
    let code: u16 = parts
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| format!("malformed status line '{status_line}'"))?;
    if !(200..300).contains(&code) {
        return Err(format!("HTTP status {code}"));
    }
    Ok(())
}

impl TransportEngine for HttpTransport {
    fn submit(&mut self, source: &str, sink: Arc<dyn ChunkSink>) -> Result<TransferId> {
        let target = HttpTarget::parse(source)?;
        let id = TransferId::new(self.next_id);

        let (tx, rx) = mpsc::channel();
        let request = target.request(&self.config.user_agent);
        let timeout = self.config.connect_timeout;
        let remote = target.clone();
        std::thread::Builder::new()
            .name(format!("gifstream-http-{id}"))
            .spawn(move || {
                // The transfer may be gone by now; the stream is then dropped.
                let _ = tx.send(open_stream(&remote, timeout, &request));
            })?;

        self.next_id += 1;
        debug!(%id, host = %target.host, port = target.port, path = %target.path, "http transfer started");

        self.connections.insert(
            id,
            Connection {
                stream: None,
                phase: Phase::Connecting(rx),
                sink,
                target,
            },
        );
        Ok(id)
    }

    fn remove(&mut self, id: TransferId) {
        if let Some(conn) = self.connections.remove(&id) {
            debug!(%id, host = %conn.target.host, "http transfer dropped");
        }
    }

    fn perform(&mut self, timeout: Duration) -> Result<Progress> {
        let mut progress = Progress::default();
        let mut buf = vec![0u8; self.config.read_chunk];

        for (id, conn) in &mut self.connections {
            match Self::step(conn, &mut buf) {
                Step::Delivered(n) => progress.bytes_delivered += n,
                Step::Blocked => {}
                Step::Done(outcome) => {
                    if let TransferOutcome::Failed(reason) = &outcome {
                        warn!(%id, host = %conn.target.host, %reason, "http transfer failed");
                    }
                    conn.sink.complete(outcome.clone());
                    progress.completed.push(Completion { id: *id, outcome });
                }
            }
        }

        for completion in &progress.completed {
            self.connections.remove(&completion.id);
        }
        progress.running = self.connections.len();

        if progress.is_idle() && progress.running > 0 {
            std::thread::sleep(timeout.min(IDLE_NAP));
        }
        Ok(progress)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

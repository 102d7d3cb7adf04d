//! Direct TCP transport.
//!
//! The offerer listens on an ephemeral port and advertises one `host:port`
//! candidate per reachable address. The answerer dials every candidate it
//! learns and proves it holds the offer by sending the offer token as its
//! first frame; the offerer echoes the token back before the channel opens.
//! The first authenticated connection wins. Frames are `u32` big-endian
//! length-prefixed.

use std::net::{IpAddr, Ipv6Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use peerdrop_common::{SignalPayload, TransportError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    description_kind, description_token, ChannelHandle, DataChannel, PeerTransport,
    TransportEvent, TransportFactory,
};

/// Largest frame accepted on the wire.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// How long an inbound connection has to present the token.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Any routable address; used only to pick the outbound interface.
const ROUTE_CHECK_ADDR: &str = "8.8.8.8:80";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// Interface the offerer listens on.
    pub bind_host: String,
    /// Host placed in advertised candidates. Empty advertises the detected
    /// outbound address and loopback.
    pub advertise_host: String,
    pub connect_timeout: Duration,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".into(),
            advertise_host: String::new(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TcpTransportFactory {
    config: Arc<TcpTransportConfig>,
}

impl TcpTransportFactory {
    pub fn new(config: TcpTransportConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl TransportFactory for TcpTransportFactory {
    fn create(&self, events: mpsc::Sender<TransportEvent>) -> Box<dyn PeerTransport> {
        Box::new(TcpTransport {
            config: self.config.clone(),
            events,
            token: None,
            listener: None,
            remote_token: None,
            answered: false,
            pending: Vec::new(),
            opened: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

pub(crate) async fn write_frame<W>(writer: &mut W, data: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if data.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(data.len()));
    }
    writer.write_u32(data.len() as u32).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. `Ok(None)` is a clean end of stream between frames.
pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(len));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

// ---------------------------------------------------------------------------
// Data channel
// ---------------------------------------------------------------------------

struct TcpDataChannel {
    writer: Mutex<OwnedWriteHalf>,
    reader: JoinHandle<()>,
}

#[async_trait]
impl DataChannel for TcpDataChannel {
    async fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, &data).await
    }

    async fn close(&self) {
        let _ = self.writer.lock().await.shutdown().await;
        self.reader.abort();
    }
}

async fn read_loop(mut reader: OwnedReadHalf, events: mpsc::Sender<TransportEvent>) {
    loop {
        let event = match read_frame(&mut reader).await {
            Ok(Some(frame)) => TransportEvent::ChannelMessage(frame),
            Ok(None) => {
                let _ = events.send(TransportEvent::ChannelClosed).await;
                return;
            }
            Err(e) => {
                let _ = events.send(TransportEvent::ChannelError(e.to_string())).await;
                return;
            }
        };
        if events.send(event).await.is_err() {
            return;
        }
    }
}

/// Wrap an authenticated stream and announce it, unless another one won.
async fn open_channel(
    stream: TcpStream,
    events: &mpsc::Sender<TransportEvent>,
    opened: &AtomicBool,
) -> bool {
    if opened.swap(true, Ordering::SeqCst) {
        return false;
    }
    let _ = stream.set_nodelay(true);
    let (read_half, write_half) = stream.into_split();
    let reader = tokio::spawn(read_loop(read_half, events.clone()));
    let channel = ChannelHandle::new(Arc::new(TcpDataChannel {
        writer: Mutex::new(write_half),
        reader,
    }));
    let _ = events.send(TransportEvent::ChannelOpen(channel)).await;
    true
}

// ---------------------------------------------------------------------------
// Offerer: accept side
// ---------------------------------------------------------------------------

async fn accept_loop(
    listener: TcpListener,
    token: String,
    events: mpsc::Sender<TransportEvent>,
    opened: Arc<AtomicBool>,
) {
    loop {
        let (mut stream, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                continue;
            }
        };

        let presented = tokio::time::timeout(HANDSHAKE_TIMEOUT, read_frame(&mut stream)).await;
        match presented {
            Ok(Ok(Some(frame))) if frame == token.as_bytes() => {
                if let Err(e) = write_frame(&mut stream, token.as_bytes()).await {
                    warn!(%addr, error = %e, "Handshake reply failed");
                    continue;
                }
                info!(%addr, "Peer connected");
                open_channel(stream, &events, &opened).await;
                return;
            }
            _ => warn!(%addr, "Rejected connection without a valid token"),
        }
    }
}

// ---------------------------------------------------------------------------
// Answerer: dial side
// ---------------------------------------------------------------------------

async fn dial(
    addr: String,
    token: String,
    timeout: Duration,
    events: mpsc::Sender<TransportEvent>,
    opened: Arc<AtomicBool>,
) {
    let mut stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!(%addr, error = %e, "Candidate unreachable");
            return;
        }
        Err(_) => {
            warn!(%addr, "Candidate timed out");
            return;
        }
    };

    if let Err(e) = write_frame(&mut stream, token.as_bytes()).await {
        warn!(%addr, error = %e, "Handshake failed");
        return;
    }
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, read_frame(&mut stream)).await {
        Ok(Ok(Some(reply))) if reply == token.as_bytes() => {}
        _ => {
            warn!(%addr, "Candidate did not acknowledge the token");
            return;
        }
    }
    if open_channel(stream, &events, &opened).await {
        info!(%addr, "Connected to peer");
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// Hosts to advertise. A configured host is used alone; otherwise the
/// outbound address (if any) is offered first, then loopback.
async fn advertise_hosts(configured: &str) -> Vec<String> {
    if !configured.is_empty() {
        return vec![configured.to_string()];
    }

    let mut hosts = Vec::new();
    match outbound_ip().await {
        Ok(ip) if !ip.is_loopback() && !ip.is_unspecified() => hosts.push(ip.to_string()),
        Ok(_) => {}
        Err(e) => debug!(error = %e, "No outbound address detected"),
    }
    hosts.push("127.0.0.1".to_string());
    hosts
}

/// Address of the interface that routes off-host. Connecting a UDP socket
/// sends no packets.
async fn outbound_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(ROUTE_CHECK_ADDR).await?;
    Ok(socket.local_addr()?.ip())
}

fn candidate_for(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn candidate_addr(candidate: &SignalPayload) -> Result<String, TransportError> {
    candidate
        .get("candidate")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TransportError::Negotiation("candidate has no address".into()))
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

struct TcpTransport {
    config: Arc<TcpTransportConfig>,
    events: mpsc::Sender<TransportEvent>,
    /// Offer token when this side is the offerer.
    token: Option<String>,
    listener: Option<TcpListener>,
    remote_token: Option<String>,
    answered: bool,
    /// Candidates received before the local answer was applied.
    pending: Vec<String>,
    opened: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl TcpTransport {
    fn spawn_dial(&mut self, addr: String) -> Result<(), TransportError> {
        let token = self
            .remote_token
            .clone()
            .ok_or_else(|| TransportError::Negotiation("no remote offer".into()))?;
        debug!(%addr, "Dialing candidate");
        self.tasks.push(tokio::spawn(dial(
            addr,
            token,
            self.config.connect_timeout,
            self.events.clone(),
            self.opened.clone(),
        )));
        Ok(())
    }
}

#[async_trait]
impl PeerTransport for TcpTransport {
    async fn create_offer(&mut self) -> Result<SignalPayload, TransportError> {
        let listener = TcpListener::bind((self.config.bind_host.as_str(), 0)).await?;
        let token = Uuid::new_v4().to_string();
        self.listener = Some(listener);
        self.token = Some(token.clone());
        Ok(serde_json::json!({ "type": "offer", "token": token }))
    }

    async fn create_answer(&mut self) -> Result<SignalPayload, TransportError> {
        let token = self
            .remote_token
            .clone()
            .ok_or_else(|| TransportError::Negotiation("no remote offer".into()))?;
        Ok(serde_json::json!({ "type": "answer", "token": token }))
    }

    async fn set_local_description(&mut self, desc: SignalPayload) -> Result<(), TransportError> {
        match description_kind(&desc) {
            Some("offer") => {
                let token = description_token(&desc)?;
                let listener = self
                    .listener
                    .take()
                    .ok_or_else(|| TransportError::Negotiation("offer was not created here".into()))?;
                let port = listener.local_addr()?.port();
                self.tasks.push(tokio::spawn(accept_loop(
                    listener,
                    token,
                    self.events.clone(),
                    self.opened.clone(),
                )));

                for host in advertise_hosts(&self.config.advertise_host).await {
                    let candidate = candidate_for(&host, port);
                    debug!(%candidate, "Listening for peer");
                    let _ = self
                        .events
                        .send(TransportEvent::LocalCandidate(
                            serde_json::json!({ "candidate": candidate }),
                        ))
                        .await;
                }
                Ok(())
            }
            Some("answer") => {
                self.answered = true;
                for addr in std::mem::take(&mut self.pending) {
                    self.spawn_dial(addr)?;
                }
                Ok(())
            }
            other => Err(TransportError::Negotiation(format!(
                "unexpected description type {other:?}"
            ))),
        }
    }

    async fn set_remote_description(
        &mut self,
        desc: SignalPayload,
    ) -> Result<(), TransportError> {
        let token = description_token(&desc)?;
        match description_kind(&desc) {
            Some("offer") => {
                self.remote_token = Some(token);
                Ok(())
            }
            Some("answer") if self.token.as_deref() == Some(token.as_str()) => Ok(()),
            Some("answer") => Err(TransportError::Negotiation("answer for another offer".into())),
            other => Err(TransportError::Negotiation(format!(
                "unexpected description type {other:?}"
            ))),
        }
    }

    async fn add_remote_candidate(
        &mut self,
        candidate: SignalPayload,
    ) -> Result<(), TransportError> {
        if self.token.is_some() {
            // Offerer only listens.
            return Ok(());
        }
        let addr = candidate_addr(&candidate)?;
        if self.answered {
            self.spawn_dial(addr)
        } else {
            self.pending.push(addr);
            Ok(())
        }
    }

    async fn close(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.listener = None;
        self.pending.clear();
    }
}

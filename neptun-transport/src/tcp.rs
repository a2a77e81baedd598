//! TCP transport

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use neptun_core::{constants::DEFAULT_CONNECT_TIMEOUT, frame, Frame, MAX_FRAME_SIZE};

use crate::{error::*, Transport};

/// TCP transport for Neptun controllers
pub struct TcpTransport {
    addr: String,
    port: u16,
    socket_addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create new TCP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            socket_addr: None,
            stream: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.socket_addr {
            return Ok(addr);
        }

        let addr_str = format!("{}:{}", self.addr, self.port);

        let addr = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))?;

        self.socket_addr = Some(addr);
        Ok(addr)
    }
}

/// Read exactly one frame from `reader`
///
/// Reads the 4-byte prefix first so a NAK (which has no length or checksum)
/// is returned as-is, then the rest of the header, then as many bytes as the
/// header announces. The result is left for [`Frame::decode`] to validate.
pub async fn read_frame<R>(reader: &mut R) -> Result<BytesMut>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(MAX_FRAME_SIZE);

    buf.resize(Frame::PREFIX_SIZE, 0);
    reader.read_exact(&mut buf[..]).await.map_err(read_error)?;

    if let Some(nak) = frame::nak_code(&buf) {
        debug!("Controller sent NAK: {}", nak);
        return Ok(buf);
    }

    buf.resize(Frame::HEADER_SIZE, 0);
    reader
        .read_exact(&mut buf[Frame::PREFIX_SIZE..])
        .await
        .map_err(read_error)?;

    let total = frame::frame_len(&buf)?;
    buf.resize(total, 0);
    reader
        .read_exact(&mut buf[Frame::HEADER_SIZE..])
        .await
        .map_err(read_error)?;

    Ok(buf)
}

fn read_error(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        Error::Io(err)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let addr = self.resolve_addr().await?;

        debug!("Connecting to {}...", addr);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectTimeout(self.connect_timeout))?
            .map_err(|e| match e.kind() {
                io::ErrorKind::ConnectionRefused => Error::ConnectionRefused(addr.to_string()),
                _ => Error::Io(e),
            })?;

        stream.set_nodelay(true)?;

        debug!("Connected to {}", addr);

        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Disconnecting from {}...", self.remote_addr());

            let _ = stream.shutdown().await;
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {}", data.len(), hex::encode_upper(data));

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn receive(&mut self, response_timeout: Duration) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let result = timeout(response_timeout, read_frame(stream))
            .await
            .map_err(|_| Error::Timeout(response_timeout))?;

        match result {
            Ok(buf) => {
                trace!("Received {} bytes: {}", buf.len(), hex::encode_upper(&buf));
                Ok(buf)
            }
            Err(e) => {
                if e.is_connection_fault() {
                    self.stream = None;
                }
                Err(e)
            }
        }
    }

    fn remote_addr(&self) -> String {
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("TCP transport dropped while still connected");
        }
    }
}

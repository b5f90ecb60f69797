//! Connection transports.
//!
//! The engines only ever see an abstract bidirectional byte stream; plain
//! TCP, TLS, and WebSocket are composed below that line by the connector,
//! which resolves the URL scheme of the broker address.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpStream, ToSocketAddrs},
};
use url::Url;

pub mod tls;
pub mod ws;

/// Default MQTT port, used when the address URL does not carry one.
pub const DEFAULT_PORT: u16 = 1883;

/// A bidirectional byte stream a session can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown protocol ({0})")]
    UnknownProtocol(String),
    #[error("invalid address: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("address has no host")]
    MissingHost,
    #[error("tls config is required")]
    MissingTlsConfig,
    #[error("invalid server name ({0})")]
    InvalidServerName(String),
    #[error("invalid websocket origin ({0})")]
    InvalidWsOrigin(String),
    #[error("connect timed out")]
    ConnectTimeout,
    #[error("websocket handshake failed: {0}")]
    Ws(#[from] tungstenite::Error),
    #[error(transparent)]
    Tls(#[from] tls::TlsError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Options consumed while opening a client transport.
#[derive(Clone, Default)]
pub struct ConnectOptions {
    pub connect_timeout: Option<Duration>,
    pub tls: Option<Arc<rustls::ClientConfig>>,
    pub ws_origin: Option<String>,
}

/// Resolve the URL scheme and open a byte stream to the broker.
///
/// Supported schemes: `tcp`, `tls`/`ssl`/`tcps`, `ws`, `wss`.
pub async fn connect(
    url: &Url,
    opts: &ConnectOptions,
) -> Result<(Box<dyn AsyncStream>, SocketAddr), Error> {
    let host = url.host_str().ok_or(Error::MissingHost)?.to_owned();
    let port = url.port().unwrap_or(DEFAULT_PORT);

    match url.scheme() {
        "tcp" => {
            let stream = dial((host.as_str(), port), opts.connect_timeout).await?;
            let peer_addr = stream.peer_addr()?;
            Ok((Box::new(stream), peer_addr))
        }
        "tls" | "ssl" | "tcps" => {
            let stream = dial((host.as_str(), port), opts.connect_timeout).await?;
            let peer_addr = stream.peer_addr()?;
            let stream = tls::client_handshake(stream, &host, opts.tls.clone()).await?;
            Ok((Box::new(stream), peer_addr))
        }
        "ws" | "wss" => ws::connect(url, &host, port, opts).await,
        other => Err(Error::UnknownProtocol(other.to_owned())),
    }
}

pub(crate) async fn dial<A: ToSocketAddrs>(
    addr: A,
    connect_timeout: Option<Duration>,
) -> Result<TcpStream, Error> {
    match connect_timeout {
        Some(timeout) if !timeout.is_zero() => tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectTimeout)?
            .map_err(Error::from),
        _ => TcpStream::connect(addr).await.map_err(Error::from),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let url = Url::parse("gopher://127.0.0.1:1883").unwrap();
        let got = connect(&url, &ConnectOptions::default()).await;
        assert!(matches!(got, Err(Error::UnknownProtocol(scheme)) if scheme == "gopher"));
    }
}

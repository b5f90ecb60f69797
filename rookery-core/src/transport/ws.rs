//! WebSocket transport.
//!
//! MQTT over WebSocket carries whole or partial packets in binary frames
//! under the `mqtt` subprotocol; [`WsByteStream`] flattens the framed
//! connection back into the byte stream the engines expect.

use std::{
    cmp, io,
    net::SocketAddr,
    pin::Pin,
    task::{Context, Poll},
};

use async_tungstenite::tokio::client_async;
use futures::{ready, Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tungstenite::{client::IntoClientRequest, handshake::client::Request, http::HeaderValue, Message};
use url::Url;

use super::{tls, AsyncStream, ConnectOptions, Error};

pub(crate) async fn connect(
    url: &Url,
    host: &str,
    port: u16,
    opts: &ConnectOptions,
) -> Result<(Box<dyn AsyncStream>, SocketAddr), Error> {
    let stream = super::dial((host, port), opts.connect_timeout).await?;
    let peer_addr = stream.peer_addr()?;
    let request = build_request(url, opts)?;

    if url.scheme() == "wss" {
        let stream = tls::client_handshake(stream, host, opts.tls.clone()).await?;
        let (ws, _) = client_async(request, stream).await?;
        Ok((Box::new(WsByteStream::new(ws)), peer_addr))
    } else {
        let (ws, _) = client_async(request, stream).await?;
        Ok((Box::new(WsByteStream::new(ws)), peer_addr))
    }
}

fn build_request(url: &Url, opts: &ConnectOptions) -> Result<Request, Error> {
    let origin = match &opts.ws_origin {
        Some(origin) => origin.clone(),
        None => derive_origin(url),
    };

    let mut request = url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(
        "Origin",
        HeaderValue::from_str(&origin).map_err(|_| Error::InvalidWsOrigin(origin.clone()))?,
    );
    // see: [MQTT-6.0.0-3]
    headers.insert("Sec-WebSocket-Protocol", HeaderValue::from_static("mqtt"));
    Ok(request)
}

/// Derive the Origin header from the broker address: the scheme maps to
/// http/https, user and host parts are kept, everything else is dropped.
fn derive_origin(url: &Url) -> String {
    let scheme = if url.scheme() == "wss" { "https" } else { "http" };
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{scheme}://{host}:{port}"),
        (Some(host), None) => format!("{scheme}://{host}"),
        _ => format!("{scheme}://"),
    }
}

enum ReadState {
    Pending,
    Ready { data: Vec<u8>, amt_read: usize },
    Terminated,
}

enum WriteState {
    Ready,
    Closed,
}

pin_project! {
    /// Byte-stream view of a WebSocket connection: binary frames in, binary
    /// frames out, everything else skipped.
    pub struct WsByteStream<S> {
        #[pin]
        inner: S,
        read: ReadState,
        write: WriteState,
    }
}

impl<S> WsByteStream<S>
where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            read: ReadState::Pending,
            write: WriteState::Ready,
        }
    }

    fn poll_next_binary_msg(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<io::Result<()>>> {
        let mut this = self.project();
        loop {
            let Some(res) = ready!(this.inner.as_mut().poll_next(cx)) else {
                *this.read = ReadState::Terminated;
                return Poll::Ready(None);
            };
            match res {
                Ok(Message::Binary(data)) => {
                    *this.read = ReadState::Ready { data, amt_read: 0 };
                    return Poll::Ready(Some(Ok(())));
                }
                Ok(Message::Close(_)) => {
                    *this.read = ReadState::Terminated;
                    return Poll::Ready(None);
                }
                Ok(_) => continue,
                Err(e) => {
                    let (state, res) = map_ws_error(e);
                    if let Some(state) = state {
                        *this.read = state;
                    }
                    return Poll::Ready(res.err().map(Err));
                }
            }
        }
    }
}

/// Translate a tungstenite error into an optional terminal read state plus
/// the io-level outcome.
fn map_ws_error(e: tungstenite::Error) -> (Option<ReadState>, io::Result<()>) {
    match e {
        tungstenite::Error::Io(e) => (None, Err(e)),
        tungstenite::Error::ConnectionClosed => (Some(ReadState::Terminated), Ok(())),
        tungstenite::Error::AlreadyClosed => (
            Some(ReadState::Terminated),
            Err(io::Error::new(io::ErrorKind::NotConnected, "already closed")),
        ),
        err => (None, Err(io::Error::other(err))),
    }
}

impl<S> AsyncRead for WsByteStream<S>
where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let this = self.as_mut().project();
            match this.read {
                ReadState::Pending => match ready!(self.as_mut().poll_next_binary_msg(cx)) {
                    Some(Ok(())) => continue,
                    Some(Err(e)) => return Poll::Ready(Err(e)),
                    None => continue,
                },
                ReadState::Ready { data, amt_read } => {
                    let data_in = &data[*amt_read..];
                    let len = cmp::min(buf.remaining(), data_in.len());
                    buf.put_slice(&data_in[..len]);
                    if len == data_in.len() {
                        *this.read = ReadState::Pending;
                    } else {
                        *amt_read += len;
                    }
                    return Poll::Ready(Ok(()));
                }
                // zero-byte read, i.e. EOF
                ReadState::Terminated => return Poll::Ready(Ok(())),
            }
        }
    }
}

impl<S> AsyncWrite for WsByteStream<S>
where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, io::Error>> {
        let mut this = self.project();
        match this.write {
            WriteState::Ready => {
                if let Err(e) = ready!(this.inner.as_mut().poll_ready(cx)) {
                    return Poll::Ready(write_error(this.write, e).map(|()| 0));
                }
                match this.inner.as_mut().start_send(Message::Binary(buf.into())) {
                    Ok(()) => Poll::Ready(Ok(buf.len())),
                    Err(e) => Poll::Ready(write_error(this.write, e).map(|()| 0)),
                }
            }
            WriteState::Closed => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "already closed",
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        let mut this = self.project();
        if let Err(e) = ready!(this.inner.as_mut().poll_flush(cx)) {
            return Poll::Ready(write_error(this.write, e));
        }
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        let mut this = self.project();
        *this.write = WriteState::Closed;
        match ready!(this.inner.as_mut().poll_close(cx)) {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Poll::Ready(Ok(())),
            Err(tungstenite::Error::Io(e)) => Poll::Ready(Err(e)),
            Err(tungstenite::Error::AlreadyClosed) => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "already closed",
            ))),
            Err(err) => Poll::Ready(Err(io::Error::other(err))),
        }
    }
}

fn write_error(state: &mut WriteState, e: tungstenite::Error) -> io::Result<()> {
    match e {
        tungstenite::Error::Io(e) => Err(e),
        tungstenite::Error::ConnectionClosed => {
            *state = WriteState::Closed;
            Ok(())
        }
        tungstenite::Error::AlreadyClosed => {
            *state = WriteState::Closed;
            Err(io::Error::new(io::ErrorKind::NotConnected, "already closed"))
        }
        err => Err(io::Error::other(err)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn origin_derivation() {
        let url = Url::parse("ws://broker.example:8083/mqtt").unwrap();
        assert_eq!(derive_origin(&url), "http://broker.example:8083");

        let url = Url::parse("wss://broker.example").unwrap();
        assert_eq!(derive_origin(&url), "https://broker.example");
    }
}

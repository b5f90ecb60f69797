//! MQTT broker engine.
//!
//! The server owns the listener and the per-connection loops; application
//! policy lives behind the [`Adapter`] traits. A minimal broker:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rookery_core::server::{NullAdapter, Server, ServerOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(Arc::new(NullAdapter), ServerOptions::default()).await?;
//!     server.serve().await?;
//!     Ok(())
//! }
//! ```

use std::{
    collections::HashMap,
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use url::Url;

pub use self::{
    adapter::{Adapter, ClientAdapter, NullAdapter, NullClientAdapter, PacketFilter,
        SubscribeTopic},
    client::ClientHandle,
    error::{AdapterError, ConnectError, Error},
    options::{ServerOptions, TlsConfig, DEFAULT_ADDR},
};
pub use crate::Message;

use crate::{
    backoff::Exp,
    transport::{self, tls::rustls_acceptor},
};

pub mod adapter;
pub mod client;
pub mod error;
pub mod options;

/// An MQTT broker bound to its listen address.
pub struct Server {
    inner: Arc<ServerInner>,
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
}

pub(crate) struct ServerInner {
    pub(crate) adapter: Arc<dyn Adapter>,
    pub(crate) options: ServerOptions,
    conns: Mutex<HashMap<u64, Arc<ClientHandle>>>,
    next_conn_id: AtomicU64,
    quit: CancellationToken,
    tracker: TaskTracker,
}

impl Server {
    /// Bind the listener named by the options' address URL.
    pub async fn bind(adapter: Arc<dyn Adapter>, options: ServerOptions) -> Result<Server, Error> {
        let url = Url::parse(options.addr()).map_err(transport::Error::from)?;
        let host = url.host_str().ok_or(transport::Error::MissingHost)?.to_owned();
        let port = url.port().unwrap_or(transport::DEFAULT_PORT);

        let acceptor = match url.scheme() {
            "tcp" => None,
            "tls" | "ssl" | "tcps" => {
                let tls = options.tls.as_ref().ok_or(transport::Error::MissingTlsConfig)?;
                Some(rustls_acceptor(tls)?)
            }
            other => return Err(transport::Error::UnknownProtocol(other.to_owned()).into()),
        };

        let listener = TcpListener::bind((host.as_str(), port)).await?;
        Ok(Server {
            inner: Arc::new(ServerInner {
                adapter,
                options,
                conns: Mutex::new(HashMap::new()),
                next_conn_id: AtomicU64::new(1),
                quit: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
            listener,
            acceptor,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the server is closed or the listener fails.
    /// Transient accept errors are retried with exponential backoff.
    pub async fn serve(&self) -> Result<(), Error> {
        let mut delay = Exp::with_min(Duration::from_millis(5));
        loop {
            tokio::select! {
                _ = self.inner.quit.cancelled() => return Ok(()),
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        delay.reset();
                        self.spawn_client(stream, addr);
                    }
                    Err(err) if is_transient_accept(&err) => {
                        log::warn!("accept failed: {err}");
                        delay.wait().await;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }

    fn spawn_client(&self, stream: TcpStream, addr: SocketAddr) {
        let inner = self.inner.clone();
        match &self.acceptor {
            None => {
                self.inner.tracker.spawn(async move {
                    client::serve_client(stream, addr, inner).await;
                });
            }
            Some(acceptor) => {
                let acceptor = acceptor.clone();
                self.inner.tracker.spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(stream) => client::serve_client(stream, addr, inner).await,
                        Err(err) => log::warn!("accept tls stream failed: {err}"),
                    }
                });
            }
        }
    }

    /// Shut the server down: stop accepting, terminate every live client,
    /// and wait for their tasks to finish.
    pub async fn close(&self) {
        self.inner.quit.cancel();
        let conns: Vec<Arc<ClientHandle>> = {
            let mut conns = self.inner.lock_conns();
            conns.drain().map(|(_, handle)| handle).collect()
        };
        for handle in conns {
            handle.terminate();
        }
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }
}

impl ServerInner {
    pub(crate) fn register(&self, handle: Arc<ClientHandle>) -> u64 {
        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        self.lock_conns().insert(id, handle);
        id
    }

    pub(crate) fn unregister(&self, id: u64) {
        self.lock_conns().remove(&id);
    }

    fn lock_conns(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<ClientHandle>>> {
        self.conns.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_transient_accept(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

//! TLS plumbing for both sides of a connection.
//!
//! The broker builds its acceptor from PEM files named in [`TlsConfig`];
//! the client hands the connector an already-built `rustls::ClientConfig`.

use std::{fs::File, io::BufReader, path::PathBuf, sync::Arc};

use rustls::{pki_types::ServerName, server::WebPkiClientVerifier, RootCertStore};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{
    client,
    rustls::{ClientConfig, Error as RustlsError, ServerConfig},
    TlsAcceptor, TlsConnector,
};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TlsConfig {
    pub ca_file: Option<PathBuf>,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub fail_if_no_peer_cert: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("I/O {0}")]
    Io(#[from] std::io::Error),
    #[error("Rustls error {0}")]
    Rustls(#[from] RustlsError),
    #[error("Invalid CA cert file {0}")]
    InvalidCACert(String),
    #[error("Invalid server key file {0}")]
    InvalidServerKey(String),
}

pub fn rustls_server_config(cfg: &TlsConfig) -> Result<ServerConfig, TlsError> {
    let cert_file = &mut BufReader::new(File::open(&cfg.cert_file)?);
    let key_file = &mut BufReader::new(File::open(&cfg.key_file)?);

    let cert_chain = rustls_pemfile::certs(cert_file).collect::<Result<Vec<_>, _>>()?;
    let key = rustls_pemfile::private_key(key_file)?
        .ok_or(TlsError::InvalidServerKey("invalid server key".to_string()))?;

    let client_auth = if cfg.fail_if_no_peer_cert {
        match &cfg.ca_file {
            Some(ca) => {
                let ca_file = &mut BufReader::new(File::open(ca)?);
                let cert_chain = rustls_pemfile::certs(ca_file).collect::<Result<Vec<_>, _>>()?;
                let mut client_auth_roots = RootCertStore::empty();
                for root in cert_chain {
                    client_auth_roots
                        .add(root)
                        .map_err(|e| TlsError::InvalidCACert(e.to_string()))?;
                }
                WebPkiClientVerifier::builder(client_auth_roots.into())
                    .build()
                    .map_err(|e| TlsError::InvalidCACert(e.to_string()))?
            }
            None => return Err(TlsError::InvalidCACert("empty ca".to_string())),
        }
    } else {
        WebPkiClientVerifier::no_client_auth()
    };

    ServerConfig::builder()
        .with_client_cert_verifier(client_auth)
        .with_single_cert(cert_chain, key)
        .map_err(|e| TlsError::InvalidCACert(e.to_string()))
}

pub fn rustls_acceptor(cfg: &TlsConfig) -> Result<TlsAcceptor, TlsError> {
    Ok(TlsAcceptor::from(Arc::new(rustls_server_config(cfg)?)))
}

pub(crate) async fn client_handshake<S>(
    stream: S,
    host: &str,
    config: Option<Arc<ClientConfig>>,
) -> Result<client::TlsStream<S>, super::Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let config = config.ok_or(super::Error::MissingTlsConfig)?;
    let server_name = ServerName::try_from(host.to_owned())
        .map_err(|_| super::Error::InvalidServerName(host.to_owned()))?;
    let connector = TlsConnector::from(config);
    connector
        .connect(server_name, stream)
        .await
        .map_err(super::Error::from)
}

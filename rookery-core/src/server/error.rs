use std::io;

use mqtt3_codec::{common::ConnectReturnCode, packet::VariablePacketError};

use crate::transport;

/// Connection refusals an adapter can answer from its connect hook. Each
/// maps onto the CONNACK return code sent back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("unacceptable protocol version")]
    UnacceptableProtocolVersion,
    #[error("identifier rejected")]
    IdentifierRejected,
    #[error("server unavailable")]
    ServerUnavailable,
    #[error("bad user name or password")]
    BadUserNameOrPassword,
    #[error("not authorized")]
    NotAuthorized,
}

impl ConnectError {
    pub(crate) fn return_code(self) -> ConnectReturnCode {
        match self {
            ConnectError::UnacceptableProtocolVersion => {
                ConnectReturnCode::UnacceptableProtocolVersion
            }
            ConnectError::IdentifierRejected => ConnectReturnCode::IdentifierRejected,
            ConnectError::ServerUnavailable => ConnectReturnCode::ServiceUnavailable,
            ConnectError::BadUserNameOrPassword => ConnectReturnCode::BadUserNameOrPassword,
            ConnectError::NotAuthorized => ConnectReturnCode::NotAuthorized,
        }
    }
}

/// Errors returned by adapter hooks. Continuable errors are logged and the
/// connection proceeds; `Disconnected` ends the session cleanly; everything
/// else terminates it.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("disconnected")]
    Disconnected,
    #[error("not supported yet")]
    NotSupported,
    #[error("not acceptable packet")]
    NotAcceptable,
    #[error("{0}")]
    Continuable(String),
    #[error("{0}")]
    Fatal(String),
}

impl AdapterError {
    pub fn continuable(&self) -> bool {
        matches!(self, AdapterError::Continuable(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("server have been closed")]
    ServerClosed,
    #[error("invalid connect packet")]
    InvalidConnectPacket,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("unsupported QoS")]
    UnsupportedQos,
    #[error("send queue unavailable")]
    SendQueue,
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Transport(#[from] transport::Error),
    #[error(transparent)]
    Tls(#[from] transport::tls::TlsError),
    #[error(transparent)]
    Packet(#[from] VariablePacketError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

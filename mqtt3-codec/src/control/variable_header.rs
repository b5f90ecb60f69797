//! Variable header in MQTT

use std::{io, string::FromUtf8Error};

use crate::common::{
    connect_ret_code::ConnectReturnCodeError, protocol_level::ProtocolLevelError,
};

/// Errors while decoding variable header
#[derive(Debug, thiserror::Error)]
pub enum VariableHeaderError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error("invalid reserved flags")]
    InvalidReservedFlag,
    #[error(transparent)]
    FromUtf8Error(#[from] FromUtf8Error),
    #[error(transparent)]
    InvalidProtocolLevel(#[from] ProtocolLevelError),
    #[error(transparent)]
    InvalidConnectReturnCode(#[from] ConnectReturnCodeError),
}

use std::io;

use mqtt3_codec::{
    common::{ConnectReturnCode, QualityOfService},
    packet::{suback::SubscribeReturnCode, VariablePacketError},
};

use crate::{transport, waitop::WaitOpError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Disconnect() was called.
    #[error("disconnected explicitly")]
    Explicit,
    #[error("detect timeout")]
    Timeout,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("connection terminated")]
    Terminated,
    #[error("operation already in progress")]
    AlreadyInProgress,
    #[error("operation not started")]
    NotStarted,
    #[error("connect rejected: {0}")]
    ConnectRejected(ConnectReturnCode),
    #[error("unexpected packet ({0})")]
    UnexpectedPacket(String),
    #[error("unsupported QoS")]
    UnsupportedQos,
    #[error("at least one topic is required")]
    EmptyTopics,
    #[error(transparent)]
    Subscribe(#[from] SubscribeError),
    #[error(transparent)]
    Unsubscribe(#[from] UnsubscribeError),
    #[error(transparent)]
    Transport(#[from] transport::Error),
    #[error(transparent)]
    Packet(#[from] VariablePacketError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<WaitOpError> for Error {
    fn from(err: WaitOpError) -> Self {
        match err {
            WaitOpError::AlreadyDoing => Error::AlreadyInProgress,
            WaitOpError::Terminated => Error::Terminated,
            WaitOpError::NotStarted => Error::NotStarted,
        }
    }
}

/// Detailed error for `subscribe`. Carries the full requested and received
/// vectors so callers can see exactly which grant went wrong.
#[derive(Debug, thiserror::Error)]
#[error(
    "subscribe result mismatch (packet id mismatch: {mismatch_packet_id}, \
     result count mismatch: {mismatch_result_count}, results: {result:?})"
)]
pub struct SubscribeError {
    pub mismatch_packet_id: bool,
    pub mismatch_result_count: bool,
    pub requested: Vec<QualityOfService>,
    pub result: Vec<SubscribeReturnCode>,
}

impl SubscribeError {
    pub(crate) fn has_errors(&self) -> bool {
        if self.mismatch_packet_id || self.mismatch_result_count {
            return true;
        }
        self.result
            .iter()
            .zip(self.requested.iter())
            .any(|(granted, requested)| {
                *granted == SubscribeReturnCode::Failure
                    || *granted != SubscribeReturnCode::from(*requested)
            })
    }
}

/// Detailed error for `unsubscribe`.
#[derive(Debug, thiserror::Error)]
#[error("mismatch packet ID")]
pub struct UnsubscribeError {
    pub mismatch_packet_id: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn granted_qos_must_match_request() {
        let err = SubscribeError {
            mismatch_packet_id: false,
            mismatch_result_count: false,
            requested: vec![QualityOfService::Level0, QualityOfService::Level1],
            result: vec![
                SubscribeReturnCode::MaximumQoSLevel0,
                SubscribeReturnCode::MaximumQoSLevel1,
            ],
        };
        assert!(!err.has_errors());

        let err = SubscribeError {
            mismatch_packet_id: false,
            mismatch_result_count: false,
            requested: vec![QualityOfService::Level1],
            result: vec![SubscribeReturnCode::MaximumQoSLevel0],
        };
        assert!(err.has_errors());

        let err = SubscribeError {
            mismatch_packet_id: false,
            mismatch_result_count: false,
            requested: vec![QualityOfService::Level0],
            result: vec![SubscribeReturnCode::Failure],
        };
        assert!(err.has_errors());
    }
}

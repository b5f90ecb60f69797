//! Application policy hooks.
//!
//! The broker engine owns connections and loops; everything that amounts to
//! policy — accepting sessions, granting subscriptions, reacting to
//! published messages — is delegated to an [`Adapter`] and the per-session
//! [`ClientAdapter`] objects it hands out.

use std::sync::Arc;

use mqtt3_codec::{
    common::QualityOfService,
    packet::{suback::SubscribeReturnCode, ConnectPacket, VariablePacket},
};

use super::{
    client::ClientHandle,
    error::{AdapterError, ConnectError, Error},
};
use crate::Message;

/// A topic filter a client asked to subscribe, with its requested QoS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeTopic {
    pub filter: String,
    pub qos: QualityOfService,
}

/// Broker-wide policy object.
pub trait Adapter: Send + Sync {
    /// Called when a new client tries to connect. The handle stays valid
    /// for the lifetime of the session and may be retained to push
    /// messages to this client.
    fn connect(
        &self,
        client: &Arc<ClientHandle>,
        packet: &ConnectPacket,
    ) -> Result<Box<dyn ClientAdapter>, ConnectError>;

    /// Called after the session has been removed from the server registry.
    /// `err` is `None` for a clean disconnect.
    fn disconnect(&self, session: &dyn ClientAdapter, err: Option<&Error>);
}

/// Per-session policy object.
pub trait ClientAdapter: Send + Sync {
    /// Client ID from the CONNECT packet.
    fn id(&self) -> &str;

    /// True if previous session state was resumed; reflected in the
    /// session-present flag of the CONNACK.
    fn is_session_present(&self) -> bool {
        false
    }

    /// Called when a DISCONNECT packet arrives.
    fn on_disconnect(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Called when a PINGREQ arrives. Returning `false` suppresses the
    /// PINGRESP.
    fn on_ping(&self) -> Result<bool, AdapterError> {
        Ok(true)
    }

    /// Decide the granted QoS for each requested topic. Returning fewer
    /// entries than requested marks the remaining topics as failed.
    fn on_subscribe(&self, topics: &[SubscribeTopic])
        -> Result<Vec<SubscribeReturnCode>, AdapterError>;

    fn on_unsubscribe(&self, _filters: &[String]) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Called for each inbound PUBLISH.
    fn on_publish(&self, message: &Message) -> Result<(), AdapterError>;

    /// Optional packet filter run on the connection's loops. Must not
    /// block.
    fn packet_filter(&self) -> Option<&dyn PacketFilter> {
        None
    }
}

/// Observes inbound packets and may rewrite outbound datagrams.
pub trait PacketFilter: Send + Sync {
    /// Sees every inbound packet before it is dispatched.
    fn pre_process(&self, _packet: &VariablePacket) -> Result<(), AdapterError> {
        Ok(())
    }

    /// May rewrite the encoded datagram before it is written out.
    fn pre_send(
        &self,
        _packet: &VariablePacket,
        datagram: Vec<u8>,
    ) -> Result<Vec<u8>, AdapterError> {
        Ok(datagram)
    }

    /// Sees the datagram that was written.
    fn post_send(&self, _packet: &VariablePacket, _datagram: &[u8]) {}
}

/// Accept-everything adapter, used when no policy is needed.
pub struct NullAdapter;

impl Adapter for NullAdapter {
    fn connect(
        &self,
        _client: &Arc<ClientHandle>,
        packet: &ConnectPacket,
    ) -> Result<Box<dyn ClientAdapter>, ConnectError> {
        Ok(Box::new(NullClientAdapter {
            client_id: packet.client_identifier().to_owned(),
            session_present: false,
        }))
    }

    fn disconnect(&self, _session: &dyn ClientAdapter, _err: Option<&Error>) {}
}

/// Session adapter that grants every request.
pub struct NullClientAdapter {
    pub client_id: String,
    pub session_present: bool,
}

impl ClientAdapter for NullClientAdapter {
    fn id(&self) -> &str {
        &self.client_id
    }

    fn is_session_present(&self) -> bool {
        self.session_present
    }

    fn on_subscribe(
        &self,
        topics: &[SubscribeTopic],
    ) -> Result<Vec<SubscribeReturnCode>, AdapterError> {
        Ok(topics.iter().map(|topic| topic.qos.into()).collect())
    }

    fn on_publish(&self, _message: &Message) -> Result<(), AdapterError> {
        Ok(())
    }
}

use std::{sync::Arc, time::Duration};

use mqtt3_codec::{
    common::QualityOfService,
    packet::{ConnectPacket, LastWill},
};

use super::error::Error;
use crate::Message;

/// Default broker address when [`Param::addr`] is empty.
pub const DEFAULT_ADDR: &str = "tcp://127.0.0.1:1883";

/// Called with each received message, serialized per connection.
pub type PublishedFn = Arc<dyn Fn(Message) + Send + Sync>;

/// Called once when the connection is lost, with the reason and the
/// parameters the session was opened with.
pub type DisconnectedFn = Arc<dyn Fn(&Error, &Param) + Send + Sync>;

/// Connection parameters for an MQTT client.
#[derive(Clone, Default)]
pub struct Param {
    /// URL to connect like `tcp://192.168.0.1:1883`.
    pub addr: String,

    /// MQTT client ID.
    pub id: String,

    /// Called when a PUBLISH message arrives. When omitted, received
    /// messages are stored into the inbound buffer for `read`.
    pub on_publish: Option<PublishedFn>,

    /// Called when the connection is disconnected.
    pub on_disconnect: Option<DisconnectedFn>,

    /// Option parameters for connection.
    pub options: Option<Options>,
}

impl Param {
    pub(crate) fn addr(&self) -> &str {
        if self.addr.is_empty() {
            DEFAULT_ADDR
        } else {
            &self.addr
        }
    }

    pub(crate) fn options(&self) -> Options {
        self.options.clone().unwrap_or_default()
    }
}

/// Connect options.
#[derive(Clone)]
pub struct Options {
    /// MQTT protocol version, 3 or 4 (anything else falls back to 4).
    pub version: u8,
    pub username: Option<String>,
    pub password: Option<String>,
    pub clean_session: bool,
    /// Keep alive interval in seconds; 0 disables keep alive entirely.
    pub keep_alive: u16,
    pub will: Option<Will>,

    /// Disables the automatic ping used to keep the session alive.
    pub disable_auto_keep_alive: bool,

    pub connect_timeout: Option<Duration>,
    pub tls: Option<Arc<rustls::ClientConfig>>,

    /// Overrides the Origin header sent on WebSocket handshakes.
    pub ws_origin: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            version: 4,
            username: None,
            password: None,
            clean_session: true,
            keep_alive: 30,
            will: None,
            disable_auto_keep_alive: false,
            connect_timeout: None,
            tls: None,
            ws_origin: None,
        }
    }
}

impl Options {
    fn version(&self) -> u8 {
        match self.version {
            3 => 3,
            _ => 4,
        }
    }

    pub(crate) fn connect_packet(&self, id: &str) -> ConnectPacket {
        let mut packet = ConnectPacket::with_version(id, self.version());
        packet.set_clean_session(self.clean_session);
        packet.set_keep_alive(self.keep_alive);
        packet.set_username(self.username.clone());
        packet.set_password(self.password.clone());
        if let Some(will) = &self.will {
            let mut last_will = LastWill::new(will.topic.clone(), will.message.clone().into_bytes());
            last_will.set_qos(will.qos);
            last_will.set_retain(will.retain);
            packet.set_will(Some(last_will));
        }
        packet
    }

    /// The pinger period: half a second ahead of the advertised keep alive,
    /// unless the interval itself is that small.
    pub(crate) fn keep_alive_interval(&self) -> Duration {
        const FASTER: Duration = Duration::from_millis(500);
        let interval = Duration::from_secs(self.keep_alive as u64);
        if interval <= FASTER {
            interval
        } else {
            interval - FASTER
        }
    }
}

/// An MQTT will message.
#[derive(Debug, Clone)]
pub struct Will {
    pub qos: QualityOfService,
    pub retain: bool,
    pub topic: String,
    pub message: String,
}

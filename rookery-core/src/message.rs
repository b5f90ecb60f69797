use mqtt3_codec::{common::QualityOfService, packet::PublishPacket};

/// An application-level message carried by a PUBLISH packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub dup: bool,
    pub qos: QualityOfService,
    pub retain: bool,
    pub topic: String,
    pub body: Vec<u8>,
}

impl From<&PublishPacket> for Message {
    fn from(packet: &PublishPacket) -> Self {
        Self {
            dup: packet.dup(),
            qos: packet.qos().into(),
            retain: packet.retain(),
            topic: packet.topic_name().to_owned(),
            body: packet.payload().to_vec(),
        }
    }
}

//! PINGREQ

use std::io::Read;

use crate::{
    common::packet::DecodablePacket,
    control::{ControlType, FixedHeader, PacketType},
    packet::PacketError,
};

/// `PINGREQ` packet
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct PingreqPacket {
    fixed_header: FixedHeader,
}

encodable_packet!(PingreqPacket());

impl PingreqPacket {
    pub fn new() -> PingreqPacket {
        PingreqPacket {
            fixed_header: FixedHeader::new(PacketType::with_default(ControlType::PingRequest), 0),
        }
    }
}

impl Default for PingreqPacket {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodablePacket for PingreqPacket {
    type DecodePacketError = std::convert::Infallible;
    type F = FixedHeader;
    type Error = PacketError<Self>;

    fn decode_packet<R: Read>(_reader: &mut R, fixed_header: Self::F) -> Result<Self, Self::Error> {
        Ok(PingreqPacket { fixed_header })
    }
}

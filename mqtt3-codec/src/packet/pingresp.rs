//! PINGRESP

use std::io::Read;

use crate::{
    common::packet::DecodablePacket,
    control::{ControlType, FixedHeader, PacketType},
    packet::PacketError,
};

/// `PINGRESP` packet
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct PingrespPacket {
    fixed_header: FixedHeader,
}

encodable_packet!(PingrespPacket());

impl PingrespPacket {
    pub fn new() -> PingrespPacket {
        PingrespPacket {
            fixed_header: FixedHeader::new(PacketType::with_default(ControlType::PingResponse), 0),
        }
    }
}

impl Default for PingrespPacket {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodablePacket for PingrespPacket {
    type DecodePacketError = std::convert::Infallible;
    type F = FixedHeader;
    type Error = PacketError<Self>;

    fn decode_packet<R: Read>(_reader: &mut R, fixed_header: Self::F) -> Result<Self, Self::Error> {
        Ok(PingrespPacket { fixed_header })
    }
}

#[cfg(test)]
mod test {
    use crate::common::encodable::Encodable;

    use super::*;

    #[test]
    fn test_pingresp_packet_encode_hex() {
        let packet = PingrespPacket::new();

        let expected = b"\xd0\x00";

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        assert_eq!(&expected[..], &buf[..]);
    }
}

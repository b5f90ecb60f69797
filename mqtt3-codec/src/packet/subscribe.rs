//! SUBSCRIBE

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::{
    common::{packet::DecodablePacket, Decodable, Encodable, PacketIdentifier, QualityOfService},
    control::{ControlType, FixedHeader, PacketType},
    packet::PacketError,
};

/// `SUBSCRIBE` packet
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct SubscribePacket {
    fixed_header: FixedHeader,
    packet_identifier: PacketIdentifier,
    payload: SubscribePacketPayload,
}

encodable_packet!(SubscribePacket(packet_identifier, payload));

impl SubscribePacket {
    pub fn new(pkid: u16, subscribes: Vec<(String, QualityOfService)>) -> SubscribePacket {
        let mut pkt = SubscribePacket {
            fixed_header: FixedHeader::new(PacketType::with_default(ControlType::Subscribe), 0),
            packet_identifier: PacketIdentifier(pkid),
            payload: SubscribePacketPayload::new(subscribes),
        };
        pkt.fix_header_remaining_len();
        pkt
    }

    pub fn packet_identifier(&self) -> u16 {
        self.packet_identifier.0
    }

    pub fn set_packet_identifier(&mut self, pkid: u16) {
        self.packet_identifier.0 = pkid;
    }

    pub fn subscribes(&self) -> &[(String, QualityOfService)] {
        &self.payload.subscribes[..]
    }
}

impl DecodablePacket for SubscribePacket {
    type DecodePacketError = SubscribePacketError;
    type F = FixedHeader;
    type Error = PacketError<Self>;

    fn decode_packet<R: Read>(reader: &mut R, fixed_header: Self::F) -> Result<Self, Self::Error> {
        let packet_identifier: PacketIdentifier = PacketIdentifier::decode(reader)?;
        let payload: SubscribePacketPayload = SubscribePacketPayload::decode_with(
            reader,
            fixed_header.remaining_length - packet_identifier.encoded_length(),
        )
        .map_err(PacketError::PayloadError)?;
        Ok(SubscribePacket {
            fixed_header,
            packet_identifier,
            payload,
        })
    }
}

/// Payload of subscribe packet
#[derive(Debug, Eq, PartialEq, Clone)]
struct SubscribePacketPayload {
    subscribes: Vec<(String, QualityOfService)>,
}

impl SubscribePacketPayload {
    pub fn new(subs: Vec<(String, QualityOfService)>) -> SubscribePacketPayload {
        SubscribePacketPayload { subscribes: subs }
    }
}

impl Encodable for SubscribePacketPayload {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        for (filter, qos) in self.subscribes.iter() {
            filter.encode(writer)?;
            writer.write_u8(*qos as u8)?;
        }

        Ok(())
    }

    fn encoded_length(&self) -> u32 {
        self.subscribes
            .iter()
            .fold(0, |b, a| b + a.0.encoded_length() + 1)
    }
}

impl Decodable for SubscribePacketPayload {
    type Error = SubscribePacketError;
    type Cond = u32;

    fn decode_with<R: Read>(
        reader: &mut R,
        mut payload_len: u32,
    ) -> Result<SubscribePacketPayload, SubscribePacketError> {
        let mut subs = Vec::new();

        while payload_len > 0 {
            let filter = String::decode(reader)?;
            // upper six bits of the requested QoS byte must be zero
            let qos = match reader.read_u8()? {
                0 => QualityOfService::Level0,
                1 => QualityOfService::Level1,
                2 => QualityOfService::Level2,
                _ => return Err(SubscribePacketError::InvalidQualityOfService),
            };

            let entry_len = filter.encoded_length() + 1;
            if entry_len > payload_len {
                return Err(SubscribePacketError::IoError(io::Error::from(
                    io::ErrorKind::UnexpectedEof,
                )));
            }
            payload_len -= entry_len;
            subs.push((filter, qos));
        }

        if subs.is_empty() {
            return Err(SubscribePacketError::EmptySubscribes);
        }

        Ok(SubscribePacketPayload::new(subs))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubscribePacketError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error("invalid quality of service")]
    InvalidQualityOfService,
    #[error("subscribe packet must carry at least one topic filter")]
    EmptySubscribes,
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use crate::common::encodable::Encodable;

    use super::*;

    #[test]
    fn test_subscribe_packet_encode_hex() {
        let subscribes = vec![
            ("a/b".to_owned(), QualityOfService::Level0),
            ("a/c".to_owned(), QualityOfService::Level0),
        ];
        let packet = SubscribePacket::new(40300, subscribes);

        let expected = b"\x82\x0e\x9d\x6c\x00\x03\x61\x2f\x62\x00\x00\x03\x61\x2f\x63\x00";

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        assert_eq!(&expected[..], &buf[..]);
    }

    #[test]
    fn test_subscribe_packet_decode_hex() {
        let encoded_data = b"\x82\x0e\x9d\x6f\x00\x03\x61\x2f\x62\x01\x00\x03\x61\x2f\x63\x01";

        let mut buf = Cursor::new(&encoded_data[..]);
        let packet = SubscribePacket::decode(&mut buf).unwrap();

        let subscribes = vec![
            ("a/b".to_owned(), QualityOfService::Level1),
            ("a/c".to_owned(), QualityOfService::Level1),
        ];
        let expected = SubscribePacket::new(40303, subscribes);

        assert_eq!(expected, packet);
    }

    #[test]
    fn test_subscribe_packet_basic() {
        let subscribes = vec![
            ("a/b".to_owned(), QualityOfService::Level0),
            ("a/c".to_owned(), QualityOfService::Level1),
        ];
        let packet = SubscribePacket::new(10001, subscribes);

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        let mut decode_buf = Cursor::new(buf);
        let decoded = SubscribePacket::decode(&mut decode_buf).unwrap();

        assert_eq!(packet, decoded);
    }

    #[test]
    fn test_subscribe_packet_empty_topics_fails_decode() {
        // packet identifier only, no payload entries
        let encoded_data = b"\x82\x02\x9d\x6c";

        let mut buf = Cursor::new(&encoded_data[..]);
        assert!(matches!(
            SubscribePacket::decode(&mut buf),
            Err(PacketError::PayloadError(
                SubscribePacketError::EmptySubscribes
            ))
        ));
    }

    #[test]
    fn test_subscribe_packet_qos_upper_bits_fail_decode() {
        // requested QoS byte 0x04 has an upper bit set
        let encoded_data = b"\x82\x08\x9d\x6c\x00\x03\x61\x2f\x62\x04";

        let mut buf = Cursor::new(&encoded_data[..]);
        assert!(matches!(
            SubscribePacket::decode(&mut buf),
            Err(PacketError::PayloadError(
                SubscribePacketError::InvalidQualityOfService
            ))
        ));
    }
}

//! UNSUBSCRIBE

use std::io::{self, Read, Write};

use crate::{
    common::{packet::DecodablePacket, Decodable, Encodable, PacketIdentifier},
    control::{ControlType, FixedHeader, PacketType},
    packet::PacketError,
};

/// `UNSUBSCRIBE` packet
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct UnsubscribePacket {
    fixed_header: FixedHeader,
    packet_identifier: PacketIdentifier,
    payload: UnsubscribePacketPayload,
}

encodable_packet!(UnsubscribePacket(packet_identifier, payload));

impl UnsubscribePacket {
    pub fn new(pkid: u16, subscribes: Vec<String>) -> UnsubscribePacket {
        let mut pkt = UnsubscribePacket {
            fixed_header: FixedHeader::new(PacketType::with_default(ControlType::Unsubscribe), 0),
            packet_identifier: PacketIdentifier(pkid),
            payload: UnsubscribePacketPayload::new(subscribes),
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

    pub fn topic_filters(&self) -> &[String] {
        &self.payload.topic_filters[..]
    }
}

impl DecodablePacket for UnsubscribePacket {
    type DecodePacketError = UnsubscribePacketError;
    type F = FixedHeader;
    type Error = PacketError<Self>;

    fn decode_packet<R: Read>(reader: &mut R, fixed_header: Self::F) -> Result<Self, Self::Error> {
        let packet_identifier: PacketIdentifier = PacketIdentifier::decode(reader)?;
        let payload: UnsubscribePacketPayload = UnsubscribePacketPayload::decode_with(
            reader,
            fixed_header.remaining_length - packet_identifier.encoded_length(),
        )
        .map_err(PacketError::PayloadError)?;
        Ok(UnsubscribePacket {
            fixed_header,
            packet_identifier,
            payload,
        })
    }
}

/// Payload of unsubscribe packet
#[derive(Debug, Eq, PartialEq, Clone)]
struct UnsubscribePacketPayload {
    topic_filters: Vec<String>,
}

impl UnsubscribePacketPayload {
    pub fn new(filters: Vec<String>) -> UnsubscribePacketPayload {
        UnsubscribePacketPayload {
            topic_filters: filters,
        }
    }
}

impl Encodable for UnsubscribePacketPayload {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        for filter in self.topic_filters.iter() {
            filter.encode(writer)?;
        }

        Ok(())
    }

    fn encoded_length(&self) -> u32 {
        self.topic_filters
            .iter()
            .fold(0, |b, a| b + a.encoded_length())
    }
}

impl Decodable for UnsubscribePacketPayload {
    type Error = UnsubscribePacketError;
    type Cond = u32;

    fn decode_with<R: Read>(
        reader: &mut R,
        mut payload_len: u32,
    ) -> Result<UnsubscribePacketPayload, UnsubscribePacketError> {
        let mut filters = Vec::new();

        while payload_len > 0 {
            let filter = String::decode(reader)?;
            let entry_len = filter.encoded_length();
            if entry_len > payload_len {
                return Err(UnsubscribePacketError::IoError(io::Error::from(
                    io::ErrorKind::UnexpectedEof,
                )));
            }
            payload_len -= entry_len;
            filters.push(filter);
        }

        if filters.is_empty() {
            return Err(UnsubscribePacketError::EmptyTopicFilters);
        }

        Ok(UnsubscribePacketPayload::new(filters))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UnsubscribePacketError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error("unsubscribe packet must carry at least one topic filter")]
    EmptyTopicFilters,
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use crate::common::encodable::Encodable;

    use super::*;

    #[test]
    fn test_unsubscribe_packet_encode_hex() {
        let packet = UnsubscribePacket::new(40302, vec!["a/b".to_owned(), "a/c".to_owned()]);

        let expected = b"\xa2\x0c\x9d\x6e\x00\x03\x61\x2f\x62\x00\x03\x61\x2f\x63";

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        assert_eq!(&expected[..], &buf[..]);
    }

    #[test]
    fn test_unsubscribe_packet_basic() {
        let packet = UnsubscribePacket::new(10001, vec!["a/b".to_owned(), "a/c".to_owned()]);

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        let mut decode_buf = Cursor::new(buf);
        let decoded = UnsubscribePacket::decode(&mut decode_buf).unwrap();

        assert_eq!(packet, decoded);
    }

    #[test]
    fn test_unsubscribe_packet_empty_fails_decode() {
        let encoded_data = b"\xa2\x02\x9d\x6e";

        let mut buf = Cursor::new(&encoded_data[..]);
        assert!(matches!(
            UnsubscribePacket::decode(&mut buf),
            Err(PacketError::PayloadError(
                UnsubscribePacketError::EmptyTopicFilters
            ))
        ));
    }
}

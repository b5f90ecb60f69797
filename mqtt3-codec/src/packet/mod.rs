//! Specific packets

use std::{
    fmt::{self, Debug},
    io::{self, Cursor, Read},
};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    common::{
        packet::{DecodablePacket, EncodablePacket},
        Decodable,
    },
    control::{fixed_header::FixedHeaderError, ControlType, FixedHeader, VariableHeaderError},
};

macro_rules! encodable_packet {
    ($typ:ident($($field:ident),* $(,)?)) => {
        impl $crate::common::packet::EncodablePacket for $typ {
            type Output = $crate::control::FixedHeader;

            fn fixed_header(&self) -> &Self::Output {
                &self.fixed_header
            }

            #[allow(unused_variables)]
            fn encode_packet<W: ::std::io::Write>(&self, writer: &mut W) -> ::std::io::Result<()> {
                $($crate::common::Encodable::encode(&self.$field, writer)?;)*
                Ok(())
            }

            fn encoded_packet_length(&self) -> u32 {
                $($crate::common::Encodable::encoded_length(&self.$field) +)*
                    0
            }
        }

        impl $typ {
            #[allow(dead_code)]
            #[inline(always)]
            fn fix_header_remaining_len(&mut self) {
                self.fixed_header.remaining_length = $crate::common::packet::EncodablePacket::encoded_packet_length(self);
            }
        }
    };
}

pub use self::{
    connack::ConnackPacket,
    connect::{ConnectPacket, LastWill},
    disconnect::DisconnectPacket,
    pingreq::PingreqPacket,
    pingresp::PingrespPacket,
    puback::PubackPacket,
    pubcomp::PubcompPacket,
    publish::PublishPacket,
    pubrec::PubrecPacket,
    pubrel::PubrelPacket,
    suback::SubackPacket,
    subscribe::SubscribePacket,
    unsuback::UnsubackPacket,
    unsubscribe::UnsubscribePacket,
};

pub mod connack;
pub mod connect;
pub mod disconnect;
pub mod pingreq;
pub mod pingresp;
pub mod puback;
pub mod pubcomp;
pub mod publish;
pub mod pubrec;
pub mod pubrel;
pub mod suback;
pub mod subscribe;
pub mod unsuback;
pub mod unsubscribe;

macro_rules! impl_decodable {
    ($($typ:ident,)+) => {
        $(impl $crate::common::encodable::Decodable for $typ {
            type Error = PacketError<Self>;
            type Cond = Option<FixedHeader>;

            fn decode_with<R: std::io::Read>(
                reader: &mut R,
                fixed_header: Self::Cond,
            ) -> Result<Self, Self::Error> {
                let fixed_header: FixedHeader = if let Some(hdr) = fixed_header {
                    hdr
                } else {
                    $crate::common::encodable::Decodable::decode(reader)?
                };

                <Self as DecodablePacket>::decode_packet(reader, fixed_header)
            }
        })+
    };
}

impl_decodable! {
    ConnectPacket,
    ConnackPacket,

    PublishPacket,
    PubackPacket,
    PubrecPacket,
    PubrelPacket,
    PubcompPacket,

    PingreqPacket,
    PingrespPacket,

    SubscribePacket,
    SubackPacket,

    UnsubscribePacket,
    UnsubackPacket,

    DisconnectPacket,
}

/// Parsing errors for packet
#[derive(thiserror::Error)]
#[error(transparent)]
pub enum PacketError<P>
where
    P: DecodablePacket,
{
    FixedHeaderError(#[from] FixedHeaderError),
    VariableHeaderError(#[from] VariableHeaderError),
    PayloadError(<P as DecodablePacket>::DecodePacketError),
    IoError(#[from] io::Error),
}

impl<P> Debug for PacketError<P>
where
    P: DecodablePacket,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PacketError::FixedHeaderError(ref e) => {
                f.debug_tuple("FixedHeaderError").field(e).finish()
            }
            PacketError::VariableHeaderError(ref e) => {
                f.debug_tuple("VariableHeaderError").field(e).finish()
            }
            PacketError::PayloadError(ref e) => f.debug_tuple("PayloadError").field(e).finish(),
            PacketError::IoError(ref e) => f.debug_tuple("IoError").field(e).finish(),
        }
    }
}

macro_rules! impl_variable_packet {
    ($($name:ident & $errname:ident => $hdr:ident,)+) => {
        /// Variable packet
        #[derive(Debug, Eq, PartialEq, Clone)]
        pub enum VariablePacket {
            $(
                $name($name),
            )+
        }

        impl VariablePacket {
            /// Asynchronously split one framed packet off an `AsyncRead` and decode it:
            /// one header byte, the variable-length remaining length, then exactly that
            /// many body bytes.
            pub async fn parse<A: AsyncRead + Unpin>(rdr: &mut A) -> Result<Self, VariablePacketError> {
                let fixed_header = match FixedHeader::parse(rdr).await {
                    Ok(header) => header,
                    Err(FixedHeaderError::ReservedType(code, length)) => {
                        let mut buf = vec![0u8; length as usize];
                        rdr.read_exact(&mut buf).await?;
                        return Err(VariablePacketError::ReservedPacket(code, buf));
                    }
                    Err(err) => return Err(From::from(err)),
                };

                let mut buffer = vec![0u8; fixed_header.remaining_length as usize];
                rdr.read_exact(&mut buffer).await?;

                decode_exact(&mut Cursor::new(&buffer[..]), fixed_header)
            }
        }

        #[inline]
        fn decode_with_header<R: io::Read>(rdr: &mut R, fixed_header: FixedHeader) -> Result<VariablePacket, VariablePacketError> {
            match fixed_header.packet_type.control_type() {
                $(
                    ControlType::$hdr => {
                        let pk = <$name as DecodablePacket>::decode_packet(rdr, fixed_header)?;
                        Ok(VariablePacket::$name(pk))
                    }
                )+
            }
        }

        /// Decode one packet body from a cursor that holds exactly the declared
        /// remaining length; unread bytes after the packet decoder ran are an error.
        #[inline]
        fn decode_exact(rdr: &mut Cursor<&[u8]>, fixed_header: FixedHeader) -> Result<VariablePacket, VariablePacketError> {
            let packet = decode_with_header(rdr, fixed_header)?;
            let leftover = rdr.get_ref().len() as u64 - rdr.position();
            if leftover > 0 {
                return Err(VariablePacketError::TrailingBytes(leftover));
            }
            Ok(packet)
        }

        $(
            impl From<$name> for VariablePacket {
                fn from(pk: $name) -> VariablePacket {
                    VariablePacket::$name(pk)
                }
            }
        )+

        impl EncodablePacket for VariablePacket {
            type Output = FixedHeader;

            fn fixed_header(&self) -> &Self::Output {
                match *self {
                    $(
                        VariablePacket::$name(ref pk) => pk.fixed_header(),
                    )+
                }
            }

            fn encode_packet<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
                match *self {
                    $(
                        VariablePacket::$name(ref pk) => pk.encode_packet(writer),
                    )+
                }
            }

            fn encoded_packet_length(&self) -> u32 {
                match *self {
                    $(
                        VariablePacket::$name(ref pk) => pk.encoded_packet_length(),
                    )+
                }
            }
        }

        impl Decodable for VariablePacket {
            type Error = VariablePacketError;
            type Cond = Option<FixedHeader>;

            fn decode_with<R: Read>(reader: &mut R, fixed_header: Self::Cond)
                    -> Result<VariablePacket, Self::Error> {
                let fixed_header = match fixed_header {
                    Some(fh) => fh,
                    None => {
                        match FixedHeader::decode(reader) {
                            Ok(header) => header,
                            Err(FixedHeaderError::ReservedType(code, length)) => {
                                let reader = &mut reader.take(length as u64);
                                let mut buf = Vec::with_capacity(length as usize);
                                reader.read_to_end(&mut buf)?;
                                return Err(VariablePacketError::ReservedPacket(code, buf));
                            },
                            Err(err) => return Err(From::from(err))
                        }
                    }
                };
                let mut limited = reader.take(fixed_header.remaining_length as u64);

                let packet = decode_with_header(&mut limited, fixed_header)?;
                if limited.limit() > 0 {
                    return Err(VariablePacketError::TrailingBytes(limited.limit()));
                }
                Ok(packet)
            }
        }

        /// Parsing errors for variable packet
        #[derive(Debug, thiserror::Error)]
        pub enum VariablePacketError {
            #[error(transparent)]
            FixedHeaderError(#[from] FixedHeaderError),
            #[error("reserved packet type ({0}), [u8, ..{len}]", len = .1.len())]
            ReservedPacket(u8, Vec<u8>),
            #[error("{0} trailing bytes after packet body")]
            TrailingBytes(u64),
            #[error(transparent)]
            IoError(#[from] io::Error),
            $(
                #[error(transparent)]
                $errname(#[from] PacketError<$name>),
            )+
        }
    }
}

impl_variable_packet! {
    ConnectPacket       & ConnectPacketError        => Connect,
    ConnackPacket       & ConnackPacketError        => ConnectAcknowledgement,

    PublishPacket       & PublishPacketError        => Publish,
    PubackPacket        & PubackPacketError         => PublishAcknowledgement,
    PubrecPacket        & PubrecPacketError         => PublishReceived,
    PubrelPacket        & PubrelPacketError         => PublishRelease,
    PubcompPacket       & PubcompPacketError        => PublishComplete,

    PingreqPacket       & PingreqPacketError        => PingRequest,
    PingrespPacket      & PingrespPacketError       => PingResponse,

    SubscribePacket     & SubscribePacketError      => Subscribe,
    SubackPacket        & SubackPacketError         => SubscribeAcknowledgement,

    UnsubscribePacket   & UnsubscribePacketError    => Unsubscribe,
    UnsubackPacket      & UnsubackPacketError       => UnsubscribeAcknowledgement,

    DisconnectPacket    & DisconnectPacketError     => Disconnect,
}

impl VariablePacket {
    pub fn new<T>(t: T) -> VariablePacket
    where
        VariablePacket: From<T>,
    {
        From::from(t)
    }
}

mod codec {
    use bytes::{Buf as _, BufMut as _, BytesMut};
    use tokio_util::codec;

    use super::*;
    use crate::{
        common::{packet::EncodablePacket, Encodable},
        control::packet_type::{PacketType, PacketTypeError},
    };

    pub struct MqttDecoder {
        state: DecodeState,
    }

    enum DecodeState {
        Start,
        Packet { length: u32, typ: DecodePacketType },
    }

    #[derive(Copy, Clone)]
    enum DecodePacketType {
        Standard(PacketType),
        Reserved(u8),
    }

    impl MqttDecoder {
        pub const fn new() -> Self {
            MqttDecoder {
                state: DecodeState::Start,
            }
        }
    }

    impl Default for MqttDecoder {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Like FixedHeader::decode(), but on a buffer instead of a stream. Returns None if it reaches
    /// the end of the buffer before it finishes decoding the header.
    #[inline]
    fn decode_header(
        mut data: &[u8],
    ) -> Option<Result<(DecodePacketType, u32, usize), FixedHeaderError>> {
        let mut header_size = 0;
        macro_rules! read_u8 {
            () => {{
                let (&x, rest) = data.split_first()?;
                data = rest;
                header_size += 1;
                x
            }};
        }

        let type_val = read_u8!();
        let remaining_len = {
            let mut cur = 0u32;
            for i in 0.. {
                let byte = read_u8!();
                cur |= ((byte as u32) & 0x7F) << (7 * i);

                if i >= 4 {
                    return Some(Err(FixedHeaderError::MalformedRemainingLength));
                }

                if byte & 0x80 == 0 {
                    break;
                }
            }

            cur
        };

        let packet_type = match PacketType::try_from(type_val) {
            Ok(ty) => DecodePacketType::Standard(ty),
            Err(PacketTypeError::ReservedType(ty, _)) => DecodePacketType::Reserved(ty),
            Err(err) => return Some(Err(err.into())),
        };
        Some(Ok((packet_type, remaining_len, header_size)))
    }

    impl codec::Decoder for MqttDecoder {
        type Item = VariablePacket;
        type Error = VariablePacketError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
            loop {
                match &mut self.state {
                    DecodeState::Start => match decode_header(&src[..]) {
                        Some(Ok((typ, length, header_size))) => {
                            src.advance(header_size);
                            self.state = DecodeState::Packet { length, typ };
                            continue;
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(None),
                    },
                    DecodeState::Packet { length, typ } => {
                        let length = *length;
                        if src.remaining() < length as usize {
                            return Ok(None);
                        }
                        let typ = *typ;

                        self.state = DecodeState::Start;

                        let body = src.split_to(length as usize);
                        match typ {
                            DecodePacketType::Standard(typ) => {
                                let header = FixedHeader {
                                    packet_type: typ,
                                    remaining_length: length,
                                };
                                return decode_exact(&mut Cursor::new(&body[..]), header)
                                    .map(Some);
                            }
                            DecodePacketType::Reserved(code) => {
                                return Err(VariablePacketError::ReservedPacket(
                                    code,
                                    body.to_vec(),
                                ));
                            }
                        }
                    }
                }
            }
        }
    }

    pub struct MqttEncoder {}

    impl MqttEncoder {
        pub const fn new() -> Self {
            MqttEncoder {}
        }
    }

    impl Default for MqttEncoder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T: EncodablePacket + Encodable> codec::Encoder<T> for MqttEncoder {
        type Error = io::Error;
        fn encode(&mut self, packet: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
            dst.reserve(packet.encoded_length() as usize);
            packet.encode(&mut dst.writer())
        }
    }

    pub struct MqttCodec {
        decode: MqttDecoder,
        encode: MqttEncoder,
    }

    impl MqttCodec {
        pub const fn new() -> Self {
            MqttCodec {
                decode: MqttDecoder::new(),
                encode: MqttEncoder::new(),
            }
        }
    }

    impl Default for MqttCodec {
        fn default() -> Self {
            Self::new()
        }
    }

    impl codec::Decoder for MqttCodec {
        type Item = VariablePacket;
        type Error = VariablePacketError;
        #[inline]
        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
            self.decode.decode(src)
        }
    }

    impl<T: EncodablePacket + Encodable> codec::Encoder<T> for MqttCodec {
        type Error = io::Error;
        #[inline]
        fn encode(&mut self, packet: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
            self.encode.encode(packet, dst)
        }
    }
}

pub use codec::{MqttCodec, MqttDecoder, MqttEncoder};

#[cfg(test)]
mod test {
    use super::*;

    use std::io::Cursor;

    use crate::common::{Decodable, Encodable, QualityOfService};

    #[test]
    fn test_variable_packet_basic() {
        let packet = ConnectPacket::new("1234".to_owned());

        // Wrap it
        let var_packet = VariablePacket::new(packet);

        // Encode
        let mut buf = Vec::new();
        var_packet.encode(&mut buf).unwrap();

        // Decode
        let mut decode_buf = Cursor::new(buf);
        let decoded_packet = VariablePacket::decode(&mut decode_buf).unwrap();

        assert_eq!(var_packet, decoded_packet);
    }

    #[test]
    fn test_round_trip_all_variants() {
        let mut publish = PublishPacket::new(
            "a/b",
            crate::common::qos::QoSWithPacketIdentifier::Level1(11),
            b"payload".to_vec(),
        );
        publish.set_retain(true);
        let packets: Vec<VariablePacket> = vec![
            ConnectPacket::new("client-1".to_owned()).into(),
            ConnackPacket::new(false, crate::common::ConnectReturnCode::ConnectionAccepted).into(),
            publish.into(),
            PubackPacket::new(11).into(),
            PubrecPacket::new(12).into(),
            PubrelPacket::new(13).into(),
            PubcompPacket::new(14).into(),
            SubscribePacket::new(15, vec![("a/+".to_owned(), QualityOfService::Level1)]).into(),
            SubackPacket::new(15, vec![crate::packet::suback::SubscribeReturnCode::MaximumQoSLevel1])
                .into(),
            UnsubscribePacket::new(16, vec!["a/+".to_owned()]).into(),
            UnsubackPacket::new(16).into(),
            PingreqPacket::new().into(),
            PingrespPacket::new().into(),
            DisconnectPacket::new().into(),
        ];

        for packet in packets {
            let mut buf = Vec::new();
            packet.encode(&mut buf).unwrap();

            // decode(encode(p)) == p
            let mut decode_buf = Cursor::new(&buf[..]);
            let decoded = VariablePacket::decode(&mut decode_buf).unwrap();
            assert_eq!(packet, decoded);

            // encode(decode(b)) == b
            let mut buf2 = Vec::new();
            decoded.encode(&mut buf2).unwrap();
            assert_eq!(buf, buf2);
        }
    }

    #[test]
    fn test_trailing_bytes_fail_decode() {
        // PUBACK with a declared length of 3: one byte left over after the body
        let encoded_data = b"\x40\x03\x00\x0b\xff";
        let mut buf = Cursor::new(&encoded_data[..]);
        assert!(matches!(
            VariablePacket::decode(&mut buf),
            Err(VariablePacketError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_reserved_type_fails_decode() {
        let encoded_data = b"\x00\x00";
        let mut buf = Cursor::new(&encoded_data[..]);
        assert!(matches!(
            VariablePacket::decode(&mut buf),
            Err(VariablePacketError::ReservedPacket(0, _))
        ));

        let encoded_data = b"\xf0\x00";
        let mut buf = Cursor::new(&encoded_data[..]);
        assert!(matches!(
            VariablePacket::decode(&mut buf),
            Err(VariablePacketError::ReservedPacket(15, _))
        ));
    }

    #[tokio::test]
    async fn test_variable_packet_async_parse() {
        let packet = ConnectPacket::new("1234".to_owned());

        let var_packet = VariablePacket::new(packet);

        let mut buf = Vec::new();
        var_packet.encode(&mut buf).unwrap();

        let mut async_buf = buf.as_slice();
        let decoded_packet = VariablePacket::parse(&mut async_buf).await.unwrap();

        assert_eq!(var_packet, decoded_packet);
    }

    #[tokio::test]
    async fn test_variable_packet_framed() {
        use futures::{SinkExt, StreamExt};
        use tokio_util::codec::{FramedRead, FramedWrite};

        let conn_packet = ConnectPacket::new("1234".to_owned());
        let sub_packet =
            SubscribePacket::new(1, vec![("foo/#".to_owned(), QualityOfService::Level0)]);

        // small, to make sure buffering and stuff works
        let (reader, writer) = tokio::io::duplex(8);

        let task = tokio::spawn({
            let (conn_packet, sub_packet) = (conn_packet.clone(), sub_packet.clone());
            async move {
                let mut sink = FramedWrite::new(writer, MqttEncoder::new());
                sink.send(conn_packet).await.unwrap();
                sink.send(sub_packet).await.unwrap();
                SinkExt::<VariablePacket>::flush(&mut sink).await.unwrap();
            }
        });

        let mut stream = FramedRead::new(reader, MqttDecoder::new());
        let decoded_conn = stream.next().await.unwrap().unwrap();
        let decoded_sub = stream.next().await.unwrap().unwrap();

        task.await.unwrap();

        assert!(stream.next().await.is_none());

        assert_eq!(decoded_conn, conn_packet.into());
        assert_eq!(decoded_sub, sub_packet.into());
    }
}

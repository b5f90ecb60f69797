//! MQTT 3.1/3.1.1 protocol codec
//!
//! Bit-exact encoding and decoding of the fourteen MQTT v3 control packet
//! types, following [MQTT v3.1.1](http://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html)
//! and accepting the older `MQIsdp` protocol name for v3.1 sessions.
//!
//! ## Usage
//!
//! ```rust
//! use std::io::Cursor;
//!
//! use mqtt3_codec::common::{Decodable, Encodable, qos::QoSWithPacketIdentifier};
//! use mqtt3_codec::packet::{PublishPacket, VariablePacket};
//!
//! let packet = PublishPacket::new("mqtt/learning", QoSWithPacketIdentifier::Level1(10),
//!                                 b"Hello MQTT!".to_vec());
//!
//! let mut buf = Vec::new();
//! packet.encode(&mut buf).unwrap();
//!
//! // Decode with known type
//! let mut dec_buf = Cursor::new(&buf[..]);
//! let decoded = PublishPacket::decode(&mut dec_buf).unwrap();
//! assert_eq!(packet, decoded);
//!
//! // Auto decode by the fixed header
//! let mut dec_buf = Cursor::new(&buf[..]);
//! let auto_decode = VariablePacket::decode(&mut dec_buf).unwrap();
//! assert_eq!(VariablePacket::PublishPacket(packet), auto_decode);
//! ```

pub mod common;
pub mod control;
pub mod packet;

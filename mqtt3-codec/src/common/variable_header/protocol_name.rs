use std::io::{self, Read, Write};

use crate::common::{Decodable, Encodable};

/// Protocol name, `"MQTT"` in v3.1.1 and `"MQIsdp"` in v3.1
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct ProtocolName(pub String);

impl Encodable for ProtocolName {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        self.0.encode(writer)
    }

    fn encoded_length(&self) -> u32 {
        self.0.encoded_length()
    }
}

impl Decodable for ProtocolName {
    type Error = io::Error;
    type Cond = ();

    fn decode_with<R: Read>(reader: &mut R, _rest: ()) -> Result<Self, Self::Error> {
        String::decode(reader).map(ProtocolName)
    }
}

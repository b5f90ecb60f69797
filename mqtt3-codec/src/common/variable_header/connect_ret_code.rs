use std::{
    fmt::Display,
    io::{self, Read, Write},
};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::common::{Decodable, Encodable};

pub const CONNECTION_ACCEPTED: u8 = 0x00;
pub const UNACCEPTABLE_PROTOCOL_VERSION: u8 = 0x01;
pub const IDENTIFIER_REJECTED: u8 = 0x02;
pub const SERVICE_UNAVAILABLE: u8 = 0x03;
pub const BAD_USERNAME_OR_PASSWORD: u8 = 0x04;
pub const NOT_AUTHORIZED: u8 = 0x05;

/// Return code for `CONNACK` packet
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ConnectReturnCode {
    ConnectionAccepted,
    UnacceptableProtocolVersion,
    IdentifierRejected,
    ServiceUnavailable,
    BadUserNameOrPassword,
    NotAuthorized,
}

impl From<ConnectReturnCode> for u8 {
    fn from(value: ConnectReturnCode) -> Self {
        match value {
            ConnectReturnCode::ConnectionAccepted => CONNECTION_ACCEPTED,
            ConnectReturnCode::UnacceptableProtocolVersion => UNACCEPTABLE_PROTOCOL_VERSION,
            ConnectReturnCode::IdentifierRejected => IDENTIFIER_REJECTED,
            ConnectReturnCode::ServiceUnavailable => SERVICE_UNAVAILABLE,
            ConnectReturnCode::BadUserNameOrPassword => BAD_USERNAME_OR_PASSWORD,
            ConnectReturnCode::NotAuthorized => NOT_AUTHORIZED,
        }
    }
}

impl From<&ConnectReturnCode> for u8 {
    fn from(value: &ConnectReturnCode) -> Self {
        (*value).into()
    }
}

impl TryFrom<u8> for ConnectReturnCode {
    type Error = ConnectReturnCodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            CONNECTION_ACCEPTED => Ok(ConnectReturnCode::ConnectionAccepted),
            UNACCEPTABLE_PROTOCOL_VERSION => Ok(ConnectReturnCode::UnacceptableProtocolVersion),
            IDENTIFIER_REJECTED => Ok(ConnectReturnCode::IdentifierRejected),
            SERVICE_UNAVAILABLE => Ok(ConnectReturnCode::ServiceUnavailable),
            BAD_USERNAME_OR_PASSWORD => Ok(ConnectReturnCode::BadUserNameOrPassword),
            NOT_AUTHORIZED => Ok(ConnectReturnCode::NotAuthorized),
            _ => Err(ConnectReturnCodeError::InvalidConnectReturnCode(code)),
        }
    }
}

impl Encodable for ConnectReturnCode {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        writer.write_u8(self.into())
    }

    fn encoded_length(&self) -> u32 {
        1
    }
}

impl Decodable for ConnectReturnCode {
    type Error = ConnectReturnCodeError;
    type Cond = ();

    fn decode_with<R: Read>(reader: &mut R, _rest: ()) -> Result<Self, Self::Error> {
        reader.read_u8().map(Self::try_from)?
    }
}

impl Display for ConnectReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ConnectReturnCode::ConnectionAccepted => "connection accepted",
            ConnectReturnCode::UnacceptableProtocolVersion => "unacceptable protocol version",
            ConnectReturnCode::IdentifierRejected => "identifier rejected",
            ConnectReturnCode::ServiceUnavailable => "server unavailable",
            ConnectReturnCode::BadUserNameOrPassword => "bad user name or password",
            ConnectReturnCode::NotAuthorized => "not authorized",
        };
        write!(f, "{}", msg)
    }
}

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub enum ConnectReturnCodeError {
    IoError(#[from] io::Error),
    #[error("invalid connect return code ({0})")]
    InvalidConnectReturnCode(u8),
}

#[cfg(test)]
mod test {
    use super::*;

    use std::io::Cursor;

    #[test]
    fn return_codes_zero_to_five_decode() {
        for code in 0u8..=5 {
            let mut buf = Cursor::new(vec![code]);
            let decoded = ConnectReturnCode::decode(&mut buf).unwrap();
            assert_eq!(u8::from(decoded), code);
        }
    }

    #[test]
    fn return_code_six_fails_decode() {
        let mut buf = Cursor::new(vec![6u8]);
        assert!(matches!(
            ConnectReturnCode::decode(&mut buf),
            Err(ConnectReturnCodeError::InvalidConnectReturnCode(6))
        ));
    }
}

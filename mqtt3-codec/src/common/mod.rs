pub use self::{
    encodable::{Decodable, Encodable, VarBytes},
    qos::QualityOfService,
    variable_header::*,
};

pub mod encodable;
pub mod packet;
pub mod qos;
pub mod variable_header;

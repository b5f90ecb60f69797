pub mod backoff;
pub mod client;
mod message;
pub mod server;
pub mod transport;
pub mod waitop;

pub use message::Message;

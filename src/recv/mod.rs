mod connection;
mod handshake;
mod ring;

pub use connection::Receiver;
pub use ring::AckSink;

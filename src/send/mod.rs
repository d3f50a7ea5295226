mod ack_manager;
mod filler;
mod handshake;
mod ring;
mod transmitter;

mod connection;

pub use connection::Sender;

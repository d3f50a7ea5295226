//! A reliable, ordered, byte-stream file-transfer protocol over UDP: a
//! three-way start handshake, a sliding-window sender with slow-start/AIMD
//! congestion control and fast retransmit, a reassembling receiver, and a
//! symmetric FIN teardown.

pub mod config;
pub mod err;
mod phase;
mod recv;
mod rtt;
mod send;
mod util;
pub mod wire;

pub use config::Config;
pub use err::{Error, Result};
pub use recv::Receiver;
pub use send::Sender;

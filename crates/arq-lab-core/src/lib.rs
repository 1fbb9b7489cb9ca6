//! Stop-and-wait ARQ protocol engine.
//!
//! [`ArqSender`] runs on entity A and [`ArqReceiver`] on entity B. Both are
//! plain state machines driven through [`TransportProtocol`]; all I/O goes
//! through the [`SystemContext`] the harness passes in.

pub mod checksum;
pub mod queue;
pub mod receiver;
pub mod sender;

#[cfg(test)]
mod test_support;

pub use arq_lab_abstract::{
    Control, Message, Packet, ProtocolConfig, SystemContext, TransportProtocol,
};
pub use queue::PacketQueue;
pub use receiver::ArqReceiver;
pub use sender::{ArqSender, SenderMode};

pub fn sender(config: ProtocolConfig) -> Box<dyn TransportProtocol> {
    Box::new(ArqSender::new(config))
}

pub fn receiver() -> Box<dyn TransportProtocol> {
    Box::new(ArqReceiver::default())
}

use serde::{Deserialize, Serialize};

use crate::packet::{Message, Packet};

/// The two protocol entities. A sends data, B receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityId {
    A,
    B,
}

impl EntityId {
    pub fn peer(&self) -> Self {
        match self {
            EntityId::A => EntityId::B,
            EntityId::B => EntityId::A,
        }
    }
}

/// Capabilities the harness lends to a protocol entity during a callback.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel for delivery to the peer.
    fn transmit(&mut self, packet: Packet);

    /// Arm this entity's retransmission timer. Replaces a running timer.
    fn start_timer(&mut self, duration_ms: u64);

    /// Disarm this entity's retransmission timer. A no-op when none is running.
    fn stop_timer(&mut self);

    /// Deliver a validated message to the upper layer.
    fn deliver(&mut self, message: &Message);

    /// Log a message to the harness output.
    fn log(&mut self, message: &str);

    /// Current harness time in ms.
    fn now(&self) -> u64;

    /// Record a numeric metric (e.g. retransmissions) for the report.
    fn record_metric(&mut self, _name: &str, _value: f64) {}
}

/// Entry points the harness drives. Events for one entity are delivered one
/// at a time and each call runs to completion.
pub trait TransportProtocol: Send {
    /// Called once before any other event.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// The upper layer has a message to send.
    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, message: &Message);

    /// A (possibly corrupted) packet arrived from the peer.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// The retransmission timer expired.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext);
}

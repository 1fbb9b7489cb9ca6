use std::collections::VecDeque;

use arq_lab_abstract::Packet;

/// FIFO of packets waiting for first transmission or retransmission.
///
/// The head is the packet currently in flight; everything behind it waits
/// until the head is acknowledged.
#[derive(Debug, Default, Clone)]
pub struct PacketQueue {
    packets: VecDeque<Packet>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, packet: Packet) {
        self.packets.push_back(packet);
    }

    pub fn peek_head(&self) -> Option<&Packet> {
        self.packets.front()
    }

    /// Remove the head. Popping an empty queue is a no-op.
    pub fn pop_head(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn clear(&mut self) {
        self.packets.clear();
    }
}

use arq_lab_abstract::{Control, Message, Packet, SystemContext, TransportProtocol};

use crate::checksum::{is_checksum_valid, is_sequence_expected, stamp};

/// Stop-and-wait receiver (entity B). Has no timer.
///
/// Rejection is signalled implicitly: a corrupted, duplicate or
/// out-of-order packet is answered with a positive acknowledgment for the
/// last sequence number accepted, which the sender reads as a request to
/// resend.
#[derive(Debug)]
pub struct ArqReceiver {
    expected_seq: u32,
    /// Set once the most recently accepted sequence number was delivered.
    last_delivered: bool,
}

impl Default for ArqReceiver {
    fn default() -> Self {
        Self {
            expected_seq: 1,
            last_delivered: false,
        }
    }
}

impl ArqReceiver {
    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    pub fn last_delivered(&self) -> bool {
        self.last_delivered
    }

    pub fn send_ack(&self, ctx: &mut dyn SystemContext, seq: u32) {
        send_control(ctx, Control::Ack(seq));
    }

    /// Explicit negative acknowledgment. The accept/discard path never
    /// emits one; it re-acknowledges instead.
    pub fn send_nack(&self, ctx: &mut dyn SystemContext, seq: u32) {
        send_control(ctx, Control::Nack(seq));
    }
}

fn send_control(ctx: &mut dyn SystemContext, control: Control) {
    ctx.transmit(stamp(control.to_packet()));
    ctx.log(&format!("send {control}"));
}

impl TransportProtocol for ArqReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.expected_seq = 1;
        self.last_delivered = false;
        ctx.log("receiver ready");
    }

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, message: &Message) {
        // simplex: B never originates data
        ctx.log(&format!("receiver dropped upper-layer data {message:?}"));
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        let in_order = is_sequence_expected(packet.seq_num, self.expected_seq);
        if !in_order || !is_checksum_valid(&packet) {
            let reason = if in_order { "corrupt" } else { "out of order" };
            ctx.log(&format!("recv pkt{}, discard ({reason})", packet.seq_num));
            self.send_ack(ctx, self.expected_seq.wrapping_sub(1));
            return;
        }

        ctx.log(&format!("recv pkt{}, deliver", packet.seq_num));
        // Only reachable for a packet that is about to be delivered, so the
        // flag is set again below and delivery is never suppressed.
        if packet.seq_num == self.expected_seq && self.last_delivered {
            self.last_delivered = false;
        }

        ctx.deliver(&packet.message());
        self.send_ack(ctx, packet.seq_num);
        self.expected_seq = self.expected_seq.wrapping_add(1);
        self.last_delivered = true;
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext) {}
}

use arq_lab_abstract::{
    Control, Message, Packet, ProtocolConfig, SystemContext, TransportProtocol,
};
use tracing::debug;

use crate::checksum::{is_sequence_expected, stamp};
use crate::queue::PacketQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderMode {
    /// Queue empty, no timer running.
    Idle,
    /// Head packet transmitted, timer running.
    AwaitingAck,
}

/// Stop-and-wait sender (entity A).
///
/// At most one packet is in flight: the queue head. Messages that arrive
/// while it is unacknowledged wait behind it and go out one by one as
/// acknowledgments come back. There is no retry limit.
#[derive(Debug)]
pub struct ArqSender {
    config: ProtocolConfig,
    next_seq: u32,
    expected_ack: u32,
    mode: SenderMode,
    queue: PacketQueue,
    retransmissions: u64,
}

impl Default for ArqSender {
    fn default() -> Self {
        Self::new(ProtocolConfig::default())
    }
}

impl ArqSender {
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            config,
            next_seq: 1,
            expected_ack: 1,
            mode: SenderMode::Idle,
            queue: PacketQueue::new(),
            retransmissions: 0,
        }
    }

    pub fn mode(&self) -> SenderMode {
        self.mode
    }

    /// Sequence number the next queued packet will carry.
    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Sequence number whose acknowledgment is awaited (the head's).
    pub fn expected_ack(&self) -> u32 {
        self.expected_ack
    }

    pub fn queue(&self) -> &PacketQueue {
        &self.queue
    }

    pub fn retransmissions(&self) -> u64 {
        self.retransmissions
    }

    /// Transmit the head and arm the timer. Returns false on an empty queue.
    fn send_head(&mut self, ctx: &mut dyn SystemContext) -> bool {
        let Some(&head) = self.queue.peek_head() else {
            return false;
        };
        ctx.transmit(head);
        ctx.start_timer(self.config.retransmit_timeout_ms);
        true
    }

    fn retransmit(&mut self, ctx: &mut dyn SystemContext) {
        if !self.send_head(ctx) {
            return;
        }
        self.retransmissions += 1;
        ctx.log(&format!("resend pkt{}", self.expected_ack));
        ctx.record_metric("retransmissions", self.retransmissions as f64);
    }

    fn handle_ack(&mut self, ctx: &mut dyn SystemContext) {
        self.queue.pop_head();
        self.expected_ack = self.expected_ack.wrapping_add(1);
        ctx.record_metric("queue_depth", self.queue.len() as f64);

        if self.send_head(ctx) {
            ctx.log(&format!("send pkt{}", self.expected_ack));
        } else {
            self.mode = SenderMode::Idle;
        }
    }
}

impl TransportProtocol for ArqSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.queue.clear();
        self.mode = SenderMode::Idle;
        self.next_seq = 1;
        self.expected_ack = 1;
        self.retransmissions = 0;
        ctx.log(&format!(
            "sender ready (timeout {}ms)",
            self.config.retransmit_timeout_ms
        ));
    }

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, message: &Message) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.queue.enqueue(stamp(Packet::data(seq, message)));
        ctx.record_metric("queue_depth", self.queue.len() as f64);

        match self.mode {
            SenderMode::Idle => {
                self.send_head(ctx);
                self.mode = SenderMode::AwaitingAck;
                ctx.log(&format!("send pkt{seq}"));
            }
            SenderMode::AwaitingAck => {
                debug!(
                    seq,
                    in_flight = self.expected_ack,
                    depth = self.queue.len(),
                    "queued behind unacknowledged packet"
                );
            }
        }
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        ctx.stop_timer();

        let control = Control::from(&packet);
        if self.mode == SenderMode::Idle {
            ctx.log(&format!("recv {control} while idle, ignored"));
            return;
        }

        match control {
            Control::Ack(seq) if is_sequence_expected(seq, self.expected_ack) => {
                ctx.log(&format!("recv {control}"));
                self.handle_ack(ctx);
            }
            other => {
                ctx.log(&format!("recv {other}, expected ACK{}", self.expected_ack));
                self.retransmit(ctx);
            }
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        if self.queue.is_empty() {
            debug!("timer expired with nothing outstanding");
            return;
        }
        ctx.log(&format!("timeout on pkt{}", self.expected_ack));
        self.retransmit(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::is_checksum_valid;
    use crate::test_support::RecordingContext;

    fn msg(text: &str) -> Message {
        Message::new(text.as_bytes()).unwrap()
    }

    fn ack(seq: u32) -> Packet {
        stamp(Control::Ack(seq).to_packet())
    }

    fn started() -> (ArqSender, RecordingContext) {
        let mut sender = ArqSender::new(ProtocolConfig {
            retransmit_timeout_ms: 30,
        });
        let mut ctx = RecordingContext::default();
        sender.init(&mut ctx);
        (sender, ctx)
    }

    #[test]
    fn init_state() {
        let (sender, ctx) = started();
        assert_eq!(sender.mode(), SenderMode::Idle);
        assert_eq!(sender.next_seq(), 1);
        assert_eq!(sender.expected_ack(), 1);
        assert!(sender.queue().is_empty());
        assert!(ctx.timer.is_none());
    }

    #[test]
    fn first_message_goes_out_immediately() {
        let (mut sender, mut ctx) = started();
        sender.on_app_data(&mut ctx, &msg("M1"));

        assert_eq!(ctx.transmitted.len(), 1);
        let packet = ctx.transmitted[0];
        assert_eq!(packet.seq_num, 1);
        assert_eq!(packet.ack, 0);
        assert_eq!(packet.message(), msg("M1"));
        assert!(is_checksum_valid(&packet));

        assert_eq!(ctx.timer, Some(30));
        assert_eq!(sender.mode(), SenderMode::AwaitingAck);
        assert_eq!(sender.next_seq(), 2);
    }

    #[test]
    fn second_message_waits_for_first_ack() {
        let (mut sender, mut ctx) = started();
        sender.on_app_data(&mut ctx, &msg("M1"));
        sender.on_app_data(&mut ctx, &msg("M2"));

        assert_eq!(ctx.take_transmitted().len(), 1);
        assert_eq!(sender.queue().len(), 2);
        assert_eq!(ctx.timer_starts, 1);

        sender.on_packet(&mut ctx, ack(1));
        let sent = ctx.take_transmitted();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].seq_num, 2);
        assert_eq!(sent[0].message(), msg("M2"));
        assert_eq!(sender.mode(), SenderMode::AwaitingAck);
        assert_eq!(sender.expected_ack(), 2);
        assert!(ctx.timer.is_some());
    }

    #[test]
    fn last_ack_returns_to_idle() {
        let (mut sender, mut ctx) = started();
        sender.on_app_data(&mut ctx, &msg("M1"));
        ctx.take_transmitted();

        sender.on_packet(&mut ctx, ack(1));
        assert!(ctx.transmitted.is_empty());
        assert!(ctx.timer.is_none());
        assert!(sender.queue().is_empty());
        assert_eq!(sender.mode(), SenderMode::Idle);
        assert_eq!(sender.expected_ack(), 2);
    }

    #[test]
    fn stale_ack_triggers_immediate_resend() {
        let (mut sender, mut ctx) = started();
        sender.on_app_data(&mut ctx, &msg("M1"));
        let original = ctx.take_transmitted()[0];

        sender.on_packet(&mut ctx, ack(0));
        assert_eq!(ctx.take_transmitted(), vec![original]);
        assert_eq!(sender.mode(), SenderMode::AwaitingAck);
        assert_eq!(sender.expected_ack(), 1);
        assert_eq!(sender.retransmissions(), 1);
        assert!(ctx.timer.is_some());
    }

    #[test]
    fn negative_flag_for_expected_seq_is_not_an_ack() {
        let (mut sender, mut ctx) = started();
        sender.on_app_data(&mut ctx, &msg("M1"));
        ctx.take_transmitted();

        sender.on_packet(&mut ctx, stamp(Control::Nack(1).to_packet()));
        assert_eq!(ctx.take_transmitted().len(), 1);
        assert_eq!(sender.queue().len(), 1);
        assert_eq!(sender.expected_ack(), 1);
    }

    #[test]
    fn timeouts_resend_the_same_packet_indefinitely() {
        let (mut sender, mut ctx) = started();
        sender.on_app_data(&mut ctx, &msg("M1"));
        let original = ctx.take_transmitted()[0];

        for round in 1..=50u64 {
            ctx.stop_timer();
            sender.on_timer(&mut ctx);
            assert_eq!(ctx.take_transmitted(), vec![original]);
            assert_eq!(ctx.timer, Some(30));
            assert_eq!(sender.retransmissions(), round);
        }
        assert_eq!(sender.mode(), SenderMode::AwaitingAck);
    }

    #[test]
    fn timeout_while_idle_does_nothing() {
        let (mut sender, mut ctx) = started();
        sender.on_timer(&mut ctx);
        assert!(ctx.transmitted.is_empty());
        assert!(ctx.timer.is_none());
        assert_eq!(sender.mode(), SenderMode::Idle);
    }

    #[test]
    fn late_duplicate_ack_while_idle_is_ignored() {
        let (mut sender, mut ctx) = started();
        sender.on_app_data(&mut ctx, &msg("M1"));
        sender.on_packet(&mut ctx, ack(1));
        ctx.take_transmitted();

        sender.on_packet(&mut ctx, ack(1));
        sender.on_packet(&mut ctx, ack(1));
        assert!(ctx.transmitted.is_empty());
        assert!(ctx.timer.is_none());
        assert_eq!(sender.mode(), SenderMode::Idle);
        assert_eq!(sender.expected_ack(), 2);
    }

    #[test]
    fn sequence_numbers_keep_increasing_across_idle_periods() {
        let (mut sender, mut ctx) = started();
        for (idx, text) in ["a", "b", "c"].into_iter().enumerate() {
            let seq = idx as u32 + 1;
            sender.on_app_data(&mut ctx, &msg(text));
            assert_eq!(ctx.take_transmitted()[0].seq_num, seq);
            sender.on_packet(&mut ctx, ack(seq));
            assert_eq!(sender.mode(), SenderMode::Idle);
        }
    }

    #[test]
    fn reports_queue_depth_and_retransmissions() {
        let (mut sender, mut ctx) = started();
        sender.on_app_data(&mut ctx, &msg("M1"));
        sender.on_app_data(&mut ctx, &msg("M2"));
        sender.on_timer(&mut ctx);

        assert!(ctx.metrics.contains(&("queue_depth".to_string(), 2.0)));
        assert!(ctx.metrics.contains(&("retransmissions".to_string(), 1.0)));
        assert!(ctx.logs.iter().any(|l| l == "resend pkt1"));
    }
}

use crate::channel::{Fate, FaultModel, corrupt_payload};
use crate::trace::SimulationReport;
use arq_lab_abstract::{Control, EntityId, Message, Packet, SimConfig};
use arq_lab_abstract::{SystemContext, TransportProtocol};
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, info};

#[derive(Debug)]
pub enum EventType {
    PacketArrival { to: EntityId, packet: Packet },
    TimerExpiry { entity: EntityId, generation: u64 },
    AppSend { message: Message },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

#[derive(Debug, Clone, Copy)]
enum TimerOp {
    Start(u64),
    Stop,
}

/// Actions buffered during a protocol callback
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    // kept in call order so stop-then-start restarts the timer
    timer_ops: Vec<TimerOp>,
    logs: Vec<String>,
    delivered: Vec<Message>,
    metrics: Vec<(String, f64)>,
}

/// Context implementation passed to a protocol entity
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl SystemContext for ScopedContext<'_> {
    fn transmit(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, duration_ms: u64) {
        self.buffer.timer_ops.push(TimerOp::Start(duration_ms));
    }

    fn stop_timer(&mut self) {
        self.buffer.timer_ops.push(TimerOp::Stop);
    }

    fn deliver(&mut self, message: &Message) {
        self.buffer.delivered.push(*message);
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.buffer.metrics.push((name.to_string(), value));
    }
}

/// Discrete-event harness for one A→B protocol pair.
pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    channel: FaultModel,

    /// Entity A
    pub sender: Box<dyn TransportProtocol>,
    /// Entity B
    pub receiver: Box<dyn TransportProtocol>,

    pub delivered: Vec<Message>,
    pub sender_packet_count: u32,
    pub receiver_packet_count: u32,
    pub lost_count: u32,
    pub corrupted_count: u32,

    /// Time series recorded via `SystemContext::record_metric`, keyed by name.
    pub metrics: HashMap<String, Vec<(u64, f64)>>,

    // Deterministic fault injection: each entry fires once
    drop_sender_seq_once: Vec<u32>,
    drop_receiver_ack_once: Vec<u32>,
    corrupt_sender_seq_once: Vec<u32>,

    pub link_events: Vec<LinkEventSummary>,

    /// Current timer generation per entity. Starting or stopping a timer
    /// bumps it; expiry events carrying an older generation are stale.
    timer_generations: HashMap<EntityId, u64>,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        sender: Box<dyn TransportProtocol>,
        receiver: Box<dyn TransportProtocol>,
    ) -> Self {
        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            channel: FaultModel::new(config),
            sender,
            receiver,
            delivered: Vec::new(),
            sender_packet_count: 0,
            receiver_packet_count: 0,
            lost_count: 0,
            corrupted_count: 0,
            metrics: HashMap::new(),
            drop_sender_seq_once: Vec::new(),
            drop_receiver_ack_once: Vec::new(),
            corrupt_sender_seq_once: Vec::new(),
            link_events: Vec::new(),
            timer_generations: HashMap::new(),
        }
    }

    /// Drop the first packet sent by A whose seq equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: u32) {
        self.drop_sender_seq_once.push(seq);
    }

    /// Drop the first positive acknowledgment sent by B for `seq`.
    pub fn add_drop_receiver_ack_once(&mut self, seq: u32) {
        self.drop_receiver_ack_once.push(seq);
    }

    /// Corrupt a payload byte of the first packet sent by A whose seq equals `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: u32) {
        self.corrupt_sender_seq_once.push(seq);
    }

    pub fn config(&self) -> &SimConfig {
        self.channel.config()
    }

    pub fn metric_series(&self, name: &str) -> Option<&[(u64, f64)]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, message: Message) {
        self.push_event(time, EventType::AppSend { message });
    }

    /// Schedule `count` upper-layer messages starting now. Interarrival
    /// times are uniform in `[0, 2 * mean_interarrival]`; message `i` is
    /// filled with the letter `'a' + i % 26`.
    pub fn schedule_generated_messages(&mut self, count: u32, mean_interarrival: u64) {
        let mut time = self.time;
        for i in 0..count {
            let gap = self.channel.rng().random_range(0..=mean_interarrival.saturating_mul(2));
            time = time.saturating_add(gap);
            let letter = b'a' + (i % 26) as u8;
            self.schedule_app_send(time, Message::filled(letter));
        }
    }

    pub fn init(&mut self) {
        self.dispatch(EntityId::A, |protocol, ctx| protocol.init(ctx));
        self.dispatch(EntityId::B, |protocol, ctx| protocol.init(ctx));
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Process the next event. Returns true if an event was processed, false if queue is empty.
    pub fn step(&mut self) -> bool {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::PacketArrival { to, packet } => {
                self.dispatch(to, |protocol, ctx| protocol.on_packet(ctx, packet));
            }
            EventType::TimerExpiry { entity, generation } => {
                let current = self.timer_generations.get(&entity).copied();
                if current != Some(generation) {
                    debug!("Skipping stale timer event for {:?}", entity);
                    return true;
                }
                self.dispatch(entity, |protocol, ctx| protocol.on_timer(ctx));
            }
            EventType::AppSend { message } => {
                self.dispatch(EntityId::A, |protocol, ctx| {
                    protocol.on_app_data(ctx, &message)
                });
            }
        }
        true
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config().clone(),
            duration_ms: self.time,
            delivered_messages: self.delivered.iter().map(Message::text).collect(),
            sender_packet_count: self.sender_packet_count,
            receiver_packet_count: self.receiver_packet_count,
            lost_count: self.lost_count,
            corrupted_count: self.corrupted_count,
            metrics: self.metrics.clone(),
            link_events: self.link_events.clone(),
        }
    }

    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    fn dispatch<F>(&mut self, entity: EntityId, callback: F)
    where
        F: FnOnce(&mut dyn TransportProtocol, &mut dyn SystemContext),
    {
        let mut buffer = ActionBuffer::default();
        {
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            let protocol = match entity {
                EntityId::A => self.sender.as_mut(),
                EntityId::B => self.receiver.as_mut(),
            };
            callback(protocol, &mut ctx);
        }
        self.process_actions(entity, buffer);
    }

    fn event(&mut self, description: String) {
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description,
        });
    }

    fn process_actions(&mut self, source: EntityId, buffer: ActionBuffer) {
        for (name, value) in buffer.metrics {
            self.metrics
                .entry(name)
                .or_default()
                .push((self.time, value));
        }

        for log in buffer.logs {
            info!("[{:?} t={}] {}", source, self.time, log);
        }

        for message in buffer.delivered {
            info!("[{:?}] DELIVERED {:?}", source, message);
            self.event(format!(
                "[{:?}] DELIVERED {:?} to upper layer",
                source,
                message.text()
            ));
            self.delivered.push(message);
        }

        for op in buffer.timer_ops {
            let generation = self.timer_generations.entry(source).or_insert(0);
            *generation += 1;
            let generation = *generation;
            if let TimerOp::Start(duration) = op {
                self.push_event(
                    self.time.saturating_add(duration),
                    EventType::TimerExpiry {
                        entity: source,
                        generation,
                    },
                );
            }
        }

        for packet in buffer.outgoing_packets {
            self.transmit(source, packet);
        }
    }

    fn transmit(&mut self, source: EntityId, mut packet: Packet) {
        let target = source.peer();
        match source {
            EntityId::A => self.sender_packet_count += 1,
            EntityId::B => self.receiver_packet_count += 1,
        }

        if source == EntityId::A {
            if let Some(pos) = self
                .drop_sender_seq_once
                .iter()
                .position(|s| *s == packet.seq_num)
            {
                self.drop_sender_seq_once.remove(pos);
                self.lost_count += 1;
                self.event(format!(
                    "[A->B] DROP (deterministic seq) seq={}",
                    packet.seq_num
                ));
                return;
            }
            if let Some(pos) = self
                .corrupt_sender_seq_once
                .iter()
                .position(|s| *s == packet.seq_num)
            {
                self.corrupt_sender_seq_once.remove(pos);
                corrupt_payload(&mut packet, 0);
                self.corrupted_count += 1;
                self.event(format!(
                    "[A->B] CORRUPT (deterministic seq) seq={}",
                    packet.seq_num
                ));
                let latency = self.channel.latency();
                self.schedule_arrival(source, packet, latency);
                return;
            }
        }

        if source == EntityId::B
            && let Control::Ack(seq) = Control::from(&packet)
            && let Some(pos) = self.drop_receiver_ack_once.iter().position(|a| *a == seq)
        {
            self.drop_receiver_ack_once.remove(pos);
            self.lost_count += 1;
            self.event(format!("[B->A] DROP (deterministic ack) ACK{}", seq));
            return;
        }

        match self.channel.apply(&mut packet) {
            Fate::Lost => {
                self.lost_count += 1;
                debug!("Packet lost in channel");
                self.event(format!(
                    "[{:?}->{:?}] DROP (random loss) seq={} ack={}",
                    source, target, packet.seq_num, packet.ack
                ));
            }
            Fate::Delivered { latency, corrupted } => {
                if corrupted {
                    self.corrupted_count += 1;
                    debug!("Packet corrupted in channel");
                    self.event(format!(
                        "[{:?}->{:?}] CORRUPT seq={} ack={}",
                        source, target, packet.seq_num, packet.ack
                    ));
                }
                self.schedule_arrival(source, packet, latency);
            }
        }
    }

    fn schedule_arrival(&mut self, source: EntityId, packet: Packet, latency: u64) {
        let target = source.peer();
        self.event(format!(
            "[{:?}->{:?}] SEND seq={} ack={} (latency={}ms)",
            source, target, packet.seq_num, packet.ack, latency
        ));
        self.push_event(
            self.time.saturating_add(latency),
            EventType::PacketArrival { to: target, packet },
        );
    }
}

use arq_lab_abstract::{EntityId, Message, Packet, SystemContext, TransportProtocol, wire};
use arq_lab_simulator::{Fate, FaultModel};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

#[derive(Debug)]
pub(crate) enum EntityEvent {
    AppData(Message),
    /// An encoded packet off the link.
    Packet(Bytes),
    TimerExpired { generation: u64 },
    Shutdown,
}

/// The entity's side of the world: channel, timer and upper layer.
pub(crate) struct ActorIo {
    entity: EntityId,
    started: Instant,
    channel: FaultModel,
    peer: UnboundedSender<EntityEvent>,
    /// This entity's own mailbox, for timer expiries.
    own: UnboundedSender<EntityEvent>,
    upper_layer: UnboundedSender<Message>,
    /// Bumped on every start and stop; only the latest start may fire.
    timer_generation: u64,
}

impl ActorIo {
    pub(crate) fn new(
        entity: EntityId,
        channel: FaultModel,
        peer: UnboundedSender<EntityEvent>,
        own: UnboundedSender<EntityEvent>,
        upper_layer: UnboundedSender<Message>,
    ) -> Self {
        Self {
            entity,
            started: Instant::now(),
            channel,
            peer,
            own,
            upper_layer,
            timer_generation: 0,
        }
    }
}

impl SystemContext for ActorIo {
    fn transmit(&mut self, mut packet: Packet) {
        match self.channel.apply(&mut packet) {
            Fate::Lost => {
                debug!(entity = ?self.entity, seq = packet.seq_num, "packet lost");
            }
            Fate::Delivered { latency, corrupted } => {
                if corrupted {
                    debug!(entity = ?self.entity, seq = packet.seq_num, "packet corrupted");
                }
                let frame = wire::encode(&packet);
                let peer = self.peer.clone();
                tokio::spawn(async move {
                    sleep(Duration::from_millis(latency)).await;
                    // peer may already be shut down
                    let _ = peer.send(EntityEvent::Packet(frame));
                });
            }
        }
    }

    fn start_timer(&mut self, duration_ms: u64) {
        self.timer_generation += 1;
        let generation = self.timer_generation;
        let own = self.own.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(duration_ms)).await;
            let _ = own.send(EntityEvent::TimerExpired { generation });
        });
    }

    fn stop_timer(&mut self) {
        self.timer_generation += 1;
    }

    fn deliver(&mut self, message: &Message) {
        if self.upper_layer.send(*message).is_err() {
            debug!(entity = ?self.entity, "upper layer gone, dropping delivery");
        }
    }

    fn log(&mut self, message: &str) {
        info!(entity = ?self.entity, t = self.now(), "{message}");
    }

    fn now(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        debug!(entity = ?self.entity, metric = name, value);
    }
}

pub(crate) struct Actor {
    pub(crate) protocol: Box<dyn TransportProtocol>,
    pub(crate) io: ActorIo,
}

impl Actor {
    pub(crate) async fn run(mut self, mut mailbox: UnboundedReceiver<EntityEvent>) {
        self.protocol.init(&mut self.io);
        while let Some(event) = mailbox.recv().await {
            match event {
                EntityEvent::AppData(message) => {
                    self.protocol.on_app_data(&mut self.io, &message);
                }
                EntityEvent::Packet(frame) => match wire::decode(&frame) {
                    Ok(packet) => self.protocol.on_packet(&mut self.io, packet),
                    Err(err) => {
                        debug!(entity = ?self.io.entity, %err, "undecodable frame dropped");
                    }
                },
                EntityEvent::TimerExpired { generation } => {
                    if generation != self.io.timer_generation {
                        debug!(entity = ?self.io.entity, "stale timer expiry skipped");
                        continue;
                    }
                    self.protocol.on_timer(&mut self.io);
                }
                EntityEvent::Shutdown => break,
            }
        }
        debug!(entity = ?self.io.entity, "actor stopped");
    }
}

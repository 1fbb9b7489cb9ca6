use arq_lab_abstract::{EntityId, Message, SimConfig, TransportProtocol};
use arq_lab_simulator::FaultModel;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;

use crate::RuntimeError;
use crate::actor::{Actor, ActorIo, EntityEvent};

/// Handle to a running A→B link.
pub struct LinkHandle {
    a: UnboundedSender<EntityEvent>,
    b: UnboundedSender<EntityEvent>,
    deliveries: UnboundedReceiver<Message>,
    tasks: Vec<JoinHandle<()>>,
}

/// Spawn `sender` as entity A and `receiver` as entity B on the current
/// tokio runtime, connected by a channel behaving as `channel` describes.
pub fn spawn_link(
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
    channel: SimConfig,
) -> LinkHandle {
    let (a_tx, a_rx) = unbounded_channel();
    let (b_tx, b_rx) = unbounded_channel();
    let (upper_tx, upper_rx) = unbounded_channel();

    let a_fault = FaultModel::with_seed(channel.clone(), channel.seed);
    let b_fault = FaultModel::with_seed(channel.clone(), channel.seed.wrapping_add(1));

    let a = Actor {
        protocol: sender,
        io: ActorIo::new(
            EntityId::A,
            a_fault,
            b_tx.clone(),
            a_tx.clone(),
            upper_tx.clone(),
        ),
    };
    let b = Actor {
        protocol: receiver,
        io: ActorIo::new(EntityId::B, b_fault, a_tx.clone(), b_tx.clone(), upper_tx),
    };

    let tasks = vec![tokio::spawn(a.run(a_rx)), tokio::spawn(b.run(b_rx))];

    LinkHandle {
        a: a_tx,
        b: b_tx,
        deliveries: upper_rx,
        tasks,
    }
}

impl LinkHandle {
    /// Hand a message to A's upper-layer entry point.
    pub fn send(&self, message: Message) -> Result<(), RuntimeError> {
        self.a
            .send(EntityEvent::AppData(message))
            .map_err(|_| RuntimeError::Closed)
    }

    /// Next message B delivered upward, in delivery order.
    pub async fn next_delivery(&mut self) -> Result<Message, RuntimeError> {
        self.deliveries.recv().await.ok_or(RuntimeError::Closed)
    }

    /// Stop both entities and wait for their tasks to finish.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        let _ = self.a.send(EntityEvent::Shutdown);
        let _ = self.b.send(EntityEvent::Shutdown);
        for task in self.tasks {
            task.await?;
        }
        Ok(())
    }
}

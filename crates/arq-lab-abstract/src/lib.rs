pub mod config;
pub mod interface;
pub mod packet;
pub mod scenario;
pub mod wire;

pub use interface::{EntityId, SystemContext, TransportProtocol};
pub use packet::{Control, MESSAGE_LENGTH, Message, Packet, PacketError};

pub use config::{ProtocolConfig, SimConfig};
pub use scenario::{
    ProtocolConfigOverride, SimConfigOverride, TestAction, TestAssertion, TestScenario,
};

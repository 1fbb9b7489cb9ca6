use crate::config::{ProtocolConfig, SimConfig};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    #[serde(default)]
    pub protocol: ProtocolConfigOverride,
    pub actions: Vec<TestAction>,
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProtocolConfigOverride {
    pub retransmit_timeout_ms: Option<u64>,
}

impl ProtocolConfigOverride {
    pub fn apply_to(&self, config: &mut ProtocolConfig) {
        if let Some(v) = self.retransmit_timeout_ms {
            config.retransmit_timeout_ms = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Upper layer at A hands over a message at a specific time
    AppSend { time: u64, data: String },
    /// Upper layer at A produces `count` generated messages
    GenerateTraffic { count: u32, mean_interarrival: u64 },
    /// Drop the first packet sent by A with the given seq number
    DropNextFromSenderSeq { seq: u32 },
    /// Drop the first acknowledgment sent by B with the given seq number
    DropNextFromReceiverAck { seq: u32 },
    /// Flip a payload byte in the first packet sent by A with the given seq number
    CorruptNextFromSenderSeq { seq: u32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Assert that specific data was delivered to B's upper layer
    DataDelivered { data: String },
    /// Assert that B delivered exactly these messages, in this order
    DeliveredInOrder { data: Vec<String> },
    /// Assert that the total number of packets sent by A is within range
    SenderPacketCount { min: u32, max: Option<u32> },
    /// Assert that simulation finishes within time
    MaxDuration { ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
name = "lost ack"
description = "B's first acknowledgment never arrives"

[config]
seed = 7
max_latency = 20

[protocol]
retransmit_timeout_ms = 100

[[actions]]
type = "app_send"
time = 0
data = "hello"

[[actions]]
type = "drop_next_from_receiver_ack"
seq = 1

[[assertions]]
type = "delivered_in_order"
data = ["hello"]

[[assertions]]
type = "sender_packet_count"
min = 2
"#;

    #[test]
    fn parses_scenario_and_applies_overrides() {
        let scenario: TestScenario = toml::from_str(SCENARIO).unwrap();
        assert_eq!(scenario.actions.len(), 2);
        assert!(matches!(
            scenario.actions[1],
            TestAction::DropNextFromReceiverAck { seq: 1 }
        ));

        let mut sim = SimConfig::default();
        scenario.config.apply_to(&mut sim);
        assert_eq!(sim.seed, 7);
        assert_eq!(sim.max_latency, 20);
        assert_eq!(sim.min_latency, 10);

        let mut protocol = ProtocolConfig::default();
        scenario.protocol.apply_to(&mut protocol);
        assert_eq!(protocol.retransmit_timeout_ms, 100);
    }
}

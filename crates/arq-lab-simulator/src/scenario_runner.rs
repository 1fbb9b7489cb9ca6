use anyhow::{Context, Result, anyhow, bail};
use arq_lab_abstract::{
    Message, ProtocolConfig, SimConfig, TestAction, TestAssertion, TestScenario,
    TransportProtocol,
};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

pub const DEFAULT_MAX_DURATION_MS: u64 = 10_000;

pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario file {}", path.display()))
}

/// Build a simulator for `scenario`. `build` receives the scenario's
/// protocol configuration and returns the (A, B) entity pair.
pub fn build_simulator<F>(scenario: &TestScenario, build: F) -> Result<Simulator>
where
    F: FnOnce(ProtocolConfig) -> (Box<dyn TransportProtocol>, Box<dyn TransportProtocol>),
{
    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);
    let mut protocol = ProtocolConfig::default();
    scenario.protocol.apply_to(&mut protocol);

    let (sender, receiver) = build(protocol);
    let mut sim = Simulator::new(config, sender, receiver);
    configure_actions(&mut sim, &scenario.actions)?;
    Ok(sim)
}

pub fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) -> Result<()> {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => {
                let message = Message::new(data.as_bytes())
                    .with_context(|| format!("Invalid app_send data {data:?}"))?;
                sim.schedule_app_send(*time, message);
            }
            TestAction::GenerateTraffic {
                count,
                mean_interarrival,
            } => {
                sim.schedule_generated_messages(*count, *mean_interarrival);
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { seq } => {
                sim.add_drop_receiver_ack_once(*seq);
            }
            TestAction::CorruptNextFromSenderSeq { seq } => {
                sim.add_corrupt_sender_seq_once(*seq);
            }
        }
    }
    Ok(())
}

/// Run a scenario to completion and check its assertions.
pub fn run_scenario<F>(scenario: &TestScenario, build: F) -> Result<SimulationReport>
where
    F: FnOnce(ProtocolConfig) -> (Box<dyn TransportProtocol>, Box<dyn TransportProtocol>),
{
    info!("Running Scenario: {}", scenario.name);
    info!("Description: {}", scenario.description);

    let mut sim = build_simulator(scenario, build)?;
    sim.init();

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| match a {
            TestAssertion::MaxDuration { ms } => Some(*ms),
            _ => None,
        })
        .unwrap_or(DEFAULT_MAX_DURATION_MS);

    run_bounded(&mut sim, max_duration)?;

    for assertion in &scenario.assertions {
        check_assertion(&sim, assertion)?;
    }

    info!("Test Scenario Passed!");
    Ok(sim.export_report())
}

/// Step `sim` until its event queue drains, failing once simulated time
/// passes `max_duration`.
pub fn run_bounded(sim: &mut Simulator, max_duration: u64) -> Result<()> {
    while sim.step() {
        if sim.current_time() > max_duration {
            bail!("Simulation timed out after {} ms", max_duration);
        }
    }
    Ok(())
}

/// Send `count` generated messages from A and run until every one is
/// acknowledged or `max_duration` ms of simulated time have passed.
pub fn run_generated<F>(
    config: SimConfig,
    protocol: ProtocolConfig,
    count: u32,
    mean_interarrival: u64,
    max_duration: u64,
    build: F,
) -> Result<SimulationReport>
where
    F: FnOnce(ProtocolConfig) -> (Box<dyn TransportProtocol>, Box<dyn TransportProtocol>),
{
    let (sender, receiver) = build(protocol);
    let mut sim = Simulator::new(config, sender, receiver);
    sim.schedule_generated_messages(count, mean_interarrival);
    info!("Starting headless simulation…");
    sim.init();
    run_bounded(&mut sim, max_duration)?;
    info!("Simulation complete.");
    Ok(sim.export_report())
}

pub fn run_scenario_file<F>(path: &Path, build: F) -> Result<SimulationReport>
where
    F: FnOnce(ProtocolConfig) -> (Box<dyn TransportProtocol>, Box<dyn TransportProtocol>),
{
    let scenario = load_scenario(path)?;
    run_scenario(&scenario, build)
}

fn check_assertion(sim: &Simulator, assertion: &TestAssertion) -> Result<()> {
    match assertion {
        TestAssertion::DataDelivered { data } => {
            let expected = Message::new(data.as_bytes())?;
            if !sim.delivered.contains(&expected) {
                return Err(anyhow!(
                    "Assertion Failed: Data {:?} was not delivered",
                    data
                ));
            }
        }
        TestAssertion::DeliveredInOrder { data } => {
            let delivered: Vec<String> = sim.delivered.iter().map(Message::text).collect();
            if &delivered != data {
                return Err(anyhow!(
                    "Assertion Failed: delivered {:?}, expected {:?}",
                    delivered,
                    data
                ));
            }
        }
        TestAssertion::SenderPacketCount { min, max } => {
            if sim.sender_packet_count < *min {
                return Err(anyhow!(
                    "Assertion Failed: Sender sent {} packets, expected min {}",
                    sim.sender_packet_count,
                    min
                ));
            }
            if let Some(max) = max
                && sim.sender_packet_count > *max
            {
                return Err(anyhow!(
                    "Assertion Failed: Sender sent {} packets, expected max {}",
                    sim.sender_packet_count,
                    max
                ));
            }
        }
        TestAssertion::MaxDuration { .. } => {} // Already checked
    }
    Ok(())
}

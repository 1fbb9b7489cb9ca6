use arq_lab_abstract::SimConfig;
use serde::Serialize;
use std::collections::HashMap;

use crate::engine::LinkEventSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration_ms: u64,
    pub delivered_messages: Vec<String>,
    pub sender_packet_count: u32,
    pub receiver_packet_count: u32,
    pub lost_count: u32,
    pub corrupted_count: u32,
    pub metrics: HashMap<String, Vec<(u64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
}

use arq_lab_abstract::{Message, Packet, SystemContext};

/// Context that records every call for later inspection.
#[derive(Default)]
pub struct RecordingContext {
    pub transmitted: Vec<Packet>,
    pub delivered: Vec<Message>,
    pub logs: Vec<String>,
    pub metrics: Vec<(String, f64)>,
    /// Duration of the running timer, if any.
    pub timer: Option<u64>,
    pub timer_starts: usize,
}

impl RecordingContext {
    pub fn take_transmitted(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.transmitted)
    }
}

impl SystemContext for RecordingContext {
    fn transmit(&mut self, packet: Packet) {
        self.transmitted.push(packet);
    }

    fn start_timer(&mut self, duration_ms: u64) {
        self.timer = Some(duration_ms);
        self.timer_starts += 1;
    }

    fn stop_timer(&mut self) {
        self.timer = None;
    }

    fn deliver(&mut self, message: &Message) {
        self.delivered.push(*message);
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        0
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.metrics.push((name.to_string(), value));
    }
}

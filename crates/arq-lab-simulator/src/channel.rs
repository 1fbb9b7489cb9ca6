//! Fault model of the unreliable link, shared by the simulator and the
//! actor runtime.

use arq_lab_abstract::{MESSAGE_LENGTH, Packet, SimConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Value written over a header field when it is corrupted.
const GARBAGE: u32 = 999_999;

/// What the channel does with one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Lost,
    Delivered { latency: u64, corrupted: bool },
}

pub struct FaultModel {
    config: SimConfig,
    rng: StdRng,
}

impl FaultModel {
    pub fn new(config: SimConfig) -> Self {
        let seed = config.seed;
        Self::with_seed(config, seed)
    }

    pub fn with_seed(config: SimConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Decide the fate of `packet`, corrupting it in place when needed.
    pub fn apply(&mut self, packet: &mut Packet) -> Fate {
        if self.rng.random::<f64>() < self.config.loss_rate {
            return Fate::Lost;
        }

        let corrupted = self.rng.random::<f64>() < self.config.corrupt_rate;
        if corrupted {
            self.corrupt(packet);
        }

        Fate::Delivered {
            latency: self.latency(),
            corrupted,
        }
    }

    /// Uniform latency in `[min_latency, max_latency]`. Packets sent close
    /// together may overtake each other.
    pub fn latency(&mut self) -> u64 {
        let lo = self.config.min_latency.min(self.config.max_latency);
        let hi = self.config.min_latency.max(self.config.max_latency);
        self.rng.random_range(lo..=hi)
    }

    /// Three quarters of corruptions hit the payload; the rest clobber the
    /// sequence number or the acknowledgment flag.
    pub fn corrupt(&mut self, packet: &mut Packet) {
        let roll = self.rng.random::<f64>();
        if roll < 0.75 {
            corrupt_payload(packet, self.rng.random_range(0..MESSAGE_LENGTH));
        } else if roll < 0.875 {
            packet.seq_num = GARBAGE;
        } else {
            packet.ack = GARBAGE;
        }
    }
}

/// Flip one bit of the payload byte at `idx`.
pub fn corrupt_payload(packet: &mut Packet, idx: usize) {
    packet.payload[idx % MESSAGE_LENGTH] ^= 0x20;
}

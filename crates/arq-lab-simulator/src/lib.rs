pub mod channel;
pub mod engine;
pub mod scenario_runner;
pub mod trace;

pub use channel::{Fate, FaultModel};
pub use engine::{LinkEventSummary, Simulator};
pub use trace::SimulationReport;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use arq_lab_abstract::{Message, ProtocolConfig, SimConfig, TransportProtocol};
use arq_lab_runtime::spawn_link;
use arq_lab_simulator::{SimulationReport, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stop-and-wait ARQ over a simulated unreliable link")]
struct Args {
    /// Run a scenario file and check its assertions.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Number of messages the upper layer at A generates.
    #[arg(long, default_value_t = 10)]
    messages: u32,

    /// Mean time between generated messages, in ms.
    #[arg(long, default_value_t = 1000)]
    interarrival: u64,

    #[arg(long, default_value_t = 0.1)]
    loss: f64,
    #[arg(long, default_value_t = 0.1)]
    corrupt: f64,
    #[arg(long, default_value_t = 100)]
    min_latency: u64,
    #[arg(long, default_value_t = 500)]
    max_latency: u64,
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Retransmission timeout of entity A, in ms.
    #[arg(long, default_value_t = 1200)]
    timeout: u64,

    /// Give up after this much simulated (or, with --realtime, wall-clock)
    /// time, in ms. Defaults to the latest generated send time plus
    /// 10 s of slack.
    #[arg(long)]
    max_duration: Option<u64>,

    /// Run over the tokio actor runtime with wall-clock timers.
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

impl Args {
    fn sim_config(&self) -> SimConfig {
        SimConfig {
            loss_rate: self.loss,
            corrupt_rate: self.corrupt,
            min_latency: self.min_latency,
            max_latency: self.max_latency,
            seed: self.seed,
        }
    }

    fn max_duration(&self) -> u64 {
        self.max_duration.unwrap_or_else(|| {
            self.interarrival
                .saturating_mul(2)
                .saturating_mul(u64::from(self.messages))
                .saturating_add(scenario_runner::DEFAULT_MAX_DURATION_MS)
        })
    }

    fn protocol_config(&self) -> ProtocolConfig {
        ProtocolConfig {
            retransmit_timeout_ms: self.timeout,
        }
    }
}

fn protocol_pair(
    config: ProtocolConfig,
) -> (Box<dyn TransportProtocol>, Box<dyn TransportProtocol>) {
    (arq_lab_core::sender(config), arq_lab_core::receiver())
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("arq-lab starting…");

    if args.realtime {
        if args.scenario.is_some() {
            bail!("--scenario and --realtime cannot be used together");
        }
        return run_realtime(&args);
    }

    let report = match &args.scenario {
        Some(path) => scenario_runner::run_scenario_file(path, protocol_pair)?,
        None => scenario_runner::run_generated(
            args.sim_config(),
            args.protocol_config(),
            args.messages,
            args.interarrival,
            args.max_duration(),
            protocol_pair,
        )?,
    };
    log_summary(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

fn run_realtime(args: &Args) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let limit = Duration::from_millis(args.max_duration());
    runtime.block_on(async {
        let (sender, receiver) = protocol_pair(args.protocol_config());
        let mut link = spawn_link(sender, receiver, args.sim_config());

        let exchange = async {
            for i in 0..args.messages {
                link.send(Message::filled(b'a' + (i % 26) as u8))?;
                tokio::time::sleep(Duration::from_millis(args.interarrival)).await;
            }
            for _ in 0..args.messages {
                let message = link.next_delivery().await?;
                info!("upper layer at B received {:?}", message.text());
            }
            Ok::<_, anyhow::Error>(())
        };
        let outcome = tokio::time::timeout(limit, exchange).await;
        link.shutdown().await?;
        match outcome {
            Ok(result) => result,
            Err(_) => bail!("Link timed out after {} ms", limit.as_millis()),
        }
    })
}

fn log_summary(report: &SimulationReport) {
    info!(
        "Simulated time: {} ms | delivered: {} | sent by A: {} | sent by B: {} | lost: {} | corrupted: {}",
        report.duration_ms,
        report.delivered_messages.len(),
        report.sender_packet_count,
        report.receiver_packet_count,
        report.lost_count,
        report.corrupted_count,
    );
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}

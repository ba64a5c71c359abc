use anyhow::Result;
use clap::{Parser, ValueEnum};
use pacesim::{NodeId, Scenario, ScenarioConfig};
use pacesim_core::{
    DataRate, ErrorModel, ErrorUnit,
    measure::ErrorRate,
    time::parse_duration,
};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    /// 5Mbps bus, byte errors on the sink, congestion window trace
    CwndTrace,
    /// 100Mbps bus, packet errors on the sink, sender on node 7, 50s
    LossyBus,
}

/// Simulate a paced sender streaming to a packet sink over a shared
/// lossy bus.
#[derive(Parser)]
struct Command {
    #[arg(long, value_enum, default_value = "cwnd-trace")]
    preset: Preset,

    /// number of nodes on the bus
    #[arg(long)]
    nodes: Option<usize>,

    /// data rate of the bus (e.g. `5Mbps`)
    #[arg(long)]
    bus_rate: Option<DataRate>,

    /// propagation delay of the bus (e.g. `5ms`)
    #[arg(long, value_parser = parse_duration)]
    bus_delay: Option<Duration>,

    /// packets waiting for the bus before the device drops
    #[arg(long)]
    queue_limit: Option<usize>,

    /// receive error rate on the sink's node (`0.001`, `1e-6`, `5%`)
    #[arg(long)]
    error_rate: Option<ErrorRate>,

    /// unit of the error rate: bit, byte or packet
    #[arg(long)]
    error_unit: Option<ErrorUnit>,

    #[arg(long)]
    sender_node: Option<NodeId>,

    #[arg(long)]
    sink_node: Option<NodeId>,

    #[arg(long)]
    port: Option<u16>,

    /// size of the packets, in bytes
    #[arg(long)]
    packet_size: Option<u32>,

    /// number of packets to send
    #[arg(long)]
    budget: Option<u64>,

    /// target sending rate (e.g. `100Mbps`)
    #[arg(long)]
    target_rate: Option<DataRate>,

    /// time the sender starts (e.g. `1s`)
    #[arg(long, value_parser = parse_duration)]
    start: Option<Duration>,

    /// length of the simulation (e.g. `10s`)
    #[arg(long, value_parser = parse_duration)]
    time: Option<Duration>,

    /// congestion window trace file
    #[arg(long, conflicts_with = "no_trace")]
    trace: Option<PathBuf>,

    /// do not write the congestion window trace
    #[arg(long)]
    no_trace: bool,

    /// seed of the receive error models
    #[arg(long)]
    seed: Option<u64>,
}

impl Command {
    fn into_config(self) -> ScenarioConfig {
        let mut config = match self.preset {
            Preset::CwndTrace => ScenarioConfig::cwnd_trace(),
            Preset::LossyBus => ScenarioConfig::lossy_bus(),
        };

        if let Some(nodes) = self.nodes {
            config.node_count = nodes;
        }
        if let Some(rate) = self.bus_rate {
            config.bus_rate = rate;
        }
        if let Some(delay) = self.bus_delay {
            config.bus_delay = delay;
        }
        if let Some(limit) = self.queue_limit {
            config.queue_limit = limit;
        }
        config.error_model =
            merge_error_model(config.error_model, self.error_rate, self.error_unit);
        if let Some(node) = self.sender_node {
            config.sender_node = node;
        }
        if let Some(node) = self.sink_node {
            config.sink_node = node;
        }
        if let Some(port) = self.port {
            config.sink_port = port;
        }
        if let Some(size) = self.packet_size {
            config.packet_size = size;
        }
        if let Some(budget) = self.budget {
            config.packet_budget = budget;
        }
        if let Some(rate) = self.target_rate {
            config.target_rate = rate;
        }
        if let Some(start) = self.start {
            config.sender_start = start;
        }
        if let Some(time) = self.time {
            config.simulation_time = time;
        }
        if self.no_trace {
            config.trace_file = None;
        } else if let Some(path) = self.trace {
            config.trace_file = Some(path);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        config
    }
}

/// Apply the command line's error rate and unit on top of the preset's
/// model. A preset without errors gets a zero rate per byte to start from.
fn merge_error_model(
    model: ErrorModel,
    rate: Option<ErrorRate>,
    unit: Option<ErrorUnit>,
) -> ErrorModel {
    if rate.is_none() && unit.is_none() {
        return model;
    }
    let (current_rate, current_unit) = match model {
        ErrorModel::None => (ErrorRate::saturating(0.0), ErrorUnit::default()),
        ErrorModel::Rate { rate, unit } => (rate, unit),
    };
    ErrorModel::Rate {
        rate: rate.unwrap_or(current_rate),
        unit: unit.unwrap_or(current_unit),
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let config = Command::parse().into_config();
    log::info!(
        "{nodes} nodes on a {rate} bus ({delay:?}), {budget} packets of {size} bytes at {target}",
        nodes = config.node_count,
        rate = config.bus_rate,
        delay = config.bus_delay,
        budget = config.packet_budget,
        size = config.packet_size,
        target = config.target_rate,
    );

    let report = Scenario::build(&config)?.run();
    print!("{report}");

    Ok(())
}

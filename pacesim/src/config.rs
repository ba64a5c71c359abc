use crate::{
    defaults,
    network::{NodeId, WindowConfig},
};
use pacesim_core::{
    DataRate, ErrorModel, ErrorUnit,
    measure::ErrorRate,
};
use std::{net::Ipv4Addr, path::PathBuf, time::Duration};
use thiserror::Error;

/// Parameters of a paced sender scenario.
///
/// `node_count` nodes share a single bus. A [`PacedSender`] on
/// `sender_node` streams to a packet sink listening on
/// `sink_node:sink_port`, whose device drops packets according to
/// `error_model`. The sender runs from `sender_start` to the end of the
/// simulation, the sink for the whole simulation.
///
/// [`PacedSender`]: pacesim_core::PacedSender
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub node_count: usize,
    pub base_address: Ipv4Addr,

    pub bus_rate: DataRate,
    pub bus_delay: Duration,
    pub queue_limit: usize,

    /// receive error model of the sink's node
    pub error_model: ErrorModel,

    pub sender_node: NodeId,
    pub sink_node: NodeId,
    pub sink_port: u16,

    pub packet_size: u32,
    pub packet_budget: u64,
    pub target_rate: DataRate,

    pub sender_start: Duration,
    pub simulation_time: Duration,

    /// where to write the congestion window trace, `None` to disable it
    pub trace_file: Option<PathBuf>,

    pub window: WindowConfig,

    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Node {node} does not exist, the network has {count} nodes")]
    UnknownNode { node: NodeId, count: usize },
    #[error("The sender starts at {start:?}, after the end of the simulation ({end:?})")]
    StartAfterEnd { start: Duration, end: Duration },
    #[error("The segment size must be at least 1 byte")]
    ZeroSegmentSize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::cwnd_trace()
    }
}

impl ScenarioConfig {
    /// Ten nodes on a 5Mbps bus, the sink's device corrupts one byte
    /// in a million, the congestion window is traced to
    /// `tcp-example.cwnd`.
    pub fn cwnd_trace() -> Self {
        Self {
            node_count: defaults::DEFAULT_NODE_COUNT,
            base_address: defaults::DEFAULT_BASE_ADDRESS,
            bus_rate: defaults::DEFAULT_BUS_RATE,
            bus_delay: defaults::DEFAULT_BUS_DELAY,
            queue_limit: defaults::DEFAULT_QUEUE_LIMIT,
            error_model: ErrorModel::Rate {
                rate: ErrorRate::saturating(1e-6),
                unit: ErrorUnit::Byte,
            },
            sender_node: NodeId::new(0),
            sink_node: NodeId::new(9),
            sink_port: defaults::DEFAULT_SINK_PORT,
            packet_size: defaults::DEFAULT_PACKET_SIZE,
            packet_budget: defaults::DEFAULT_PACKET_BUDGET,
            target_rate: defaults::DEFAULT_TARGET_RATE,
            sender_start: defaults::DEFAULT_SENDER_START,
            simulation_time: defaults::DEFAULT_SIMULATION_TIME,
            trace_file: Some(PathBuf::from(defaults::DEFAULT_TRACE_FILE)),
            window: WindowConfig::default(),
            seed: defaults::DEFAULT_SEED,
        }
    }

    /// A fast bus with one packet in a thousand corrupted, the sender on
    /// node 7, 50 seconds and no trace.
    pub fn lossy_bus() -> Self {
        Self {
            bus_rate: DataRate::from_mbps(100),
            bus_delay: Duration::from_nanos(6560),
            error_model: ErrorModel::Rate {
                rate: ErrorRate::saturating(0.001),
                unit: ErrorUnit::Packet,
            },
            sender_node: NodeId::new(7),
            simulation_time: Duration::from_secs(50),
            trace_file: None,
            ..Self::cwnd_trace()
        }
    }

    pub fn set_node_count(mut self, node_count: usize) -> Self {
        self.node_count = node_count;
        self
    }

    pub fn set_bus(mut self, rate: DataRate, delay: Duration) -> Self {
        self.bus_rate = rate;
        self.bus_delay = delay;
        self
    }

    pub fn set_queue_limit(mut self, queue_limit: usize) -> Self {
        self.queue_limit = queue_limit;
        self
    }

    pub fn set_error_model(mut self, error_model: ErrorModel) -> Self {
        self.error_model = error_model;
        self
    }

    pub fn set_sender_node(mut self, node: NodeId) -> Self {
        self.sender_node = node;
        self
    }

    pub fn set_sink(mut self, node: NodeId, port: u16) -> Self {
        self.sink_node = node;
        self.sink_port = port;
        self
    }

    pub fn set_stream(mut self, packet_size: u32, packet_budget: u64, target_rate: DataRate) -> Self {
        self.packet_size = packet_size;
        self.packet_budget = packet_budget;
        self.target_rate = target_rate;
        self
    }

    pub fn set_sender_start(mut self, start: Duration) -> Self {
        self.sender_start = start;
        self
    }

    pub fn set_simulation_time(mut self, time: Duration) -> Self {
        self.simulation_time = time;
        self
    }

    pub fn set_trace_file(mut self, path: Option<PathBuf>) -> Self {
        self.trace_file = path;
        self
    }

    pub fn set_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check the parameters that only make sense together.
    ///
    /// The stream parameters are checked by the sender itself.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for node in [self.sender_node, self.sink_node] {
            if node.index() >= self.node_count {
                return Err(ConfigurationError::UnknownNode {
                    node,
                    count: self.node_count,
                });
            }
        }
        if self.sender_start > self.simulation_time {
            return Err(ConfigurationError::StartAfterEnd {
                start: self.sender_start,
                end: self.simulation_time,
            });
        }
        if self.window.segment_size == 0 {
            return Err(ConfigurationError::ZeroSegmentSize);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cwnd_trace_preset() {
        let config = ScenarioConfig::default();

        assert_eq!(config, ScenarioConfig::cwnd_trace());
        assert_eq!(config.node_count, 10);
        assert_eq!(config.bus_rate, DataRate::from_mbps(5));
        assert_eq!(config.bus_delay, Duration::from_millis(5));
        assert_eq!(config.error_model.to_string(), "0.000001 per byte");
        assert_eq!(config.sender_node, NodeId::new(0));
        assert_eq!(config.sink_node, NodeId::new(9));
        assert_eq!(config.sink_port, 8080);
        assert_eq!(config.packet_size, 1460);
        assert_eq!(config.packet_budget, 1_000_000);
        assert_eq!(config.target_rate, DataRate::from_mbps(100));
        assert_eq!(config.sender_start, Duration::from_secs(1));
        assert_eq!(config.simulation_time, Duration::from_secs(10));
        assert_eq!(config.trace_file, Some(PathBuf::from("tcp-example.cwnd")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn lossy_bus_preset() {
        let config = ScenarioConfig::lossy_bus();

        assert_eq!(config.bus_rate, DataRate::from_mbps(100));
        assert_eq!(config.bus_delay, Duration::from_nanos(6560));
        assert_eq!(config.error_model.to_string(), "0.001 per packet");
        assert_eq!(config.sender_node, NodeId::new(7));
        assert_eq!(config.simulation_time, Duration::from_secs(50));
        assert_eq!(config.trace_file, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_node() {
        let config = ScenarioConfig::default().set_sink(NodeId::new(10), 8080);
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::UnknownNode {
                node: NodeId::new(10),
                count: 10
            })
        );
    }

    #[test]
    fn start_after_end() {
        let config = ScenarioConfig::default()
            .set_sender_start(Duration::from_secs(11))
            .set_simulation_time(Duration::from_secs(10));
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::StartAfterEnd { .. })
        ));
    }
}

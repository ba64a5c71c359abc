//! Default values of the scenario and of the network

use pacesim_core::DataRate;
use std::{net::Ipv4Addr, time::Duration};

pub const DEFAULT_NODE_COUNT: usize = 10;

/// the nodes are numbered from `10.1.2.1`
pub const DEFAULT_BASE_ADDRESS: Ipv4Addr = Ipv4Addr::new(10, 1, 2, 0);

pub const DEFAULT_BUS_RATE: DataRate = DataRate::from_mbps(5);
pub const DEFAULT_BUS_DELAY: Duration = Duration::from_millis(5);

/// packets waiting for the bus before the device starts dropping
pub const DEFAULT_QUEUE_LIMIT: usize = 100;

pub const DEFAULT_SINK_PORT: u16 = 8080;

pub const DEFAULT_PACKET_SIZE: u32 = 1460;
pub const DEFAULT_PACKET_BUDGET: u64 = 1_000_000;
pub const DEFAULT_TARGET_RATE: DataRate = DataRate::from_mbps(100);

pub const DEFAULT_SENDER_START: Duration = Duration::from_secs(1);
pub const DEFAULT_SIMULATION_TIME: Duration = Duration::from_secs(10);

pub const DEFAULT_TRACE_FILE: &str = "tcp-example.cwnd";

pub const DEFAULT_SEGMENT_SIZE: u32 = 1460;
pub const DEFAULT_INITIAL_WINDOW_SEGMENTS: u32 = 10;

pub const FIRST_EPHEMERAL_PORT: u16 = 49153;

pub const DEFAULT_SEED: u64 = 0;

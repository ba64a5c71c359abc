//! Stream 50 packets from node 0 to node 3 and print every change of the
//! congestion window to stdout, in the trace file format.

use pacesim::{Channel, Network, NodeId, Simulation, defaults};
use pacesim_core::{CONGESTION_WINDOW, CongestionTraceSink, DataRate, SimTime};
use std::{io, time::Duration};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let channel = Channel::new(
        DataRate::from_mbps(5),
        Duration::from_millis(5),
        defaults::DEFAULT_QUEUE_LIMIT,
    );
    let mut network = Network::new(4, defaults::DEFAULT_BASE_ADDRESS, channel)?;
    let sink = network.install_sink(NodeId::new(3), defaults::DEFAULT_SINK_PORT)?;

    let end = SimTime::from_secs(2);
    let mut sim = Simulation::new(network);
    sim.schedule_sink(sink, SimTime::ZERO, end);

    let socket = sim.open_socket(NodeId::new(0))?;
    let conn = socket.id();
    // twice the bus capacity: packets queue up on the device
    let app = sim.add_sender(socket, sink, 1460, 50, DataRate::from_mbps(10))?;
    sim.schedule_sender(app, SimTime::from_millis(100), end);

    sim.trace_connect(
        conn,
        CONGESTION_WINDOW,
        Box::new(CongestionTraceSink::new(io::stdout())),
    )?;

    let report = sim.run_until(end);
    eprint!("{report}");

    Ok(())
}

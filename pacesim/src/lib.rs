/*!
# pacesim

A paced sender on a shared lossy bus.

Ten nodes (by default) share a single [`Channel`]. A [`PacedSender`]
opens a [`SimSocket`] on one node and streams fixed-size packets at a
target rate to a [`PacketSink`] on another node, whose device corrupts
packets according to an [`ErrorModel`]. Every change of the
connection's congestion window can be written to a trace file.

```no_run
use pacesim::{Scenario, ScenarioConfig};

let config = ScenarioConfig::cwnd_trace();
let report = Scenario::build(&config)?.run();
println!("{report}");
# Ok::<(), anyhow::Error>(())
```

[`PacedSender`]: pacesim_core::PacedSender
[`ErrorModel`]: pacesim_core::ErrorModel
*/

pub mod config;
pub mod defaults;
pub mod network;
pub mod scenario;
pub mod simulation;
mod sink;

pub use self::{
    config::{ConfigurationError, ScenarioConfig},
    network::{Channel, ConnId, Network, NetworkError, NodeId, SimSocket, WindowConfig},
    scenario::{Scenario, ScenarioReport},
    simulation::{SimEvent, SimReport, Simulation},
    sink::PacketSink,
};

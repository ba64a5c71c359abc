use crate::{
    config::ScenarioConfig,
    network::{Channel, Network},
    simulation::{SimReport, Simulation},
};
use anyhow::{Context as _, Result};
use pacesim_core::{CONGESTION_WINDOW, CongestionTraceSink, SimTime, WindowObserver as _};
use std::{
    cell::RefCell,
    fmt,
    fs::File,
    io::BufWriter,
    path::PathBuf,
    rc::Rc,
};

type TraceFile = CongestionTraceSink<BufWriter<File>>;

/// A scenario ready to run.
pub struct Scenario {
    simulation: Simulation,
    end: SimTime,
    trace: Option<(PathBuf, Rc<RefCell<TraceFile>>)>,
}

/// Summary of a scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub simulation: SimReport,
    /// the trace file and the number of records written to it
    pub trace: Option<(PathBuf, u64)>,
}

impl Scenario {
    /// Assemble the network, the sink, the sender and the trace file.
    ///
    /// Nothing is simulated yet: any configuration error is reported
    /// before the clock starts.
    pub fn build(config: &ScenarioConfig) -> Result<Self> {
        config.validate().context("Invalid scenario")?;

        let channel = Channel::new(config.bus_rate, config.bus_delay, config.queue_limit);
        let mut network = Network::new(config.node_count, config.base_address, channel)
            .context("Failed to create the network")?;
        network.set_seed(config.seed);
        network.set_window(config.window);
        network.set_receive_error_model(config.sink_node, config.error_model)?;
        let sink = network
            .install_sink(config.sink_node, config.sink_port)
            .context("Failed to install the packet sink")?;

        let end = SimTime::ZERO + config.simulation_time;
        let mut simulation = Simulation::new(network);
        simulation.schedule_sink(sink, SimTime::ZERO, end);

        let socket = simulation
            .open_socket(config.sender_node)
            .context("Failed to open the sender's socket")?;
        let conn = socket.id();
        let app = simulation
            .add_sender(
                socket,
                sink,
                config.packet_size,
                config.packet_budget,
                config.target_rate,
            )
            .context("Invalid sender configuration")?;
        simulation.schedule_sender(app, SimTime::ZERO + config.sender_start, end);

        let trace = match &config.trace_file {
            None => None,
            Some(path) => {
                let file = CongestionTraceSink::create(path).with_context(|| {
                    format!("Failed to create the trace file {}", path.display())
                })?;
                let file = Rc::new(RefCell::new(file));
                let observer = Rc::clone(&file);
                simulation.trace_connect(
                    conn,
                    CONGESTION_WINDOW,
                    Box::new(move |at: SimTime, old: u32, new: u32| {
                        observer.borrow_mut().on_window_change(at, old, new)
                    }),
                )?;
                Some((path.clone(), file))
            }
        };

        log::debug!(
            "{app} on node {sender} streaming to {sink}, receive errors on the sink: {error}",
            sender = config.sender_node,
            error = config.error_model,
        );

        Ok(Self {
            simulation,
            end,
            trace,
        })
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Run the simulation to its end and flush the trace.
    pub fn run(mut self) -> ScenarioReport {
        let simulation = self.simulation.run_until(self.end);

        let trace = self.trace.take().map(|(path, file)| {
            let mut file = file.borrow_mut();
            file.flush();
            if file.failed() > 0 {
                log::warn!(
                    "{failed} records could not be written to {path}",
                    failed = file.failed(),
                    path = path.display(),
                );
            }
            (path, file.written())
        });

        ScenarioReport { simulation, trace }
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simulation)?;
        if let Some((path, written)) = &self.trace {
            writeln!(f, "congestion window trace: {} ({written} records)", path.display())?;
        }
        Ok(())
    }
}

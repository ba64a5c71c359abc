use crate::network::{ConnId, Delivery, Network, NetworkError, NetworkStats, NodeId, SimSocket};
use pacesim_core::{
    AppId, AppTimer, DataRate, PacedSender, Scheduler, SimTime, WindowObserver,
    app::{ConfigError, SenderError},
};
use std::{
    cell::{Ref, RefCell},
    fmt,
    net::SocketAddrV4,
    rc::Rc,
};

/// Everything that can happen in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// a timer scheduled by an application
    Timer(AppTimer),
    StartSender(AppId),
    StopSender(AppId),
    StartSink(SocketAddrV4),
    StopSink(SocketAddrV4),
    /// a packet sent on `conn` reaches its destination
    Arrival { conn: ConnId, bytes: u64 },
}

impl From<AppTimer> for SimEvent {
    fn from(timer: AppTimer) -> Self {
        Self::Timer(timer)
    }
}

/// The event loop of the simulation.
///
/// The simulation owns the [`Scheduler`] and is the only component
/// popping events from it. Each event is handed to the application or
/// the network it names, then the packets put on the channel during
/// that callback are scheduled for arrival.
///
/// Failures of the applications do not stop the simulation: they are
/// logged and counted in the [`SimReport`].
pub struct Simulation {
    scheduler: Scheduler<SimEvent>,

    network: Rc<RefCell<Network>>,

    senders: Vec<PacedSender<SimSocket>>,

    activation_failures: u64,
    send_failures: u64,
}

/// Summary of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimReport {
    pub end: SimTime,
    pub network: NetworkStats,
    pub senders: Vec<SenderReport>,
    pub sinks: Vec<SinkReport>,
    pub activation_failures: u64,
    pub send_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderReport {
    pub id: AppId,
    pub packets_sent: u64,
    /// congestion window of the sender's connection at the end of the run
    pub window: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
    pub address: SocketAddrV4,
    pub packets: u64,
    pub bytes: u64,
}

impl Simulation {
    pub fn new(network: Network) -> Self {
        Self {
            scheduler: Scheduler::new(),
            network: Rc::new(RefCell::new(network)),
            senders: Vec::new(),
            activation_failures: 0,
            send_failures: 0,
        }
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn network(&self) -> Ref<'_, Network> {
        self.network.borrow()
    }

    pub fn sender(&self, id: AppId) -> Option<&PacedSender<SimSocket>> {
        self.senders.get(id.index())
    }

    /// Open a new socket on `node`.
    pub fn open_socket(&self, node: NodeId) -> Result<SimSocket, NetworkError> {
        SimSocket::open(&self.network, node)
    }

    /// Install a [`PacedSender`] streaming on `socket`.
    ///
    /// The sender is inactive until the time given to
    /// [`schedule_sender`](Self::schedule_sender).
    pub fn add_sender(
        &mut self,
        socket: SimSocket,
        destination: SocketAddrV4,
        packet_size: u32,
        packet_budget: u64,
        target_rate: DataRate,
    ) -> Result<AppId, ConfigError> {
        let id = AppId::new(self.senders.len() as u64);
        let mut sender = PacedSender::new(id);
        sender.configure(socket, destination, packet_size, packet_budget, target_rate)?;
        self.senders.push(sender);
        Ok(id)
    }

    pub fn schedule_sender(&mut self, id: AppId, start: SimTime, stop: SimTime) {
        self.scheduler.schedule_at(start, SimEvent::StartSender(id));
        self.scheduler.schedule_at(stop, SimEvent::StopSender(id));
    }

    pub fn schedule_sink(&mut self, address: SocketAddrV4, start: SimTime, stop: SimTime) {
        self.scheduler.schedule_at(start, SimEvent::StartSink(address));
        self.scheduler.schedule_at(stop, SimEvent::StopSink(address));
    }

    /// Subscribe `observer` to the trace source `name` of a connection.
    pub fn trace_connect(
        &mut self,
        conn: ConnId,
        name: &str,
        observer: Box<dyn WindowObserver>,
    ) -> Result<(), NetworkError> {
        self.network.borrow_mut().trace_connect(conn, name, observer)
    }

    /// Process every event due at or before `stop`.
    ///
    /// The clock is left at `stop`; events scheduled later remain
    /// pending and a following call resumes from there.
    pub fn run_until(&mut self, stop: SimTime) -> SimReport {
        while let Some(at) = self.scheduler.next_time() {
            if at > stop {
                break;
            }
            let Some((now, event)) = self.scheduler.pop() else {
                break;
            };

            self.network.borrow_mut().advance(now);
            self.dispatch(event);
            self.schedule_arrivals();
        }

        self.scheduler.advance_to(stop);
        self.network.borrow_mut().advance(self.scheduler.now());

        let report = self.report();
        log::info!(
            "simulation stopped at {end}s: {sent} packets sent, {received} received",
            end = report.end,
            sent = report.network.packets_sent,
            received = report.network.received,
        );
        report
    }

    pub fn report(&self) -> SimReport {
        let network = self.network.borrow();

        let senders = self
            .senders
            .iter()
            .map(|sender| SenderReport {
                id: sender.id(),
                packets_sent: sender.packets_sent(),
                window: sender
                    .connection()
                    .and_then(|socket| network.window(socket.id())),
            })
            .collect();

        let sinks = network
            .sinks()
            .into_iter()
            .map(|sink| SinkReport {
                address: sink.local(),
                packets: sink.packets(),
                bytes: sink.bytes(),
            })
            .collect();

        SimReport {
            end: self.scheduler.now(),
            network: network.stats(),
            senders,
            sinks,
            activation_failures: self.activation_failures,
            send_failures: self.send_failures,
        }
    }

    fn dispatch(&mut self, event: SimEvent) {
        match event {
            SimEvent::Timer(AppTimer { app }) => {
                let Some(sender) = self.senders.get_mut(app.index()) else {
                    log::debug!("timer for unknown application {app} ignored");
                    return;
                };
                if let Err(error) = sender.on_timer(&mut self.scheduler) {
                    self.send_failures += 1;
                    log_sender_error(app, &error);
                }
            }
            SimEvent::StartSender(app) => {
                let Some(sender) = self.senders.get_mut(app.index()) else {
                    return;
                };
                match sender.activate(&mut self.scheduler) {
                    Ok(()) => {}
                    Err(error @ SenderError::Send { .. }) => {
                        self.send_failures += 1;
                        log_sender_error(app, &error);
                    }
                    Err(error) => {
                        self.activation_failures += 1;
                        log_sender_error(app, &error);
                    }
                }
            }
            SimEvent::StopSender(app) => {
                if let Some(sender) = self.senders.get_mut(app.index()) {
                    sender.deactivate(&mut self.scheduler);
                }
            }
            SimEvent::StartSink(address) => {
                if let Some(sink) = self.network.borrow_mut().sink_mut(address) {
                    sink.start();
                }
            }
            SimEvent::StopSink(address) => {
                if let Some(sink) = self.network.borrow_mut().sink_mut(address) {
                    sink.stop();
                }
            }
            SimEvent::Arrival { conn, bytes } => {
                let delivery = self.network.borrow_mut().deliver(conn, bytes);
                if delivery != Delivery::Received {
                    log::trace!("{conn}: packet of {bytes} bytes {delivery:?}");
                }
            }
        }
    }

    fn schedule_arrivals(&mut self) {
        let in_flight = self.network.borrow_mut().take_in_flight();
        for packet in in_flight {
            self.scheduler.schedule_at(
                packet.arrival,
                SimEvent::Arrival {
                    conn: packet.conn,
                    bytes: packet.bytes,
                },
            );
        }
    }
}

fn log_sender_error(app: AppId, error: &SenderError) {
    match error {
        SenderError::Send { .. } => log::warn!("{app}: {}", ErrorChain(error)),
        _ => log::error!("{app}: {}", ErrorChain(error)),
    }
}

/// display an error followed by its sources
struct ErrorChain<'a>(&'a dyn std::error::Error);

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(error) = source {
            write!(f, ": {error}")?;
            source = error.source();
        }
        Ok(())
    }
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "simulated time: {}s", self.end)?;
        writeln!(
            f,
            "packets sent: {} (queue drops: {}, corrupted: {}, discarded: {})",
            self.network.packets_sent,
            self.network.queue_drops,
            self.network.corrupted,
            self.network.discarded,
        )?;
        for sender in &self.senders {
            write!(f, "{}: {} packets", sender.id, sender.packets_sent)?;
            if let Some(window) = sender.window {
                write!(f, ", final window {window} bytes")?;
            }
            writeln!(f)?;
        }
        for sink in &self.sinks {
            writeln!(
                f,
                "sink {}: {} packets ({} bytes)",
                sink.address, sink.packets, sink.bytes
            )?;
        }
        if self.activation_failures > 0 || self.send_failures > 0 {
            writeln!(
                f,
                "failures: {} activations, {} sends",
                self.activation_failures, self.send_failures
            )?;
        }
        Ok(())
    }
}

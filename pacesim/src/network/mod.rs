mod channel;
mod id;
mod socket;

use crate::{defaults, sink::PacketSink};
use pacesim_core::{
    CONGESTION_WINDOW, ErrorModel, Payload, SimTime, TracedWindow, TransportError,
    WindowObserver, trace::TraceError,
};
use rand_chacha::ChaChaRng;
use rand_core::SeedableRng as _;
use std::{
    collections::{HashMap, hash_map::Entry},
    net::{Ipv4Addr, SocketAddrV4},
};
use thiserror::Error;

pub use self::{
    channel::{Channel, QueueFull},
    id::{ConnId, NodeId},
    socket::SimSocket,
};

/// Nodes, addresses, connections and the shared [`Channel`].
///
/// The network is the transport substrate of the simulation. It does
/// not own a clock: the [`Simulation`] moves the network to the time of
/// the event being processed with [`Network::advance`] before handing
/// the event over.
///
/// Sending on a connection puts the packet on the channel straight away;
/// the arrival of the packets is collected by the [`Simulation`] with
/// [`Network::take_in_flight`] and fed back through
/// [`Network::deliver`] when the arrival time is reached.
///
/// [`Simulation`]: crate::Simulation
pub struct Network {
    now: SimTime,

    nodes: Vec<Node>,

    addresses: HashMap<Ipv4Addr, NodeId>,

    channel: Channel,

    connections: HashMap<ConnId, Connection>,

    /// the last assigned connection ID
    last_conn: ConnId,

    next_port: u16,

    sinks: HashMap<SocketAddrV4, PacketSink>,

    window: WindowConfig,

    in_flight: Vec<InFlight>,

    stats: NetworkStats,

    /// Centralised RNG for every receive error decision.
    rng: ChaChaRng,
}

/// A host attached to the shared channel.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    address: Ipv4Addr,
    receive_error: ErrorModel,
}

/// Parameters of the per-connection congestion window bookkeeping.
///
/// The window (in bytes) starts at `initial_segments * segment_size`,
/// grows by one segment for every delivered packet and is halved (but
/// never below one segment) for every lost packet. It does not gate
/// the sending: it only feeds the connection's `CongestionWindow`
/// trace source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub segment_size: u32,
    pub initial_segments: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            segment_size: defaults::DEFAULT_SEGMENT_SIZE,
            initial_segments: defaults::DEFAULT_INITIAL_WINDOW_SEGMENTS,
        }
    }
}

impl WindowConfig {
    fn initial_window(&self) -> u32 {
        self.segment_size.saturating_mul(self.initial_segments)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Created,
    Bound { local: SocketAddrV4 },
    Connected { local: SocketAddrV4, peer: SocketAddrV4 },
    Closed,
}

struct Connection {
    node: NodeId,
    state: ConnectionState,
    /// destination of the packets, kept after close for in-flight packets
    peer: Option<SocketAddrV4>,
    window: TracedWindow,
}

/// A packet travelling on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub conn: ConnId,
    pub bytes: u64,
    pub arrival: SimTime,
}

/// What happened to a packet reaching its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// the packet was accounted by the destination's sink
    Received,
    /// the receive error model corrupted the packet
    Corrupted,
    /// nobody is listening at the destination anymore
    Discarded,
}

/// Counters of the network activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    /// packets handed to the channel by the connections
    pub packets_sent: u64,
    /// packets dropped because the channel's queue was full
    pub queue_drops: u64,
    /// packets dropped by a receive error model
    pub corrupted: u64,
    /// packets accounted by a sink
    pub received: u64,
    /// packets arriving at an address where no sink is running
    pub discarded: u64,
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Node ({node}) Not Found")]
    NodeNotFound { node: NodeId },
    #[error("Connection ({conn}) Not Found")]
    ConnectionNotFound { conn: ConnId },
    #[error("Cannot address {count} nodes from {base}, at most {max} are available")]
    TooManyNodes {
        count: usize,
        base: Ipv4Addr,
        max: usize,
    },
    #[error("A sink is already installed at {address}")]
    SinkAlreadyInstalled { address: SocketAddrV4 },
    #[error("{0}")]
    Trace(#[from] TraceError),
}

impl Node {
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    #[inline]
    pub fn receive_error(&self) -> ErrorModel {
        self.receive_error
    }
}

impl Connection {
    fn on_delivered(&mut self, now: SimTime, segment_size: u32) {
        if self.state == ConnectionState::Closed {
            return;
        }
        let window = self.window.get().saturating_add(segment_size);
        self.window.set(now, window);
    }

    fn on_loss(&mut self, now: SimTime, segment_size: u32) {
        if self.state == ConnectionState::Closed {
            return;
        }
        let window = (self.window.get() / 2).max(segment_size);
        self.window.set(now, window);
    }
}

impl Network {
    /// Create `node_count` nodes on `channel`, assigning them the
    /// addresses following `base` (the first node gets `base + 1`).
    pub fn new(node_count: usize, base: Ipv4Addr, channel: Channel) -> Result<Self, NetworkError> {
        // keep the last address of the /24 for broadcast
        let max = 254usize.saturating_sub(usize::from(base.octets()[3]));
        if node_count > max {
            return Err(NetworkError::TooManyNodes {
                count: node_count,
                base,
                max,
            });
        }

        let base = u32::from(base);
        let mut nodes = Vec::with_capacity(node_count);
        let mut addresses = HashMap::with_capacity(node_count);
        for index in 0..node_count {
            let id = NodeId::new(index as u64);
            let address = Ipv4Addr::from(base + index as u32 + 1);
            addresses.insert(address, id);
            nodes.push(Node {
                id,
                address,
                receive_error: ErrorModel::None,
            });
        }

        Ok(Self {
            now: SimTime::ZERO,
            nodes,
            addresses,
            channel,
            connections: HashMap::new(),
            last_conn: ConnId::ZERO,
            next_port: defaults::FIRST_EPHEMERAL_PORT,
            sinks: HashMap::new(),
            window: WindowConfig::default(),
            in_flight: Vec::new(),
            stats: NetworkStats::default(),
            rng: ChaChaRng::seed_from_u64(0),
        })
    }

    /// Re-seed the RNG used by the receive error models.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaChaRng::seed_from_u64(seed);
    }

    pub fn set_window(&mut self, window: WindowConfig) {
        self.window = window;
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, NetworkError> {
        self.nodes
            .get(id.index())
            .ok_or(NetworkError::NodeNotFound { node: id })
    }

    pub fn set_receive_error_model(
        &mut self,
        id: NodeId,
        model: ErrorModel,
    ) -> Result<(), NetworkError> {
        let node = self
            .nodes
            .get_mut(id.index())
            .ok_or(NetworkError::NodeNotFound { node: id })?;
        node.receive_error = model;
        Ok(())
    }

    /// Install a (stopped) [`PacketSink`] on `port` of the given node.
    pub fn install_sink(&mut self, id: NodeId, port: u16) -> Result<SocketAddrV4, NetworkError> {
        let address = SocketAddrV4::new(self.node(id)?.address, port);

        match self.sinks.entry(address) {
            Entry::Occupied(_) => Err(NetworkError::SinkAlreadyInstalled { address }),
            Entry::Vacant(entry) => {
                entry.insert(PacketSink::new(address));
                Ok(address)
            }
        }
    }

    pub fn sink(&self, address: SocketAddrV4) -> Option<&PacketSink> {
        self.sinks.get(&address)
    }

    /// every installed sink, ordered by address
    pub fn sinks(&self) -> Vec<&PacketSink> {
        let mut sinks: Vec<_> = self.sinks.values().collect();
        sinks.sort_by_key(|sink| sink.local());
        sinks
    }

    pub(crate) fn sink_mut(&mut self, address: SocketAddrV4) -> Option<&mut PacketSink> {
        self.sinks.get_mut(&address)
    }

    /// Create a new (unbound) connection on the given node.
    pub fn open_connection(&mut self, node: NodeId) -> Result<ConnId, NetworkError> {
        self.node(node)?;

        let id = self.last_conn.next();
        self.last_conn = id;
        self.connections.insert(
            id,
            Connection {
                node,
                state: ConnectionState::Created,
                peer: None,
                window: TracedWindow::new(CONGESTION_WINDOW, self.window.initial_window()),
            },
        );
        Ok(id)
    }

    /// Subscribe `observer` to the trace source `name` of a connection.
    pub fn trace_connect(
        &mut self,
        conn: ConnId,
        name: &str,
        observer: Box<dyn WindowObserver>,
    ) -> Result<(), NetworkError> {
        let connection = self
            .connections
            .get_mut(&conn)
            .ok_or(NetworkError::ConnectionNotFound { conn })?;
        connection.window.connect(name, observer)?;
        Ok(())
    }

    /// current congestion window of a connection, in bytes
    pub fn window(&self, conn: ConnId) -> Option<u32> {
        self.connections.get(&conn).map(|c| c.window.get())
    }

    pub(crate) fn advance(&mut self, now: SimTime) {
        debug_assert!(now >= self.now, "the network's clock never goes backward");
        self.now = now;
    }

    pub(crate) fn take_in_flight(&mut self) -> Vec<InFlight> {
        std::mem::take(&mut self.in_flight)
    }

    pub(crate) fn bind(&mut self, conn: ConnId) -> Result<(), TransportError> {
        let connection = self
            .connections
            .get_mut(&conn)
            .ok_or(TransportError::Closed)?;

        match connection.state {
            ConnectionState::Created => {}
            ConnectionState::Closed => return Err(TransportError::Closed),
            ConnectionState::Bound { .. } | ConnectionState::Connected { .. } => {
                return Err(TransportError::AlreadyBound);
            }
        }

        let port = self.next_port;
        self.next_port = self
            .next_port
            .checked_add(1)
            .unwrap_or(defaults::FIRST_EPHEMERAL_PORT);

        let address = self.nodes[connection.node.index()].address;
        connection.state = ConnectionState::Bound {
            local: SocketAddrV4::new(address, port),
        };
        Ok(())
    }

    pub(crate) fn connect(
        &mut self,
        conn: ConnId,
        destination: SocketAddrV4,
    ) -> Result<(), TransportError> {
        let connection = self
            .connections
            .get_mut(&conn)
            .ok_or(TransportError::Closed)?;

        let local = match connection.state {
            ConnectionState::Bound { local } => local,
            ConnectionState::Created => return Err(TransportError::NotBound),
            ConnectionState::Connected { .. } => return Err(TransportError::AlreadyConnected),
            ConnectionState::Closed => return Err(TransportError::Closed),
        };

        let listening = self
            .sinks
            .get(&destination)
            .is_some_and(PacketSink::is_running);
        if !listening {
            return Err(TransportError::Unreachable {
                destination: destination.to_string(),
            });
        }

        log::debug!("{conn}: {local} connected to {destination}");
        connection.state = ConnectionState::Connected {
            local,
            peer: destination,
        };
        connection.peer = Some(destination);
        Ok(())
    }

    pub(crate) fn send(&mut self, conn: ConnId, payload: Payload) -> Result<(), TransportError> {
        let connection = self
            .connections
            .get_mut(&conn)
            .ok_or(TransportError::Closed)?;

        match connection.state {
            ConnectionState::Connected { .. } => {}
            ConnectionState::Closed => return Err(TransportError::Closed),
            ConnectionState::Created | ConnectionState::Bound { .. } => {
                return Err(TransportError::NotConnected);
            }
        }

        let bytes = payload.bytes_size();
        self.stats.packets_sent += 1;

        match self.channel.transmit(self.now, bytes) {
            Ok(arrival) => self.in_flight.push(InFlight {
                conn,
                bytes,
                arrival,
            }),
            Err(QueueFull) => {
                log::trace!("{conn}: channel queue full, packet of {bytes} bytes dropped");
                self.stats.queue_drops += 1;
                connection.on_loss(self.now, self.window.segment_size);
            }
        }

        Ok(())
    }

    pub(crate) fn close(&mut self, conn: ConnId) -> Result<(), TransportError> {
        if let Some(connection) = self.connections.get_mut(&conn) {
            connection.state = ConnectionState::Closed;
        }
        Ok(())
    }

    /// A packet of `bytes` sent on `conn` reaches its destination.
    pub(crate) fn deliver(&mut self, conn: ConnId, bytes: u64) -> Delivery {
        let Some(connection) = self.connections.get_mut(&conn) else {
            return Delivery::Discarded;
        };
        let Some(peer) = connection.peer else {
            return Delivery::Discarded;
        };

        let receive_error = self
            .addresses
            .get(peer.ip())
            .and_then(|node| self.nodes.get(node.index()))
            .map(Node::receive_error)
            .unwrap_or_default();

        if receive_error.is_corrupt(&mut self.rng, bytes) {
            self.stats.corrupted += 1;
            connection.on_loss(self.now, self.window.segment_size);
            return Delivery::Corrupted;
        }

        let received = self
            .sinks
            .get_mut(&peer)
            .is_some_and(|sink| sink.receive(bytes));
        if received {
            self.stats.received += 1;
            connection.on_delivered(self.now, self.window.segment_size);
            Delivery::Received
        } else {
            self.stats.discarded += 1;
            Delivery::Discarded
        }
    }
}

use std::net::SocketAddrV4;

/// Application receiving the traffic of the connections to its address.
///
/// The sink only accepts connections and counts what it receives while
/// it is running.
#[derive(Debug, Clone)]
pub struct PacketSink {
    local: SocketAddrV4,
    running: bool,
    packets: u64,
    bytes: u64,
}

impl PacketSink {
    pub fn new(local: SocketAddrV4) -> Self {
        Self {
            local,
            running: false,
            packets: 0,
            bytes: 0,
        }
    }

    #[inline]
    pub fn local(&self) -> SocketAddrV4 {
        self.local
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn start(&mut self) {
        log::debug!("sink {}: listening", self.local);
        self.running = true;
    }

    pub(crate) fn stop(&mut self) {
        log::debug!(
            "sink {}: stopped after {} packets ({} bytes)",
            self.local,
            self.packets,
            self.bytes
        );
        self.running = false;
    }

    /// Account for a received packet. Returns `false` if the sink is
    /// not running and the packet was discarded.
    pub(crate) fn receive(&mut self, bytes: u64) -> bool {
        if !self.running {
            return false;
        }
        self.packets += 1;
        self.bytes += bytes;
        true
    }

    /// total number of packets received
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// total number of bytes received
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

use pacesim_core::{DataRate, SimTime};
use std::{collections::VecDeque, time::Duration};

/// A shared broadcast medium.
///
/// Every node of the network transmits on the same channel, one packet
/// at a time: a packet starts its transmission when the channel is
/// free, takes `bytes * 8 / rate` to be put on the wire and reaches the
/// other end after the propagation `delay`.
///
/// Packets waiting for the channel sit in a drop-tail queue of at most
/// `queue_limit` packets.
///
/// ```text
/// send ──► [ queue (drop-tail) ] ──► transmission (rate) ──► propagation (delay) ──► arrival
/// ```
#[derive(Debug)]
pub struct Channel {
    rate: DataRate,
    delay: Duration,
    queue_limit: usize,

    /// the channel is busy transmitting until this time
    busy_until: SimTime,

    /// transmission start time of the packets that are still waiting
    waiting: VecDeque<SimTime>,
}

/// The channel's queue is full, the packet was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull;

impl Channel {
    pub fn new(rate: DataRate, delay: Duration, queue_limit: usize) -> Self {
        Self {
            rate,
            delay,
            queue_limit,
            busy_until: SimTime::ZERO,
            waiting: VecDeque::new(),
        }
    }

    #[inline]
    pub fn rate(&self) -> DataRate {
        self.rate
    }

    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// number of packets waiting for the channel at `now`
    pub fn backlog(&mut self, now: SimTime) -> usize {
        while self.waiting.front().is_some_and(|start| *start <= now) {
            self.waiting.pop_front();
        }
        self.waiting.len()
    }

    /// Put a packet of `bytes` on the channel at `now`.
    ///
    /// Returns the time the packet arrives at the other end of the
    /// channel.
    pub fn transmit(&mut self, now: SimTime, bytes: u64) -> Result<SimTime, QueueFull> {
        let start = now.max(self.busy_until);

        if start > now && self.backlog(now) >= self.queue_limit {
            return Err(QueueFull);
        }

        self.busy_until = start + self.rate.transmission_time(bytes);
        if start > now {
            self.waiting.push_back(start);
        }

        Ok(self.busy_until + self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKET: u64 = 1460;

    fn bus() -> Channel {
        Channel::new(DataRate::from_mbps(5), Duration::from_millis(5), 2)
    }

    #[test]
    fn idle_channel_transmits_immediately() {
        let mut channel = bus();
        let now = SimTime::from_secs(1);

        let arrival = channel.transmit(now, PACKET).unwrap();

        // 2.336ms on the wire + 5ms propagation
        assert_eq!(arrival, now + Duration::from_micros(7_336));
        assert_eq!(channel.backlog(now), 0);
    }

    #[test]
    fn transmissions_are_serialized() {
        let mut channel = bus();
        let now = SimTime::from_secs(1);

        let first = channel.transmit(now, PACKET).unwrap();
        let second = channel.transmit(now, PACKET).unwrap();

        assert_eq!(second, first + Duration::from_micros(2_336));
        assert_eq!(channel.backlog(now), 1);
    }

    #[test]
    fn full_queue_drops() {
        let mut channel = bus();
        let now = SimTime::ZERO;

        channel.transmit(now, PACKET).unwrap();
        channel.transmit(now, PACKET).unwrap();
        channel.transmit(now, PACKET).unwrap();

        assert_eq!(channel.backlog(now), 2);
        assert_eq!(channel.transmit(now, PACKET), Err(QueueFull));
    }

    #[test]
    fn queue_drains_over_time() {
        let mut channel = bus();
        let now = SimTime::ZERO;
        for _ in 0..3 {
            channel.transmit(now, PACKET).unwrap();
        }

        // the first waiting packet started its transmission
        let later = now + Duration::from_micros(2_336);
        assert_eq!(channel.backlog(later), 1);
        assert!(channel.transmit(later, PACKET).is_ok());
    }
}

use crate::{
    app::{AppId, AppTimer},
    measure::DataRate,
    scheduler::{EventId, Scheduler},
    transport::{Payload, Transport, TransportError},
};
use std::time::Duration;
use thiserror::Error;

/// Lifecycle state of a [`PacedSender`].
///
/// There is no paused state: pacing either proceeds or is fully torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    #[default]
    Inactive,
    Active,
}

/// Invalid [`PacedSender::configure`] parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Target rate must be greater than 0bps")]
    ZeroRate,
    #[error("Packet size must be at least 1 byte")]
    ZeroPacketSize,
    #[error("Cannot reconfigure an active sender, deactivate it first")]
    SenderActive,
}

#[derive(Debug, Error)]
pub enum SenderError {
    #[error("Sender is not configured")]
    NotConfigured,
    #[error("Sender is already active")]
    AlreadyActive,
    #[error("Failed to bind the connection")]
    Bind(#[source] TransportError),
    #[error("Failed to connect to {destination}")]
    Connect {
        destination: String,
        #[source]
        source: TransportError,
    },
    #[error("Failed to send packet #{packet}, stopping emission")]
    Send {
        packet: u64,
        #[source]
        source: TransportError,
    },
}

struct SenderConfig<A> {
    destination: A,
    packet_size: u32,
    packet_budget: u64,
    target_rate: DataRate,
}

impl<A> SenderConfig<A> {
    fn pacing_delay(&self) -> Duration {
        self.target_rate.transmission_time(self.packet_size as u64)
    }
}

/// Application streaming a bounded number of fixed-size packets to a
/// single destination at a target rate.
///
/// On activation the sender connects to its destination and emits the
/// first packet immediately. After each emission, if the budget is not
/// exhausted, it schedules the next one `packet_size * 8 / target_rate`
/// seconds later on the [`Scheduler`]. Deactivation cancels the pending
/// emission and closes the connection.
///
/// The sender never holds on to the scheduler: every operation that
/// needs to schedule or cancel receives it as a parameter, and the
/// scheduled emissions are [`AppTimer`]s naming the sender by its
/// [`AppId`]. The owner of the scheduler hands fired timers back with
/// [`PacedSender::on_timer`].
pub struct PacedSender<T: Transport> {
    id: AppId,

    connection: Option<T>,

    config: Option<SenderConfig<T::Address>>,

    state: SenderState,

    /// the next scheduled emission, if any
    pending: Option<EventId>,

    packets_sent: u64,
}

impl<T: Transport> PacedSender<T> {
    pub fn new(id: AppId) -> Self {
        Self {
            id,
            connection: None,
            config: None,
            state: SenderState::Inactive,
            pending: None,
            packets_sent: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> AppId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> SenderState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == SenderState::Active
    }

    /// number of packets sent since the last activation
    #[inline]
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    #[inline]
    pub fn pending_event(&self) -> Option<EventId> {
        self.pending
    }

    pub fn connection(&self) -> Option<&T> {
        self.connection.as_ref()
    }

    /// delay between two emissions, `None` if not configured
    pub fn pacing_delay(&self) -> Option<Duration> {
        self.config.as_ref().map(SenderConfig::pacing_delay)
    }

    /// Set the connection and the stream parameters.
    ///
    /// Replaces any previous configuration. The connection is only
    /// stored, it is opened by [`activate`](Self::activate).
    ///
    /// A `packet_budget` of `0` still emits one packet on activation:
    /// the first emission is unconditional.
    pub fn configure(
        &mut self,
        connection: T,
        destination: T::Address,
        packet_size: u32,
        packet_budget: u64,
        target_rate: DataRate,
    ) -> Result<(), ConfigError> {
        if self.is_active() {
            return Err(ConfigError::SenderActive);
        }
        if target_rate.is_zero() {
            return Err(ConfigError::ZeroRate);
        }
        if packet_size == 0 {
            return Err(ConfigError::ZeroPacketSize);
        }

        self.connection = Some(connection);
        self.config = Some(SenderConfig {
            destination,
            packet_size,
            packet_budget,
            target_rate,
        });
        Ok(())
    }

    /// Open the connection and emit the first packet.
    ///
    /// If the connection cannot be bound, connected, or carry the first
    /// packet, the sender stays [`SenderState::Inactive`] and the
    /// connection is released.
    pub fn activate<E>(&mut self, scheduler: &mut Scheduler<E>) -> Result<(), SenderError>
    where
        E: From<AppTimer>,
    {
        if self.is_active() {
            return Err(SenderError::AlreadyActive);
        }
        let (Some(connection), Some(config)) = (self.connection.as_mut(), self.config.as_ref())
        else {
            return Err(SenderError::NotConfigured);
        };

        connection.bind().map_err(SenderError::Bind)?;
        if let Err(source) = connection.connect(&config.destination) {
            let destination = config.destination.to_string();
            self.release();
            return Err(SenderError::Connect {
                destination,
                source,
            });
        }

        log::debug!(
            "{id}: streaming {budget} packets of {size} bytes to {destination} at {rate}",
            id = self.id,
            budget = config.packet_budget,
            size = config.packet_size,
            destination = config.destination,
            rate = config.target_rate,
        );

        self.state = SenderState::Active;
        self.packets_sent = 0;
        if let Err(error) = self.emit_and_reschedule(scheduler) {
            self.state = SenderState::Inactive;
            self.release();
            return Err(error);
        }
        Ok(())
    }

    /// Cancel the pending emission and close the connection.
    ///
    /// Calling this on an inactive sender does nothing.
    pub fn deactivate<E>(&mut self, scheduler: &mut Scheduler<E>) {
        if !self.is_active() {
            return;
        }
        self.state = SenderState::Inactive;

        if let Some(event) = self.pending.take() {
            scheduler.cancel(event);
        }

        self.release();

        log::debug!(
            "{id}: stopped after {sent} packets",
            id = self.id,
            sent = self.packets_sent
        );
    }

    /// close the connection, a failure is only logged
    fn release(&mut self) {
        if let Some(connection) = self.connection.as_mut() {
            if let Err(error) = connection.close() {
                log::warn!("{id}: failed to close the connection: {error}", id = self.id);
            }
        }
    }

    /// Handle a fired [`AppTimer`] addressed to this sender.
    ///
    /// A timer reaching an inactive sender is ignored.
    ///
    /// # Errors
    ///
    /// If the packet cannot be sent the emission stops for this run: no
    /// retry is attempted and nothing is rescheduled. The sender remains
    /// active until [`deactivate`](Self::deactivate) is called.
    pub fn on_timer<E>(&mut self, scheduler: &mut Scheduler<E>) -> Result<(), SenderError>
    where
        E: From<AppTimer>,
    {
        self.pending = None;
        if !self.is_active() {
            return Ok(());
        }
        self.emit_and_reschedule(scheduler)
    }

    fn emit_and_reschedule<E>(&mut self, scheduler: &mut Scheduler<E>) -> Result<(), SenderError>
    where
        E: From<AppTimer>,
    {
        let (Some(connection), Some(config)) = (self.connection.as_mut(), self.config.as_ref())
        else {
            return Err(SenderError::NotConfigured);
        };

        connection
            .send(Payload::zeroed(config.packet_size))
            .map_err(|source| SenderError::Send {
                packet: self.packets_sent + 1,
                source,
            })?;
        self.packets_sent += 1;

        if self.is_active() && self.packets_sent < config.packet_budget {
            let timer = AppTimer { app: self.id };
            self.pending = Some(scheduler.schedule_after(config.pacing_delay(), timer.into()));
        }

        Ok(())
    }
}

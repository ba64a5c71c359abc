use std::fmt;
use thiserror::Error;

/// A packet payload of a given size.
///
/// The content is all zeros and is never materialized: only the size of
/// the payload matters to the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Payload {
    size: u32,
}

impl Payload {
    pub const fn zeroed(size: u32) -> Self {
        Self { size }
    }

    /// return the size of the payload in bytes
    #[inline]
    pub const fn bytes_size(&self) -> u64 {
        self.size as u64
    }
}

/// Error reported by a [`Transport`] endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Endpoint is already bound")]
    AlreadyBound,
    #[error("Endpoint is not bound")]
    NotBound,
    #[error("Destination ({destination}) is unreachable")]
    Unreachable { destination: String },
    #[error("Endpoint is already connected")]
    AlreadyConnected,
    #[error("Endpoint is not connected")]
    NotConnected,
    #[error("Endpoint is closed")]
    Closed,
}

/// One side of a connection-oriented data stream.
///
/// This is the only capability a [`PacedSender`] needs from the network
/// stack. Implementations report every failure as a [`TransportError`];
/// none of the operations may block.
///
/// [`PacedSender`]: crate::app::PacedSender
pub trait Transport {
    type Address: fmt::Display + Clone;

    /// allocate the local end of the connection
    fn bind(&mut self) -> Result<(), TransportError>;

    fn connect(&mut self, destination: &Self::Address) -> Result<(), TransportError>;

    fn send(&mut self, payload: Payload) -> Result<(), TransportError>;

    /// release the connection
    ///
    /// Closing an endpoint that was never opened is not an error.
    fn close(&mut self) -> Result<(), TransportError>;
}

use super::{ConnId, Network, NetworkError, NodeId};
use pacesim_core::{Payload, Transport, TransportError};
use std::{cell::RefCell, net::SocketAddrV4, rc::Rc};

/// A connection endpoint opened on one of the nodes of a [`Network`].
///
/// The socket is the [`Transport`] handed to the applications: every
/// operation is forwarded to the network the socket was opened on.
pub struct SimSocket {
    id: ConnId,
    network: Rc<RefCell<Network>>,
}

impl SimSocket {
    /// Open a new, unbound, socket on `node`.
    pub fn open(network: &Rc<RefCell<Network>>, node: NodeId) -> Result<Self, NetworkError> {
        let id = network.borrow_mut().open_connection(node)?;
        Ok(Self {
            id,
            network: Rc::clone(network),
        })
    }

    #[inline]
    pub fn id(&self) -> ConnId {
        self.id
    }
}

impl Transport for SimSocket {
    type Address = SocketAddrV4;

    fn bind(&mut self) -> Result<(), TransportError> {
        self.network.borrow_mut().bind(self.id)
    }

    fn connect(&mut self, destination: &SocketAddrV4) -> Result<(), TransportError> {
        self.network.borrow_mut().connect(self.id, *destination)
    }

    fn send(&mut self, payload: Payload) -> Result<(), TransportError> {
        self.network.borrow_mut().send(self.id, payload)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.network.borrow_mut().close(self.id)
    }
}

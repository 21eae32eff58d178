//! Reference in-process `PeerNetwork`: a shared registry of
//! per-(peer, protocol) handlers. Used by integration tests and the
//! `optimystic-test` harness to wire up a mesh of nodes without a real
//! transport.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use optimystic_base::{err, PeerId, Result};

use crate::transport::{PeerNetwork, Stream};

type Handler = Arc<dyn Fn(&PeerId, Vec<u8>) -> Result<Vec<u8>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Registry(Arc<Mutex<HashMap<(PeerId, String), Handler>>>);

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A view of this registry scoped to one peer, used both to register
    /// its own protocol handlers and to connect out to others.
    pub fn node(&self, peer_id: PeerId) -> InMemoryPeerNetwork {
        InMemoryPeerNetwork {
            self_id: peer_id,
            registry: self.0.clone(),
        }
    }
}

pub struct InMemoryPeerNetwork {
    self_id: PeerId,
    registry: Arc<Mutex<HashMap<(PeerId, String), Handler>>>,
}

impl InMemoryPeerNetwork {
    pub fn register(
        &self,
        protocol: &str,
        handler: impl Fn(&PeerId, Vec<u8>) -> Result<Vec<u8>> + Send + Sync + 'static,
    ) {
        self.registry
            .lock()
            .unwrap()
            .insert((self.self_id.clone(), protocol.to_string()), Arc::new(handler));
    }

    pub fn self_id(&self) -> &PeerId {
        &self.self_id
    }
}

impl PeerNetwork for InMemoryPeerNetwork {
    fn connect(&self, peer_id: &PeerId, protocol: &str) -> Result<Box<dyn Stream>> {
        let handler = self
            .registry
            .lock()
            .unwrap()
            .get(&(peer_id.clone(), protocol.to_string()))
            .cloned()
            .ok_or_else(|| err("no handler registered for peer/protocol"))?;
        Ok(Box::new(InMemoryStream {
            from: self.self_id.clone(),
            handler,
        }))
    }
}

struct InMemoryStream {
    from: PeerId,
    handler: Handler,
}

impl Stream for InMemoryStream {
    fn request(&mut self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        (self.handler)(&self.from, bytes)
    }

    fn close(&mut self) {}
}

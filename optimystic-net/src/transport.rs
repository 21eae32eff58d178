//! Transport abstraction: `PeerNetwork::connect(peerId,
//! protocol)` yields a `Stream`; the core never inspects stream
//! internals. Every sub-protocol (repo, cluster, sync, fret) is
//! itself request/response, so `Stream` exposes a single blocking
//! `request`, matching the cooperative event-loop model without
//! needing an async runtime.

use optimystic_base::{Error, PeerId, Result};
use serde::{de::DeserializeOwned, Serialize};

pub trait Stream: Send {
    fn request(&mut self, bytes: Vec<u8>) -> Result<Vec<u8>>;
    fn close(&mut self);
}

pub trait PeerNetwork: Send + Sync {
    fn connect(&self, peer_id: &PeerId, protocol: &str) -> Result<Box<dyn Stream>>;
}

pub fn request_json<T: Serialize, R: DeserializeOwned>(stream: &mut dyn Stream, value: &T) -> Result<R> {
    let body = serde_json::to_vec(value).map_err(Error::new)?;
    let resp = stream.request(body)?;
    serde_json::from_slice(&resp).map_err(Error::new)
}

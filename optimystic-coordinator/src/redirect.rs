//! Responsibility-based redirects. A node that is
//! not in the responsibility set for a key hands the client a list of
//! peers that are; the client follows at most two hops before giving up.

use optimystic_base::{kind_err, Error, ErrorKind, PeerId, Result};
use optimystic_net::{PeerAddr, Redirect};
use optimystic_ring::{responsibility_for, Coord};

/// Determine whether `self_id` should handle `key` itself, or hand back a
/// redirect naming the peers that should.
pub fn responsible_or_redirect(
    self_id: &PeerId,
    known_peers: &[PeerId],
    key: &Coord,
    responsibility_k: usize,
    addrs_of: impl Fn(&PeerId) -> Vec<String>,
) -> Option<Redirect> {
    let responsibility = responsibility_for(self_id, known_peers, key, responsibility_k);
    if responsibility.responsible {
        return None;
    }
    let peers = responsibility
        .nearest
        .into_iter()
        .map(|id| {
            let addrs = addrs_of(&id);
            PeerAddr { id, addrs }
        })
        .collect();
    Some(Redirect::not_in_cluster(peers))
}

/// Tracks hops for a client following a chain of redirects. Raises
/// `RedirectLoop` once more than two hops have been followed.
#[derive(Default)]
pub struct RedirectGuard {
    hops: usize,
}

impl RedirectGuard {
    pub fn new() -> Self {
        RedirectGuard::default()
    }

    pub fn follow(&mut self) -> Result<()> {
        self.hops += 1;
        if self.hops > 2 {
            return Err(redirect_loop());
        }
        Ok(())
    }
}

fn redirect_loop() -> Error {
    kind_err(ErrorKind::RedirectLoop, "exceeded redirect hop limit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responsible_peer_gets_no_redirect() {
        let self_id = PeerId::from("p0");
        let key = optimystic_base::Hash32::from_bytes(b"k");
        let redirect = responsible_or_redirect(&self_id, &[], &key, 3, |_| Vec::new());
        assert!(redirect.is_none());
    }

    #[test]
    fn unresponsible_peer_gets_a_redirect_naming_the_nearest_peers() {
        let self_id = PeerId::from("zzzzzzzzzzzzzzzzzzzz");
        let others: Vec<PeerId> = (0..10).map(|i| PeerId::from(format!("p{i}").as_str())).collect();
        let key = optimystic_base::Hash32::from_bytes(b"k");
        let redirect = responsible_or_redirect(&self_id, &others, &key, 3, |_| vec!["addr".to_string()]);
        assert!(redirect.is_some());
        assert!(!redirect.unwrap().peers.is_empty());
    }

    #[test]
    fn guard_raises_redirect_loop_after_two_hops() {
        let mut guard = RedirectGuard::new();
        guard.follow().unwrap();
        guard.follow().unwrap();
        assert!(guard.follow().is_err());
    }
}

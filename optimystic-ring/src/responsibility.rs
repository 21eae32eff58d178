//! Responsibility & redirect: given a key, determine whether
//! self is in the top-K closest peers; otherwise produce a redirect list.

use optimystic_base::PeerId;

use crate::distance::{coord_of, xor_distance, Coord};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Responsibility {
    pub responsible: bool,
    /// Top `effectiveK` peers by distance to the key, self included if
    /// responsible.
    pub nearest: Vec<PeerId>,
}

/// `effectiveK`: `responsibilityK` capped by the size of
/// the known mesh, floored at 1.
fn effective_k(responsibility_k: usize, total_peers: usize) -> usize {
    responsibility_k.min((total_peers / 2).max(1))
}

/// Determine whether `self_id` is responsible for `key`, given the set of
/// peers known besides itself.
pub fn responsibility_for(
    self_id: &PeerId,
    known_peers: &[PeerId],
    key: &Coord,
    responsibility_k: usize,
) -> Responsibility {
    let mut all: Vec<PeerId> = known_peers.to_vec();
    if !all.contains(self_id) {
        all.push(self_id.clone());
    }
    all.sort();
    all.dedup();

    let mut sorted = all.clone();
    sorted.sort_by(|a, b| {
        let da = xor_distance(&coord_of(a), key);
        let db = xor_distance(&coord_of(b), key);
        da.as_bytes().cmp(db.as_bytes()).then_with(|| a.0.cmp(&b.0))
    });

    if sorted.len() <= 3 {
        // Tiny-mesh special case: exactly the single closest peer handles
        // the key.
        let responsible = sorted.first() == Some(self_id);
        let nearest = sorted.into_iter().take(1).collect();
        return Responsibility {
            responsible,
            nearest,
        };
    }

    let k = effective_k(responsibility_k, sorted.len());
    let nearest: Vec<PeerId> = sorted.into_iter().take(k).collect();
    let responsible = nearest.contains(self_id);
    Responsibility {
        responsible,
        nearest,
    }
}

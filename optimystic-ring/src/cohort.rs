//! Cohort assembler: the two-sided alternating selection
//! around a key that produces a key's replica set.

use optimystic_base::PeerId;

use crate::distance::{coord_of, xor_distance, Coord};

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Anchor {
    None,
    Peer(PeerId),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Cohort {
    pub anchors: (Anchor, Anchor),
    pub peers: Vec<PeerId>,
}

/// Assemble a cohort of up to `wants` unique peers around `key`.
///
/// Algorithm: sort all peers by XOR distance to `key`
/// (ties by peer id lex order); `succ` is the closest, `pred` the
/// second-closest (or `succ` again if there is only one peer); then
/// alternately emit `succ`, `pred`, the next-closer-than-succ, the
/// next-closer-than-pred, and so on until `wants` unique peers are
/// collected or the candidate list is exhausted.
pub fn assemble_cohort(key: &Coord, peers: &[PeerId], wants: usize) -> Cohort {
    if peers.is_empty() {
        return Cohort {
            anchors: (Anchor::None, Anchor::None),
            peers: Vec::new(),
        };
    }

    let mut sorted: Vec<PeerId> = peers.to_vec();
    sorted.sort_by(|a, b| {
        let da = xor_distance(&coord_of(a), key);
        let db = xor_distance(&coord_of(b), key);
        da.as_bytes().cmp(db.as_bytes()).then_with(|| a.0.cmp(&b.0))
    });
    sorted.dedup();

    let succ_idx = 0usize;
    let pred_idx = if sorted.len() > 1 { 1usize } else { 0usize };

    let anchors = (
        Anchor::Peer(sorted[succ_idx].clone()),
        Anchor::Peer(sorted[pred_idx].clone()),
    );

    let want = wants.min(sorted.len());
    let mut out: Vec<PeerId> = Vec::with_capacity(want);
    let mut seen = std::collections::HashSet::new();

    let mut succ_step = 0usize; // next untaken index walking outward from succ_idx
    let mut pred_step = 0usize; // next untaken index walking outward from pred_idx
    let mut turn_is_succ = true;

    // succ/pred both start at fixed anchors; "stepping outward" advances
    // succ_step/pred_step through the remaining sorted candidates in
    // order, skipping whichever anchor index is not being stepped.
    let succ_candidates: Vec<usize> = (0..sorted.len()).filter(|&i| i != pred_idx).collect();
    let pred_candidates: Vec<usize> = (0..sorted.len()).filter(|&i| i != succ_idx).collect();

    while out.len() < want {
        let idx_opt = if turn_is_succ {
            let idx = succ_candidates.get(succ_step).copied();
            succ_step += 1;
            idx
        } else {
            let idx = pred_candidates.get(pred_step).copied();
            pred_step += 1;
            idx
        };
        turn_is_succ = !turn_is_succ;

        let Some(idx) = idx_opt else {
            // One side exhausted; keep draining whichever side still has
            // candidates until both run dry.
            if succ_step >= succ_candidates.len() && pred_step >= pred_candidates.len() {
                break;
            }
            continue;
        };

        let candidate = sorted[idx].clone();
        if seen.insert(candidate.clone()) {
            out.push(candidate);
        }
    }

    Cohort {
        anchors,
        peers: out,
    }
}

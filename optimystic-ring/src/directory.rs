//! Peer directory: an ordered structure of known peers keyed
//! by `(coord, peerId)`, supporting successor/predecessor/neighbor
//! queries. All queries are total: an empty directory returns empty
//! sequences, never an error.

use std::collections::BTreeMap;

use optimystic_base::PeerId;
use serde::{Deserialize, Serialize};

use crate::distance::Coord;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PeerState {
    Connected,
    Disconnected,
    Dead,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct PeerEntry {
    pub peer_id: PeerId,
    pub coord: Coord,
    pub state: PeerState,
    pub last_seen_micros: i64,
    pub consecutive_failures: u32,
    pub relevance: f64,
}

impl PeerEntry {
    pub fn new(peer_id: PeerId, coord: Coord) -> Self {
        PeerEntry {
            peer_id,
            coord,
            state: PeerState::Connected,
            last_seen_micros: 0,
            consecutive_failures: 0,
            relevance: 1.0,
        }
    }
}

/// Ordering key: `(coord, peerId)`. Siblings at equal coord are tie-broken
/// by peer id lex order.
type Key = (Coord, PeerId);

#[derive(Default)]
pub struct PeerDirectory {
    by_key: BTreeMap<Key, PeerEntry>,
    coord_of: std::collections::HashMap<PeerId, Coord>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.by_key.len()
    }

    /// Re-inserting an id that already exists removes its prior coord
    /// entry first, so a peer never appears twice under different coords.
    pub fn upsert(&mut self, peer_id: PeerId, coord: Coord) {
        if let Some(prior_coord) = self.coord_of.get(&peer_id).cloned() {
            self.by_key.remove(&(prior_coord, peer_id.clone()));
        }
        self.coord_of.insert(peer_id.clone(), coord.clone());
        let entry = PeerEntry::new(peer_id.clone(), coord.clone());
        self.by_key.insert((coord, peer_id), entry);
    }

    pub fn remove(&mut self, peer_id: &PeerId) {
        if let Some(coord) = self.coord_of.remove(peer_id) {
            self.by_key.remove(&(coord, peer_id.clone()));
        }
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&PeerEntry> {
        let coord = self.coord_of.get(peer_id)?;
        self.by_key.get(&(coord.clone(), peer_id.clone()))
    }

    pub fn get_mut(&mut self, peer_id: &PeerId) -> Option<&mut PeerEntry> {
        let coord = self.coord_of.get(peer_id)?.clone();
        self.by_key.get_mut(&(coord, peer_id.clone()))
    }

    pub fn list(&self) -> Vec<PeerEntry> {
        self.by_key.values().cloned().collect()
    }

    /// The first entry with `coord` strictly greater than the given
    /// coordinate, wrapping to the first entry if none is greater.
    pub fn successor_of(&self, coord: &Coord) -> Option<PeerEntry> {
        self.neighbors_right(coord, 1).into_iter().next()
    }

    /// The last entry with `coord` strictly less than the given
    /// coordinate, wrapping to the last entry if none is smaller.
    pub fn predecessor_of(&self, coord: &Coord) -> Option<PeerEntry> {
        self.neighbors_left(coord, 1).into_iter().next()
    }

    /// Up to `count` entries strictly after `coord`, in ascending order,
    /// wrapping around (right-of-last = first).
    pub fn neighbors_right(&self, coord: &Coord, count: usize) -> Vec<PeerEntry> {
        if self.by_key.is_empty() || count == 0 {
            return Vec::new();
        }
        let probe = (coord.clone(), PeerId(String::new()));
        let after: Vec<PeerEntry> = self
            .by_key
            .range((std::ops::Bound::Excluded(probe), std::ops::Bound::Unbounded))
            .map(|(_, v)| v.clone())
            .collect();
        let mut out = Vec::with_capacity(count);
        let mut iter = after.into_iter().chain(self.by_key.values().cloned());
        let mut seen = std::collections::HashSet::new();
        while out.len() < count {
            let Some(entry) = iter.next() else { break };
            if !seen.insert(entry.peer_id.clone()) {
                // We've wrapped all the way around without finding enough
                // distinct peers (directory smaller than `count`).
                break;
            }
            out.push(entry);
        }
        out
    }

    /// Up to `count` entries strictly before `coord`, nearest-first,
    /// wrapping around (left-of-first = last).
    pub fn neighbors_left(&self, coord: &Coord, count: usize) -> Vec<PeerEntry> {
        if self.by_key.is_empty() || count == 0 {
            return Vec::new();
        }
        let probe = (coord.clone(), PeerId(String::new()));
        let before: Vec<PeerEntry> = self
            .by_key
            .range((std::ops::Bound::Unbounded, std::ops::Bound::Excluded(probe)))
            .rev()
            .map(|(_, v)| v.clone())
            .collect();
        let mut out = Vec::with_capacity(count);
        let mut iter = before
            .into_iter()
            .chain(self.by_key.values().rev().cloned());
        let mut seen = std::collections::HashSet::new();
        while out.len() < count {
            let Some(entry) = iter.next() else { break };
            if !seen.insert(entry.peer_id.clone()) {
                break;
            }
            out.push(entry);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::coord_of;

    fn dir_of(ids: &[&str]) -> PeerDirectory {
        let mut d = PeerDirectory::new();
        for id in ids {
            let pid = PeerId::from(*id);
            let coord = coord_of(&pid);
            d.upsert(pid, coord);
        }
        d
    }

    #[test]
    fn empty_directory_queries_are_total() {
        let d = PeerDirectory::new();
        assert!(d.list().is_empty());
        assert!(d.successor_of(&coord_of(&PeerId::from("x"))).is_none());
        assert!(d.neighbors_right(&coord_of(&PeerId::from("x")), 5).is_empty());
    }

    #[test]
    fn upsert_same_id_moves_rather_than_duplicates() {
        let mut d = dir_of(&["a", "b", "c"]);
        assert_eq!(d.size(), 3);
        let pid = PeerId::from("a");
        let other_coord = coord_of(&PeerId::from("zzzzz"));
        d.upsert(pid.clone(), other_coord.clone());
        assert_eq!(d.size(), 3);
        assert_eq!(d.get(&pid).unwrap().coord, other_coord);
    }

    #[test]
    fn neighbors_right_wraps() {
        let d = dir_of(&["a", "b", "c", "d", "e"]);
        let all = d.list();
        let last = &all[all.len() - 1];
        let wrapped = d.neighbors_right(&last.coord, 1);
        assert_eq!(wrapped[0].peer_id, all[0].peer_id);
    }

    #[test]
    fn neighbors_right_never_duplicates_when_count_exceeds_size() {
        let d = dir_of(&["a", "b", "c"]);
        let got = d.neighbors_right(&coord_of(&PeerId::from("a")), 10);
        assert_eq!(got.len(), 3);
        let mut ids: Vec<_> = got.iter().map(|e| e.peer_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}

//! Ring distance: the XOR metric over 256-bit peer/key
//! coordinates, word-sliced into four `u64` limbs for the XOR/compare
//! operations below.

use optimystic_base::{Hash32, PeerId};

/// A point in the `[0, 2^256)` keyspace: either a peer's coordinate or a
/// content key being placed.
pub type Coord = Hash32;

/// `coordOf(peerId)`: SHA-256 of the peer id's canonical byte form.
pub fn coord_of(peer_id: &PeerId) -> Coord {
    Hash32::from_bytes(peer_id.canonical_bytes())
}

/// Big-endian XOR distance between two coordinates.
pub fn xor_distance(a: &Coord, b: &Coord) -> Coord {
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = a.as_bytes()[i] ^ b.as_bytes()[i];
    }
    Hash32(out)
}

/// Lexicographic `<` over two 256-bit values, big-endian byte order.
pub fn less_lex(a: &Coord, b: &Coord) -> bool {
    a.as_bytes() < b.as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let p = PeerId::from("peer-1");
        let c = coord_of(&p);
        let d = xor_distance(&c, &c);
        assert_eq!(d.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn coord_of_is_deterministic() {
        let p = PeerId::from("peer-1");
        assert_eq!(coord_of(&p), coord_of(&p));
    }

    #[test]
    fn xor_distance_is_symmetric() {
        let a = coord_of(&PeerId::from("a"));
        let b = coord_of(&PeerId::from("b"));
        assert_eq!(xor_distance(&a, &b), xor_distance(&b, &a));
    }

    #[test]
    fn less_lex_is_a_strict_weak_order() {
        let a = Hash32([0u8; 32]);
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        let b = Hash32(bytes);
        assert!(less_lex(&a, &b));
        assert!(!less_lex(&b, &a));
    }
}

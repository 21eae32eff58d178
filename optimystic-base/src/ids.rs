//! Opaque identifiers shared by every layer of the core. Kept
//! here, rather than duplicated per-crate, because `optimystic-store`,
//! `optimystic-log`, `optimystic-collection`, `optimystic-transactor` and
//! `optimystic-coordinator` all need to agree on the same key types.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Opaque, byte-string identifier, unique within a collection.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub Vec<u8>);

impl BlockId {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        BlockId(s.as_bytes().to_vec())
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        BlockId(s.into_bytes())
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Opaque identifier for a collection; the collection's header block shares
/// this id.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionId(pub Vec<u8>);

impl From<&str> for CollectionId {
    fn from(s: &str) -> Self {
        CollectionId(s.as_bytes().to_vec())
    }
}

impl fmt::Debug for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionId({})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl CollectionId {
    pub fn header_block_id(&self) -> BlockId {
        BlockId(self.0.clone())
    }
}

/// Randomly-generated opaque id assigned by the action's originator, used
/// for dedup and pending-state tracking.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new_random() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        ActionId(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionId({})", self.0)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier for a peer in the mesh. Its canonical
/// byte form is SHA-256'd to produce the peer's ring coordinate.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn canonical_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        PeerId(s.to_string())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A per-collection monotonic integer, gap-free, assigned at commit.
/// `Revision(0)` means "none committed".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Revision(pub u64);

impl Revision {
    pub const NONE: Revision = Revision(0);

    pub fn next(self) -> Revision {
        Revision(self.0 + 1)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A committed position in a collection's log: `(ActionId, rev)`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ActionRev {
    pub action_id: ActionId,
    pub rev: Revision,
}

/// A client's view of a collection's log: the as-of revision for reads.
/// `rev == Revision::NONE` means "latest".
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct ActionContext {
    pub committed: Vec<ActionRev>,
    pub rev: Revision,
}

impl ActionContext {
    pub fn latest() -> Self {
        ActionContext::default()
    }

    pub fn record(&mut self, action_id: ActionId, rev: Revision) {
        self.committed.push(ActionRev {
            action_id,
            rev,
        });
        self.rev = rev;
    }
}

impl Default for Revision {
    fn default() -> Self {
        Revision::NONE
    }
}

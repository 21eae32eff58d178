//! Transaction identity.
//! Lives in `optimystic-base` because both the wire layer
//! (`optimystic-net`) and the business logic that drives commits
//! (`optimystic-coordinator`) need to agree on the same shape without one
//! depending on the other.

use serde::{Deserialize, Serialize};

use crate::{BlockId, Hash32, PeerId, Revision};

/// Monotonic-enough wall-clock reading in microseconds since the epoch.
/// Ordering across nodes tolerates clock skew; it is never used as a
/// revision number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

/// Identifies a registered `Engine` implementation.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct EngineId(pub String);

impl From<&str> for EngineId {
    fn from(s: &str) -> Self {
        EngineId(s.to_string())
    }
}

/// Created at BEGIN; stable through the transaction.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TransactionStamp {
    pub peer_id: PeerId,
    pub timestamp: Timestamp,
    pub schema_hash: Hash32,
    pub engine_id: EngineId,
    pub id: Hash32,
}

impl TransactionStamp {
    pub fn new(peer_id: PeerId, timestamp: Timestamp, schema_hash: Hash32, engine_id: EngineId) -> Self {
        let id = crate::combine(&[
            peer_id.0.as_bytes(),
            &timestamp.0.to_be_bytes(),
            schema_hash.as_bytes(),
            engine_id.0.as_bytes(),
        ]);
        TransactionStamp {
            peer_id,
            timestamp,
            schema_hash,
            engine_id,
            id,
        }
    }
}

/// A `(BlockId, expectedRevision)` read dependency.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Read {
    pub block_id: BlockId,
    pub expected_revision: Revision,
}

/// Finalized at COMMIT. Statements are engine-specific opaque
/// strings; the engine named by `stamp.engine_id` is the only thing that
/// knows how to interpret them.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub stamp: TransactionStamp,
    pub statements: Vec<String>,
    pub reads: Vec<Read>,
    pub id: Hash32,
}

impl Transaction {
    pub fn new(stamp: TransactionStamp, statements: Vec<String>, reads: Vec<Read>) -> Self {
        let mut parts: Vec<&[u8]> = vec![stamp.id.as_bytes()];
        let stmt_bytes: Vec<&[u8]> = statements.iter().map(|s| s.as_bytes()).collect();
        parts.extend(stmt_bytes.iter());
        let read_encodings: Vec<Vec<u8>> = reads
            .iter()
            .map(|r| {
                let mut v = r.block_id.as_bytes().to_vec();
                v.extend_from_slice(&r.expected_revision.0.to_be_bytes());
                v
            })
            .collect();
        let read_refs: Vec<&[u8]> = read_encodings.iter().map(|v| v.as_slice()).collect();
        parts.extend(read_refs.iter());
        let id = crate::combine(&parts);
        Transaction {
            stamp,
            statements,
            reads,
            id,
        }
    }
}

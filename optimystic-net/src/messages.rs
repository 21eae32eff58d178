//! Wire message shapes. JSON-serialized, length-prefixed; see
//! [`crate::framing`] for the prefix encoding.

use std::collections::BTreeSet;

use optimystic_base::{ActionId, BlockId, CollectionId, PeerId, Revision};
use optimystic_store::{Block, Transforms};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Get { block_id: BlockId },
    Pend(Box<PendRequest>),
    Cancel { action_id: ActionId },
    Commit(Box<CommitRequest>),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RepoMessage {
    pub operations: Vec<Operation>,
    pub expiration: Option<i64>,
    pub coordinating_block_ids: Option<BTreeSet<BlockId>>,
}

/// How strictly the replica should treat overlapping pendings on the
/// same blocks: `c`ollide (reject outright), `f`orce (accept, racing
/// pendings resolve at commit), `r`eplace (supersede an earlier pending
/// from the same originator).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendPolicy {
    #[serde(rename = "c")]
    Collide,
    #[serde(rename = "f")]
    Force,
    #[serde(rename = "r")]
    Replace,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendRequest {
    pub action_id: ActionId,
    pub rev: Option<Revision>,
    pub transforms: Transforms,
    pub policy: PendPolicy,
    pub transaction: Option<optimystic_base::Transaction>,
    pub operations_hash: Option<optimystic_base::Hash32>,
    pub supercluster_nominees: Option<Vec<PeerId>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionPending {
    pub action_id: ActionId,
    pub block_ids: BTreeSet<BlockId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionTransforms {
    pub action_id: ActionId,
    pub transforms: Transforms,
}

/// `{ success: true, pending, blockIds } | { success: false, reason?,
/// missing?, pending? }`, flattened into one struct with the
/// fields that don't apply to a given outcome left `None`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendResult {
    pub success: bool,
    pub pending: Option<Vec<ActionPending>>,
    pub block_ids: Option<BTreeSet<BlockId>>,
    pub reason: Option<String>,
    pub missing: Option<Vec<ActionTransforms>>,
}

impl PendResult {
    pub fn success(pending: Vec<ActionPending>, block_ids: BTreeSet<BlockId>) -> Self {
        PendResult {
            success: true,
            pending: Some(pending),
            block_ids: Some(block_ids),
            reason: None,
            missing: None,
        }
    }

    pub fn failure(
        reason: impl Into<String>,
        missing: Vec<ActionTransforms>,
        pending: Vec<ActionPending>,
    ) -> Self {
        PendResult {
            success: false,
            pending: Some(pending),
            block_ids: None,
            reason: Some(reason.into()),
            missing: Some(missing),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitRequest {
    pub action_id: ActionId,
    pub block_ids: BTreeSet<BlockId>,
    pub header_id: Option<BlockId>,
    pub tail_id: BlockId,
    pub rev: Revision,
}

/// `{ success: true, coordinatorId? } | StaleFailure`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitResult {
    pub success: bool,
    pub coordinator_id: Option<CollectionId>,
    pub missing: Option<Vec<ActionTransforms>>,
    pub pending: Option<Vec<ActionPending>>,
}

impl CommitResult {
    pub fn success(coordinator_id: Option<CollectionId>) -> Self {
        CommitResult {
            success: true,
            coordinator_id,
            missing: None,
            pending: None,
        }
    }

    pub fn stale_failure(missing: Vec<ActionTransforms>, pending: Vec<ActionPending>) -> Self {
        CommitResult {
            success: false,
            coordinator_id: None,
            missing: Some(missing),
            pending: Some(pending),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerAddr {
    pub id: PeerId,
    pub addrs: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Redirect {
    pub peers: Vec<PeerAddr>,
    pub reason: String,
}

impl Redirect {
    pub fn not_in_cluster(peers: Vec<PeerAddr>) -> Self {
        Redirect {
            peers,
            reason: "not_in_cluster".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NeighborSnapshotV1 {
    pub v: u8,
    pub from: PeerId,
    pub timestamp: i64,
    pub successors: Vec<PeerId>,
    pub predecessors: Vec<PeerId>,
    pub sample: Option<Vec<PeerId>>,
    pub size_estimate: Option<u64>,
    pub confidence: Option<f64>,
    pub sig: Option<String>,
}

/// A block fetched via a `Get` operation's reply, kept separate from
/// `RepoMessage` since replies carry data the request doesn't.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetResult {
    pub block_id: BlockId,
    pub block: Option<Block>,
}

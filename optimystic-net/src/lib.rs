//! Wire messages and transport abstraction.

mod framing;
pub mod mem;
mod messages;
mod protocol;
mod transport;

pub use framing::{read_frame, write_frame};
pub use messages::{
    ActionPending, ActionTransforms, CommitRequest, CommitResult, GetResult, NeighborSnapshotV1,
    Operation, PeerAddr, PendPolicy, PendRequest, PendResult, Redirect, RepoMessage,
};
pub use protocol::{
    namespaced, CLUSTER, FRET_LEAVE, FRET_MAYBE_ACT, FRET_NEIGHBORS, FRET_NEIGHBORS_ANNOUNCE,
    FRET_PING, REPO, SYNC,
};
pub use transport::{request_json, PeerNetwork, Stream};

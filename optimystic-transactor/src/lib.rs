//! Transactor: node-local pend/commit/cancel/get state
//! machine over blocks, kept per node. The collection layer drives it
//! through [`optimystic_collection::CollectionTransactor`]; the wire
//! layer drives it through [`handle_repo_message`] on behalf of remote
//! replicas.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use optimystic_base::{kind_err, ActionId, ActionRev, BlockId, CollectionId, Error, ErrorKind, Hash32, Result, Revision, Transaction};
use optimystic_collection::{CollectionTransactor, TransactOutcome};
use optimystic_net::{ActionPending, CommitResult, PendPolicy, PendRequest, PendResult};
use optimystic_store::{Block, BlockStore, Transforms};

#[cfg(test)]
mod model;

#[derive(Default, Clone)]
struct PendingState {
    latest: Option<ActionRev>,
    pendings: BTreeSet<ActionId>,
}

/// Per-action position in the `none -> pending -> committed ->
/// checkpointed` lifecycle; `pending -> aborted` via `cancel`. `None`
/// means the transactor has no record of the action at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionState {
    None,
    Pending,
    Committed,
    Checkpointed,
    Aborted,
}

pub struct Transactor {
    store: Arc<dyn BlockStore>,
    per_block: Mutex<BTreeMap<BlockId, PendingState>>,
    pending_transforms: Mutex<BTreeMap<ActionId, (BTreeSet<BlockId>, Transforms)>>,
    collection_revs: Mutex<BTreeMap<CollectionId, Revision>>,
    action_states: Mutex<BTreeMap<ActionId, ActionState>>,
    committed_at: Mutex<BTreeMap<ActionId, (CollectionId, Revision)>>,
    checkpoint_revs: Mutex<BTreeMap<CollectionId, Revision>>,
}

impl Transactor {
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Transactor {
            store,
            per_block: Mutex::new(BTreeMap::new()),
            pending_transforms: Mutex::new(BTreeMap::new()),
            collection_revs: Mutex::new(BTreeMap::new()),
            action_states: Mutex::new(BTreeMap::new()),
            committed_at: Mutex::new(BTreeMap::new()),
            checkpoint_revs: Mutex::new(BTreeMap::new()),
        }
    }

    /// The current lifecycle state of each named action, `None` for any
    /// action this transactor has no record of.
    pub fn get_status(&self, action_refs: &[ActionId]) -> BTreeMap<ActionId, ActionState> {
        let states = self.action_states.lock().unwrap();
        action_refs
            .iter()
            .map(|id| (id.clone(), states.get(id).copied().unwrap_or(ActionState::None)))
            .collect()
    }

    /// Advance `collection_id`'s checkpoint watermark to `upto_rev`,
    /// promoting every action committed at or below it to `checkpointed`.
    /// A checkpoint only moves forward; a stale or repeated call is a
    /// no-op.
    pub fn checkpoint(&self, collection_id: &CollectionId, upto_rev: Revision) {
        let mut watermarks = self.checkpoint_revs.lock().unwrap();
        let current = watermarks.get(collection_id).copied().unwrap_or(Revision::NONE);
        if upto_rev.0 <= current.0 {
            return;
        }
        watermarks.insert(collection_id.clone(), upto_rev);
        drop(watermarks);

        let committed_at = self.committed_at.lock().unwrap();
        let mut states = self.action_states.lock().unwrap();
        for (action_id, (action_collection, rev)) in committed_at.iter() {
            if action_collection == collection_id && rev.0 <= upto_rev.0 {
                if let Some(state) = states.get_mut(action_id) {
                    if *state == ActionState::Committed {
                        *state = ActionState::Checkpointed;
                    }
                }
            }
        }
    }

    pub fn get(&self, id: &BlockId) -> Result<Option<Block>> {
        self.store.try_get(id)
    }

    /// The revision a block was last committed at, or `Revision::NONE` if
    /// it has never been committed. Used by the validator's read-
    /// dependency check.
    pub fn block_revision(&self, id: &BlockId) -> Revision {
        self.per_block
            .lock()
            .unwrap()
            .get(id)
            .and_then(|state| state.latest.as_ref())
            .map(|action_rev| action_rev.rev)
            .unwrap_or(Revision::NONE)
    }

    /// Register a batch of transforms as pending against every block id
    /// they touch. `Collide` rejects if another action already has a
    /// pending on any of those blocks; `Force` and `Replace` always
    /// accept (the distinction matters to the collection layer's
    /// deferred-replacement bookkeeping, not here).
    pub fn pend(
        &self,
        action_id: ActionId,
        transforms: Transforms,
        policy: PendPolicy,
    ) -> Result<PendOutcome> {
        let block_ids = transforms.block_ids();
        let mut per_block = self.per_block.lock().unwrap();

        if policy == PendPolicy::Collide {
            let mut conflicting_ids = BTreeSet::new();
            for id in &block_ids {
                if let Some(state) = per_block.get(id) {
                    if state.pendings.iter().any(|p| p != &action_id) {
                        conflicting_ids.insert(id.clone());
                    }
                }
            }
            if !conflicting_ids.is_empty() {
                return Ok(PendOutcome::Conflict {
                    pendings_on_blocks: conflicting_ids,
                });
            }
        }

        for id in &block_ids {
            per_block.entry(id.clone()).or_default().pendings.insert(action_id.clone());
        }
        self.pending_transforms
            .lock()
            .unwrap()
            .insert(action_id.clone(), (block_ids.clone(), transforms));
        self.action_states.lock().unwrap().insert(action_id, ActionState::Pending);
        Ok(PendOutcome::Accepted { block_ids })
    }

    /// `pend`, but first runs `hook` against `transaction`/`operations_hash`
    /// when all three are present. A validation failure is reported as
    /// `Rejected` rather than accepted; the action never becomes pending.
    pub fn pend_with_validation(
        &self,
        action_id: ActionId,
        transforms: Transforms,
        policy: PendPolicy,
        transaction: Option<&Transaction>,
        operations_hash: Option<&Hash32>,
        hook: Option<&dyn PendValidationHook>,
    ) -> Result<PendOutcome> {
        if let (Some(transaction), Some(operations_hash), Some(hook)) = (transaction, operations_hash, hook) {
            if !hook.validate(transaction, operations_hash)? {
                return Ok(PendOutcome::Rejected {
                    reason: "transaction failed re-execution validation".to_string(),
                });
            }
        }
        self.pend(action_id, transforms, policy)
    }

    pub fn cancel(&self, action_id: &ActionId) {
        if let Some((block_ids, _)) = self.pending_transforms.lock().unwrap().remove(action_id) {
            let mut per_block = self.per_block.lock().unwrap();
            for id in block_ids {
                if let Some(state) = per_block.get_mut(&id) {
                    state.pendings.remove(action_id);
                }
            }
        }
        self.action_states
            .lock()
            .unwrap()
            .insert(action_id.clone(), ActionState::Aborted);
    }

    /// Promote a pending action to committed: verify the target revision
    /// is exactly one past the collection's current tail, apply the
    /// transforms to the store, and clear the pending markers.
    pub fn commit(
        &self,
        collection_id: &CollectionId,
        action_id: ActionId,
        new_rev: Revision,
    ) -> Result<CommitOutcome> {
        let mut revs = self.collection_revs.lock().unwrap();
        let current = revs.get(collection_id).copied().unwrap_or(Revision::NONE);
        if new_rev != current.next() {
            return Ok(CommitOutcome::Stale);
        }

        let (block_ids, transforms) = self
            .pending_transforms
            .lock()
            .unwrap()
            .remove(&action_id)
            .ok_or_else(|| kind_err(ErrorKind::PartialCommit, "no pending transforms for action"))?;

        self.store.apply(&transforms)?;

        let mut per_block = self.per_block.lock().unwrap();
        for id in &block_ids {
            let state = per_block.entry(id.clone()).or_default();
            state.pendings.remove(&action_id);
            state.latest = Some(ActionRev {
                action_id: action_id.clone(),
                rev: new_rev,
            });
        }
        revs.insert(collection_id.clone(), new_rev);
        self.committed_at
            .lock()
            .unwrap()
            .insert(action_id.clone(), (collection_id.clone(), new_rev));
        self.action_states.lock().unwrap().insert(action_id, ActionState::Committed);
        Ok(CommitOutcome::Success)
    }
}

pub enum PendOutcome {
    Accepted { block_ids: BTreeSet<BlockId> },
    Conflict { pendings_on_blocks: BTreeSet<BlockId> },
    /// A validation hook ran against the claimed transaction and rejected
    /// it; the pend never took effect.
    Rejected { reason: String },
}

/// Runs against a claimed `Transaction` and its `operationsHash` before a
/// replica accepts a pend. A trait rather than a concrete type so this
/// crate doesn't need to depend on whatever engine registry the hook's
/// re-execution needs; the coordinator wires its own validator in.
pub trait PendValidationHook: Send + Sync {
    fn validate(&self, transaction: &Transaction, operations_hash: &Hash32) -> Result<bool>;
}

pub enum CommitOutcome {
    Success,
    Stale,
}

/// The single-node path a `Collection` uses: pend then immediately
/// commit under the `Force` policy, since a collection only ever
/// transacts with its own node's transactor.
impl CollectionTransactor for Transactor {
    fn get(&self, _collection_id: &CollectionId, id: &BlockId) -> Result<Option<Block>> {
        Transactor::get(self, id)
    }

    fn transact(
        &self,
        collection_id: &CollectionId,
        transforms: &Transforms,
        action_id: ActionId,
        new_rev: Revision,
        _tail_block_id: BlockId,
        _transaction: Option<&Transaction>,
        _operations_hash: Option<&Hash32>,
    ) -> Result<TransactOutcome> {
        match self.pend(action_id.clone(), transforms.clone(), PendPolicy::Force)? {
            PendOutcome::Rejected { reason } => Err(kind_err(ErrorKind::Other, reason)),
            PendOutcome::Conflict { pendings_on_blocks } => {
                Ok(TransactOutcome::StaleFailure { pendings_on_blocks })
            }
            PendOutcome::Accepted { .. } => match self.commit(collection_id, action_id.clone(), new_rev)? {
                CommitOutcome::Success => Ok(TransactOutcome::Success),
                CommitOutcome::Stale => {
                    self.cancel(&action_id);
                    Ok(TransactOutcome::StaleFailure {
                        pendings_on_blocks: BTreeSet::new(),
                    })
                }
            },
        }
    }
}

/// Handle a `PendRequest` arriving over the wire on behalf of a remote
/// coordinator: pend the transforms
/// against this node's transactor and report the outcome in wire shape.
pub fn handle_pend(transactor: &Transactor, request: PendRequest) -> PendResult {
    handle_pend_validated(transactor, request, None)
}

/// Handle a `PendRequest`, optionally running `hook` against its
/// `transaction`/`operations_hash` first when both are present.
pub fn handle_pend_validated(
    transactor: &Transactor,
    request: PendRequest,
    hook: Option<&dyn PendValidationHook>,
) -> PendResult {
    let outcome = transactor.pend_with_validation(
        request.action_id.clone(),
        request.transforms,
        request.policy,
        request.transaction.as_ref(),
        request.operations_hash.as_ref(),
        hook,
    );
    match outcome {
        Ok(PendOutcome::Accepted { block_ids }) => PendResult::success(Vec::new(), block_ids),
        Ok(PendOutcome::Conflict { pendings_on_blocks }) => PendResult::failure(
            "stale",
            Vec::new(),
            pendings_on_blocks
                .into_iter()
                .map(|id| ActionPending {
                    action_id: request.action_id.clone(),
                    block_ids: [id].into_iter().collect(),
                })
                .collect(),
        ),
        Ok(PendOutcome::Rejected { reason }) => PendResult::failure(reason, Vec::new(), Vec::new()),
        Err(e) => PendResult::failure(e.to_string(), Vec::new(), Vec::new()),
    }
}

/// Handle a `CommitRequest` arriving over the wire.
pub fn handle_commit(
    transactor: &Transactor,
    collection_id: &CollectionId,
    action_id: ActionId,
    new_rev: Revision,
) -> CommitResult {
    match transactor.commit(collection_id, action_id, new_rev) {
        Ok(CommitOutcome::Success) => CommitResult::success(None),
        Ok(CommitOutcome::Stale) => CommitResult::stale_failure(Vec::new(), Vec::new()),
        Err(_) => CommitResult::stale_failure(Vec::new(), Vec::new()),
    }
}

pub fn log_not_found(collection_id: &CollectionId) -> Error {
    kind_err(ErrorKind::LogNotFound, format!("no log for collection {}", collection_id))
}

pub fn no_handler(action_type: &str) -> Error {
    kind_err(ErrorKind::NoHandler, format!("no handler for action type {}", action_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimystic_store::InMemoryBlockStore;
    use serde_json::json;

    fn transactor() -> Transactor {
        Transactor::new(Arc::new(InMemoryBlockStore::new()))
    }

    fn insert_transforms(id: &str) -> Transforms {
        let mut t = Transforms::empty();
        t.insert(Block::new(BlockId::from(id), "XX", json!({"v": 1})));
        t
    }

    #[test]
    fn pend_then_commit_applies_to_store() {
        let t = transactor();
        let action_id = ActionId::new_random();
        let transforms = insert_transforms("x");
        t.pend(action_id.clone(), transforms, PendPolicy::Force).unwrap();
        let outcome = t.commit(&CollectionId::from("c1"), action_id, Revision(1)).unwrap();
        assert!(matches!(outcome, CommitOutcome::Success));
        assert!(t.get(&BlockId::from("x")).unwrap().is_some());
    }

    #[test]
    fn commit_with_wrong_revision_is_stale() {
        let t = transactor();
        let action_id = ActionId::new_random();
        t.pend(action_id.clone(), insert_transforms("x"), PendPolicy::Force).unwrap();
        let outcome = t.commit(&CollectionId::from("c1"), action_id, Revision(5)).unwrap();
        assert!(matches!(outcome, CommitOutcome::Stale));
    }

    #[test]
    fn collide_policy_rejects_overlapping_pending() {
        let t = transactor();
        let a1 = ActionId::new_random();
        let a2 = ActionId::new_random();
        t.pend(a1, insert_transforms("x"), PendPolicy::Collide).unwrap();
        let outcome = t.pend(a2, insert_transforms("x"), PendPolicy::Collide).unwrap();
        assert!(matches!(outcome, PendOutcome::Conflict { .. }));
    }

    #[test]
    fn cancel_clears_pending_markers() {
        let t = transactor();
        let action_id = ActionId::new_random();
        t.pend(action_id.clone(), insert_transforms("x"), PendPolicy::Collide).unwrap();
        t.cancel(&action_id);
        let a2 = ActionId::new_random();
        let outcome = t.pend(a2, insert_transforms("x"), PendPolicy::Collide).unwrap();
        assert!(matches!(outcome, PendOutcome::Accepted { .. }));
    }

    #[test]
    fn get_status_tracks_the_full_lifecycle() {
        let t = transactor();
        let collection_id = CollectionId::from("c1");
        let pending = ActionId::new_random();
        let committed = ActionId::new_random();
        let cancelled = ActionId::new_random();
        let unknown = ActionId::new_random();

        t.pend(pending.clone(), insert_transforms("x"), PendPolicy::Force).unwrap();

        t.pend(committed.clone(), insert_transforms("y"), PendPolicy::Force).unwrap();
        t.commit(&collection_id, committed.clone(), Revision(1)).unwrap();

        t.pend(cancelled.clone(), insert_transforms("z"), PendPolicy::Force).unwrap();
        t.cancel(&cancelled);

        let refs = [pending.clone(), committed.clone(), cancelled.clone(), unknown.clone()];
        let status = t.get_status(&refs);
        assert_eq!(status[&pending], ActionState::Pending);
        assert_eq!(status[&committed], ActionState::Committed);
        assert_eq!(status[&cancelled], ActionState::Aborted);
        assert_eq!(status[&unknown], ActionState::None);

        t.checkpoint(&collection_id, Revision(1));
        let status = t.get_status(&[committed.clone()]);
        assert_eq!(status[&committed], ActionState::Checkpointed);
    }

    #[test]
    fn checkpoint_does_not_promote_revisions_past_the_watermark() {
        let t = transactor();
        let collection_id = CollectionId::from("c1");
        let a1 = ActionId::new_random();
        let a2 = ActionId::new_random();
        t.pend(a1.clone(), insert_transforms("x"), PendPolicy::Force).unwrap();
        t.commit(&collection_id, a1.clone(), Revision(1)).unwrap();
        t.pend(a2.clone(), insert_transforms("y"), PendPolicy::Force).unwrap();
        t.commit(&collection_id, a2.clone(), Revision(2)).unwrap();

        t.checkpoint(&collection_id, Revision(1));
        let status = t.get_status(&[a1.clone(), a2.clone()]);
        assert_eq!(status[&a1], ActionState::Checkpointed);
        assert_eq!(status[&a2], ActionState::Committed);
    }
}

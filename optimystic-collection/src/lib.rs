//! Collection: the action pipeline, local apply (`act`),
//! pull-and-reconcile (`update`), push (`sync`), and log replay
//! (`select_log`), sitting atop a per-collection `Tracker` and
//! `CollectionLog`.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use optimystic_base::{err, kind_err, ActionContext, ActionId, BlockId, CollectionId, ErrorKind, Hash32, Result, Revision, Transaction};
use optimystic_log::{Action, CollectionLog};
use optimystic_store::{Block, Transforms};
use optimystic_tracker::{BlockSource, Tracker, TrackerHandle};

const PENDING_RETRY_DELAY: Duration = Duration::from_millis(100);

/// What a collection's handlers turn an `Action` into: a mutation on
/// whatever tracker they're handed (the main tracker, or a speculative
/// one built atop it while validating a batch).
pub trait Handler: Send + Sync {
    fn handle(&self, action: &Action, tracker: &mut dyn TrackerHandle) -> Result<()>;
}

/// The node-local surface of the transactor that a
/// collection needs: read blocks "as of" the collection's log, and
/// submit a batch of transforms for commit.
pub trait CollectionTransactor: Send + Sync {
    fn get(&self, collection_id: &CollectionId, id: &BlockId) -> Result<Option<Block>>;

    /// `transaction`/`operations_hash` carry the coordinator's claimed
    /// transaction and its canonical hash when this commit is part of a
    /// multi-collection session, so a replica can re-validate it before
    /// admitting the pend; a plain single-collection `sync` passes `None`
    /// for both.
    fn transact(
        &self,
        collection_id: &CollectionId,
        transforms: &Transforms,
        action_id: ActionId,
        new_rev: Revision,
        tail_block_id: BlockId,
        transaction: Option<&Transaction>,
        operations_hash: Option<&Hash32>,
    ) -> Result<TransactOutcome>;
}

pub enum TransactOutcome {
    Success,
    /// Rejected because the targeted revision has already moved; the
    /// block ids below (if any) have other pending actions in flight.
    StaleFailure {
        pendings_on_blocks: BTreeSet<BlockId>,
    },
}

/// A `BlockSource` reading through a `CollectionTransactor` at "latest".
struct TransactorSource<T: CollectionTransactor> {
    transactor: Arc<T>,
    collection_id: CollectionId,
}

impl<T: CollectionTransactor> BlockSource for TransactorSource<T> {
    fn get(&self, id: &BlockId) -> Result<Option<Block>> {
        self.transactor.get(&self.collection_id, id)
    }
}

type ConflictFilter = dyn Fn(&Action, &[Action]) -> Option<Action> + Send + Sync;

struct State<T: CollectionTransactor> {
    tracker: Tracker<TransactorSource<T>>,
    pending: Vec<Action>,
    context: ActionContext,
}

pub struct Collection<T: CollectionTransactor> {
    id: CollectionId,
    transactor: Arc<T>,
    handlers: HashMap<String, Arc<dyn Handler>>,
    log: CollectionLog,
    state: Mutex<State<T>>,
    sync_lock: Mutex<()>,
    filter_conflict: Option<Box<ConflictFilter>>,
}

impl<T: CollectionTransactor> Collection<T> {
    pub fn create_or_open(
        transactor: Arc<T>,
        store: Arc<dyn optimystic_store::BlockStore>,
        id: CollectionId,
        handlers: HashMap<String, Arc<dyn Handler>>,
    ) -> Result<Self> {
        let source = TransactorSource {
            transactor: transactor.clone(),
            collection_id: id.clone(),
        };
        let (log, context) = CollectionLog::create_or_open(store, id.clone())?;
        Ok(Collection {
            id,
            transactor,
            handlers,
            log,
            state: Mutex::new(State {
                tracker: Tracker::new(source),
                pending: Vec::new(),
                context,
            }),
            sync_lock: Mutex::new(()),
            filter_conflict: None,
        })
    }

    pub fn with_filter_conflict(
        mut self,
        filter: impl Fn(&Action, &[Action]) -> Option<Action> + Send + Sync + 'static,
    ) -> Self {
        self.filter_conflict = Some(Box::new(filter));
        self
    }

    pub fn id(&self) -> &CollectionId {
        &self.id
    }

    /// Apply a batch of actions to the local tracker and enqueue them as
    /// pending. On any handler error the tracker is rolled back to
    /// exactly its prior state and nothing is enqueued.
    pub fn act(&self, actions: Vec<Action>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let snapshot = state.tracker.peek().deep_clone();
        for action in &actions {
            let handler = self
                .handlers
                .get(&action.action_type)
                .ok_or_else(|| kind_err(ErrorKind::NoHandler, format!("no handler for action type {}", action.action_type)))?;
            if let Err(e) = handler.handle(action, &mut state.tracker) {
                state.tracker.restore(snapshot);
                return Err(e);
            }
        }
        state.pending.extend(actions);
        Ok(())
    }

    /// Pull remote log entries since the current context and reconcile
    /// pending local work against them.
    pub fn update(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let since = state.context.rev;
        let (entries, new_context) = self.log.get_from(since)?;
        let mut any_conflicts = false;
        for entry in &entries {
            if let Some(filter) = &self.filter_conflict {
                let mut kept = Vec::new();
                let mut resubmit = Vec::new();
                for local in state.pending.drain(..) {
                    match filter(&local, &entry.actions) {
                        None => {}
                        Some(replacement) if replacement == local => kept.push(local),
                        Some(replacement) => resubmit.push(replacement),
                    }
                }
                state.pending = kept;
                for action in resubmit {
                    let handler = self.handlers.get(&action.action_type).ok_or_else(|| {
                        kind_err(ErrorKind::NoHandler, format!("no handler for action type {}", action.action_type))
                    })?;
                    handler.handle(&action, &mut state.tracker)?;
                    state.pending.push(action);
                }
            }
            if !state.tracker.conflicts(&entry.block_ids).is_empty() {
                any_conflicts = true;
            }
        }
        if any_conflicts {
            state.tracker.reset();
            let pending = state.pending.clone();
            state.pending.clear();
            for action in pending {
                let handler = self
                    .handlers
                    .get(&action.action_type)
                    .ok_or_else(|| kind_err(ErrorKind::NoHandler, format!("no handler for action type {}", action.action_type)))?;
                handler.handle(&action, &mut state.tracker)?;
                state.pending.push(action);
            }
        }
        state.context = new_context;
        Ok(())
    }

    /// Push pending actions and tracked transforms to the transactor
    /// under this collection's named lock, retrying on stale failure.
    pub fn sync(&self) -> Result<()> {
        self.sync_inner(None, None)
    }

    /// `sync`, carrying the coordinator's `Transaction` and its claimed
    /// operations hash through to the transactor so a replica can
    /// re-validate the commit before admitting it.
    pub fn sync_for_commit(&self, transaction: &Transaction, operations_hash: &Hash32) -> Result<()> {
        self.sync_inner(Some(transaction), Some(operations_hash))
    }

    fn sync_inner(&self, transaction: Option<&Transaction>, operations_hash: Option<&Hash32>) -> Result<()> {
        let _guard = self.sync_lock.lock().unwrap();
        loop {
            let (snapshot_actions, snapshot_transforms, new_rev, action_id) = {
                let state = self.state.lock().unwrap();
                if state.pending.is_empty() && state.tracker.is_empty() {
                    return Ok(());
                }
                (
                    state.pending.clone(),
                    state.tracker.peek().clone(),
                    state.context.rev.next(),
                    ActionId::new_random(),
                )
            };

            let added = match self.log.add_actions(
                snapshot_actions.clone(),
                action_id.clone(),
                new_rev,
                snapshot_transforms.block_ids(),
            ) {
                Ok(added) => added,
                // Someone else advanced the log tail first; this is the
                // same recoverable condition `transactor.transact` reports
                // as a stale failure below, refresh and retry rather than
                // propagating a fatal error.
                Err(e) if e.kind() == &ErrorKind::StaleFailure => {
                    self.update()?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let outcome = self.transactor.transact(
                &self.id,
                &snapshot_transforms,
                action_id.clone(),
                new_rev,
                added.tail_path,
                transaction,
                operations_hash,
            )?;

            match outcome {
                TransactOutcome::Success => {
                    let mut state = self.state.lock().unwrap();
                    state
                        .pending
                        .retain(|a| !snapshot_actions.iter().any(|s| s.action_type == a.action_type && s.data == a.data));
                    state.tracker.reset();
                    drop(state);
                    self.update()?;
                    let mut state = self.state.lock().unwrap();
                    state.context.record(action_id, new_rev);
                    return Ok(());
                }
                TransactOutcome::StaleFailure { pendings_on_blocks } => {
                    if !pendings_on_blocks.is_empty() {
                        std::thread::sleep(PENDING_RETRY_DELAY);
                    }
                    self.update()?;
                }
            }
        }
    }

    pub fn update_and_sync(&self) -> Result<()> {
        self.update()?;
        self.sync()
    }

    /// Actions of each log entry, in forward or reverse order.
    pub fn select_log(&self, forward: bool) -> Result<Vec<Action>> {
        let entries = self.log.select(None, forward)?;
        Ok(entries.into_iter().flat_map(|e| e.actions).collect())
    }

    pub fn action_context(&self) -> ActionContext {
        self.state.lock().unwrap().context.clone()
    }

    /// The transforms accumulated by `act` calls since the last `sync`,
    /// without draining them. Used by a coordinator spanning several
    /// collections to project a cross-collection operations hash before
    /// any collection actually syncs.
    pub fn snapshot(&self) -> Transforms {
        self.state.lock().unwrap().tracker.peek().clone()
    }

    /// How many actions are queued for the next `sync`. A coordinator
    /// records this before touching a collection so it can truncate back
    /// to it on rollback without disturbing actions enqueued by others.
    pub fn pending_len(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Roll the tracker back to `transforms` and drop any pending actions
    /// enqueued after `pending_len`, as a multi-collection `rollback()`
    /// does. Never touches committed state; nothing here has been synced yet.
    pub fn discard_since(&self, transforms: Transforms, pending_len: usize) {
        let mut state = self.state.lock().unwrap();
        state.tracker.restore(transforms);
        state.pending.truncate(pending_len);
    }
}

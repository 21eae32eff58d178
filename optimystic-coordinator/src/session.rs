//! Coordinator session lifecycle: `begin` / `execute` /
//! `commit` / `rollback` over a fixed set of collections sharing one
//! node's transactor.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use optimystic_base::{
    kind_err, CollectionId, Error, ErrorKind, PeerId, Read, Result, Timestamp, Transaction,
    TransactionStamp,
};
use optimystic_collection::{Collection, CollectionTransactor};
use optimystic_engine::Engine;
use optimystic_store::Transforms;

use crate::operations::operations_hash;

fn now_micros() -> Timestamp {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Timestamp(since_epoch.as_micros() as i64)
}

/// What a collection looked like the first time this session touched it;
/// rollback restores exactly this.
struct TouchedBefore {
    transforms: Transforms,
    pending_len: usize,
}

pub struct CommitOutcome {
    pub coordinator_id: CollectionId,
    pub operations_hash: optimystic_base::Hash32,
}

/// A multi-collection transaction in progress on one node.
/// `collections` is the fixed set this session may touch; an `execute`
/// naming any other collection id is an error.
pub struct Session<T: CollectionTransactor> {
    stamp: TransactionStamp,
    engine: Arc<dyn Engine>,
    collections: HashMap<CollectionId, Arc<Collection<T>>>,
    statements: Mutex<Vec<String>>,
    reads: Mutex<Vec<Read>>,
    touched: Mutex<BTreeMap<CollectionId, TouchedBefore>>,
}

impl<T: CollectionTransactor> Session<T> {
    /// `begin()`: mint a fresh `TransactionStamp` for `peer_id` against
    /// `engine`'s current schema.
    pub fn begin(
        peer_id: PeerId,
        engine: Arc<dyn Engine>,
        collections: HashMap<CollectionId, Arc<Collection<T>>>,
    ) -> Self {
        let stamp = TransactionStamp::new(peer_id, now_micros(), engine.schema_hash(), engine.id());
        Session {
            stamp,
            engine,
            collections,
            statements: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
            touched: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn stamp(&self) -> &TransactionStamp {
        &self.stamp
    }

    pub fn record_read(&self, read: Read) {
        self.reads.lock().unwrap().push(read);
    }

    /// `execute(statement)`: ask the engine to translate `statement` into
    /// per-collection actions and apply them immediately via each
    /// collection's `act`.
    pub fn execute(&self, statement: &str) -> Result<()> {
        let actions_by_collection = self.engine.execute(statement)?;
        let mut touched = self.touched.lock().unwrap();
        for (collection_id, actions) in actions_by_collection {
            let collection = self.collections.get(&collection_id).ok_or_else(|| {
                kind_err(
                    ErrorKind::Other,
                    format!("session has no collection {collection_id}"),
                )
            })?;
            touched.entry(collection_id).or_insert_with(|| TouchedBefore {
                transforms: collection.snapshot(),
                pending_len: collection.pending_len(),
            });
            collection.act(actions)?;
        }
        self.statements.lock().unwrap().push(statement.to_string());
        Ok(())
    }

    /// `commit()`: project every touched collection's transforms into the
    /// canonical operations list, hash it, pin the first touched
    /// collection (lowest id) as `coordinatorId`, then push every
    /// collection's `sync` in that fixed order. A failure partway through
    /// is a `PartialCommit`, not a silent rollback: some replicas may
    /// already have committed.
    pub fn commit(&self) -> Result<Option<CommitOutcome>> {
        let touched = self.touched.lock().unwrap();
        if touched.is_empty() {
            return Ok(None);
        }

        let coordinator_id = touched.keys().next().cloned().expect("non-empty checked above");
        let projection: Vec<(CollectionId, Transforms)> = touched
            .iter()
            .map(|(id, before)| {
                let collection = &self.collections[id];
                (id.clone(), collection.snapshot())
            })
            .collect();
        let hash = operations_hash(&projection)?;

        let transaction = Transaction::new(
            self.stamp.clone(),
            self.statements.lock().unwrap().clone(),
            self.reads.lock().unwrap().clone(),
        );

        let mut committed = Vec::new();
        for collection_id in touched.keys() {
            let collection = &self.collections[collection_id];
            if let Err(e) = collection.sync_for_commit(&transaction, &hash) {
                return Err(partial_commit(&committed, collection_id, e));
            }
            committed.push(collection_id.clone());
        }

        drop(touched);
        self.touched.lock().unwrap().clear();
        self.statements.lock().unwrap().clear();
        self.reads.lock().unwrap().clear();

        Ok(Some(CommitOutcome {
            coordinator_id,
            operations_hash: hash,
        }))
    }

    /// `rollback()`: discard every touched collection's uncommitted
    /// tracker overlay and pending actions, restoring exactly the
    /// snapshot taken the first time this session touched it.
    pub fn rollback(&self) {
        let mut touched = self.touched.lock().unwrap();
        for (collection_id, before) in touched.drain() {
            if let Some(collection) = self.collections.get(&collection_id) {
                collection.discard_since(before.transforms, before.pending_len);
            }
        }
        self.statements.lock().unwrap().clear();
        self.reads.lock().unwrap().clear();
    }
}

fn partial_commit(committed: &[CollectionId], failed_on: &CollectionId, cause: Error) -> Error {
    kind_err(
        ErrorKind::PartialCommit,
        format!(
            "committed {committed:?} before failing on {failed_on}: {cause}"
        ),
    )
}
